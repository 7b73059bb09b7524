//! Asynchronous event notifications and their dispatch.
//!
//! Replies in the 6xx code range are events, not command responses. The
//! [`EventDispatcher`] routes each one to the observers registered for its
//! event type, in registration order, synchronously on the connection's
//! reader task. Observers must not block: command replies and further
//! events share that one read path.

use crate::error::ControlError;
use crate::protocol::{parse_key_value_pairs, ControlReply};
use crate::types::{
    parse_path, CircuitId, CircuitPurpose, CircuitStatus, Fingerprint, NodeRef, OrConnStatus,
    StreamId, StreamStatus,
};
use data_encoding::BASE64_NOPAD;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Event types subscribable with SETEVENTS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A circuit changed state.
    Circ,
    /// Minor circuit change (purpose or cannibalization).
    CircMinor,
    /// A stream changed state.
    Stream,
    /// An OR connection changed state.
    OrConn,
    /// Bytes moved in the last second.
    Bw,
    /// Debug-severity log line.
    Debug,
    /// Info-severity log line.
    Info,
    /// Notice-severity log line.
    Notice,
    /// Warning-severity log line.
    Warn,
    /// Error-severity log line.
    Err,
    /// The daemon fetched new relay descriptors.
    NewDesc,
    /// An address mapping was added, expired, or failed.
    AddrMap,
    /// The daemon's own descriptor changed.
    DescChanged,
    /// Status report affecting the whole daemon.
    StatusGeneral,
    /// Status report about client operation.
    StatusClient,
    /// Status report about server operation.
    StatusServer,
    /// The guard set changed.
    Guard,
    /// Network status entries changed for some relays.
    Ns,
    /// A fresh consensus arrived.
    NewConsensus,
    /// A signal was processed.
    Signal,
    /// The configuration changed out from under us.
    ConfChanged,
    /// The network became reachable or unreachable.
    NetworkLiveness,
    /// Progress fetching or uploading a hidden service descriptor.
    HsDesc,
    /// Content of a fetched hidden service descriptor.
    HsDescContent,
}

impl EventType {
    /// Keyword table, one entry per variant.
    const KEYWORDS: &'static [(EventType, &'static str)] = &[
        (EventType::Circ, "CIRC"),
        (EventType::CircMinor, "CIRC_MINOR"),
        (EventType::Stream, "STREAM"),
        (EventType::OrConn, "ORCONN"),
        (EventType::Bw, "BW"),
        (EventType::Debug, "DEBUG"),
        (EventType::Info, "INFO"),
        (EventType::Notice, "NOTICE"),
        (EventType::Warn, "WARN"),
        (EventType::Err, "ERR"),
        (EventType::NewDesc, "NEWDESC"),
        (EventType::AddrMap, "ADDRMAP"),
        (EventType::DescChanged, "DESCCHANGED"),
        (EventType::StatusGeneral, "STATUS_GENERAL"),
        (EventType::StatusClient, "STATUS_CLIENT"),
        (EventType::StatusServer, "STATUS_SERVER"),
        (EventType::Guard, "GUARD"),
        (EventType::Ns, "NS"),
        (EventType::NewConsensus, "NEWCONSENSUS"),
        (EventType::Signal, "SIGNAL"),
        (EventType::ConfChanged, "CONF_CHANGED"),
        (EventType::NetworkLiveness, "NETWORK_LIVENESS"),
        (EventType::HsDesc, "HS_DESC"),
        (EventType::HsDescContent, "HS_DESC_CONTENT"),
    ];

    /// The event keyword on the wire.
    pub fn as_str(&self) -> &'static str {
        Self::KEYWORDS
            .iter()
            .find(|(ty, _)| ty == self)
            .map(|(_, keyword)| *keyword)
            .expect("keyword table covers every event type")
    }
}

impl FromStr for EventType {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, ControlError> {
        Self::KEYWORDS
            .iter()
            .find(|(_, keyword)| keyword.eq_ignore_ascii_case(s))
            .map(|(ty, _)| *ty)
            .ok_or_else(|| ControlError::Parse(format!("unknown event type: {}", s)))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed asynchronous event.
///
/// Known event shapes get a structured variant; everything else is carried
/// opaquely so unknown event types stay deliverable (forward compatibility:
/// an unknown event is never a protocol error).
#[derive(Debug, Clone)]
pub enum Event {
    /// A circuit changed state.
    CircuitStatus(CircuitEvent),
    /// A stream changed state.
    StreamStatus(StreamEvent),
    /// An OR connection changed state.
    OrConnStatus(OrConnEvent),
    /// Bytes moved in the last second.
    Bandwidth(BandwidthEvent),
    /// A log line from the daemon.
    Log(LogEvent),
    /// An address mapping was added, expired, or failed.
    AddressMap(AddressMapEvent),
    /// A general/client/server status report.
    Status(StatusEvent),
    /// Network status entries for some relays.
    NetworkStatus(Vec<NsEntry>),
    /// The network became reachable or unreachable.
    NetworkLiveness(bool),
    /// Any event without a structured parse, carried verbatim.
    Opaque {
        /// The event keyword as received.
        name: String,
        /// The raw event payload.
        data: String,
    },
}

/// Circuit status event payload.
#[derive(Debug, Clone)]
pub struct CircuitEvent {
    /// The circuit this event concerns.
    pub id: CircuitId,
    /// New status.
    pub status: CircuitStatus,
    /// Relay path, possibly empty while the circuit is being built.
    pub path: Vec<NodeRef>,
    /// Build flags from `BUILD_FLAGS=`.
    pub build_flags: Vec<String>,
    /// Circuit purpose from `PURPOSE=`.
    pub purpose: Option<CircuitPurpose>,
    /// Creation time from `TIME_CREATED=`.
    pub time_created: Option<String>,
    /// Local reason for failure or closure.
    pub reason: Option<String>,
    /// Remote reason for failure or closure.
    pub remote_reason: Option<String>,
}

/// Stream status event payload.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// The stream this event concerns.
    pub id: StreamId,
    /// New status.
    pub status: StreamStatus,
    /// Circuit carrying the stream, 0 while unattached.
    pub circuit: CircuitId,
    /// Target `address:port`.
    pub target: String,
    /// Reason for failure or closure.
    pub reason: Option<String>,
    /// Source address of the stream.
    pub source_addr: Option<String>,
    /// Why the stream was opened.
    pub purpose: Option<String>,
}

/// OR connection status event payload.
#[derive(Debug, Clone)]
pub struct OrConnEvent {
    /// Long name or `address:port` of the peer.
    pub target: String,
    /// New status.
    pub status: OrConnStatus,
    /// Reason for failure or closure.
    pub reason: Option<String>,
    /// Number of circuits on the connection.
    pub num_circuits: Option<u32>,
}

impl OrConnEvent {
    /// The peer as a relay reference, when the target is a long name.
    pub fn node_ref(&self) -> Option<NodeRef> {
        self.target.parse().ok()
    }
}

/// Bandwidth event payload.
#[derive(Debug, Clone, Copy)]
pub struct BandwidthEvent {
    /// Bytes read over the last second.
    pub bytes_read: u64,
    /// Bytes written over the last second.
    pub bytes_written: u64,
}

/// Severity of a daemon log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    /// Debugging detail.
    Debug,
    /// Informational.
    Info,
    /// Normal but significant.
    Notice,
    /// Something looks wrong.
    Warn,
    /// Something is broken.
    Err,
}

/// Log line event payload.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Severity of the line.
    pub severity: LogSeverity,
    /// The message text.
    pub message: String,
}

/// Address mapping event payload.
#[derive(Debug, Clone)]
pub struct AddressMapEvent {
    /// The address being mapped.
    pub original: String,
    /// What it now maps to.
    pub new: String,
    /// Expiry timestamp, when given.
    pub expiry: Option<String>,
    /// Error keyword for failed resolutions.
    pub error: Option<String>,
}

/// Scope of a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusScope {
    /// STATUS_GENERAL.
    General,
    /// STATUS_CLIENT.
    Client,
    /// STATUS_SERVER.
    Server,
}

/// Severity of a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSeverity {
    /// Routine report.
    Notice,
    /// Degraded but operational.
    Warn,
    /// Something failed.
    Err,
}

/// Status event payload, e.g. `STATUS_CLIENT NOTICE BOOTSTRAP PROGRESS=…`.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    /// Which status stream the event came from.
    pub scope: StatusScope,
    /// Severity of the report.
    pub severity: StatusSeverity,
    /// Action keyword, e.g. `BOOTSTRAP` or `CIRCUIT_ESTABLISHED`.
    pub action: String,
    /// Keyword arguments of the report.
    pub arguments: HashMap<String, String>,
}

/// One router status entry from an NS or NEWCONSENSUS event.
#[derive(Debug, Clone)]
pub struct NsEntry {
    /// Relay nickname.
    pub nickname: String,
    /// Relay fingerprint, decoded from the base64 identity.
    pub fingerprint: Fingerprint,
    /// Published IP address.
    pub address: String,
    /// OR port.
    pub or_port: u16,
    /// Capability flags from the `s` line.
    pub flags: Vec<String>,
}

/// Parse an event reply's payload into an [`Event`].
///
/// `name` is the first token of the reply text, `payload` the remainder of
/// the first line, `data` any attached data block.
pub fn parse_event(name: &str, payload: &str, data: Option<&str>) -> Event {
    match name.to_uppercase().as_str() {
        "CIRC" => parse_circuit_event(payload),
        "STREAM" => parse_stream_event(payload),
        "ORCONN" => parse_orconn_event(payload),
        "BW" => parse_bandwidth_event(payload),
        "DEBUG" | "INFO" | "NOTICE" | "WARN" | "ERR" => parse_log_event(name, payload),
        "ADDRMAP" => parse_addrmap_event(payload),
        "STATUS_GENERAL" => parse_status_event(StatusScope::General, payload),
        "STATUS_CLIENT" => parse_status_event(StatusScope::Client, payload),
        "STATUS_SERVER" => parse_status_event(StatusScope::Server, payload),
        "NS" | "NEWCONSENSUS" => Event::NetworkStatus(parse_ns_entries(data.unwrap_or(""))),
        "NETWORK_LIVENESS" => Event::NetworkLiveness(payload.trim().eq_ignore_ascii_case("UP")),
        _ => Event::Opaque {
            name: name.to_string(),
            data: match data {
                Some(d) => format!("{}\n{}", payload, d),
                None => payload.to_string(),
            },
        },
    }
}

fn parse_circuit_event(text: &str) -> Event {
    let mut tokens = text.splitn(3, ' ');

    let id = tokens
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(CircuitId(0));
    let status = tokens
        .next()
        .and_then(|s| CircuitStatus::from_str(s).ok())
        .unwrap_or(CircuitStatus::Unknown);

    // The path token is optional; when absent, keyword arguments follow
    // the status directly.
    let rest = tokens.next().unwrap_or("");
    let (path, kv_text) = if rest.starts_with('$') {
        match rest.split_once(' ') {
            Some((path, kv)) => (parse_path(path), kv),
            None => (parse_path(rest), ""),
        }
    } else {
        (Vec::new(), rest)
    };
    let kv = parse_key_value_pairs(kv_text);

    Event::CircuitStatus(CircuitEvent {
        id,
        status,
        path,
        build_flags: kv
            .get("BUILD_FLAGS")
            .map(|s| s.split(',').map(String::from).collect())
            .unwrap_or_default(),
        purpose: kv.get("PURPOSE").and_then(|s| s.parse().ok()),
        time_created: kv.get("TIME_CREATED").cloned(),
        reason: kv.get("REASON").cloned(),
        remote_reason: kv.get("REMOTE_REASON").cloned(),
    })
}

fn parse_stream_event(text: &str) -> Event {
    let parts: Vec<&str> = text.splitn(5, ' ').collect();

    let id = parts
        .first()
        .and_then(|s| s.parse().ok())
        .unwrap_or(StreamId(0));
    let status = parts
        .get(1)
        .and_then(|s| StreamStatus::from_str(s).ok())
        .unwrap_or(StreamStatus::Unknown);
    let circuit = parts
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(CircuitId(0));
    let target = parts.get(3).unwrap_or(&"").to_string();
    let kv = parse_key_value_pairs(parts.get(4).unwrap_or(&""));

    Event::StreamStatus(StreamEvent {
        id,
        status,
        circuit,
        target,
        reason: kv.get("REASON").cloned(),
        source_addr: kv.get("SOURCE_ADDR").cloned(),
        purpose: kv.get("PURPOSE").cloned(),
    })
}

fn parse_orconn_event(text: &str) -> Event {
    let parts: Vec<&str> = text.splitn(3, ' ').collect();

    let target = parts.first().unwrap_or(&"").to_string();
    let status = parts
        .get(1)
        .and_then(|s| OrConnStatus::from_str(s).ok())
        .unwrap_or(OrConnStatus::Unknown);
    let kv = parse_key_value_pairs(parts.get(2).unwrap_or(&""));

    Event::OrConnStatus(OrConnEvent {
        target,
        status,
        reason: kv.get("REASON").cloned(),
        num_circuits: kv.get("NCIRCS").and_then(|s| s.parse().ok()),
    })
}

fn parse_bandwidth_event(text: &str) -> Event {
    let mut parts = text.split_whitespace();
    Event::Bandwidth(BandwidthEvent {
        bytes_read: parts.next().and_then(|s| s.parse().ok()).unwrap_or(0),
        bytes_written: parts.next().and_then(|s| s.parse().ok()).unwrap_or(0),
    })
}

fn parse_log_event(severity: &str, text: &str) -> Event {
    let severity = match severity.to_uppercase().as_str() {
        "DEBUG" => LogSeverity::Debug,
        "INFO" => LogSeverity::Info,
        "WARN" => LogSeverity::Warn,
        "ERR" => LogSeverity::Err,
        _ => LogSeverity::Notice,
    };
    Event::Log(LogEvent {
        severity,
        message: text.to_string(),
    })
}

fn parse_addrmap_event(text: &str) -> Event {
    let parts: Vec<&str> = text.splitn(4, ' ').collect();
    let kv = parse_key_value_pairs(parts.get(3).unwrap_or(&""));

    Event::AddressMap(AddressMapEvent {
        original: parts.first().unwrap_or(&"").to_string(),
        new: parts.get(1).unwrap_or(&"").to_string(),
        expiry: parts.get(2).map(|s| s.trim_matches('"').to_string()),
        error: kv.get("error").cloned(),
    })
}

fn parse_status_event(scope: StatusScope, text: &str) -> Event {
    let mut tokens = text.splitn(3, ' ');
    let severity = match tokens.next().unwrap_or("").to_uppercase().as_str() {
        "WARN" => StatusSeverity::Warn,
        "ERR" => StatusSeverity::Err,
        _ => StatusSeverity::Notice,
    };
    let action = tokens.next().unwrap_or("").to_string();
    let arguments = parse_key_value_pairs(tokens.next().unwrap_or(""));

    Event::Status(StatusEvent {
        scope,
        severity,
        action,
        arguments,
    })
}

/// Parse router status entries (`r` and `s` lines) from an NS data block.
fn parse_ns_entries(data: &str) -> Vec<NsEntry> {
    let mut entries = Vec::new();

    for line in data.lines() {
        if let Some(rest) = line.strip_prefix("r ") {
            let fields: Vec<&str> = rest.split_whitespace().collect();
            // r <nickname> <identity> [...] <IP> <ORPort> <DirPort>
            if fields.len() < 5 {
                continue;
            }
            let Some(fingerprint) = decode_identity(fields[1]) else {
                continue;
            };
            let or_port = fields[fields.len() - 2].parse().unwrap_or(0);
            entries.push(NsEntry {
                nickname: fields[0].to_string(),
                fingerprint,
                address: fields[fields.len() - 3].to_string(),
                or_port,
                flags: Vec::new(),
            });
        } else if let Some(rest) = line.strip_prefix("s ") {
            if let Some(entry) = entries.last_mut() {
                entry.flags = rest.split_whitespace().map(String::from).collect();
            }
        }
    }

    entries
}

/// Decode a base64 relay identity into its hex fingerprint.
fn decode_identity(identity: &str) -> Option<Fingerprint> {
    let bytes = BASE64_NOPAD
        .decode(identity.trim_end_matches('=').as_bytes())
        .ok()?;
    if bytes.len() != 20 {
        return None;
    }
    Some(Fingerprint::new(hex::encode_upper(bytes)))
}

/// Identifies one registered observer, for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct DispatchTable {
    next_id: u64,
    by_type: HashMap<EventType, Vec<(u64, Handler)>>,
    catch_all: Vec<(u64, Handler)>,
}

/// Routes event replies to registered observers.
///
/// Observers for a type run in registration order, followed by the
/// catch-all observers, which receive every event. Events with an
/// unrecognized type keyword reach only the catch-all; with no observer at
/// all they are dropped after a debug log line.
#[derive(Default)]
pub struct EventDispatcher {
    table: Mutex<DispatchTable>,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for one event type.
    pub fn subscribe(
        &self,
        event_type: EventType,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut table = self.table.lock().expect("dispatcher lock poisoned");
        let id = table.next_id;
        table.next_id += 1;
        table
            .by_type
            .entry(event_type)
            .or_default()
            .push((id, Arc::new(handler)));
        SubscriptionId(id)
    }

    /// Register a catch-all observer; it receives every event, including
    /// ones with unrecognized type keywords.
    pub fn subscribe_any(
        &self,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut table = self.table.lock().expect("dispatcher lock poisoned");
        let id = table.next_id;
        table.next_id += 1;
        table.catch_all.push((id, Arc::new(handler)));
        SubscriptionId(id)
    }

    /// Drop every observer. Used at connection teardown so no further
    /// events are delivered.
    pub fn clear(&self) {
        let mut table = self.table.lock().expect("dispatcher lock poisoned");
        table.by_type.clear();
        table.catch_all.clear();
    }

    /// Remove an observer. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.table.lock().expect("dispatcher lock poisoned");
        let before = table.catch_all.len() + table.by_type.values().map(Vec::len).sum::<usize>();
        table.catch_all.retain(|(hid, _)| *hid != id.0);
        for handlers in table.by_type.values_mut() {
            handlers.retain(|(hid, _)| *hid != id.0);
        }
        before != table.catch_all.len() + table.by_type.values().map(Vec::len).sum::<usize>()
    }

    /// Parse an event reply and invoke the matching observers.
    ///
    /// Called from the reader task; handlers run synchronously here.
    pub fn dispatch(&self, reply: &ControlReply) {
        let first = reply.first_line();
        let mut parts = first.splitn(2, ' ');
        let name = parts.next().unwrap_or("");
        let payload = parts.next().unwrap_or("");

        let event = parse_event(name, payload, reply.data());

        // Clone the handler list out of the lock so observers may register
        // or remove subscriptions without deadlocking.
        let (handlers, catch_all): (Vec<Handler>, Vec<Handler>) = {
            let table = self.table.lock().expect("dispatcher lock poisoned");
            let specific = EventType::from_str(name)
                .ok()
                .and_then(|ty| table.by_type.get(&ty))
                .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default();
            let all = table.catch_all.iter().map(|(_, h)| Arc::clone(h)).collect();
            (specific, all)
        };

        if handlers.is_empty() && catch_all.is_empty() {
            debug!(event = name, "dropping event without observers");
            return;
        }

        if handlers.is_empty() {
            for handler in &catch_all {
                handler(&event);
            }
        } else {
            for handler in &handlers {
                handler(&event);
            }
            for handler in &catch_all {
                handler(&event);
            }
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock().expect("dispatcher lock poisoned");
        f.debug_struct("EventDispatcher")
            .field("typed", &table.by_type.len())
            .field("catch_all", &table.catch_all.len())
            .finish()
    }
}
