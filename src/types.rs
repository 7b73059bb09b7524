//! Core types for circuits, streams, relays, and onion services.

use crate::error::{ControlError, Result};
use crate::protocol::parse_key_value_pairs;
use std::fmt;
use std::str::FromStr;

/// Numeric identifier of one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CircuitId(pub u64);

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CircuitId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(CircuitId(s.parse()?))
    }
}

/// Numeric identifier of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(StreamId(s.parse()?))
    }
}

/// A relay fingerprint: 40 hex characters, stored uppercase without the
/// `$` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Normalize a hex string into a fingerprint, stripping a `$` prefix.
    pub fn new(fingerprint: impl Into<String>) -> Self {
        let fp = fingerprint.into();
        let fp = fp.strip_prefix('$').unwrap_or(&fp).to_uppercase();
        Fingerprint(fp)
    }

    /// The fingerprint without the `$` prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fingerprint with the `$` prefix used in command arguments.
    pub fn with_prefix(&self) -> String {
        format!("${}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix('$').unwrap_or(s);
        if s.len() != 40 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ControlError::Parse(format!(
                "invalid fingerprint '{}': expected 40 hex characters",
                s
            )));
        }
        Ok(Fingerprint::new(s))
    }
}

/// A relay reference as it appears in a circuit path: the identifying
/// fingerprint plus the nickname cached at the time of the event.
///
/// This is a by-value reference, never an owning handle into the node
/// table; the registry's node records evolve independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    /// The relay fingerprint.
    pub fingerprint: Fingerprint,
    /// The nickname attached to the long name, when present.
    pub nickname: Option<String>,
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.nickname {
            Some(nick) => write!(f, "${}~{}", self.fingerprint, nick),
            None => write!(f, "${}", self.fingerprint),
        }
    }
}

impl FromStr for NodeRef {
    type Err = ControlError;

    /// Parse a long name: `$FP`, `$FP~nickname`, or `$FP=nickname`.
    fn from_str(s: &str) -> Result<Self> {
        let rest = s.strip_prefix('$').ok_or_else(|| {
            ControlError::Parse(format!("relay reference '{}' lacks a fingerprint", s))
        })?;
        match rest.find(['~', '=']) {
            Some(sep) => Ok(NodeRef {
                fingerprint: rest[..sep].parse()?,
                nickname: Some(rest[sep + 1..].to_string()),
            }),
            None => Ok(NodeRef {
                fingerprint: rest.parse()?,
                nickname: None,
            }),
        }
    }
}

/// Parse a comma-separated circuit path into relay references, skipping
/// entries without a fingerprint.
pub fn parse_path(s: &str) -> Vec<NodeRef> {
    s.split(',')
        .filter(|p| !p.is_empty())
        .filter_map(|p| NodeRef::from_str(p).ok())
        .collect()
}

/// Lifecycle state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    /// Circuit id assigned to a new circuit.
    Launched,
    /// All hops finished; the circuit can accept streams.
    Built,
    /// All hops finished; waiting to see whether a better guard is usable.
    GuardWait,
    /// Another hop finished while the circuit is under construction.
    Extended,
    /// Circuit closed before it was built.
    Failed,
    /// Circuit closed after it was built.
    Closed,
    /// Status keyword not in the table.
    Unknown,
}

impl CircuitStatus {
    /// Keyword table, excluding the `Unknown` fallback.
    const KEYWORDS: &'static [(CircuitStatus, &'static str)] = &[
        (CircuitStatus::Launched, "LAUNCHED"),
        (CircuitStatus::Built, "BUILT"),
        (CircuitStatus::GuardWait, "GUARD_WAIT"),
        (CircuitStatus::Extended, "EXTENDED"),
        (CircuitStatus::Failed, "FAILED"),
        (CircuitStatus::Closed, "CLOSED"),
    ];

    /// The status keyword on the wire.
    pub fn as_str(&self) -> &'static str {
        Self::KEYWORDS
            .iter()
            .find(|(status, _)| status == self)
            .map(|(_, keyword)| *keyword)
            .unwrap_or("UNKNOWN")
    }

    /// Whether this is a terminal state (the circuit is gone).
    pub fn is_terminal(&self) -> bool {
        matches!(self, CircuitStatus::Failed | CircuitStatus::Closed)
    }
}

impl FromStr for CircuitStatus {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::KEYWORDS
            .iter()
            .find(|(_, keyword)| keyword.eq_ignore_ascii_case(s))
            .map(|(status, _)| *status)
            .unwrap_or(CircuitStatus::Unknown))
    }
}

impl fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purpose of a circuit, from the `PURPOSE=` keyword of circuit events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitPurpose {
    /// General-purpose client circuit.
    General,
    /// Hidden-service client introduction circuit.
    HsClientIntro,
    /// Hidden-service client rendezvous circuit.
    HsClientRend,
    /// Hidden-service server introduction circuit.
    HsServiceIntro,
    /// Hidden-service server rendezvous circuit.
    HsServiceRend,
    /// Circuit built to test our own reachability.
    Testing,
    /// Circuit built on behalf of a controller.
    Controller,
    /// Circuit kept to measure build timeouts.
    MeasureTimeout,
    /// Purpose keyword not in the table.
    Other(String),
}

impl CircuitPurpose {
    /// Keyword table for the fixed purposes.
    const KEYWORDS: &'static [(CircuitPurpose, &'static str)] = &[
        (CircuitPurpose::General, "GENERAL"),
        (CircuitPurpose::HsClientIntro, "HS_CLIENT_INTRO"),
        (CircuitPurpose::HsClientRend, "HS_CLIENT_REND"),
        (CircuitPurpose::HsServiceIntro, "HS_SERVICE_INTRO"),
        (CircuitPurpose::HsServiceRend, "HS_SERVICE_REND"),
        (CircuitPurpose::Testing, "TESTING"),
        (CircuitPurpose::Controller, "CONTROLLER"),
        (CircuitPurpose::MeasureTimeout, "MEASURE_TIMEOUT"),
    ];

    /// The purpose keyword on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            CircuitPurpose::Other(s) => s.as_str(),
            known => Self::KEYWORDS
                .iter()
                .find(|(purpose, _)| purpose == known)
                .map(|(_, keyword)| *keyword)
                .unwrap_or("UNKNOWN"),
        }
    }
}

impl FromStr for CircuitPurpose {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::KEYWORDS
            .iter()
            .find(|(_, keyword)| keyword.eq_ignore_ascii_case(s))
            .map(|(purpose, _)| purpose.clone())
            .unwrap_or_else(|| CircuitPurpose::Other(s.to_uppercase())))
    }
}

impl fmt::Display for CircuitPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// New connection request.
    New,
    /// New resolve request.
    NewResolve,
    /// The target address was remapped.
    Remap,
    /// Connect message sent along a circuit.
    SentConnect,
    /// Resolve message sent along a circuit.
    SentResolve,
    /// Stream established.
    Succeeded,
    /// Stream failed, not retriable.
    Failed,
    /// The stream was closed.
    Closed,
    /// Detached from its circuit, still retriable.
    Detached,
    /// Waiting for the controller to attach it.
    ControllerWait,
    /// Status keyword not in the table.
    Unknown,
}

impl FromStr for StreamStatus {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        const KEYWORDS: &[(StreamStatus, &str)] = &[
            (StreamStatus::New, "NEW"),
            (StreamStatus::NewResolve, "NEWRESOLVE"),
            (StreamStatus::Remap, "REMAP"),
            (StreamStatus::SentConnect, "SENTCONNECT"),
            (StreamStatus::SentResolve, "SENTRESOLVE"),
            (StreamStatus::Succeeded, "SUCCEEDED"),
            (StreamStatus::Failed, "FAILED"),
            (StreamStatus::Closed, "CLOSED"),
            (StreamStatus::Detached, "DETACHED"),
            (StreamStatus::ControllerWait, "CONTROLLER_WAIT"),
        ];
        Ok(KEYWORDS
            .iter()
            .find(|(_, keyword)| keyword.eq_ignore_ascii_case(s))
            .map(|(status, _)| *status)
            .unwrap_or(StreamStatus::Unknown))
    }
}

/// Lifecycle state of an OR connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrConnStatus {
    /// New incoming connection.
    New,
    /// New outgoing connection launched.
    Launched,
    /// Connected and handshake done.
    Connected,
    /// Connection attempt failed.
    Failed,
    /// Connection closed.
    Closed,
    /// Status keyword not in the table.
    Unknown,
}

impl FromStr for OrConnStatus {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        const KEYWORDS: &[(OrConnStatus, &str)] = &[
            (OrConnStatus::New, "NEW"),
            (OrConnStatus::Launched, "LAUNCHED"),
            (OrConnStatus::Connected, "CONNECTED"),
            (OrConnStatus::Failed, "FAILED"),
            (OrConnStatus::Closed, "CLOSED"),
        ];
        Ok(KEYWORDS
            .iter()
            .find(|(_, keyword)| keyword.eq_ignore_ascii_case(s))
            .map(|(status, _)| *status)
            .unwrap_or(OrConnStatus::Unknown))
    }
}

/// A signal deliverable through the SIGNAL command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Reload configuration.
    Reload,
    /// Clean shutdown after a grace period.
    Shutdown,
    /// Dump statistics.
    Dump,
    /// Switch open logs to debug level.
    Debug,
    /// Shut down without waiting.
    Halt,
    /// Switch to fresh circuits for new streams.
    NewNym,
    /// Forget client-side cached addresses.
    ClearDnsCache,
    /// Dump an unscheduled heartbeat message.
    Heartbeat,
    /// Become dormant.
    Dormant,
    /// Stop being dormant.
    Active,
}

impl Signal {
    /// The signal keyword on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Reload => "RELOAD",
            Signal::Shutdown => "SHUTDOWN",
            Signal::Dump => "DUMP",
            Signal::Debug => "DEBUG",
            Signal::Halt => "HALT",
            Signal::NewNym => "NEWNYM",
            Signal::ClearDnsCache => "CLEARDNSCACHE",
            Signal::Heartbeat => "HEARTBEAT",
            Signal::Dormant => "DORMANT",
            Signal::Active => "ACTIVE",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A v2/v3 onion service address, stored without the `.onion` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OnionAddress {
    address: String,
}

impl OnionAddress {
    /// Normalize an address, stripping a `.onion` suffix and lowercasing.
    pub fn new(address: impl Into<String>) -> Self {
        let addr = address.into().to_lowercase();
        let addr = addr.strip_suffix(".onion").unwrap_or(&addr).to_string();
        OnionAddress { address: addr }
    }

    /// The service id (address without the `.onion` suffix).
    pub fn service_id(&self) -> &str {
        &self.address
    }

    /// The full address with the `.onion` suffix.
    pub fn full_address(&self) -> String {
        format!("{}.onion", self.address)
    }

    /// Whether this is a v3 address (56 base32 characters).
    pub fn is_v3(&self) -> bool {
        self.address.len() == 56
    }
}

impl fmt::Display for OnionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl FromStr for OnionAddress {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(OnionAddress::new(s))
    }
}

/// One bootstrap phase report, from `status/bootstrap-phase` or a
/// STATUS_CLIENT BOOTSTRAP event.
#[derive(Debug, Clone)]
pub struct BootstrapStatus {
    /// Progress percentage, 0 to 100.
    pub progress: u8,
    /// Machine-readable tag for the phase.
    pub tag: String,
    /// Prose summary of the phase.
    pub summary: String,
    /// Warning message, when the phase is stuck.
    pub warning: Option<String>,
    /// Reason keyword for the problem.
    pub reason: Option<String>,
}

impl BootstrapStatus {
    /// Whether bootstrap has completed.
    pub fn is_done(&self) -> bool {
        self.progress >= 100
    }
}

impl FromStr for BootstrapStatus {
    type Err = ControlError;

    /// Parse text of the shape
    /// `NOTICE BOOTSTRAP PROGRESS=85 TAG=handshake SUMMARY="..."`.
    fn from_str(s: &str) -> Result<Self> {
        let kv = parse_key_value_pairs(s);
        let progress = kv
            .get("PROGRESS")
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| {
                ControlError::Parse(format!("bootstrap status without PROGRESS: '{}'", s))
            })?;
        Ok(BootstrapStatus {
            progress,
            tag: kv.get("TAG").cloned().unwrap_or_default(),
            summary: kv.get("SUMMARY").cloned().unwrap_or_default(),
            warning: kv.get("WARNING").cloned(),
            reason: kv.get("REASON").cloned(),
        })
    }
}
