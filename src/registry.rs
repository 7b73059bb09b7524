//! Event-sourced registry of circuits and known relays.
//!
//! The registry is a pure projection: it subscribes to circuit and network
//! status events and folds them into in-memory tables. It never issues
//! commands of its own, so attaching it adds no synchronous round-trips.
//! Events arrive in order on the connection's reader task and the registry
//! is their sole consumer here, so last-event-wins per circuit id is the
//! complete conflict rule.

use crate::events::{CircuitEvent, Event, NsEntry, OrConnEvent};
use crate::types::{CircuitId, CircuitPurpose, CircuitStatus, Fingerprint, NodeRef};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[cfg(feature = "tokio-runtime")]
use crate::connection::TorController;
#[cfg(feature = "tokio-runtime")]
use crate::events::{EventType, SubscriptionId};

/// Grace period during which terminal circuits stay queryable before the
/// next fold sweeps them out.
pub const DEFAULT_TOMBSTONE_GRACE: Duration = Duration::from_secs(30);

/// Snapshot of one tracked circuit.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Circuit id.
    pub id: CircuitId,
    /// Last observed state.
    pub state: CircuitStatus,
    /// Relay path as of the last event that carried one.
    pub path: Vec<NodeRef>,
    /// Purpose as of the last event that carried one.
    pub purpose: Option<CircuitPurpose>,
    closed_at: Option<Instant>,
}

impl Circuit {
    /// Whether the circuit has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Snapshot of one known relay.
#[derive(Debug, Clone)]
pub struct Node {
    /// Relay fingerprint.
    pub fingerprint: Fingerprint,
    /// Nickname, when any event has carried one.
    pub nickname: Option<String>,
    /// Published address, when a network status entry has carried one.
    pub address: Option<String>,
    /// Capability flags from the latest network status entry.
    pub flags: Vec<String>,
}

#[derive(Default)]
struct Tables {
    circuits: HashMap<CircuitId, Circuit>,
    nodes: HashMap<Fingerprint, Node>,
}

/// The live circuit and relay tables, updated exclusively from events.
///
/// Clones share the same tables. External callers only ever receive cloned
/// snapshots; nothing hands out references into the tables.
#[derive(Clone)]
pub struct CircuitRegistry {
    tables: Arc<Mutex<Tables>>,
    grace: Duration,
}

impl CircuitRegistry {
    /// Create an empty registry with the default tombstone grace period.
    pub fn new() -> Self {
        Self::with_grace(DEFAULT_TOMBSTONE_GRACE)
    }

    /// Create an empty registry with a custom tombstone grace period.
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            grace,
        }
    }

    /// Fold one event into the tables.
    ///
    /// Non-circuit, non-node events are ignored, so the registry can be
    /// safely registered as a catch-all observer.
    pub fn apply(&self, event: &Event) {
        let mut tables = self.tables.lock().expect("registry lock poisoned");
        match event {
            Event::CircuitStatus(circ) => Self::fold_circuit(&mut tables, circ),
            Event::NetworkStatus(entries) => Self::fold_ns(&mut tables, entries),
            Event::OrConnStatus(conn) => Self::fold_orconn(&mut tables, conn),
            _ => {}
        }
        self.sweep(&mut tables);
    }

    fn fold_circuit(tables: &mut Tables, event: &CircuitEvent) {
        for node in &event.path {
            Self::remember_node(tables, node);
        }

        let circuit = tables.circuits.entry(event.id).or_insert_with(|| Circuit {
            id: event.id,
            state: event.status,
            path: Vec::new(),
            purpose: None,
            closed_at: None,
        });

        circuit.state = event.status;
        if !event.path.is_empty() {
            circuit.path = event.path.clone();
        }
        if event.purpose.is_some() {
            circuit.purpose = event.purpose.clone();
        }
        circuit.closed_at = if event.status.is_terminal() {
            circuit.closed_at.or_else(|| Some(Instant::now()))
        } else {
            None
        };
    }

    fn fold_ns(tables: &mut Tables, entries: &[NsEntry]) {
        for entry in entries {
            let node = tables
                .nodes
                .entry(entry.fingerprint.clone())
                .or_insert_with(|| Node {
                    fingerprint: entry.fingerprint.clone(),
                    nickname: None,
                    address: None,
                    flags: Vec::new(),
                });
            node.nickname = Some(entry.nickname.clone());
            node.address = Some(format!("{}:{}", entry.address, entry.or_port));
            node.flags = entry.flags.clone();
        }
    }

    fn fold_orconn(tables: &mut Tables, event: &OrConnEvent) {
        if let Some(node) = event.node_ref() {
            Self::remember_node(tables, &node);
        }
    }

    fn remember_node(tables: &mut Tables, node_ref: &NodeRef) {
        let node = tables
            .nodes
            .entry(node_ref.fingerprint.clone())
            .or_insert_with(|| Node {
                fingerprint: node_ref.fingerprint.clone(),
                nickname: None,
                address: None,
                flags: Vec::new(),
            });
        if node_ref.nickname.is_some() {
            node.nickname = node_ref.nickname.clone();
        }
    }

    /// Drop terminal circuits whose grace period has passed.
    fn sweep(&self, tables: &mut Tables) {
        let grace = self.grace;
        tables
            .circuits
            .retain(|_, c| c.closed_at.map(|t| t.elapsed() < grace).unwrap_or(true));
    }

    /// Snapshot of one circuit by id.
    pub fn circuit(&self, id: CircuitId) -> Option<Circuit> {
        self.tables
            .lock()
            .expect("registry lock poisoned")
            .circuits
            .get(&id)
            .cloned()
    }

    /// Snapshots of every circuit matching the predicate, ordered by id.
    pub fn circuits_where(&self, predicate: impl Fn(&Circuit) -> bool) -> Vec<Circuit> {
        let tables = self.tables.lock().expect("registry lock poisoned");
        let mut circuits: Vec<Circuit> = tables
            .circuits
            .values()
            .filter(|c| predicate(c))
            .cloned()
            .collect();
        circuits.sort_by_key(|c| c.id);
        circuits
    }

    /// Snapshots of every circuit not in a terminal state.
    pub fn live_circuits(&self) -> Vec<Circuit> {
        self.circuits_where(|c| !c.is_terminal())
    }

    /// Snapshot of one relay by fingerprint.
    pub fn node_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<Node> {
        self.tables
            .lock()
            .expect("registry lock poisoned")
            .nodes
            .get(fingerprint)
            .cloned()
    }

    /// Number of known relays.
    pub fn node_count(&self) -> usize {
        self.tables.lock().expect("registry lock poisoned").nodes.len()
    }

    /// Register this registry's fold as observers on a controller.
    ///
    /// Subscribes to circuit, network status, and OR connection events.
    /// The daemon only emits them once the corresponding types are enabled
    /// with SETEVENTS.
    #[cfg(feature = "tokio-runtime")]
    pub fn attach(&self, controller: &TorController) -> Vec<SubscriptionId> {
        [EventType::Circ, EventType::Ns, EventType::NewConsensus, EventType::OrConn]
            .into_iter()
            .map(|ty| {
                let registry = self.clone();
                controller.subscribe(ty, move |event| registry.apply(event))
            })
            .collect()
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CircuitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.lock().expect("registry lock poisoned");
        f.debug_struct("CircuitRegistry")
            .field("circuits", &tables.circuits.len())
            .field("nodes", &tables.nodes.len())
            .finish()
    }
}
