//! Port-binding and controller registries.
//!
//! The node advertises each registered binding in its poll replies.  A
//! binding is either an **output** (a sender pushing a universe onto the
//! network) or an **input** (a receiver subscribed to one); the two are kept
//! in one tagged registry so the broadcaster walks a single list.
//!
//! Remote controllers are tracked separately by source address, fed by
//! inbound ArtPoll datagrams.  Liveness is decided by an **externally
//! driven** sweep with an explicit clock argument — no hidden timer — so the
//! timeout policy is testable without sockets.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use artnet_core::UniverseAddress;

/// Opaque handle identifying one registered binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

/// A universe binding the node advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortBinding {
    /// A sender: the node outputs this universe onto the network.
    Output(UniverseAddress),
    /// A receiver: the node consumes this universe from the network.
    Input(UniverseAddress),
}

impl PortBinding {
    pub fn address(&self) -> UniverseAddress {
        match self {
            PortBinding::Output(addr) | PortBinding::Input(addr) => *addr,
        }
    }
}

/// One registry entry with its registration handle and last activity.
#[derive(Debug, Clone)]
pub struct BindingEntry {
    pub id: BindingId,
    pub binding: PortBinding,
    pub last_seen: Instant,
}

/// The node's sender/receiver registry.
///
/// Mutated only by registration and deregistration; the broadcaster and
/// dispatcher read snapshots.
#[derive(Debug, Default)]
pub struct BindingRegistry {
    next_id: u64,
    entries: Vec<BindingEntry>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding and returns its handle.
    pub fn register(&mut self, binding: PortBinding) -> BindingId {
        let id = BindingId(self.next_id);
        self.next_id += 1;
        self.entries.push(BindingEntry {
            id,
            binding,
            last_seen: Instant::now(),
        });
        id
    }

    /// Removes a binding.  Returns `false` when the handle was already gone,
    /// which makes deregistration idempotent.
    pub fn deregister(&mut self, id: BindingId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Refreshes the activity timestamp of one binding.  Senders call this
    /// on every transmit request.
    pub fn touch(&mut self, id: BindingId) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.last_seen = Instant::now();
        }
    }

    /// When the binding was registered or last active.
    pub fn last_seen(&self, id: BindingId) -> Option<Instant> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.last_seen)
    }

    /// All entries with their handles and activity timestamps, in
    /// registration order.
    pub fn entries(&self) -> &[BindingEntry] {
        &self.entries
    }

    /// Snapshot of all bindings, outputs first, in registration order.
    ///
    /// The broadcaster relies on this ordering: within a round, output ports
    /// are described before input ports.
    pub fn snapshot(&self) -> Vec<PortBinding> {
        let outputs = self
            .entries
            .iter()
            .filter(|e| matches!(e.binding, PortBinding::Output(_)));
        let inputs = self
            .entries
            .iter()
            .filter(|e| matches!(e.binding, PortBinding::Input(_)));
        outputs.chain(inputs).map(|e| e.binding).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Controller tracking ───────────────────────────────────────────────────────

/// Liveness record for one remote controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEntry {
    pub last_seen: Instant,
    pub online: bool,
}

/// Remote controllers observed via inbound ArtPoll, keyed by source address.
#[derive(Debug, Default)]
pub struct ControllerRegistry {
    entries: HashMap<SocketAddr, ControllerEntry>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a poll from `src` at time `now`, reviving an offline entry.
    pub fn record(&mut self, src: SocketAddr, now: Instant) {
        self.entries.insert(
            src,
            ControllerEntry {
                last_seen: now,
                online: true,
            },
        );
    }

    /// Marks every controller silent for longer than `timeout` as offline.
    /// Returns how many entries this sweep newly marked.
    pub fn sweep(&mut self, timeout: Duration, now: Instant) -> usize {
        let mut marked = 0;
        for entry in self.entries.values_mut() {
            if entry.online && now.duration_since(entry.last_seen) > timeout {
                entry.online = false;
                marked += 1;
            }
        }
        marked
    }

    /// Number of controllers currently considered online.
    pub fn online_count(&self) -> usize {
        self.entries.values().filter(|e| e.online).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
