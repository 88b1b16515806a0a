//! Per-session lifecycle callbacks.
//!
//! Every session owns one [`EventDispatcher`]. Callbacks registered through a
//! request's subscriptions only ever see events for that session's topic, and
//! are dropped together with the session.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Lifecycle event kinds a caller can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Wallet scanned the request and completed the handshake
    QrCodeScanned,
    /// Wallet accepted the request and is generating the proof
    GeneratingProof,
    /// Wallet delivered a proof
    ProofGenerated,
    /// User declined the request in the wallet
    Reject,
    /// Wallet or transport reported an error
    Error,
}

impl EventKind {
    /// All kinds, in registry order
    pub const ALL: [EventKind; 5] = [
        Self::QrCodeScanned,
        Self::GeneratingProof,
        Self::ProofGenerated,
        Self::Reject,
        Self::Error,
    ];

    fn index(self) -> usize {
        match self {
            Self::QrCodeScanned => 0,
            Self::GeneratingProof => 1,
            Self::ProofGenerated => 2,
            Self::Reject => 3,
            Self::Error => 4,
        }
    }
}

/// An event fired to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Handshake completed
    QrCodeScanned,
    /// Proof generation started for the topic
    GeneratingProof {
        /// Session topic
        topic: String,
    },
    /// Proof received (hex)
    ProofGenerated {
        /// Hex-encoded proof bytes
        proof: String,
    },
    /// Request rejected by the user
    Reject,
    /// Error reported by the wallet or transport
    Error {
        /// Error description
        message: String,
    },
}

impl Event {
    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::QrCodeScanned => EventKind::QrCodeScanned,
            Self::GeneratingProof { .. } => EventKind::GeneratingProof,
            Self::ProofGenerated { .. } => EventKind::ProofGenerated,
            Self::Reject => EventKind::Reject,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

/// Shared callback handle
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Five ordered callback registries, one per [`EventKind`]
#[derive(Default)]
pub struct EventDispatcher {
    registries: [Vec<Callback>; 5],
}

impl EventDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for `kind`
    pub fn register(&mut self, kind: EventKind, callback: Callback) {
        self.registries[kind.index()].push(callback);
    }

    /// Number of callbacks registered for `kind`
    pub fn count(&self, kind: EventKind) -> usize {
        self.registries[kind.index()].len()
    }

    /// Whether anything is registered for `kind`
    pub fn has(&self, kind: EventKind) -> bool {
        self.count(kind) > 0
    }

    /// Snapshot of the callbacks for `kind`, so they can run without holding
    /// the session lock.
    pub fn callbacks(&self, kind: EventKind) -> Vec<Callback> {
        self.registries[kind.index()].clone()
    }

    /// Invoke every callback for the event's kind, in registration order.
    pub fn fire(&self, event: &Event) -> usize {
        fire_all(&self.callbacks(event.kind()), event)
    }

    /// Drop every registered callback
    pub fn clear(&mut self) {
        for registry in &mut self.registries {
            registry.clear();
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("EventDispatcher");
        for kind in EventKind::ALL {
            dbg.field(&format!("{kind:?}"), &self.count(kind));
        }
        dbg.finish()
    }
}

/// Run callbacks in order. A panicking callback is logged and does not stop
/// its siblings. Returns how many completed normally.
pub fn fire_all(callbacks: &[Callback], event: &Event) -> usize {
    let mut completed = 0;
    for (index, callback) in callbacks.iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| callback(event))) {
            Ok(()) => completed += 1,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(
                    kind = ?event.kind(),
                    index,
                    %reason,
                    "event callback panicked"
                );
            },
        }
    }
    completed
}
