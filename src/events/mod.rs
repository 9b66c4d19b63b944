//! In-process event bus
//!
//! Typed pub/sub for write events, status changes, memory pressure,
//! rollback notifications, and backup lifecycle. Every subscription
//! returns a handle; registration beyond the configured listener bound is
//! refused, and teardown drops all listeners.
//!
//! Delivery is synchronous and in listener-registration order. Publishers
//! call after the durable commit, so listeners only ever observe
//! committed state.

mod errors;

pub use errors::{EventError, EventResult};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::model::TaskStatus;

/// Events published by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A transaction committed; keys list every touched store key
    WriteCommitted {
        transaction_id: String,
        keys: Vec<String>,
    },
    /// A task changed status
    StatusChanged {
        task_id: String,
        path: String,
        from: TaskStatus,
        to: TaskStatus,
        /// True when the engine rewrote the requested transition
        auto: bool,
    },
    /// The cache shed entries under pressure
    CacheReduction {
        entries_removed: u64,
        bytes_saved: u64,
        trigger: String,
    },
    /// Combined memory/cache pressure crossed the reduction threshold
    MemoryPressure { score: f64 },
    /// A rollback began
    RollbackStarted { transaction_id: String },
    /// A rollback finished; `validated` reports the post-rollback check
    RollbackCompleted {
        transaction_id: String,
        validated: bool,
    },
    /// A backup export completed
    BackupCompleted { file: String, records: u64 },
    /// A backup export failed
    BackupFailed { reason: String },
    /// The store entered degraded mode
    StoreDegraded { reason: String },
}

impl EngineEvent {
    /// Event name for logs and filtering.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::WriteCommitted { .. } => "write_committed",
            EngineEvent::StatusChanged { .. } => "status_changed",
            EngineEvent::CacheReduction { .. } => "cache_reduction",
            EngineEvent::MemoryPressure { .. } => "memory_pressure",
            EngineEvent::RollbackStarted { .. } => "rollback_started",
            EngineEvent::RollbackCompleted { .. } => "rollback_completed",
            EngineEvent::BackupCompleted { .. } => "backup_completed",
            EngineEvent::BackupFailed { .. } => "backup_failed",
            EngineEvent::StoreDegraded { .. } => "store_degraded",
        }
    }
}

type Listener = Box<dyn Fn(&EngineEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]; pass back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

/// The bus.
pub struct EventBus {
    listeners: RwLock<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
    max_listeners: usize,
}

impl EventBus {
    /// Create a bus with a listener bound.
    pub fn new(max_listeners: usize) -> Self {
        Self {
            listeners: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            max_listeners,
        }
    }

    /// Register a listener.
    ///
    /// # Errors
    ///
    /// `LIMIT_EXCEEDED` when the registry is full.
    pub fn subscribe<F>(&self, listener: F) -> EventResult<SubscriptionHandle>
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().expect("event bus lock poisoned");
        if listeners.len() >= self.max_listeners {
            return Err(EventError::limit_exceeded(self.max_listeners));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        listeners.insert(id, Box::new(listener));
        Ok(SubscriptionHandle(id))
    }

    /// Remove a listener. Unknown handles are ignored.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut listeners = self.listeners.write().expect("event bus lock poisoned");
        listeners.remove(&handle.0);
    }

    /// Publish an event to every listener, in registration order.
    pub fn publish(&self, event: &EngineEvent) {
        let listeners = self.listeners.read().expect("event bus lock poisoned");
        for listener in listeners.values() {
            listener(event);
        }
    }

    /// Current listener count.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().expect("event bus lock poisoned").len()
    }

    /// Drop every listener. Called at engine teardown.
    pub fn clear(&self) {
        self.listeners.write().expect("event bus lock poisoned").clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("max_listeners", &self.max_listeners)
            .finish()
    }
}
