//! Engine event notifications.

use std::fmt;

use vega_memory::{LeakReport, PressureLevel};

/// Notifications emitted by the engine to subscribed listeners.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A node was registered.
    IndicatorRegistered {
        /// Node id.
        id: String,
    },
    /// A node was unregistered.
    IndicatorUnregistered {
        /// Node id.
        id: String,
    },
    /// One node evaluation finished.
    IndicatorCalculated {
        /// Node id.
        id: String,
        /// Mode label: "cached", "incremental" or "full".
        mode: &'static str,
    },
    /// A node's cached results and state were invalidated.
    IndicatorInvalidated {
        /// Node id.
        id: String,
        /// Why the node was invalidated.
        reason: String,
    },
    /// Memory pressure changed level.
    MemoryAlert {
        /// Level entered.
        level: PressureLevel,
        /// Alert description.
        message: String,
    },
    /// A leak suspect was surfaced or reclassified.
    LeakDetected {
        /// The leak finding.
        report: LeakReport,
    },
    /// One maintenance pass finished.
    MaintenanceCompleted {
        /// Cache entries evicted by the retention sweep.
        evicted_entries: usize,
        /// Estimated bytes reclaimed by shedding.
        reclaimed_bytes: usize,
    },
}

/// Listener callback invoked for every emitted event.
pub type EventListener = Box<dyn Fn(&EngineEvent) + Send>;

/// Fan-out of engine events to registered listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<EventListener>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    /// Delivers an event to every listener, in subscription order.
    pub fn emit(&self, event: &EngineEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
