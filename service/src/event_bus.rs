//! Fan-out of ledger events to subscribers.

use crowdsale_ledger::SaleEvent;

/// Synchronous fan-out event bus for sale events.
///
/// Listeners are invoked inline while the service still holds the ledger
/// lock, so they observe events in commit order. Keep handlers fast.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&SaleEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&SaleEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &SaleEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn emit_all<'a>(&self, events: impl IntoIterator<Item = &'a SaleEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
