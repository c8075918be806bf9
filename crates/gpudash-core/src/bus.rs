use std::collections::VecDeque;

use crate::event::Event;

/// FIFO queue of events awaiting dispatch.
///
/// Each frame the app loop publishes input, timer ticks and poller
/// deliveries, drains the queue in order, and routes every event through the
/// module registry. Keeping all state changes on this one path is what makes
/// chart state single-threaded.
pub struct EventBus {
    queue: VecDeque<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn publish(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    /// Publish a batch, keeping its order.
    pub fn publish_all(&mut self, events: impl IntoIterator<Item = Event>) {
        self.queue.extend(events);
    }

    /// Remove and return all pending events, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        self.queue.drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
