//! Notification channels

use std::cell::RefCell;

use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Fan-out emitter; every subscriber gets its own unbounded stream
pub struct EventEmitter<T> {
    subscribers: RefCell<Vec<UnboundedSender<T>>>,
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
        }
    }
}

impl<T: Clone> EventEmitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<T> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(sender);
        receiver
    }

    /// Send to every live subscriber, dropping the ones that went away
    pub fn emit(&self, value: T) {
        self.subscribers
            .borrow_mut()
            .retain(|sender| sender.unbounded_send(value.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives() {
        let emitter = EventEmitter::new();
        let mut a = emitter.subscribe();
        let mut b = emitter.subscribe();

        emitter.emit(7);

        assert_eq!(a.try_next().ok().flatten(), Some(7));
        assert_eq!(b.try_next().ok().flatten(), Some(7));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let emitter = EventEmitter::new();
        let receiver = emitter.subscribe();
        drop(receiver);

        emitter.emit("x");
        assert_eq!(emitter.subscriber_count(), 0);
    }
}
