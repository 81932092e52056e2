//! In-process broadcast of session notifications.
//!
//! Every subscriber receives a copy of every message published after it
//! subscribed. Dropped subscriptions are pruned on the next publish.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use parking_lot::Mutex;

/// A subscription to an [`EventBus`].
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Next message, if one is already queued.
    pub fn try_next(&self) -> Option<M> {
        match self.receiver.try_recv() {
            Ok(m) => Some(m),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn next_timeout(&self, timeout: Duration) -> Option<M> {
        match self.receiver.recv_timeout(timeout) {
            Ok(m) => Some(m),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued so far, in publish order.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Best-effort fan-out bus. No IO, no async.
#[derive(Debug)]
pub struct EventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> Default for EventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M: Clone> EventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, message: M) {
        let mut subs = self.subscribers.lock();

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());
    }

    pub fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        Subscription::new(rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_messages_in_order() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(1);
        bus.publish(2);

        assert_eq!(a.drain(), vec![1, 2]);
        assert_eq!(b.drain(), vec![1, 2]);
        assert_eq!(a.try_next(), None);
    }

    #[test]
    fn late_subscribers_miss_earlier_messages() {
        let bus = EventBus::new();
        bus.publish("early");
        let sub = bus.subscribe();
        bus.publish("late");
        assert_eq!(sub.drain(), vec!["late"]);
    }

    #[test]
    fn dropped_subscriptions_are_pruned_on_publish() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(());
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.drain().len(), 1);
    }
}
