use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

/// A discrete lane press at a song time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanePress {
    pub lane: usize,
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fans lane presses out to explicitly registered subscribers.
///
/// Subscribers own their receiver; dropping it is equivalent to
/// unsubscribing and the sender is pruned on the next dispatch.
#[derive(Debug, Default)]
pub struct LaneInput {
    subscribers: Vec<(SubscriptionId, Sender<LanePress>)>,
    next_id: u64,
}

impl LaneInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<LanePress>) {
        let (sender, receiver) = mpsc::channel();
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, sender));
        (id, receiver)
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers `press` to every live subscriber and returns how many
    /// received it.
    pub fn dispatch(&mut self, press: LanePress) -> usize {
        self.subscribers
            .retain(|(_, sender)| sender.send(press).is_ok());
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(lane: usize) -> LanePress {
        LanePress { lane, time: 1.5 }
    }

    #[test]
    fn delivers_to_all_subscribers() {
        let mut input = LaneInput::new();
        let (_, first) = input.subscribe();
        let (_, second) = input.subscribe();

        assert_eq!(input.dispatch(press(2)), 2);
        assert_eq!(first.try_recv().unwrap(), press(2));
        assert_eq!(second.try_recv().unwrap(), press(2));
    }

    #[test]
    fn unsubscribed_receivers_get_nothing() {
        let mut input = LaneInput::new();
        let (id, receiver) = input.subscribe();
        assert!(input.unsubscribe(id));
        assert!(!input.unsubscribe(id));

        assert_eq!(input.dispatch(press(0)), 0);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut input = LaneInput::new();
        let (_, kept) = input.subscribe();
        let (_, dropped) = input.subscribe();
        drop(dropped);

        assert_eq!(input.dispatch(press(1)), 1);
        assert_eq!(input.subscriber_count(), 1);
        assert_eq!(kept.try_iter().count(), 1);
    }
}
