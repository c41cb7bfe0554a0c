use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Mutex, PoisonError};

use super::types::DecoderEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A subscriber's end of a session's notification channel.
///
/// Events arrive in the order the session produced them. The channel
/// disconnects when the subscriber unsubscribes or the session is closed.
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::Receiver<DecoderEvent>,
}

/// Fan-out of decoder events to every current subscriber.
#[derive(Default)]
pub(crate) struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, mpsc::Sender<DecoderEvent>)>>,
}

impl EventBus {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, mpsc::Sender<DecoderEvent>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::channel();
        self.lock().push((id, tx));
        Subscription { id, events: rx }
    }

    /// Returns whether `id` was subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    /// Send to every subscriber, pruning those whose receiver is gone.
    pub fn publish(&self, event: &DecoderEvent) {
        self.lock()
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
