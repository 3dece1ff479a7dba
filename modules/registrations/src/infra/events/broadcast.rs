use tokio::sync::broadcast;

use crate::domain::ports::EventPublisher;

/// Event fan-out on `tokio::sync::broadcast`.
/// Bounded: lagging subscribers lose the oldest events.
pub struct BroadcastEventPublisher<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> BroadcastEventPublisher<E> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }
}

impl<E: Clone + Send + Sync + 'static> EventPublisher<E> for BroadcastEventPublisher<E> {
    fn publish(&self, event: &E) {
        // no subscribers is not an error
        let _ = self.tx.send(event.clone());
    }
}
