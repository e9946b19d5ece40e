use tokio::sync::broadcast;

use crate::db::models::Reading;

/// How many undelivered readings a slow observer may fall behind before the
/// channel starts dropping its oldest events.
const CHANNEL_CAPACITY: usize = 256;

/// Fan-out of newly persisted readings to live observers.
///
/// Built on `tokio::sync::broadcast`: each observer owns its own receiver, so
/// a slow or dead observer never blocks the publisher or its peers. Delivery
/// is at-most-once with no backlog — an observer that subscribes after a
/// publish never sees that reading.
#[derive(Clone)]
pub struct ReadingBroadcaster {
    tx: broadcast::Sender<Reading>,
}

impl ReadingBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Fire-and-forget publish. Having no connected observers is not an
    /// error.
    pub fn publish(&self, reading: Reading) {
        let _ = self.tx.send(reading);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Reading> {
        self.tx.subscribe()
    }

    /// Number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ReadingBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
