//! Bounded FIFO queue of outbound notifications.
//!
//! Any number of producers hold a cloned [`NotificationQueue`]; the single
//! consumer is the [`Dispatcher`](crate::dispatcher::Dispatcher), which owns
//! the receiving half. A full queue applies backpressure: `enqueue` waits for
//! room rather than dropping the item.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use subscribe_common::types::NotificationItem;

use crate::error::NotifierError;

/// Default number of notifications that may wait for the dispatcher.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Producer handle of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<NotificationItem>,
    capacity: usize,
}

/// Consumer half, owned by the dispatcher.
pub type NotificationReceiver = mpsc::Receiver<NotificationItem>;

/// Create a queue holding at most `capacity` pending items.
///
/// # Panics
///
/// Panics if `capacity` is zero or above `Semaphore::MAX_PERMITS`.
pub fn channel(capacity: usize) -> (NotificationQueue, NotificationReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (NotificationQueue { tx, capacity }, rx)
}

impl NotificationQueue {
    /// Enqueue an item, waiting for space when the queue is full.
    pub async fn enqueue(&self, item: NotificationItem) -> Result<(), NotifierError> {
        self.tx
            .send(item)
            .await
            .map_err(|_| NotifierError::QueueClosed)
    }

    /// Enqueue without waiting.
    pub fn try_enqueue(&self, item: NotificationItem) -> Result<(), NotifierError> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => NotifierError::QueueFull,
            TrySendError::Closed(_) => NotifierError::QueueClosed,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently waiting for the dispatcher.
    pub fn pending(&self) -> usize {
        self.capacity - self.tx.capacity()
    }
}
