//! Fanout of one source stream to dynamically attached subscribers.
//!
//! A single dispatch task reads the source and hands each value to every
//! attached subscriber in turn, awaiting each delivery before moving on. A
//! subscriber that stops reading stalls every other subscriber and the source
//! until it reads or detaches. Nothing is dropped and there is no timeout.
//!
//! Tokio channels cannot be zero-capacity, so each subscriber channel holds
//! one value rather than none. A stalled subscriber therefore blocks the
//! dispatch of the second value after it stops reading, not the first.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

const SUBSCRIPTION_CAPACITY: usize = 1;

type Subscribers<T> = Arc<Mutex<HashMap<u64, mpsc::Sender<T>>>>;

/// Distributes values from one source to every current subscriber.
pub struct Fanout<T> {
    subscribers: Subscribers<T>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for Fanout<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<T: Clone + Send + 'static> Fanout<T> {
    /// Wraps `source` and spawns the dispatch task on the current Tokio runtime.
    ///
    /// The task ends when every sender of `source` is dropped.
    #[must_use]
    pub fn spawn(mut source: mpsc::Receiver<T>) -> Self {
        let subscribers: Subscribers<T> = Arc::new(Mutex::new(HashMap::new()));
        let dispatch = Arc::clone(&subscribers);

        tokio::spawn(async move {
            while let Some(value) = source.recv().await {
                let targets: Vec<(u64, mpsc::Sender<T>)> = dispatch
                    .lock()
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect();

                for (id, tx) in targets {
                    if tx.send(value.clone()).await.is_err() {
                        dispatch.lock().remove(&id);
                        debug!(subscription = id, "Dropped closed subscription");
                    }
                }
            }
            dispatch.lock().clear();
            debug!("Fanout source closed");
        });

        Self {
            subscribers,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attaches a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        self.subscribers.lock().insert(id, tx);
        debug!(subscription = id, "Subscriber attached");
        Subscription {
            id,
            receiver: rx,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Returns the number of attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// One attached output of a [`Fanout`]. Detaches on [`Subscription::unsubscribe`] or drop.
pub struct Subscription<T> {
    id: u64,
    receiver: mpsc::Receiver<T>,
    subscribers: Subscribers<T>,
}

impl<T> Subscription<T> {
    /// Waits for the next value. Returns `None` once the fanout source is closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Detaches this subscriber. A delivery blocked on it is released.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.subscribers.lock().remove(&self.id);
        self.receiver.close();
        debug!(subscription = self.id, "Subscriber detached");
    }
}
