use domain::GatewayError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Serialized backend response shared with waiters
pub type SharedFetch = Result<String, GatewayError>;

type Calls = HashMap<String, (u64, broadcast::Sender<SharedFetch>)>;

/// Map of cache keys currently being fetched from a backend.
///
/// The first miss on a key becomes the leader and performs the fetch; later
/// misses on the same key subscribe and receive the leader's result.
#[derive(Default)]
pub struct InFlight {
    calls: Mutex<Calls>,
    next_id: AtomicU64,
}

pub enum Flight {
    Leader(LeaderGuard),
    Follower(broadcast::Receiver<SharedFetch>),
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn calls(&self) -> MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn join(self: &Arc<Self>, key: &str) -> Flight {
        let mut calls = self.calls();
        if let Some((_, tx)) = calls.get(key) {
            return Flight::Follower(tx.subscribe());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = broadcast::channel(1);
        calls.insert(key.to_string(), (id, tx.clone()));

        Flight::Leader(LeaderGuard {
            flights: Arc::clone(self),
            key: key.to_string(),
            id,
            tx,
        })
    }

    pub fn len(&self) -> usize {
        self.calls().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, key: &str, id: u64) {
        let mut calls = self.calls();
        if calls.get(key).map(|(current, _)| *current == id).unwrap_or(false) {
            calls.remove(key);
        }
    }
}

/// Held by the caller performing the fetch. Dropping it without calling
/// `complete` (e.g. on cancellation) closes the channel and waiters fetch
/// on their own.
pub struct LeaderGuard {
    flights: Arc<InFlight>,
    key: String,
    id: u64,
    tx: broadcast::Sender<SharedFetch>,
}

impl LeaderGuard {
    pub fn complete(self, result: SharedFetch) {
        self.flights.remove(&self.key, self.id);
        // No receivers is fine: nobody else missed on this key
        let _ = self.tx.send(result);
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.flights.remove(&self.key, self.id);
    }
}
