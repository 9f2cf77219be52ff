// Collapses concurrent identical fetches: the first caller for a key runs
// the fetch, everyone arriving while it runs waits for that result.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

struct Flight<T> {
    id: u64,
    result: watch::Receiver<Option<T>>,
}

pub struct SingleFlight<T> {
    inflight: DashMap<String, Flight<T>>,
    next_id: AtomicU64,
}

enum Role<T> {
    Leader(u64, watch::Sender<Option<T>>),
    Follower(watch::Receiver<Option<T>>),
}

/// Removes the leader's marker however the leader finishes, including when
/// its future is dropped mid-fetch
struct FlightGuard<'a, T> {
    inflight: &'a DashMap<String, Flight<T>>,
    key: &'a str,
    id: u64,
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        self.inflight.remove_if(self.key, |_, flight| flight.id == self.id);
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // The entry guard holds a shard lock and must be gone before any await
        let role = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(flight) => Role::Follower(flight.get().result.clone()),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                slot.insert(Flight { id, result: rx });
                Role::Leader(id, tx)
            }
        };

        match role {
            Role::Leader(id, tx) => {
                let _guard = FlightGuard {
                    inflight: &self.inflight,
                    key,
                    id,
                };
                let value = fetch().await;
                tx.send_replace(Some(value.clone()));
                value
            }
            Role::Follower(mut rx) => {
                loop {
                    let current = rx.borrow_and_update().clone();
                    if let Some(value) = current {
                        return value;
                    }
                    if rx.changed().await.is_err() {
                        break;
                    }
                }

                let current = rx.borrow().clone();
                match current {
                    Some(value) => value,
                    None => {
                        tracing::debug!("In-flight fetch for {} was abandoned, fetching", key);
                        fetch().await
                    }
                }
            }
        }
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
