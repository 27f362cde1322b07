//! Single-flight coalescing of concurrent fetches.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

/// At most one piece of work per key in flight.
///
/// The first caller for a key runs the work; callers arriving while it runs
/// wait and receive a clone of its result. If the running caller is dropped
/// before finishing, one of the waiters takes over.
pub struct SingleFlight<K, V> {
    flights: Mutex<HashMap<K, broadcast::Sender<V>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, or wait for the caller already running it.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        while let Some(mut rx) = self.join(&key) {
            match rx.recv().await {
                Ok(value) => return value,
                // The leader went away without a result.
                Err(_) => continue,
            }
        }

        let guard = FlightGuard {
            flights: &self.flights,
            key: Some(key),
        };
        let value = work().await;
        guard.finish(value.clone());
        value
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Subscribe to a running flight, or register a new one and return `None`.
    fn join(&self, key: &K) -> Option<broadcast::Receiver<V>> {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        match flights.entry(key.clone()) {
            Entry::Occupied(entry) => Some(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx);
                None
            }
        }
    }
}

/// Removes the flight when the leader finishes or is dropped.
struct FlightGuard<'a, K: Eq + Hash, V> {
    flights: &'a Mutex<HashMap<K, broadcast::Sender<V>>>,
    key: Option<K>,
}

impl<K: Eq + Hash, V> FlightGuard<'_, K, V> {
    fn finish(mut self, value: V) {
        if let Some(key) = self.key.take() {
            let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx) = flights.remove(&key) {
                // No receivers is fine.
                let _ = tx.send(value);
            }
        }
    }
}

impl<K: Eq + Hash, V> Drop for FlightGuard<'_, K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.flights
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_run() {
        let flights = Arc::new(SingleFlight::<String, u32>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let callers = (0..10).map(|_| {
            let flights = Arc::clone(&flights);
            let runs = Arc::clone(&runs);
            async move {
                flights
                    .run("cart".to_string(), || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42
                    })
                    .await
            }
        });
        let results = futures::future::join_all(callers).await;

        assert_eq!(results, vec![42; 10]);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_run_separately() {
        let flights = SingleFlight::<&'static str, &'static str>::new();
        let (a, b) = tokio::join!(
            flights.run("a", || async { "a" }),
            flights.run("b", || async { "b" }),
        );
        assert_eq!((a, b), ("a", "b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_callers_run_again() {
        let flights = SingleFlight::<u8, usize>::new();
        let runs = AtomicUsize::new(0);
        for _ in 0..3 {
            flights
                .run(1, || async { runs.fetch_add(1, Ordering::SeqCst) })
                .await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_leader_hands_over() {
        let flights = Arc::new(SingleFlight::<u8, &'static str>::new());

        let leader = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move {
                flights
                    .run(1, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        "leader"
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(flights.in_flight(), 1);

        let waiter = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move { flights.run(1, || async { "waiter" }).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;

        leader.abort();
        assert_eq!(waiter.await.unwrap(), "waiter");
        assert_eq!(flights.in_flight(), 0);
    }
}
