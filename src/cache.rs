//! Single-flight cache keyed by string
//!
//! Each key gets its own async lock, created on first use and kept for the
//! lifetime of the cache. The first caller for a key performs the fetch while
//! later callers for the same key wait on that lock and then read the stored
//! value. Callers for different keys never contend.
//!
//! Successful values are kept forever. A failed fetch is handed to every
//! caller that was already waiting on it and is then forgotten, so the next
//! request for the key fetches again.

use crate::error::{DashboardError, SharedError};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Per-key lock plus the most recent failure recorded under it
#[derive(Debug, Default)]
struct FlightSlot {
    /// Number of failed fetches so far; callers snapshot it before queueing
    failures: AtomicU64,
    /// Held for the duration of a fetch
    last_failure: Mutex<Option<(u64, SharedError)>>,
}

/// Write-once, read-many cache with at most one in-flight fetch per key
#[derive(Debug)]
pub struct SingleFlight<V> {
    values: DashMap<String, V>,
    slots: DashMap<String, Arc<FlightSlot>>,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            values: DashMap::new(),
            slots: DashMap::new(),
        }
    }
}

impl<V: Clone> SingleFlight<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, running `fetch` if there is none.
    ///
    /// Concurrent calls for the same key run `fetch` once and all observe its
    /// outcome.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V, SharedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, DashboardError>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let slot = self.slot(key);
        let seen_failures = slot.failures.load(Ordering::Acquire);
        let mut last_failure = slot.last_failure.lock().await;

        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        // The fetch we queued behind failed; share its error instead of retrying.
        if let Some((attempt, error)) = last_failure.as_ref() {
            if *attempt == seen_failures {
                return Err(Arc::clone(error));
            }
        }

        debug!("Cache miss for {}", key);
        match fetch().await {
            Ok(value) => {
                self.values.insert(key.to_string(), value.clone());
                *last_failure = None;
                Ok(value)
            }
            Err(e) => {
                let error = Arc::new(e);
                *last_failure = Some((seen_failures, Arc::clone(&error)));
                slot.failures.fetch_add(1, Ordering::Release);
                Err(error)
            }
        }
    }

    /// Cached value for `key`, if a fetch has succeeded
    pub fn get(&self, key: &str) -> Option<V> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// Number of cached values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn slot(&self, key: &str) -> Arc<FlightSlot> {
        Arc::clone(&*self.slots.entry(key.to_string()).or_default())
    }
}
