//! Short-lived cache of backend query results.
//!
//! Entries stay until a mutation invalidates them. Comment and vote entries
//! additionally go stale after the [`RefreshPolicy`] interval, so activity by
//! other users shows up without anyone invalidating.

use agora_common::model::{Id, community::CommunityMarker, post::PostMarker};
use std::{any::Any, collections::HashMap, future::Future, sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::Instant};
use tracing::trace;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Entries kept at once before the oldest fetch is evicted.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum QueryKey {
    Posts,
    Post(Id<PostMarker>),
    Comments(Id<PostMarker>),
    Votes(Id<PostMarker>),
    Communities,
    CommunityPage(Id<CommunityMarker>),
}

impl QueryKey {
    fn refreshes(self) -> bool {
        matches!(self, QueryKey::Comments(_) | QueryKey::Votes(_))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct RefreshPolicy {
    pub interval: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl RefreshPolicy {
    fn is_stale(self, key: QueryKey, entry: &Entry) -> bool {
        key.refreshes() && entry.fetched_at.elapsed() >= self.interval
    }
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

#[derive(Default)]
struct Entries {
    map: HashMap<QueryKey, Entry>,
    /// Bumped by every invalidation. Results fetched across a bump may predate
    /// the mutation and are handed out but not stored.
    epoch: u64,
}

pub struct QueryCache {
    policy: RefreshPolicy,
    capacity: usize,
    entries: Mutex<Entries>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("policy", &self.policy)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(policy: RefreshPolicy, capacity: usize) -> Self {
        Self {
            policy,
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    fn cached<T>(&self, entries: &mut Entries, key: QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = entries.map.get(&key)?;

        if self.policy.is_stale(key, entry) {
            trace!(?key, "Cached query went stale");
            entries.map.remove(&key);
            return None;
        }

        entry.value.downcast_ref::<T>().cloned()
    }

    fn store(&self, entries: &mut Entries, key: QueryKey, value: Arc<dyn Any + Send + Sync>) {
        let policy = self.policy;
        entries
            .map
            .retain(|&cached, entry| !policy.is_stale(cached, entry));

        if entries.map.len() >= self.capacity && !entries.map.contains_key(&key) {
            let oldest = entries
                .map
                .iter()
                .min_by_key(|(_, entry)| entry.fetched_at)
                .map(|(&key, _)| key);
            if let Some(oldest) = oldest {
                trace!(key = ?oldest, "Evicting cached query");
                entries.map.remove(&oldest);
            }
        }

        entries.map.insert(
            key,
            Entry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Returns the cached result for `key`, running `fetch` on a miss.
    ///
    /// Failed fetches are not cached, and neither are fetches that overlapped
    /// an [`invalidate`](Self::invalidate). The lock is not held while
    /// fetching, so concurrent misses may fetch twice.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let epoch = {
            let mut entries = self.entries.lock().await;
            if let Some(value) = self.cached(&mut entries, key) {
                return Ok(value);
            }
            entries.epoch
        };

        let value = fetch().await?;

        let mut entries = self.entries.lock().await;
        if entries.epoch == epoch {
            self.store(&mut entries, key, Arc::new(value.clone()));
        } else {
            trace!(?key, "Fetched query overlapped an invalidation, not caching it");
        }

        Ok(value)
    }

    pub async fn invalidate(&self, keys: &[QueryKey]) {
        let mut entries = self.entries.lock().await;
        entries.epoch = entries.epoch.wrapping_add(1);
        for key in keys {
            entries.map.remove(key);
        }
        trace!(?keys, "Invalidated cached queries");
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.map.len()
    }
}
