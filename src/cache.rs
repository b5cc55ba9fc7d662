//! Time-bounded in-memory cache with a periodic expiry sweep.
//!
//! Reads, writes and the sweep all go through one mutex, so the cache can be shared between
//! controllers and the background sweeper on a multi-threaded runtime.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A cached value and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub value: T,
  pub fetched_at: Instant,
}

impl<T> CacheEntry<T> {
  /// Valid iff `now - fetched_at < ttl`.
  pub fn is_valid(&self, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(self.fetched_at) < ttl
  }
}

/// Key scoped by namespace so unrelated caches can share one map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub namespace: String,
  pub id: String,
}

impl CacheKey {
  pub fn new(namespace: &str, id: &str) -> Self {
    Self { namespace: namespace.to_string(), id: id.to_string() }
  }
}

pub struct TtlCache<K, V> {
  ttl: Duration,
  entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
  K: Eq + Hash,
  V: Clone,
{
  pub fn new(ttl: Duration) -> Self {
    Self { ttl, entries: Mutex::new(HashMap::new()) }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
    // A panic while holding the lock cannot leave the map half-written, so recover the guard.
    self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Return the value if present and not expired. Expired entries are left for the sweep.
  pub fn get(&self, key: &K) -> Option<V> {
    let now = Instant::now();
    self.lock().get(key).filter(|entry| entry.is_valid(now, self.ttl)).map(|entry| entry.value.clone())
  }

  /// Store `value` stamped with the current time, replacing any previous entry.
  pub fn insert(&self, key: K, value: V) {
    self.lock().insert(key, CacheEntry { value, fetched_at: Instant::now() });
  }

  pub fn invalidate(&self, key: &K) -> bool {
    self.lock().remove(key).is_some()
  }

  pub fn clear(&self) {
    self.lock().clear();
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Remove every expired entry. Returns how many were dropped.
  pub fn sweep(&self) -> usize {
    let now = Instant::now();
    let ttl = self.ttl;
    let mut entries = self.lock();
    let before = entries.len();
    entries.retain(|_, entry| entry.is_valid(now, ttl));
    before - entries.len()
  }
}

/// Spawn the periodic expiry sweep.
///
/// Runs every `period` regardless of access patterns until `cancel` is triggered.
pub fn spawn_sweeper<K, V>(cache: Arc<TtlCache<K, V>>, period: Duration, cancel: CancellationToken) -> JoinHandle<()>
where
  K: Eq + Hash + Send + 'static,
  V: Clone + Send + 'static,
{
  tokio::spawn(async move {
    info!(interval_secs = period.as_secs(), "cache: sweeper started");
    let mut interval = tokio::time::interval(period);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("cache: sweeper stopping");
          break;
        }
        _ = interval.tick() => {
          let removed = cache.sweep();
          if removed > 0 {
            debug!(removed, remaining = cache.len(), "cache: swept expired entries");
          }
        }
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const TTL: Duration = Duration::from_secs(600);

  #[tokio::test(start_paused = true)]
  async fn hit_within_ttl() {
    let cache = TtlCache::new(TTL);
    cache.insert(CacheKey::new("ns", "abc"), 1u32);
    tokio::time::advance(Duration::from_secs(599)).await;
    assert_eq!(cache.get(&CacheKey::new("ns", "abc")), Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn miss_exactly_at_ttl() {
    let cache = TtlCache::new(TTL);
    cache.insert("abc", 1u32);
    tokio::time::advance(TTL).await;
    assert_eq!(cache.get(&"abc"), None);
    // Still stored until swept.
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn namespaces_do_not_collide() {
    let cache = TtlCache::new(TTL);
    cache.insert(CacheKey::new("metadata", "abc"), "m");
    cache.insert(CacheKey::new("thumbs", "abc"), "t");
    assert_eq!(cache.get(&CacheKey::new("metadata", "abc")), Some("m"));
    assert_eq!(cache.get(&CacheKey::new("thumbs", "abc")), Some("t"));
  }

  #[test]
  fn invalidate_removes_one_entry() {
    let cache = TtlCache::new(TTL);
    cache.insert("a", 1);
    cache.insert("b", 2);
    assert!(cache.invalidate(&"a"));
    assert!(!cache.invalidate(&"a"));
    assert_eq!(cache.get(&"b"), Some(2));
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn sweep_drops_only_expired() {
    let cache = TtlCache::new(TTL);
    cache.insert("old", 1);
    tokio::time::advance(Duration::from_secs(400)).await;
    cache.insert("new", 2);
    tokio::time::advance(Duration::from_secs(300)).await;
    assert_eq!(cache.sweep(), 1);
    assert_eq!(cache.get(&"new"), Some(2));
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn sweeper_runs_on_its_own_interval() {
    let cache = Arc::new(TtlCache::new(TTL));
    cache.insert("abc", 1);
    let cancel = CancellationToken::new();
    let handle = spawn_sweeper(Arc::clone(&cache), Duration::from_secs(300), cancel.clone());

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(cache.len(), 1);

    // Tick at 600s finds the entry exactly at its TTL and drops it.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(cache.is_empty());

    cancel.cancel();
    handle.await.unwrap();
  }
}
