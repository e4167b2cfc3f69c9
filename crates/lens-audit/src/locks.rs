//! Keyed async locks serializing aggregations per site.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Map from site id to an async mutex.
///
/// An entry lives while some caller holds or awaits it; the last guard to
/// drop removes it.
#[derive(Clone, Default)]
pub struct SiteLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Exclusive hold on one site.
pub struct SiteGuard {
    guard: Option<OwnedMutexGuard<()>>,
    site_id: String,
    inner: Arc<Mutex<LockMap>>,
}

impl SiteLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `site_id`.
    ///
    /// Dropping the returned future before it resolves leaves no entry behind.
    pub async fn lock(&self, site_id: &str) -> SiteGuard {
        let mutex = self.entry(site_id);
        let waiter = Waiter {
            mutex: Some(Arc::clone(&mutex)),
            site_id,
            inner: &self.inner,
        };
        let guard = mutex.lock_owned().await;
        drop(waiter);
        self.guard(site_id, guard)
    }

    /// Number of sites with a live entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, site_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.map().entry(site_id.to_string()).or_default())
    }

    fn guard(&self, site_id: &str, guard: OwnedMutexGuard<()>) -> SiteGuard {
        SiteGuard {
            guard: Some(guard),
            site_id: site_id.to_string(),
            inner: Arc::clone(&self.inner),
        }
    }
}

fn remove_if_idle(inner: &Mutex<LockMap>, site_id: &str) {
    let mut map = inner.lock().unwrap_or_else(PoisonError::into_inner);
    if map
        .get(site_id)
        .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
    {
        map.remove(site_id);
    }
}

/// Reference held while awaiting a site lock.
struct Waiter<'a> {
    mutex: Option<Arc<tokio::sync::Mutex<()>>>,
    site_id: &'a str,
    inner: &'a Mutex<LockMap>,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        drop(self.mutex.take());
        remove_if_idle(self.inner, self.site_id);
    }
}

impl SiteGuard {
    #[must_use]
    pub fn site_id(&self) -> &str {
        &self.site_id
    }
}

impl Drop for SiteGuard {
    fn drop(&mut self) {
        // The owned guard holds an Arc to the mutex; release it first so the
        // idle check sees only the map's reference.
        drop(self.guard.take());
        remove_if_idle(&self.inner, &self.site_id);
    }
}

impl std::fmt::Debug for SiteLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteLocks").field("sites", &self.len()).finish()
    }
}
