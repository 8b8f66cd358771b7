use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::{CookieJar, CookieJarHandle, CookiePartitionKey, PartitionKeyCollection, WeakCookieStoreHandle};
use crate::zone::ZoneId;
use http::HeaderMap;
use url::Url;

/// A `CookieJar` decorator that persists changes after each mutation.
///
/// This type is *transparent* for reads but *eagerly* persists after writes.
/// Only the durable part of the jar is handed to the store; transient (nonced)
/// partitions stay in memory. Once the store is dropped, writes only reach the
/// in-memory jar.
pub struct PersistentCookieJar {
    /// Zone ID associated with this jar (used to address the store).
    zone_id: ZoneId,
    /// Inner cookie jar that holds the actual cookie state.
    pub inner: CookieJarHandle,
    /// Handle to the cookie store responsible for persistence.
    store_handle: WeakCookieStoreHandle,
}

impl PersistentCookieJar {
    /// Creates a new persistence-enabled wrapper around an existing jar.
    pub fn new(zone_id: ZoneId, jar: CookieJarHandle, store_handle: WeakCookieStoreHandle) -> Self {
        Self {
            zone_id,
            inner: jar,
            store_handle,
        }
    }

    /// Returns a durable snapshot of the inner jar, if it is a [`DefaultCookieJar`].
    pub fn snapshot(&self) -> Option<DefaultCookieJar> {
        let inner = self.inner.read();
        inner
            .as_any()
            .downcast_ref::<DefaultCookieJar>()
            .map(DefaultCookieJar::without_transient_partitions)
    }

    /// Snapshots the inner jar and persists it to the backing store.
    fn persist(&self) {
        let Some(store) = self.store_handle.upgrade() else {
            log::debug!("zone {}: cookie store is gone, not persisting", self.zone_id);
            return;
        };

        match self.snapshot() {
            Some(snapshot) => store.persist_zone_from_snapshot(self.zone_id, &snapshot),
            None => log::error!("zone {}: inner cookie jar cannot be snapshotted, not persisting", self.zone_id),
        }
    }
}

impl CookieJar for PersistentCookieJar {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap, partition_key: Option<&CookiePartitionKey>) {
        self.inner.write().store_response_cookies(url, headers, partition_key);
        self.persist();
    }

    fn get_request_cookies(&self, url: &Url, partitions: &PartitionKeyCollection) -> Option<String> {
        self.inner.read().get_request_cookies(url, partitions)
    }

    fn clear(&mut self) {
        self.inner.write().clear();
        self.persist();
    }

    fn get_all_cookies(&self, partitions: &PartitionKeyCollection) -> Vec<(Option<CookiePartitionKey>, Url, String)> {
        self.inner.read().get_all_cookies(partitions)
    }

    fn remove_cookie(&mut self, url: &Url, cookie_name: &str, partitions: &PartitionKeyCollection) {
        self.inner.write().remove_cookie(url, cookie_name, partitions);
        self.persist();
    }

    fn remove_cookies_for_url(&mut self, url: &Url, partitions: &PartitionKeyCollection) {
        self.inner.write().remove_cookies_for_url(url, partitions);
        self.persist();
    }

    fn delete_partitioned(&mut self, partitions: &PartitionKeyCollection) -> usize {
        let removed = self.inner.write().delete_partitioned(partitions);
        if removed > 0 {
            self.persist();
        }
        removed
    }
}
