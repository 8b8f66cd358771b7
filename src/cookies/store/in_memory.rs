use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::CookieConfig;
use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::store::CookieStore;
use crate::cookies::CookieJarHandle;
use crate::zone::ZoneId;

/// Keeps one jar per zone in memory. Nothing survives the store.
#[derive(Default)]
pub struct InMemoryCookieStore {
    config: CookieConfig,
    /// Cookie jars per zone
    jars: RwLock<HashMap<ZoneId, CookieJarHandle>>,
}

impl InMemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose jars use `config`.
    pub fn with_config(config: CookieConfig) -> Self {
        Self {
            config,
            jars: RwLock::new(HashMap::new()),
        }
    }
}

impl CookieStore for InMemoryCookieStore {
    fn jar_for(&self, zone_id: ZoneId) -> Option<CookieJarHandle> {
        let mut jars = self.jars.write();
        let handle = jars
            .entry(zone_id)
            .or_insert_with(|| {
                let jar: CookieJarHandle = Arc::new(RwLock::new(DefaultCookieJar::with_config(self.config.clone())));
                jar
            })
            .clone();
        Some(handle)
    }

    fn persist_zone_from_snapshot(&self, _zone_id: ZoneId, _snapshot: &DefaultCookieJar) {}

    fn remove_zone(&self, zone_id: ZoneId) {
        self.jars.write().remove(&zone_id);
    }

    fn persist_all(&self) {}
}
