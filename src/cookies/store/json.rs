//! JSON-backed cookie store.
//!
//! `JsonCookieStore` persists **all zones'** cookie jars in a single JSON file on disk.
//! It implements the [`CookieStore`] trait and returns per-zone jars wrapped in
//! [`PersistentCookieJar`], so that **every mutation** to a jar triggers a snapshot
//! write back to this store.
//!
//! ### Design
//! - One file for all zones (`CookieStoreFile { zones: HashMap<ZoneId, DefaultCookieJar> }`).
//!   Partition keys are written in their serialized `"<site>^<bit>"` form.
//! - In-memory cache: `jars: RwLock<HashMap<ZoneId, CookieJarHandle>>` for quick reuse.
//! - The store keeps a weak self handle (`store_self`) so the persistent jars can call
//!   back into `persist_zone_from_snapshot` without keeping the store alive.
//!
//! ### I/O characteristics & caveats
//! - `persist_zone_from_snapshot` and `remove_zone` **read then rewrite** the entire
//!   JSON file. For large datasets, use the SQLite-backed store.
//! - Every load/modify/save cycle holds `io_lock`, so zones persisting from different
//!   threads do not overwrite each other's entries.
//! - The file is replaced atomically: contents go to a temporary file in the same
//!   directory, which is then renamed over the store file.
//! - I/O errors after construction are logged and otherwise ignored.
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::CookieConfig;
use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::persistent_cookie_jar::PersistentCookieJar;
use crate::cookies::store::CookieStore;
use crate::cookies::{CookieJarHandle, WeakCookieStoreHandle};
use crate::errors::CookieError;
use crate::zone::ZoneId;

/// On-disk representation of all zones' cookie jars.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CookieStoreFile {
    zones: HashMap<ZoneId, DefaultCookieJar>,
}

/// A JSON-based cookie store that persists cookies across sessions.
pub struct JsonCookieStore {
    /// Path to the JSON file where cookies are stored.
    path: PathBuf,

    /// Configuration handed to every jar loaded from the file.
    config: CookieConfig,

    /// Actual list of cookie jars per zone
    jars: RwLock<HashMap<ZoneId, CookieJarHandle>>,

    /// Serializes every read-modify-write of the file.
    io_lock: Mutex<()>,

    /// Weak self handle, so `PersistentCookieJar` can call back into this store.
    store_self: Weak<Self>,
}

impl JsonCookieStore {
    /// Creates (or opens) a JSON cookie store at `path`.
    ///
    /// If the file does not exist, an empty structure is written to disk.
    pub fn new(path: PathBuf) -> Result<Arc<Self>, CookieError> {
        Self::with_config(path, CookieConfig::default())
    }

    pub fn with_config(path: PathBuf, config: CookieConfig) -> Result<Arc<Self>, CookieError> {
        let store = Arc::new_cyclic(|store_self| Self {
            path,
            config,
            jars: RwLock::new(HashMap::new()),
            io_lock: Mutex::new(()),
            store_self: store_self.clone(),
        });

        if !store.path.exists() {
            store.save_file(&CookieStoreFile::default())?;
        }

        Ok(store)
    }

    /// Loads and deserializes the full cookie store file.
    fn load_file(&self) -> Result<CookieStoreFile, CookieError> {
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Serializes and atomically replaces the full cookie store file (pretty-printed).
    fn save_file(&self, store_file: &CookieStoreFile) -> Result<(), CookieError> {
        let contents = serde_json::to_vec_pretty(store_file)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&contents)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Loads the file, applies `update` and writes it back, all under `io_lock`.
    fn update_file(&self, update: impl FnOnce(&mut CookieStoreFile)) -> Result<(), CookieError> {
        let _guard = self.io_lock.lock();
        let mut file = self.load_file()?;
        update(&mut file);
        self.save_file(&file)
    }
}

impl CookieStore for JsonCookieStore {
    /// Returns the cookie jar handle for `zone_id`, creating it if needed.
    ///
    /// A jar missing from the file starts empty. An unreadable file also yields
    /// an empty jar, after logging the error.
    fn jar_for(&self, zone_id: ZoneId) -> Option<CookieJarHandle> {
        {
            // Fast path: already in memory
            let jars = self.jars.read();
            if let Some(jar) = jars.get(&zone_id) {
                return Some(jar.clone());
            }
        }

        let file = {
            let _guard = self.io_lock.lock();
            self.load_file()
        };
        let loaded = match file {
            Ok(mut file) => file.zones.remove(&zone_id),
            Err(e) => {
                log::error!("cannot load cookie store {}: {}", self.path.display(), e);
                None
            }
        };
        let mut jar = DefaultCookieJar::with_config(self.config.clone());
        if let Some(loaded) = loaded {
            jar.unpartitioned = loaded.unpartitioned;
            jar.partitioned = loaded.partitioned;
        }

        let store: WeakCookieStoreHandle = self.store_self.clone();
        let inner: CookieJarHandle = Arc::new(RwLock::new(jar));
        let persistent: CookieJarHandle = Arc::new(RwLock::new(PersistentCookieJar::new(zone_id, inner, store)));

        Some(self.jars.write().entry(zone_id).or_insert(persistent).clone())
    }

    fn persist_zone_from_snapshot(&self, zone_id: ZoneId, snapshot: &DefaultCookieJar) {
        let snapshot = snapshot.without_transient_partitions();
        if let Err(e) = self.update_file(|file| {
            file.zones.insert(zone_id, snapshot);
        }) {
            log::error!("cannot persist cookies for zone {}: {}", zone_id, e);
        }
    }

    fn remove_zone(&self, zone_id: ZoneId) {
        self.jars.write().remove(&zone_id);

        if let Err(e) = self.update_file(|file| {
            file.zones.remove(&zone_id);
        }) {
            log::error!("cannot remove cookies for zone {}: {}", zone_id, e);
        }
    }

    /// Persists **all** in-memory jars to disk by snapshotting them.
    fn persist_all(&self) {
        let snapshots: Vec<(ZoneId, DefaultCookieJar)> = self
            .jars
            .read()
            .iter()
            .filter_map(|(zone_id, jar)| {
                let jar = jar.read();
                let persist = jar.as_any().downcast_ref::<PersistentCookieJar>()?;
                Some((*zone_id, persist.snapshot()?))
            })
            .collect();

        if let Err(e) = self.update_file(|file| file.zones.extend(snapshots)) {
            log::error!("cannot persist cookie store {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{CookiePartitionKey, PartitionKeyCollection};
    use http::{HeaderMap, HeaderValue};
    use url::Url;
    use uuid::Uuid;

    fn set_cookie(values: &[&'static str]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for v in values {
            h.append("set-cookie", HeaderValue::from_static(v));
        }
        h
    }

    #[test]
    fn partitioned_cookies_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let zone = ZoneId::new();
        let url: Url = "https://embed.test/".parse().unwrap();
        let top = CookiePartitionKey::from_url(&"https://top.test".parse().unwrap()).unwrap();

        {
            let store = JsonCookieStore::new(path.clone()).unwrap();
            let jar = store.jar_for(zone).unwrap();
            jar.write().store_response_cookies(&url, &set_cookie(&["plain=1"]), None);
            jar.write()
                .store_response_cookies(&url, &set_cookie(&["chip=1; Secure; Partitioned"]), Some(&top));
        }

        let store = JsonCookieStore::new(path).unwrap();
        let jar = store.jar_for(zone).unwrap();

        assert_eq!(
            jar.read().get_request_cookies(&url, &PartitionKeyCollection::new()).as_deref(),
            Some("plain=1")
        );
        let mut all: Vec<String> = jar
            .read()
            .get_request_cookies(&url, &PartitionKeyCollection::singleton(top))
            .unwrap()
            .split("; ")
            .map(String::from)
            .collect();
        all.sort();
        assert_eq!(all, vec!["chip=1", "plain=1"]);
    }

    #[test]
    fn transient_partitions_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let zone = ZoneId::new();
        let url: Url = "https://embed.test/".parse().unwrap();
        let nonced =
            CookiePartitionKey::from_url_with_nonce(&"https://top.test".parse().unwrap(), Uuid::new_v4()).unwrap();

        let store = JsonCookieStore::new(path.clone()).unwrap();
        let jar = store.jar_for(zone).unwrap();
        jar.write()
            .store_response_cookies(&url, &set_cookie(&["t=1; Secure; Partitioned"]), Some(&nonced));

        // Still visible in memory.
        assert_eq!(
            jar.read()
                .get_request_cookies(&url, &PartitionKeyCollection::singleton(nonced))
                .as_deref(),
            Some("t=1")
        );

        store.persist_all();
        let reopened = JsonCookieStore::new(path).unwrap();
        let jar = reopened.jar_for(zone).unwrap();
        assert!(jar.read().get_all_cookies(&PartitionKeyCollection::contains_all()).is_empty());
    }

    #[test]
    fn delete_partitioned_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let zone = ZoneId::new();
        let url: Url = "https://embed.test/".parse().unwrap();
        let top = CookiePartitionKey::from_url(&"https://top.test".parse().unwrap()).unwrap();

        {
            let store = JsonCookieStore::new(path.clone()).unwrap();
            let jar = store.jar_for(zone).unwrap();
            jar.write()
                .store_response_cookies(&url, &set_cookie(&["chip=1; Secure; Partitioned"]), Some(&top));
            assert_eq!(jar.write().delete_partitioned(&PartitionKeyCollection::contains_all()), 1);
        }

        let store = JsonCookieStore::new(path).unwrap();
        let jar = store.jar_for(zone).unwrap();
        assert!(jar.read().get_all_cookies(&PartitionKeyCollection::contains_all()).is_empty());
    }

    #[test]
    fn remove_zone_clears_file_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let zone = ZoneId::new();
        let url: Url = "https://example.com/".parse().unwrap();

        let store = JsonCookieStore::new(path.clone()).unwrap();
        let jar = store.jar_for(zone).unwrap();
        jar.write().store_response_cookies(&url, &set_cookie(&["a=1"]), None);
        store.remove_zone(zone);

        let reopened = JsonCookieStore::new(path).unwrap();
        let jar = reopened.jar_for(zone).unwrap();
        assert!(jar.read().get_request_cookies(&url, &PartitionKeyCollection::new()).is_none());
    }

    #[test]
    fn zones_persisting_concurrently_keep_all_cookies() {
        const ZONES: usize = 8;
        const COOKIES: usize = 20;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let url: Url = "https://embed.test/".parse().unwrap();
        let top = CookiePartitionKey::from_url(&"https://top.test".parse().unwrap()).unwrap();
        let zones: Vec<ZoneId> = (0..ZONES).map(|_| ZoneId::new()).collect();

        let store = JsonCookieStore::new(path.clone()).unwrap();
        let workers: Vec<_> = zones
            .iter()
            .map(|&zone| {
                let store = store.clone();
                let url = url.clone();
                let top = top.clone();
                std::thread::spawn(move || {
                    let jar = store.jar_for(zone).unwrap();
                    for i in 0..COOKIES {
                        let header = HeaderValue::from_str(&format!("c{i}=1; Secure; Partitioned")).unwrap();
                        let mut headers = HeaderMap::new();
                        headers.append("set-cookie", header);
                        jar.write().store_response_cookies(&url, &headers, Some(&top));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        drop(store);

        let reopened = JsonCookieStore::new(path).unwrap();
        for zone in zones {
            let jar = reopened.jar_for(zone).unwrap();
            let all = jar.read().get_all_cookies(&PartitionKeyCollection::contains_all());
            assert_eq!(all.len(), COOKIES, "zone {zone} lost cookies");
        }
    }

    #[test]
    fn jar_does_not_keep_store_alive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let zone = ZoneId::new();
        let url: Url = "https://example.com/".parse().unwrap();

        let store = JsonCookieStore::new(path).unwrap();
        let jar = store.jar_for(zone).unwrap();
        let weak = Arc::downgrade(&store);
        drop(store);
        assert!(weak.upgrade().is_none());

        // Writes still reach the in-memory jar once the store is gone.
        jar.write().store_response_cookies(&url, &set_cookie(&["a=1"]), None);
        assert_eq!(
            jar.read().get_request_cookies(&url, &PartitionKeyCollection::new()).as_deref(),
            Some("a=1")
        );
    }
}
