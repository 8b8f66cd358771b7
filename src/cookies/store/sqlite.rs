//! SQLite-backed cookie store.
//!
//! `SqliteCookieStore` persists **all zones'** cookie jars in a single SQLite
//! database. It implements the [`CookieStore`] trait and returns per-zone jars
//! wrapped in a [`PersistentCookieJar`], so that **every mutation** to a jar
//! triggers a snapshot write back to this store.
//!
//! ## Design
//! - One **table** (`cookies`) for all zones; each row is a single cookie.
//! - The `partition_key` column holds the serialized [`CookiePartitionKey`], or the
//!   empty string for unpartitioned cookies. Transient partitions are never written.
//! - In-memory cache: `jars: RwLock<HashMap<ZoneId, CookieJarHandle>>` for quick reuse.
//! - Database access is via an `r2d2` pool for safe multi-threaded use.
//!
//! ## I/O characteristics & caveats
//! - `save_zone` **rewrites** the set of cookies for a zone (DELETE + INSERT).
//! - Errors after construction are logged and otherwise ignored.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::params;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::CookieConfig;
use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::persistent_cookie_jar::PersistentCookieJar;
use crate::cookies::store::CookieStore;
use crate::cookies::{Cookie, CookieJarHandle, CookiePartitionKey, WeakCookieStoreHandle};
use crate::errors::CookieError;
use crate::zone::ZoneId;

/// Value of the `partition_key` column for unpartitioned cookies.
const UNPARTITIONED: &str = "";

/// A SQLite-based cookie store that persists cookies across sessions.
pub struct SqliteCookieStore {
    /// Connection pool for SQLite database (so it can run multithreaded)
    pool: Pool<SqliteConnectionManager>,
    /// Configuration handed to every jar loaded from the database.
    config: CookieConfig,
    /// Cookie jars per zone
    jars: RwLock<HashMap<ZoneId, CookieJarHandle>>,
    /// Weak self handle provided to persistent jars for callback persistence.
    store_self: Weak<Self>,
}

impl SqliteCookieStore {
    /// Opens (or creates) a SQLite database at `path` and ensures the schema exists.
    pub fn new(path: PathBuf) -> Result<Arc<Self>, CookieError> {
        Self::with_config(path, CookieConfig::default())
    }

    pub fn with_config(path: PathBuf, config: CookieConfig) -> Result<Arc<Self>, CookieError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::new(manager)?;

        pool.get()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS cookies (
                zone_id TEXT NOT NULL,
                partition_key TEXT NOT NULL,
                origin TEXT NOT NULL,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                path TEXT,
                domain TEXT,
                secure INTEGER NOT NULL,
                expires TEXT,
                same_site TEXT,
                http_only INTEGER NOT NULL,
                PRIMARY KEY (zone_id, partition_key, origin, name)
            );",
        )?;

        Ok(Arc::new_cyclic(|store_self| Self {
            pool,
            config,
            jars: RwLock::new(HashMap::new()),
            store_self: store_self.clone(),
        }))
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, CookieError> {
        Ok(self.pool.get()?)
    }

    /// Loads all cookies for `zone_id` from the database into a new [`DefaultCookieJar`].
    ///
    /// Rows with an unparseable partition key are skipped.
    fn load_zone(&self, zone_id: ZoneId) -> Result<DefaultCookieJar, CookieError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT partition_key, origin, name, value, path, domain, secure, expires, same_site, http_only
             FROM cookies WHERE zone_id = ?1",
        )?;

        let rows = stmt.query_map([zone_id.to_string()], |row| {
            let partition_key: String = row.get(0)?;
            let origin: String = row.get(1)?;
            let entry = Cookie {
                name: row.get(2)?,
                value: row.get(3)?,
                path: row.get(4)?,
                domain: row.get(5)?,
                secure: row.get::<_, i64>(6)? != 0,
                expires: row.get(7)?,
                same_site: row.get(8)?,
                http_only: row.get::<_, i64>(9)? != 0,
            };
            Ok((partition_key, origin, entry))
        })?;

        let mut jar = DefaultCookieJar::with_config(self.config.clone());
        for row in rows {
            let (partition_key, origin, entry) = row?;
            let buckets = if partition_key == UNPARTITIONED {
                &mut jar.unpartitioned
            } else {
                match CookiePartitionKey::from_serialized(&partition_key) {
                    Ok(key) => jar.partitioned.entry(key).or_default(),
                    Err(e) => {
                        log::warn!("zone {}: skipping cookie '{}': {}", zone_id, entry.name, e);
                        continue;
                    }
                }
            };
            buckets.entry(origin).or_default().push(entry);
        }

        Ok(jar)
    }

    /// Replaces all cookies for `zone_id` with the contents of `jar` in a transaction.
    fn save_zone(&self, zone_id: ZoneId, jar: &DefaultCookieJar) -> Result<(), CookieError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM cookies WHERE zone_id = ?1", [zone_id.to_string()])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO cookies (zone_id, partition_key, origin, name, value, path, domain, secure, expires, same_site, http_only)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            let partitioned = jar
                .partitioned
                .iter()
                .filter(|(key, _)| !key.is_transient())
                .map(|(key, buckets)| key.to_serialized().map(|key| (key, buckets)))
                .collect::<Result<Vec<_>, CookieError>>()?;
            let all = std::iter::once((UNPARTITIONED.to_string(), &jar.unpartitioned)).chain(partitioned);

            for (partition_key, buckets) in all {
                for (origin, cookies) in buckets {
                    for cookie in cookies {
                        stmt.execute(params![
                            zone_id.to_string(),
                            partition_key,
                            origin,
                            cookie.name,
                            cookie.value,
                            cookie.path,
                            cookie.domain,
                            cookie.secure as i64,
                            cookie.expires,
                            cookie.same_site,
                            cookie.http_only as i64
                        ])?;
                    }
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn remove_zone_from_db(&self, zone_id: ZoneId) -> Result<(), CookieError> {
        self.conn()?
            .execute("DELETE FROM cookies WHERE zone_id = ?1", [zone_id.to_string()])?;
        Ok(())
    }
}

impl CookieStore for SqliteCookieStore {
    /// Returns the cookie jar handle for `zone_id`, creating it if needed.
    ///
    /// Returns `None` when the zone cannot be loaded from the database.
    fn jar_for(&self, zone_id: ZoneId) -> Option<CookieJarHandle> {
        {
            let jars = self.jars.read();
            if let Some(jar) = jars.get(&zone_id) {
                return Some(jar.clone());
            }
        }

        let jar = match self.load_zone(zone_id) {
            Ok(jar) => jar,
            Err(e) => {
                log::error!("cannot load cookies for zone {}: {}", zone_id, e);
                return None;
            }
        };

        let store: WeakCookieStoreHandle = self.store_self.clone();
        let inner: CookieJarHandle = Arc::new(RwLock::new(jar));
        let handle: CookieJarHandle = Arc::new(RwLock::new(PersistentCookieJar::new(zone_id, inner, store)));

        Some(self.jars.write().entry(zone_id).or_insert(handle).clone())
    }

    fn persist_zone_from_snapshot(&self, zone_id: ZoneId, snapshot: &DefaultCookieJar) {
        if let Err(e) = self.save_zone(zone_id, snapshot) {
            log::error!("cannot persist cookies for zone {}: {}", zone_id, e);
        }
    }

    fn remove_zone(&self, zone_id: ZoneId) {
        self.jars.write().remove(&zone_id);
        if let Err(e) = self.remove_zone_from_db(zone_id) {
            log::error!("cannot remove cookies for zone {}: {}", zone_id, e);
        }
    }

    fn persist_all(&self) {
        let jars = self.jars.read();

        for (zone_id, jar_handle) in jars.iter() {
            let jar = jar_handle.read();
            if let Some(snapshot) = jar
                .as_any()
                .downcast_ref::<PersistentCookieJar>()
                .and_then(PersistentCookieJar::snapshot)
            {
                self.persist_zone_from_snapshot(*zone_id, &snapshot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{AncestorChain, PartitionKeyCollection};
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
    fn partitions_roundtrip_through_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.sqlite");
        let zone = ZoneId::new();
        let url: Url = "https://embed.test/".parse().unwrap();
        let top: Url = "https://top.test".parse().unwrap();
        let same = CookiePartitionKey::from_url(&top).unwrap();
        let cross = same.clone().with_ancestor_chain(AncestorChain::CrossSite);
        let nonced = CookiePartitionKey::from_url_with_nonce(&top, Uuid::new_v4()).unwrap();

        {
            let store = SqliteCookieStore::new(path.clone()).unwrap();
            let jar = store.jar_for(zone).unwrap();
            let mut jar = jar.write();
            jar.store_response_cookies(&url, &set_cookie(&["plain=1"]), None);
            jar.store_response_cookies(&url, &set_cookie(&["c=same; Secure; Partitioned"]), Some(&same));
            jar.store_response_cookies(&url, &set_cookie(&["c=cross; Secure; Partitioned"]), Some(&cross));
            jar.store_response_cookies(&url, &set_cookie(&["c=nonce; Secure; Partitioned"]), Some(&nonced));
        }

        let store = SqliteCookieStore::new(path).unwrap();
        let jar = store.jar_for(zone).unwrap();
        let all = jar.read().get_all_cookies(&PartitionKeyCollection::contains_all());

        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|(k, _, s)| k.is_none() && s == "plain=1"));
        assert!(all.iter().any(|(k, _, s)| k.as_ref() == Some(&same) && s == "c=same"));
        assert!(all.iter().any(|(k, _, s)| k.as_ref() == Some(&cross) && s == "c=cross"));
    }

    #[test]
    fn remove_zone_deletes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.sqlite");
        let zone = ZoneId::new();
        let url: Url = "https://example.com/".parse().unwrap();

        let store = SqliteCookieStore::new(path).unwrap();
        store
            .jar_for(zone)
            .unwrap()
            .write()
            .store_response_cookies(&url, &set_cookie(&["a=1"]), None);
        store.remove_zone(zone);

        let jar = store.jar_for(zone).unwrap();
        assert!(jar.read().get_request_cookies(&url, &PartitionKeyCollection::new()).is_none());
    }

    #[test]
    fn jar_does_not_keep_store_alive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.sqlite");
        let zone = ZoneId::new();
        let url: Url = "https://example.com/".parse().unwrap();

        let store = SqliteCookieStore::new(path).unwrap();
        let jar = store.jar_for(zone).unwrap();
        let weak = Arc::downgrade(&store);
        drop(store);
        assert!(weak.upgrade().is_none());

        jar.write().store_response_cookies(&url, &set_cookie(&["a=1"]), None);
        assert_eq!(
            jar.read().get_request_cookies(&url, &PartitionKeyCollection::new()).as_deref(),
            Some("a=1")
        );
    }
}
