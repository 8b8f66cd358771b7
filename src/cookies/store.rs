//! Cookie store infrastructure.
//!
//! A **cookie store** is a provisioner and persistence layer for per-zone cookie jars.
//! - A zone only *holds a [`CookieJarHandle`]*, never a store.
//! - A **CookieStore** can *mint* a jar for a given [`ZoneId`] and optionally
//!   persist/flush all zone jars in one place (e.g., a single JSON file or SQLite DB).
//!
//! This module exports three implementations:
//! - [`InMemoryCookieStore`]: nothing is written anywhere (private/ephemeral zones).
//! - [`JsonCookieStore`]: file-backed JSON store (good for simple setups).
//! - [`SqliteCookieStore`]: SQLite-backed store (feature `sqlite_cookie_store`).
//!
//! ## Partitions
//! Persistent stores write every partition of a jar **except transient ones**: a
//! partition keyed with a nonce only lives as long as the in-memory jar.
//!
//! ## Design notes
//! - Implementations are `Send + Sync` and safe for concurrent access.
//! - `CookieStore::jar_for(zone_id)` returns the *same logical jar instance* for a zone for
//!   the lifetime of the store, so all handles observe consistent state.
//!
//! ## Example
//! ```rust,no_run
//! use gosub_cookies::cookies::{CookieStore, JsonCookieStore, PartitionKeyCollection};
//! use gosub_cookies::ZoneId;
//!
//! let store = JsonCookieStore::new("cookies.json".into()).unwrap();
//! let zone_id = ZoneId::new();
//!
//! let jar = store.jar_for(zone_id).unwrap();
//! let url = "https://example.com/".parse().unwrap();
//! let header = jar.read().get_request_cookies(&url, &PartitionKeyCollection::new());
//! ```
mod in_memory;
mod json;
#[cfg(feature = "sqlite_cookie_store")]
mod sqlite;

use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::cookies::CookieJarHandle;
use crate::zone::ZoneId;

/// In-memory cookie store (nothing persisted).
pub use in_memory::InMemoryCookieStore;
/// File-backed JSON cookie store (one file for all zones).
pub use json::JsonCookieStore;
/// SQLite-backed cookie store (one database for all zones).
#[cfg(feature = "sqlite_cookie_store")]
pub use sqlite::SqliteCookieStore;

/// A cookie **store** mints per-zone cookie **jars** and (optionally) persists them.
///
/// Implementations must be `Send + Sync` and safe for concurrent use.
pub trait CookieStore: Send + Sync {
    /// Returns (or creates and returns) the cookie jar handle for `zone_id`.
    ///
    /// ### Expectations
    /// - Should return the *same logical jar instance* for a given `zone_id`
    ///   across calls, so all holders observe consistent state.
    /// - May create the jar lazily on first request.
    /// - Return `None` if provisioning fails irrecoverably.
    fn jar_for(&self, zone_id: ZoneId) -> Option<CookieJarHandle>;

    /// Persists the cookie state for `zone_id` from a provided snapshot.
    ///
    /// The snapshot is expected to be free of transient partitions (see
    /// [`DefaultCookieJar::without_transient_partitions`]); stores drop any that
    /// slip through.
    ///
    /// This is **best-effort** and must not panic.
    fn persist_zone_from_snapshot(&self, zone_id: ZoneId, snapshot: &DefaultCookieJar);

    /// Removes all persisted cookie data for `zone_id` from the store.
    ///
    /// This operation is **idempotent** and must not panic.
    fn remove_zone(&self, zone_id: ZoneId);

    /// Persists all known zone jars to durable storage.
    fn persist_all(&self);
}
