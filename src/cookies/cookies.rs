//! Cookie core types.
//!
//! This module defines the **type-erased handles** used throughout the crate
//! and the serializable [`Cookie`] data structure.
//!
//! # Concurrency model
//! - [`CookieJarHandle`] is `Arc<RwLock<dyn CookieJar + Send + Sync>>` (a `parking_lot` lock).
//!   - Callers take a **read lock** for non-mutating operations and a **write lock**
//!     for mutating operations on the underlying jar.
//! - [`CookieStoreHandle`] is `Arc<dyn CookieStore + Send + Sync>`.
//!   - Stores manage their **own internal synchronization**. The trait methods take `&self`.
//!
//! # Typical usage
//! ```ignore
//! // Acquire cookies for a request made from a frame under `top_level`
//! let partition_key = compute_partition_key(&top_level, PartitionPolicy::TopLevelSite);
//! let partitions = PartitionKeyCollection::from_optional(partition_key.clone());
//! let cookies_header = jar.read().get_request_cookies(&url, &partitions);
//!
//! // Store cookies from a response
//! jar.write().store_response_cookies(&url, &headers, partition_key.as_ref());
//! ```

use crate::cookies::store::CookieStore;
use crate::cookies::CookieJar;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// A handle to a cookie jar trait.
///
/// This is a reference-counted, read/write-locked pointer to a type-erased
/// [`CookieJar`]. Obtain a **read lock** for queries and a **write lock** for
/// mutations.
pub type CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>;

/// A handle to a cookie store trait.
///
/// Store implementations must be **`Send + Sync` and internally synchronized**,
/// since callers hold only `&self` when invoking trait methods.
pub type CookieStoreHandle = Arc<dyn CookieStore + Send + Sync>;

/// A non-owning handle to a cookie store.
///
/// Jars minted by a store call back into it through this handle, so a jar never
/// keeps its store alive.
pub type WeakCookieStoreHandle = Weak<dyn CookieStore + Send + Sync>;

/// A cookie as stored/serialized by the jar.
///
/// The partition a cookie belongs to is not part of the record; it is the bucket
/// the jar keeps the cookie in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,

    /// Raw cookie value (not URL-decoded).
    pub value: String,

    /// Path scoping (e.g., `"/"`).
    pub path: Option<String>,

    /// Domain scoping (host-only if `None`).
    pub domain: Option<String>,

    /// If `true`, cookie is sent only over HTTPS.
    pub secure: bool,

    /// Expiration timestamp as received, if any. Session cookies have `None`.
    pub expires: Option<String>,

    /// SameSite policy (`"Strict"`, `"Lax"`, or `"None"`).
    pub same_site: Option<String>,

    /// If `true`, cookie is blocked from access by client-side scripts.
    pub http_only: bool,
}

impl Cookie {
    /// Creates a cookie with only a name and value set.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            secure: false,
            expires: None,
            same_site: None,
            http_only: false,
        }
    }

    /// Whether this cookie should be attached to a request for `host`/`path`.
    pub(crate) fn matches_request(&self, host: &str, path: &str, is_https: bool) -> bool {
        let domain_match = match &self.domain {
            Some(domain) => host == domain || host.ends_with(&format!(".{}", domain)),
            None => true,
        };
        let path_match = match &self.path {
            Some(cookie_path) => path.starts_with(cookie_path),
            None => true,
        };

        domain_match && path_match && (!self.secure || is_https)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_matches_host_and_subdomains() {
        let mut c = Cookie::new("a", "1");
        c.domain = Some("example.com".into());

        assert!(c.matches_request("example.com", "/", false));
        assert!(c.matches_request("www.example.com", "/", false));
        assert!(!c.matches_request("badexample.com", "/", false));
    }

    #[test]
    fn path_and_secure_filter() {
        let mut c = Cookie::new("a", "1");
        c.path = Some("/app".into());
        c.secure = true;

        assert!(c.matches_request("example.com", "/app/page", true));
        assert!(!c.matches_request("example.com", "/other", true));
        assert!(!c.matches_request("example.com", "/app/page", false));
    }
}
