//! Cookie jar abstraction and a simple in-memory implementation.
//!
//! A **cookie jar** represents all cookies belonging to a single zone. Inside a jar,
//! cookies are split into **partitions**:
//! - the unpartitioned bucket, visible from every top-level site, and
//! - one bucket per [`CookiePartitionKey`], holding cookies set with the
//!   `Partitioned` attribute while browsing under that key.
//!
//! Every read and deletion takes a [`PartitionKeyCollection`] naming the partitions
//! it applies to. Unpartitioned cookies are always in scope for reads and
//! per-URL removals; partitioned cookies only when the collection contains their key.
//!
//! ## Notes & limitations
//! - Parsing is intentionally **minimal**: `Expires`, `Path`, `Domain`, `Secure`,
//!   `HttpOnly`, `SameSite` and `Partitioned` are handled; `Max-Age` and expiration
//!   enforcement are not.
//! - Within a partition, cookies are bucketed by **origin**
//!   (`url.origin().ascii_serialization()`).
//! - This module is **not** internally synchronized. Use it via a
//!   [`CookieJarHandle`](crate::cookies::CookieJarHandle).
//!
use std::any::Any;
use std::collections::HashMap;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::CookieConfig;
use crate::cookies::{Cookie, CookiePartitionKey, PartitionKeyCollection, PartitionPolicy};

/// Cookies of one partition, keyed by origin.
type OriginBuckets = HashMap<String, Vec<Cookie>>;

/// A cookie jar keeps the cookies for one single zone.
///
/// ### Type erasure
/// `as_any` / `as_any_mut` enable downcasting when callers need access to
/// concrete implementations (e.g., for snapshotting/persistence).
pub trait CookieJar: Send + Sync {
    /// Returns a type-erased reference to the jar.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable type-erased reference to the jar.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Stores cookies found in response `headers` for the given `url`.
    ///
    /// Cookies carrying the `Partitioned` attribute go into `partition_key`'s
    /// partition. Without a key they are stored unpartitioned.
    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap, partition_key: Option<&CookiePartitionKey>);

    /// Returns the `Cookie` request header value to send for `url`, if any.
    ///
    /// Includes unpartitioned cookies and cookies from partitions in `partitions`.
    fn get_request_cookies(&self, url: &Url, partitions: &PartitionKeyCollection) -> Option<String>;

    /// Removes all cookies from the jar.
    fn clear(&mut self);

    /// Retrieves cookies grouped by partition and origin, formatted as `"name=value"` pairs.
    ///
    /// Unpartitioned cookies are reported with a `None` partition.
    fn get_all_cookies(&self, partitions: &PartitionKeyCollection) -> Vec<(Option<CookiePartitionKey>, Url, String)>;

    /// Removes the cookie named `cookie_name` for `url`, from the unpartitioned
    /// bucket and from every partition in `partitions`.
    fn remove_cookie(&mut self, url: &Url, cookie_name: &str, partitions: &PartitionKeyCollection);

    /// Removes all cookies for `url`'s origin, from the unpartitioned bucket and
    /// from every partition in `partitions`.
    fn remove_cookies_for_url(&mut self, url: &Url, partitions: &PartitionKeyCollection);

    /// Removes every partitioned cookie whose partition is in `partitions`.
    ///
    /// Unpartitioned cookies are untouched. Returns the number of cookies removed.
    fn delete_partitioned(&mut self, partitions: &PartitionKeyCollection) -> usize;
}

/// Default cookie jar which holds cookies for a single zone.
///
/// This implementation is **in-memory only** and performs **no persistence**.
///
/// ### Parsing behavior
/// - Accepts multiple `Set-Cookie` headers.
/// - If `Path` is absent, a default path is derived from the request URL.
/// - `Partitioned` cookies must also be `Secure`; others are dropped.
/// - A partition holding `max_cookies_per_partition` cookies rejects new names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultCookieJar {
    #[serde(skip)]
    config: CookieConfig,

    /// Unpartitioned cookies, bucketed by **origin**.
    pub unpartitioned: OriginBuckets,

    /// Partitioned cookies, bucketed by partition key and then by **origin**.
    pub partitioned: HashMap<CookiePartitionKey, OriginBuckets>,
}

impl DefaultCookieJar {
    /// Creates an empty in-memory cookie jar with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CookieConfig::default())
    }

    pub fn with_config(config: CookieConfig) -> Self {
        DefaultCookieJar {
            config,
            unpartitioned: HashMap::new(),
            partitioned: HashMap::new(),
        }
    }

    /// Number of cookies in the jar, across all partitions.
    pub fn len(&self) -> usize {
        count(&self.unpartitioned) + self.partitioned.values().map(count).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the jar without transient (nonced) partitions.
    ///
    /// This is the state that may be written to durable storage.
    pub fn without_transient_partitions(&self) -> DefaultCookieJar {
        DefaultCookieJar {
            config: self.config.clone(),
            unpartitioned: self.unpartitioned.clone(),
            partitioned: self
                .partitioned
                .iter()
                .filter(|(key, _)| !key.is_transient())
                .map(|(key, buckets)| (key.clone(), buckets.clone()))
                .collect(),
        }
    }

    /// Partition keys held by this jar that fall within `partitions`.
    ///
    /// Explicit collections are looked up key by key; the universal collection
    /// is resolved by testing every partition the jar holds.
    fn matching_partitions(&self, partitions: &PartitionKeyCollection) -> Vec<CookiePartitionKey> {
        if partitions.contains_all_keys() {
            return self
                .partitioned
                .keys()
                .filter(|key| partitions.contains(key))
                .cloned()
                .collect();
        }

        partitions
            .partition_keys()
            .filter(|key| self.partitioned.contains_key(*key))
            .cloned()
            .collect()
    }

    fn insert(&mut self, origin: &str, cookie: Cookie, partition_key: Option<&CookiePartitionKey>) {
        let max = self.config.max_cookies_per_partition;

        let buckets = match partition_key {
            None => &mut self.unpartitioned,
            Some(key) => {
                let (held, is_replacement) = self.partitioned.get(key).map_or((0, false), |buckets| {
                    let replaces = buckets
                        .get(origin)
                        .is_some_and(|b| b.iter().any(|c| c.name == cookie.name));
                    (count(buckets), replaces)
                });
                if !is_replacement && held >= max {
                    log::warn!(
                        "partition {} is full ({} cookies), rejecting cookie '{}'",
                        key,
                        max,
                        cookie.name
                    );
                    return;
                }
                self.partitioned.entry(key.clone()).or_default()
            }
        };

        let bucket = buckets.entry(origin.to_string()).or_default();
        // Replace existing cookie with same name
        if let Some(existing) = bucket.iter_mut().find(|c| c.name == cookie.name) {
            *existing = cookie;
        } else {
            bucket.push(cookie);
        }
    }

    fn prune_empty_buckets(&mut self) {
        self.unpartitioned.retain(|_, cookies| !cookies.is_empty());
        for buckets in self.partitioned.values_mut() {
            buckets.retain(|_, cookies| !cookies.is_empty());
        }
        self.partitioned.retain(|_, buckets| !buckets.is_empty());
    }
}

impl CookieJar for DefaultCookieJar {
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap, partition_key: Option<&CookiePartitionKey>) {
        let origin = url.origin().ascii_serialization();
        let default_path = url.path().rsplit_once('/').map_or("/", |(a, _)| if a.is_empty() { "/" } else { a });
        let honor_partitioned = self.config.partition_policy != PartitionPolicy::None;

        for header in headers.get_all("set-cookie") {
            let Ok(header_str) = header.to_str() else {
                log::debug!("skipping non-ASCII Set-Cookie header from {}", url);
                continue;
            };

            let Some((mut cookie, partitioned)) = parse_set_cookie(header_str) else {
                log::debug!("skipping malformed Set-Cookie header from {}: {}", url, header_str);
                continue;
            };

            if cookie.path.is_none() {
                cookie.path = Some(default_path.to_string());
            }

            let target = match (partitioned && honor_partitioned, partition_key) {
                (true, Some(key)) => {
                    if !cookie.secure {
                        log::warn!("rejecting Partitioned cookie '{}' from {} without Secure", cookie.name, url);
                        continue;
                    }
                    Some(key)
                }
                _ => None,
            };

            self.insert(&origin, cookie, target);
        }
    }

    fn get_request_cookies(&self, url: &Url, partitions: &PartitionKeyCollection) -> Option<String> {
        let origin = url.origin().ascii_serialization();
        let host = url.host_str().unwrap_or_default();
        let path = url.path();
        let is_https = url.scheme() == "https";

        let partitioned = self.matching_partitions(partitions);
        let buckets = std::iter::once(&self.unpartitioned)
            .chain(partitioned.iter().filter_map(|key| self.partitioned.get(key)));

        let header = buckets
            .filter_map(|b| b.get(&origin))
            .flatten()
            .filter(|cookie| cookie.matches_request(host, path, is_https))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    fn clear(&mut self) {
        self.unpartitioned.clear();
        self.partitioned.clear();
    }

    fn get_all_cookies(&self, partitions: &PartitionKeyCollection) -> Vec<(Option<CookiePartitionKey>, Url, String)> {
        let partitioned = self.matching_partitions(partitions);
        let buckets = std::iter::once((None, &self.unpartitioned)).chain(
            partitioned
                .into_iter()
                .filter_map(|key| self.partitioned.get(&key).map(|b| (Some(key), b))),
        );

        let mut result = Vec::new();
        for (key, bucket) in buckets {
            for (origin, cookies) in bucket {
                let Ok(url) = Url::parse(origin) else {
                    continue;
                };
                let str_ = cookies
                    .iter()
                    .map(|c| format!("{}={}", c.name, c.value))
                    .collect::<Vec<_>>()
                    .join("; ");
                result.push((key.clone(), url, str_));
            }
        }

        result
    }

    fn remove_cookie(&mut self, url: &Url, cookie_name: &str, partitions: &PartitionKeyCollection) {
        let origin = url.origin().ascii_serialization();
        for key in self.matching_partitions(partitions) {
            if let Some(cookies) = self.partitioned.get_mut(&key).and_then(|b| b.get_mut(&origin)) {
                cookies.retain(|c| c.name != cookie_name);
            }
        }
        if let Some(cookies) = self.unpartitioned.get_mut(&origin) {
            cookies.retain(|c| c.name != cookie_name);
        }
        self.prune_empty_buckets();
    }

    fn remove_cookies_for_url(&mut self, url: &Url, partitions: &PartitionKeyCollection) {
        let origin = url.origin().ascii_serialization();
        for key in self.matching_partitions(partitions) {
            if let Some(buckets) = self.partitioned.get_mut(&key) {
                buckets.remove(&origin);
            }
        }
        self.unpartitioned.remove(&origin);
        self.prune_empty_buckets();
    }

    fn delete_partitioned(&mut self, partitions: &PartitionKeyCollection) -> usize {
        let mut removed = 0;
        for key in self.matching_partitions(partitions) {
            if let Some(buckets) = self.partitioned.remove(&key) {
                removed += count(&buckets);
            }
        }

        log::debug!("deleted {} partitioned cookies in {}", removed, partitions);
        removed
    }
}

fn count(buckets: &OriginBuckets) -> usize {
    buckets.values().map(Vec::len).sum()
}

/// Parses a single `Set-Cookie` header value.
///
/// Returns the cookie and whether it carried the `Partitioned` attribute.
fn parse_set_cookie(header: &str) -> Option<(Cookie, bool)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie::new(name, value.trim());
    let mut partitioned = false;

    for part in parts {
        let part = part.trim();
        if let Some((k, v)) = part.split_once('=') {
            let v = v.trim();
            match k.trim().to_ascii_lowercase().as_str() {
                "path" => cookie.path = Some(v.to_string()),
                "domain" => cookie.domain = Some(v.trim_start_matches('.').to_ascii_lowercase()),
                "expires" => cookie.expires = Some(v.to_string()),
                "samesite" => {
                    // normalize to "Lax" | "Strict" | "None"
                    cookie.same_site = Some(if v.eq_ignore_ascii_case("lax") {
                        "Lax".to_string()
                    } else if v.eq_ignore_ascii_case("strict") {
                        "Strict".to_string()
                    } else if v.eq_ignore_ascii_case("none") {
                        "None".to_string()
                    } else {
                        v.to_string()
                    });
                }
                _ => {}
            }
        } else if part.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if part.eq_ignore_ascii_case("httponly") {
            cookie.http_only = true;
        } else if part.eq_ignore_ascii_case("partitioned") {
            partitioned = true;
        }
    }

    Some((cookie, partitioned))
}
