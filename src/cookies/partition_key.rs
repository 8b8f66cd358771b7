//! Cookie partition keys.
//!
//! A [`CookiePartitionKey`] identifies the storage partition a cookie lives in. It is
//! derived from the **top-level site** of the document that set the cookie, plus:
//! - an optional **nonce** that isolates a transient partition (such partitions are
//!   never written to disk), and
//! - an [`AncestorChain`] bit recording whether any frame between the top-level
//!   document and the setter was cross-site.
//!
//! The site is the `scheme://host` of the top-level URL. Ports and paths are dropped.
//!
//! Keys serialize to `"<site>^<bit>"`, where `<bit>` is `1` for a cross-site ancestor
//! chain and `0` otherwise. Nonced keys refuse to serialize.
use std::fmt::{Display, Formatter};

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::{Origin, Url};
use uuid::Uuid;

use crate::errors::CookieError;

const ANCESTOR_CHAIN_SEPARATOR: char = '^';

/// Whether the frame chain from the top-level document down to the cookie setter
/// contains a cross-site ancestor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum AncestorChain {
    #[default]
    SameSite,
    CrossSite,
}

impl AncestorChain {
    fn as_bit(self) -> char {
        match self {
            AncestorChain::SameSite => '0',
            AncestorChain::CrossSite => '1',
        }
    }

    fn from_bit(bit: &str) -> Option<Self> {
        match bit {
            "0" => Some(AncestorChain::SameSite),
            "1" => Some(AncestorChain::CrossSite),
            _ => None,
        }
    }
}

/// Which partition key, if any, a response's cookies are stored under.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PartitionPolicy {
    /// Ignore the `Partitioned` attribute; every cookie is unpartitioned.
    None,
    /// Key `Partitioned` cookies by the top-level site.
    #[default]
    TopLevelSite,
}

/// Identifies a cookie partition.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CookiePartitionKey {
    site: String,
    nonce: Option<Uuid>,
    ancestor_chain: AncestorChain,
}

impl CookiePartitionKey {
    /// Builds the key for the top-level site of `url`.
    ///
    /// Fails when `url` has an opaque origin (e.g. `data:` URLs), since such
    /// documents have no site to partition by.
    pub fn from_url(url: &Url) -> Result<Self, CookieError> {
        Ok(Self {
            site: site_for_url(url)?,
            nonce: None,
            ancestor_chain: AncestorChain::SameSite,
        })
    }

    /// Builds a transient key for `url`, isolated by `nonce`.
    pub fn from_url_with_nonce(url: &Url, nonce: Uuid) -> Result<Self, CookieError> {
        let mut key = Self::from_url(url)?;
        key.nonce = Some(nonce);
        Ok(key)
    }

    pub fn with_ancestor_chain(mut self, ancestor_chain: AncestorChain) -> Self {
        self.ancestor_chain = ancestor_chain;
        self
    }

    /// Top-level site, `scheme://host`.
    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn nonce(&self) -> Option<Uuid> {
        self.nonce
    }

    pub fn ancestor_chain(&self) -> AncestorChain {
        self.ancestor_chain
    }

    /// Transient keys carry a nonce and must not outlive the session.
    pub fn is_transient(&self) -> bool {
        self.nonce.is_some()
    }

    /// Serializes the key for storage.
    pub fn to_serialized(&self) -> Result<String, CookieError> {
        if self.is_transient() {
            return Err(CookieError::TransientPartitionKey);
        }

        Ok(format!(
            "{}{}{}",
            self.site,
            ANCESTOR_CHAIN_SEPARATOR,
            self.ancestor_chain.as_bit()
        ))
    }

    /// Parses a key produced by [`to_serialized`](Self::to_serialized).
    ///
    /// The site must already be in canonical `scheme://host` form.
    pub fn from_serialized(s: &str) -> Result<Self, CookieError> {
        let invalid = || CookieError::InvalidPartitionKey(s.to_string());

        let (site, bit) = s.rsplit_once(ANCESTOR_CHAIN_SEPARATOR).ok_or_else(invalid)?;
        let ancestor_chain = AncestorChain::from_bit(bit).ok_or_else(invalid)?;
        let url = Url::parse(site).map_err(|_| invalid())?;
        let key = Self::from_url(&url).map_err(|_| invalid())?;

        if key.site != site {
            return Err(invalid());
        }

        Ok(key.with_ancestor_chain(ancestor_chain))
    }
}

impl Display for CookiePartitionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.site)?;
        if self.ancestor_chain == AncestorChain::CrossSite {
            write!(f, " (cross-site)")?;
        }
        if let Some(nonce) = self.nonce {
            write!(f, " [nonce {}]", nonce)?;
        }
        Ok(())
    }
}

impl Serialize for CookiePartitionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = self.to_serialized().map_err(S::Error::custom)?;
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for CookiePartitionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CookiePartitionKey::from_serialized(&s).map_err(D::Error::custom)
    }
}

/// Returns the partition key that cookies set in a document at `top_level_url`
/// are stored under, or `None` when they are stored unpartitioned.
pub fn compute_partition_key(top_level_url: &Url, policy: PartitionPolicy) -> Option<CookiePartitionKey> {
    match policy {
        PartitionPolicy::None => None,
        PartitionPolicy::TopLevelSite => CookiePartitionKey::from_url(top_level_url).ok(),
    }
}

fn site_for_url(url: &Url) -> Result<String, CookieError> {
    match url.origin() {
        Origin::Tuple(scheme, host, _port) => Ok(format!("{}://{}", scheme, host)),
        Origin::Opaque(_) => Err(CookieError::OpaqueOrigin(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn u(s: &str) -> Url {
        Url::parse(s).expect("valid URL")
    }

    #[test]
    fn site_drops_port_path_and_query() {
        let key = CookiePartitionKey::from_url(&u("https://WWW.Example.com:8443/a/b?q=1#f")).unwrap();
        assert_eq!(key.site(), "https://www.example.com");
        assert_eq!(key.ancestor_chain(), AncestorChain::SameSite);
        assert!(!key.is_transient());
    }

    #[test]
    fn opaque_origin_is_rejected() {
        let err = CookiePartitionKey::from_url(&u("data:text/plain,hello")).unwrap_err();
        assert!(matches!(err, CookieError::OpaqueOrigin(_)));
    }

    #[test]
    fn ipv6_host_keeps_brackets() {
        let key = CookiePartitionKey::from_url(&u("http://[2001:db8::1]:8080/")).unwrap();
        assert_eq!(key.site(), "http://[2001:db8::1]");
    }

    #[test]
    fn serialize_roundtrips_ancestor_chain() {
        let key = CookiePartitionKey::from_url(&u("https://foo.test/x"))
            .unwrap()
            .with_ancestor_chain(AncestorChain::CrossSite);

        let s = key.to_serialized().unwrap();
        assert_eq!(s, "https://foo.test^1");
        assert_eq!(CookiePartitionKey::from_serialized(&s).unwrap(), key);
    }

    #[test]
    fn nonced_key_does_not_serialize() {
        let key = CookiePartitionKey::from_url_with_nonce(&u("https://foo.test"), Uuid::new_v4()).unwrap();
        assert!(key.is_transient());
        assert!(matches!(key.to_serialized(), Err(CookieError::TransientPartitionKey)));
        assert!(serde_json::to_string(&key).is_err());
    }

    #[test]
    fn deserialize_rejects_malformed_input() {
        for input in [
            "",
            "https://foo.test",
            "https://foo.test^2",
            "not a url^0",
            "https://foo.test/path^0",
            "https://foo.test:8443^0",
            "data:text/plain,x^0",
        ] {
            assert!(
                matches!(CookiePartitionKey::from_serialized(input), Err(CookieError::InvalidPartitionKey(_))),
                "expected {:?} to be rejected",
                input
            );
        }
    }

    #[test]
    fn nonce_and_ancestor_chain_take_part_in_equality() {
        let base = CookiePartitionKey::from_url(&u("https://foo.test")).unwrap();
        let cross = base.clone().with_ancestor_chain(AncestorChain::CrossSite);
        let nonced = CookiePartitionKey::from_url_with_nonce(&u("https://foo.test"), Uuid::new_v4()).unwrap();
        let same = CookiePartitionKey::from_url(&u("https://foo.test/other")).unwrap();

        assert_eq!(base, same);
        assert_ne!(base, cross);
        assert_ne!(base, nonced);

        let set: HashSet<_> = [base, cross, nonced, same].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn compute_respects_policy() {
        let url = u("https://shop.example/checkout");
        assert_eq!(compute_partition_key(&url, PartitionPolicy::None), None);
        assert_eq!(
            compute_partition_key(&url, PartitionPolicy::TopLevelSite).map(|k| k.site().to_string()),
            Some("https://shop.example".to_string())
        );
        assert_eq!(compute_partition_key(&u("data:,x"), PartitionPolicy::TopLevelSite), None);
    }

    #[test]
    fn serde_uses_string_form() {
        let key = CookiePartitionKey::from_url(&u("https://foo.test")).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"https://foo.test^0\"");
        let back: CookiePartitionKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
