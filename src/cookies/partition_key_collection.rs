//! [`PartitionKeyCollection`]: which cookie partitions a jar operation applies to.
//!
//! A collection is in exactly one of three states:
//! - **empty**: matches no partition,
//! - **explicit**: matches a non-empty, deduplicated set of [`CookiePartitionKey`]s,
//! - **all**: matches every partition, including ones that do not exist yet.
//!
//! Collections are immutable values. A jar receives one per query or deletion and
//! only ever asks it [`contains`](PartitionKeyCollection::contains),
//! [`is_empty`](PartitionKeyCollection::is_empty) and
//! [`contains_all_keys`](PartitionKeyCollection::contains_all_keys). The universal
//! collection cannot be enumerated; see
//! [`partition_keys`](PartitionKeyCollection::partition_keys).
//!
//! Equality is structural: an explicit collection is never equal to the universal
//! one, even if it happens to list every partition a jar currently holds.
//!
//! ```rust
//! use gosub_cookies::cookies::{CookiePartitionKey, PartitionKeyCollection};
//! use url::Url;
//!
//! let foo = CookiePartitionKey::from_url(&Url::parse("https://foo.test").unwrap()).unwrap();
//! let bar = CookiePartitionKey::from_url(&Url::parse("https://bar.test").unwrap()).unwrap();
//!
//! let only_foo = PartitionKeyCollection::singleton(foo.clone());
//! assert!(only_foo.contains(&foo));
//! assert!(!only_foo.contains(&bar));
//!
//! assert!(PartitionKeyCollection::contains_all().contains(&bar));
//! assert!(!PartitionKeyCollection::new().contains(&foo));
//! ```
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use url::Url;

use crate::cookies::partition_key::{AncestorChain, CookiePartitionKey};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Keys {
    #[default]
    Empty,
    /// Never empty.
    Explicit(HashSet<CookiePartitionKey>),
    All,
}

/// A set of cookie partition keys, or the universal set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionKeyCollection {
    keys: Keys,
}

impl PartitionKeyCollection {
    /// Creates a collection that matches no partition.
    pub fn new() -> Self {
        Self { keys: Keys::Empty }
    }

    /// Creates a collection holding exactly `key`.
    pub fn singleton(key: CookiePartitionKey) -> Self {
        Self {
            keys: Keys::Explicit(HashSet::from([key])),
        }
    }

    /// Creates a collection from `keys`, dropping duplicates.
    ///
    /// An empty input yields the empty collection.
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = CookiePartitionKey>,
    {
        let keys: HashSet<CookiePartitionKey> = keys.into_iter().collect();
        if keys.is_empty() {
            return Self::new();
        }

        Self {
            keys: Keys::Explicit(keys),
        }
    }

    /// Creates the universal collection.
    pub fn contains_all() -> Self {
        Self { keys: Keys::All }
    }

    pub fn from_optional(key: Option<CookiePartitionKey>) -> Self {
        match key {
            Some(key) => Self::singleton(key),
            None => Self::new(),
        }
    }

    /// Creates a collection matching both ancestor-chain variants of the
    /// unnonced partition for the top-level site of `site`.
    ///
    /// Transient partitions of that site are not included. A URL with an opaque
    /// origin has no site and yields the empty collection.
    pub fn matches_site(site: &Url) -> Self {
        match CookiePartitionKey::from_url(site) {
            Ok(key) => Self::from_keys([
                key.clone().with_ancestor_chain(AncestorChain::SameSite),
                key.with_ancestor_chain(AncestorChain::CrossSite),
            ]),
            Err(e) => {
                log::debug!("no partition keys for site {}: {}", site, e);
                Self::new()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.keys, Keys::Empty)
    }

    pub fn contains_all_keys(&self) -> bool {
        matches!(self.keys, Keys::All)
    }

    /// True when the collection lists a non-empty, finite set of keys.
    pub fn is_explicit(&self) -> bool {
        matches!(self.keys, Keys::Explicit(_))
    }

    /// Returns true when `key` falls within this collection.
    pub fn contains(&self, key: &CookiePartitionKey) -> bool {
        match &self.keys {
            Keys::Empty => false,
            Keys::Explicit(keys) => keys.contains(key),
            Keys::All => true,
        }
    }

    /// Iterates over the listed keys, in no particular order.
    ///
    /// # Panics
    /// Panics if this is the universal collection, which cannot be enumerated.
    /// Check [`contains_all_keys`](Self::contains_all_keys) first.
    pub fn partition_keys(&self) -> impl Iterator<Item = &CookiePartitionKey> + '_ {
        let keys = match &self.keys {
            Keys::Empty => None,
            Keys::Explicit(keys) => Some(keys.iter()),
            Keys::All => panic!("partition_keys() called on a collection that contains all keys"),
        };

        keys.into_iter().flatten()
    }
}

impl From<CookiePartitionKey> for PartitionKeyCollection {
    fn from(key: CookiePartitionKey) -> Self {
        Self::singleton(key)
    }
}

impl From<Option<CookiePartitionKey>> for PartitionKeyCollection {
    fn from(key: Option<CookiePartitionKey>) -> Self {
        Self::from_optional(key)
    }
}

impl FromIterator<CookiePartitionKey> for PartitionKeyCollection {
    fn from_iter<I: IntoIterator<Item = CookiePartitionKey>>(iter: I) -> Self {
        Self::from_keys(iter)
    }
}

impl Display for PartitionKeyCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.keys {
            Keys::Empty => write!(f, "{{}}"),
            Keys::All => write!(f, "*"),
            Keys::Explicit(keys) => {
                let mut names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                names.sort_unstable();
                write!(f, "{{{}}}", names.join(", "))
            }
        }
    }
}
