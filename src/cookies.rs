// src/cookies.rs
//! Cookies: [`CookieJar`], [`CookieStore`], backends, and partition scoping via
//! [`CookiePartitionKey`] and [`PartitionKeyCollection`].

mod cookies;
mod cookie_jar;
mod partition_key;
mod partition_key_collection;
mod persistent_cookie_jar;
mod store;

pub use cookies::Cookie;
pub use cookies::CookieJarHandle;
pub use cookies::CookieStoreHandle;
pub use cookies::WeakCookieStoreHandle;

pub use cookie_jar::CookieJar;
pub use cookie_jar::DefaultCookieJar;
pub use persistent_cookie_jar::PersistentCookieJar;

pub use partition_key::compute_partition_key;
pub use partition_key::AncestorChain;
pub use partition_key::CookiePartitionKey;
pub use partition_key::PartitionPolicy;
pub use partition_key_collection::PartitionKeyCollection;

pub use store::CookieStore;
pub use store::InMemoryCookieStore;
pub use store::JsonCookieStore;
#[cfg(feature = "sqlite_cookie_store")]
pub use store::SqliteCookieStore;
