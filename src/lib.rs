//! Partitioned cookie storage.
//!
//! Cookies live in per-zone [`CookieJar`](cookies::CookieJar)s. Each cookie is either
//! unpartitioned or bound to a [`CookiePartitionKey`](cookies::CookiePartitionKey), and
//! every jar read or deletion is scoped by a
//! [`PartitionKeyCollection`](cookies::PartitionKeyCollection).
pub mod config;
pub mod cookies;
pub mod errors;
pub mod zone;

pub use config::CookieConfig;
pub use errors::CookieError;
pub use zone::ZoneId;
