use crate::cookies::PartitionPolicy;

/// Default number of cookies a single partition may hold.
const DEFAULT_MAX_COOKIES_PER_PARTITION: usize = 180;

/// Cookie jar configuration.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// How incoming `Partitioned` cookies are keyed
    pub partition_policy: PartitionPolicy,
    /// Maximum number of cookies in one partition before new ones are rejected
    pub max_cookies_per_partition: usize,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            partition_policy: PartitionPolicy::TopLevelSite,
            max_cookies_per_partition: DEFAULT_MAX_COOKIES_PER_PARTITION,
        }
    }
}
