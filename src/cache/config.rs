//! Cache configuration and the TTL policy.
//!
//! TTLs follow volatility: the more often a view changes, the shorter it
//! lives. [`TtlPolicy::check_ordering`] rejects a policy that breaks that
//! ordering.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_MAX_ENTRIES: usize = 10_000;

const ENTITY_SECS: u64 = 3600;
const FEATURED_SECS: u64 = 1800;
const TRENDING_SECS: u64 = 1800;
const RELATED_SECS: u64 = 1800;
const CATEGORY_SECS: u64 = 1200;
const TAG_SECS: u64 = 1200;
const AUTHOR_SECS: u64 = 1200;
const POPULAR_SECS: u64 = 900;
const LISTING_SECS: u64 = 600;
const SEARCH_SECS: u64 = 600;
const ANALYTICS_SECS: u64 = 600;
const STATUS_COUNTS_SECS: u64 = 300;

/// Time-to-live per view family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// By-id and by-slug lookups.
    pub entity: Duration,
    pub featured: Duration,
    pub trending: Duration,
    pub popular: Duration,
    pub category: Duration,
    pub tag: Duration,
    pub author: Duration,
    pub related: Duration,
    pub search: Duration,
    /// Published listings, scheduled and review queues.
    pub listing: Duration,
    pub analytics: Duration,
    pub status_counts: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            entity: Duration::from_secs(ENTITY_SECS),
            featured: Duration::from_secs(FEATURED_SECS),
            trending: Duration::from_secs(TRENDING_SECS),
            popular: Duration::from_secs(POPULAR_SECS),
            category: Duration::from_secs(CATEGORY_SECS),
            tag: Duration::from_secs(TAG_SECS),
            author: Duration::from_secs(AUTHOR_SECS),
            related: Duration::from_secs(RELATED_SECS),
            search: Duration::from_secs(SEARCH_SECS),
            listing: Duration::from_secs(LISTING_SECS),
            analytics: Duration::from_secs(ANALYTICS_SECS),
            status_counts: Duration::from_secs(STATUS_COUNTS_SECS),
        }
    }
}

impl TtlPolicy {
    /// Verify `status_counts <= listing <= popular/category/tag/author <=
    /// featured/trending <= entity`.
    pub fn check_ordering(&self) -> Result<(), String> {
        let tiers: [&[(&str, Duration)]; 5] = [
            &[("status_counts", self.status_counts)],
            &[("listing", self.listing)],
            &[
                ("popular", self.popular),
                ("category", self.category),
                ("tag", self.tag),
                ("author", self.author),
            ],
            &[("featured", self.featured), ("trending", self.trending)],
            &[("entity", self.entity)],
        ];

        for pair in tiers.windows(2) {
            for (short_name, short_ttl) in pair[0] {
                for (long_name, long_ttl) in pair[1] {
                    if short_ttl > long_ttl {
                        return Err(format!(
                            "ttl `{short_name}` ({}s) must not exceed `{long_name}` ({}s)",
                            short_ttl.as_secs(),
                            long_ttl.as_secs()
                        ));
                    }
                }
            }
        }

        if self.all().iter().any(|ttl| ttl.is_zero()) {
            return Err("ttl values must be positive".to_string());
        }

        Ok(())
    }

    fn all(&self) -> [Duration; 12] {
        [
            self.entity,
            self.featured,
            self.trending,
            self.popular,
            self.category,
            self.tag,
            self.author,
            self.related,
            self.search,
            self.listing,
            self.analytics,
            self.status_counts,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every read computes directly against the store.
    pub enabled: bool,
    /// LRU bound on stored entries.
    pub max_entries: usize,
    pub ttl: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: TtlPolicy::default(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries,
            ttl: settings.ttl,
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Capacity as `NonZeroUsize`, clamping zero to one.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_respects_volatility_order() {
        let policy = TtlPolicy::default();
        assert!(policy.check_ordering().is_ok());
        assert_eq!(policy.entity, Duration::from_secs(3600));
        assert_eq!(policy.status_counts, Duration::from_secs(300));
    }

    #[test]
    fn listing_longer_than_popular_is_rejected() {
        let policy = TtlPolicy {
            listing: Duration::from_secs(2000),
            ..TtlPolicy::default()
        };
        let err = policy.check_ordering().unwrap_err();
        assert!(err.contains("listing"), "unexpected message: {err}");
    }

    #[test]
    fn trending_longer_than_entity_is_rejected() {
        let policy = TtlPolicy {
            trending: Duration::from_secs(7200),
            ..TtlPolicy::default()
        };
        assert!(policy.check_ordering().is_err());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let policy = TtlPolicy {
            status_counts: Duration::ZERO,
            ..TtlPolicy::default()
        };
        assert!(policy.check_ordering().is_err());
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            max_entries: 0,
            ..CacheConfig::default()
        };
        assert_eq!(config.max_entries_non_zero().get(), 1);
    }
}
