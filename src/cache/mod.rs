//! Newsdesk read cache.
//!
//! A single in-process, tag-indexed TTL cache in front of the article
//! queries, plus the coordinator that purges it after writes.
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 10000
//!
//! [cache.ttl]
//! entity = 3600
//! status_counts = 300
//! # ... see config.rs for every view family
//! ```

mod config;
mod events;
mod keys;
pub(crate) mod lock;
mod planner;
mod store;
mod tags;
mod trigger;

pub use config::{CacheConfig, TtlPolicy};
pub use events::WriteEvent;
pub use keys::{CacheKey, KeyNamespace, fingerprint};
pub use planner::InvalidationPlan;
pub use store::{CacheError, TaggedCache};
pub use tags::{ARTICLE_WRITE_TAGS, CacheTag};
pub use trigger::{InvalidationCoordinator, InvalidationReport};

/// Names of the metrics emitted by [`TaggedCache`].
pub mod metric_names {
    pub use super::store::{
        METRIC_CACHE_COMPUTE_MS, METRIC_CACHE_EVICT, METRIC_CACHE_FALLBACK, METRIC_CACHE_HIT,
        METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS,
    };
}
