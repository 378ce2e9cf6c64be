//! Invalidation Coordinator.
//!
//! Turns write events into an [`InvalidationPlan`] and applies it: exact
//! keys first, then the broad tags. Invalidation never fails the write that
//! triggered it.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::articles::BulkTransition;

use super::events::WriteEvent;
use super::planner::InvalidationPlan;
use super::store::TaggedCache;

/// Outcome of one applied plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub keys_removed: usize,
    pub tagged_removed: usize,
    pub skipped: bool,
}

#[derive(Clone)]
pub struct InvalidationCoordinator {
    cache: Arc<TaggedCache>,
}

impl InvalidationCoordinator {
    pub fn new(cache: Arc<TaggedCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<TaggedCache> {
        &self.cache
    }

    pub fn article_upserted(&self, id: Uuid, slug: &str) -> InvalidationReport {
        self.apply(&[WriteEvent::ArticleUpserted {
            id,
            slug: slug.to_string(),
        }])
    }

    pub fn article_deleted(&self, id: Uuid, slug: &str) -> InvalidationReport {
        self.apply(&[WriteEvent::ArticleDeleted {
            id,
            slug: slug.to_string(),
        }])
    }

    pub fn articles_bulk_changed(&self, transition: BulkTransition, ids: &[Uuid]) -> InvalidationReport {
        self.apply(&[WriteEvent::ArticlesBulkChanged {
            transition,
            ids: ids.to_vec(),
        }])
    }

    pub fn apply(&self, events: &[WriteEvent]) -> InvalidationReport {
        if !self.cache.is_enabled() {
            debug!(event_count = events.len(), "Invalidation skipped: cache disabled");
            return InvalidationReport {
                skipped: true,
                ..InvalidationReport::default()
            };
        }

        let plan = InvalidationPlan::from_events(events);
        if plan.is_empty() {
            return InvalidationReport::default();
        }

        let keys_removed = self.cache.invalidate_keys(&plan.keys);
        let tagged_removed = self.cache.invalidate_tags(&plan.tag_list());

        info!(
            event_count = events.len(),
            first_event = %events[0],
            keys_removed,
            tagged_removed,
            %plan,
            "Cache invalidated"
        );

        InvalidationReport {
            keys_removed,
            tagged_removed,
            skipped: false,
        }
    }
}
