//! Invalidation planning.
//!
//! Merges write events into one deduplicated set of exact keys and coarse
//! tags to purge.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::events::WriteEvent;
use super::keys::CacheKey;
use super::tags::{ARTICLE_WRITE_TAGS, CacheTag};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Exact by-id and by-slug lookups, every detail level.
    pub keys: Vec<CacheKey>,
    pub tags: BTreeSet<CacheTag>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags.iter().map(|tag| tag.as_str()).collect();
        write!(
            f,
            "InvalidationPlan {{ keys: {}, tags: [{}] }}",
            self.keys.len(),
            tags.join(", ")
        )
    }
}

impl InvalidationPlan {
    pub fn from_events(events: &[WriteEvent]) -> Self {
        let mut plan = Self::default();
        let mut seen = HashSet::new();

        for event in events {
            let keys = match event {
                WriteEvent::ArticleUpserted { id, slug } | WriteEvent::ArticleDeleted { id, slug } => {
                    CacheKey::article_variants(*id, Some(slug))
                }
                WriteEvent::ArticlesBulkChanged { ids, .. } => ids
                    .iter()
                    .flat_map(|id| CacheKey::article_variants(*id, None))
                    .collect(),
            };

            for key in keys {
                if seen.insert(key.clone()) {
                    plan.keys.push(key);
                }
            }
            plan.tags.extend(ARTICLE_WRITE_TAGS);
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.tags.is_empty()
    }

    pub fn tag_list(&self) -> Vec<CacheTag> {
        self.tags.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::application::query::DetailLevel;
    use crate::domain::articles::BulkTransition;

    #[test]
    fn upsert_targets_every_lookup_and_all_broad_tags() {
        let id = Uuid::new_v4();
        let plan = InvalidationPlan::from_events(&[WriteEvent::ArticleUpserted {
            id,
            slug: "secim".to_string(),
        }]);

        assert_eq!(plan.keys.len(), 6);
        assert!(plan.keys.contains(&CacheKey::article_by_slug("secim", DetailLevel::Detail)));
        assert_eq!(plan.tags.len(), ARTICLE_WRITE_TAGS.len());
        assert!(plan.tags.contains(&CacheTag::Featured));
    }

    #[test]
    fn repeated_events_are_deduplicated() {
        let id = Uuid::new_v4();
        let event = WriteEvent::ArticleDeleted {
            id,
            slug: "gone".to_string(),
        };
        let plan = InvalidationPlan::from_events(&[event.clone(), event]);
        assert_eq!(plan.keys.len(), 6);
    }

    #[test]
    fn bulk_changes_are_not_exempt() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let plan = InvalidationPlan::from_events(&[WriteEvent::ArticlesBulkChanged {
            transition: BulkTransition::Archive,
            ids,
        }]);
        assert_eq!(plan.keys.len(), 6);
        assert!(plan.tags.contains(&CacheTag::Listings));
        assert!(plan.tags.contains(&CacheTag::Articles));
    }

    #[test]
    fn empty_input_plans_nothing() {
        let plan = InvalidationPlan::from_events(&[]);
        assert!(plan.is_empty());
        assert!(plan.to_string().contains("keys: 0"));
    }
}
