//! Write events that drive invalidation.

use std::fmt;

use uuid::Uuid;

use crate::domain::articles::BulkTransition;

/// A committed (or about to be committed) change to article state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    ArticleUpserted { id: Uuid, slug: String },
    ArticleDeleted { id: Uuid, slug: String },
    /// Slugs are not known for bulk changes; slug-keyed lookups are reached
    /// through the `articles` tag instead.
    ArticlesBulkChanged {
        transition: BulkTransition,
        ids: Vec<Uuid>,
    },
}

impl WriteEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WriteEvent::ArticleUpserted { .. } => "article_upserted",
            WriteEvent::ArticleDeleted { .. } => "article_deleted",
            WriteEvent::ArticlesBulkChanged { .. } => "articles_bulk_changed",
        }
    }
}

impl fmt::Display for WriteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteEvent::ArticleUpserted { id, slug } | WriteEvent::ArticleDeleted { id, slug } => {
                write!(f, "{} {id} ({slug})", self.kind())
            }
            WriteEvent::ArticlesBulkChanged { transition, ids } => {
                write!(f, "{} {} x{}", self.kind(), transition.as_str(), ids.len())
            }
        }
    }
}
