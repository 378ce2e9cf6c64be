//! Article state transitions shared by every persistence adapter.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::entities::ArticleRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{ArticleStatus, EditorialStatus};

/// Set-based state change applied to many articles at once.
///
/// Each transition carries a precondition on the current row; rows failing
/// it are left untouched and are not counted as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkTransition {
    Publish,
    Unpublish,
    Feature,
    Archive,
}

impl BulkTransition {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkTransition::Publish => "publish",
            BulkTransition::Unpublish => "unpublish",
            BulkTransition::Feature => "feature",
            BulkTransition::Archive => "archive",
        }
    }

    pub fn applies_to(self, article: &ArticleRecord) -> bool {
        match self {
            BulkTransition::Publish => article.editorial_status == EditorialStatus::Approved,
            BulkTransition::Unpublish => article.status == ArticleStatus::Published,
            BulkTransition::Feature => {
                article.status == ArticleStatus::Published && !article.flags.is_featured
            }
            BulkTransition::Archive => article.status != ArticleStatus::Archived,
        }
    }

    /// Apply the effect in place. Callers check [`Self::applies_to`] first.
    pub fn apply(self, article: &mut ArticleRecord, now: OffsetDateTime) {
        match self {
            BulkTransition::Publish => {
                article.status = ArticleStatus::Published;
                article.editorial_status = EditorialStatus::Published;
                article.published_at.get_or_insert(now);
            }
            BulkTransition::Unpublish => {
                article.status = ArticleStatus::Draft;
                article.editorial_status = EditorialStatus::Approved;
            }
            BulkTransition::Feature => {
                article.flags.is_featured = true;
            }
            BulkTransition::Archive => {
                article.status = ArticleStatus::Archived;
                article.editorial_status = EditorialStatus::Archived;
            }
        }
        article.updated_at = now;
    }
}

/// Whether the article is visible on public listings at `now`.
pub fn is_live(article: &ArticleRecord, now: OffsetDateTime) -> bool {
    article.status == ArticleStatus::Published
        && article.published_at.is_some_and(|published| published <= now)
}

const WORDS_PER_MINUTE: usize = 200;

/// Estimated reading time in whole minutes, never below one.
pub fn reading_time_minutes(content: &str) -> i32 {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// Resolve `published_at` for a write with the requested `status`.
///
/// Published articles default to `now`; scheduled ones must name a future
/// time; drafts keep whatever the caller supplied.
pub fn resolve_publication(
    status: ArticleStatus,
    published_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> Result<Option<OffsetDateTime>, DomainError> {
    match status {
        ArticleStatus::Published => Ok(Some(published_at.unwrap_or(now))),
        ArticleStatus::Scheduled => match published_at {
            Some(at) if at > now => Ok(Some(at)),
            Some(_) => Err(DomainError::validation(
                "published_at",
                "scheduled articles need a publication time in the future",
            )),
            None => Err(DomainError::validation(
                "published_at",
                "scheduled articles need a publication time",
            )),
        },
        ArticleStatus::Draft | ArticleStatus::Archived => Ok(published_at),
    }
}
