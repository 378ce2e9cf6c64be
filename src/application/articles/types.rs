use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::entities::ArticleFlags;
use crate::domain::error::DomainError;
use crate::domain::types::{ArticleStatus, EditorialStatus};

pub const DEFAULT_ARTICLE_TYPE: &str = "news";
pub const DEFAULT_RELATED_LIMIT: u32 = 4;
pub const DEFAULT_FEATURED_LIMIT: u32 = 6;
pub const DEFAULT_TRENDING_HOURS: u32 = 24;
pub const DEFAULT_POPULAR_DAYS: u32 = 7;

#[derive(Debug, Error)]
pub enum ArticleServiceError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Tag reference on a write: an existing tag, or a name to find or create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagInput {
    Id(Uuid),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleInput {
    pub title: String,
    /// Derived from the title when absent. Ignored on update.
    pub slug: Option<String>,
    pub content: String,
    pub excerpt: String,
    pub article_type: Option<String>,
    pub status: ArticleStatus,
    pub editorial_status: EditorialStatus,
    pub published_at: Option<OffsetDateTime>,
    pub author_id: Uuid,
    pub editor_id: Option<Uuid>,
    pub category_id: Uuid,
    pub flags: ArticleFlags,
    pub tags: Vec<TagInput>,
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl ArticleInput {
    /// A draft with comments allowed and nothing else set.
    pub fn draft(
        title: impl Into<String>,
        content: impl Into<String>,
        author_id: Uuid,
        category_id: Uuid,
    ) -> Self {
        Self {
            title: title.into(),
            slug: None,
            content: content.into(),
            excerpt: String::new(),
            article_type: None,
            status: ArticleStatus::Draft,
            editorial_status: EditorialStatus::Draft,
            published_at: None,
            author_id,
            editor_id: None,
            category_id,
            flags: ArticleFlags {
                allow_comments: true,
                ..ArticleFlags::default()
            },
            tags: Vec::new(),
            meta: BTreeMap::new(),
        }
    }
}

/// Ids arrive as text from callers; anything but a UUID is rejected.
pub fn parse_article_id(value: &str) -> Result<Uuid, ArticleServiceError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| DomainError::validation("id", format!("`{value}` is not a valid article id")).into())
}

pub(crate) fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), ArticleServiceError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty").into());
    }
    Ok(())
}
