//! Repository traits describing persistence adapters.
//!
//! Reads execute [`ArticlePlan`]s; writes go through an explicit
//! [`ArticleTransaction`] so the entity row, its tag associations and its
//! metadata commit or roll back together.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::Page;
use crate::application::query::{AnalyticsPlan, ArticlePlan};
use crate::domain::analytics::{AnalyticsSummary, StatusCounts};
use crate::domain::articles::BulkTransition;
use crate::domain::entities::{ArticleFlags, ArticleRecord, ArticleView, MetaEntry, TagRecord};
use crate::domain::types::{ArticleStatus, EditorialStatus, MetaEntityType};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Column values for an inserted or updated article row.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleWrite {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub article_type: String,
    pub status: ArticleStatus,
    pub editorial_status: EditorialStatus,
    pub published_at: Option<OffsetDateTime>,
    pub author_id: Uuid,
    pub editor_id: Option<Uuid>,
    pub category_id: Uuid,
    pub reading_time: i32,
    pub flags: ArticleFlags,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    /// Execute a listing plan. Pages past the end come back empty.
    async fn fetch_page(&self, plan: &ArticlePlan) -> Result<Page<ArticleView>, RepoError>;

    /// First match of a plan, projected as the plan asks.
    async fn fetch_one(&self, plan: &ArticlePlan) -> Result<Option<ArticleView>, RepoError>;

    async fn analytics(&self, plan: &AnalyticsPlan) -> Result<AnalyticsSummary, RepoError>;

    async fn status_counts(&self) -> Result<StatusCounts, RepoError>;

    async fn list_meta(
        &self,
        entity_type: MetaEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<MetaEntry>, RepoError>;
}

#[async_trait]
pub trait ArticlesWriteRepo: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ArticleTransaction>, RepoError>;

    /// Returns whether a row was removed.
    async fn delete_article(&self, id: Uuid) -> Result<bool, RepoError>;

    /// Apply `transition` to every listed article meeting its precondition.
    /// Returns how many rows changed.
    async fn apply_bulk(&self, transition: BulkTransition, ids: &[Uuid]) -> Result<u64, RepoError>;
}

/// One open write transaction.
///
/// Dropping a transaction without calling [`ArticleTransaction::commit`]
/// discards every change made through it.
#[async_trait]
pub trait ArticleTransaction: Send {
    async fn slug_exists(&mut self, slug: &str) -> Result<bool, RepoError>;

    /// Current row, locked for the rest of the transaction where supported.
    async fn find_article(&mut self, id: Uuid) -> Result<Option<ArticleRecord>, RepoError>;

    async fn insert_article(&mut self, write: &ArticleWrite) -> Result<ArticleRecord, RepoError>;

    async fn update_article(
        &mut self,
        id: Uuid,
        write: &ArticleWrite,
    ) -> Result<ArticleRecord, RepoError>;

    async fn find_tag(&mut self, id: Uuid) -> Result<Option<TagRecord>, RepoError>;

    /// Match on the slug derived from `name`; create the tag when absent.
    async fn find_or_create_tag(&mut self, name: &str) -> Result<TagRecord, RepoError>;

    /// Make the article's associations exactly `tag_ids`.
    async fn replace_article_tags(
        &mut self,
        article_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), RepoError>;

    /// Upsert keyed by `(entity_type, entity_id, key)`.
    async fn set_meta(&mut self, entry: &MetaEntry) -> Result<(), RepoError>;

    async fn commit(self: Box<Self>) -> Result<(), RepoError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepoError>;
}
