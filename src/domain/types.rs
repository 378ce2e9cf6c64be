//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Publication state of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "article_status", rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Published,
    Scheduled,
    Archived,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 4] = [
        ArticleStatus::Draft,
        ArticleStatus::Published,
        ArticleStatus::Scheduled,
        ArticleStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
            ArticleStatus::Scheduled => "scheduled",
            ArticleStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval-workflow state, tracked independently from [`ArticleStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "editorial_status", rename_all = "snake_case")]
pub enum EditorialStatus {
    Draft,
    PendingReview,
    Approved,
    Published,
    Archived,
}

impl EditorialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EditorialStatus::Draft => "draft",
            EditorialStatus::PendingReview => "pending_review",
            EditorialStatus::Approved => "approved",
            EditorialStatus::Published => "published",
            EditorialStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for EditorialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "comment_status", rename_all = "snake_case")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
    Spam,
}

/// Entity kinds that may own metadata entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaEntityType {
    Article,
    Category,
    Tag,
}

impl MetaEntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetaEntityType::Article => "article",
            MetaEntityType::Category => "category",
            MetaEntityType::Tag => "tag",
        }
    }
}
