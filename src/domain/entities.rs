//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{ArticleStatus, CommentStatus, EditorialStatus, MetaEntityType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleFlags {
    pub is_featured: bool,
    pub is_breaking: bool,
    pub is_editors_pick: bool,
    pub is_sponsored: bool,
    pub is_premium: bool,
    pub allow_comments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArticleMetrics {
    pub views_count: i64,
    pub shares_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub bookmarks_count: i64,
    pub engagement_score: f64,
    pub engagement_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: Uuid,
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
    pub metrics: ArticleMetrics,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub article_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub status: CommentStatus,
    pub created_at: OffsetDateTime,
}

/// One key/value pair attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub entity_type: MetaEntityType,
    pub entity_id: Uuid,
    pub key: String,
    pub value: serde_json::Value,
}

/// Author columns fetched alongside an article. `bio` is only populated for
/// the full and detail projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub parent: Option<Box<CategoryRef>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentThread {
    pub comment: CommentRecord,
    pub author: Option<AuthorRef>,
    pub replies: Vec<CommentThread>,
}

/// An article together with the related entities its projection asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleView {
    pub article: ArticleRecord,
    pub author: Option<AuthorRef>,
    pub editor: Option<AuthorRef>,
    pub category: Option<CategoryRef>,
    pub tags: Vec<TagRef>,
    pub comments: Vec<CommentThread>,
}

impl ArticleView {
    pub fn bare(article: ArticleRecord) -> Self {
        Self {
            article,
            author: None,
            editor: None,
            category: None,
            tags: Vec::new(),
            comments: Vec::new(),
        }
    }
}

impl AuthorRecord {
    pub fn to_ref(&self, include_bio: bool) -> AuthorRef {
        AuthorRef {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            avatar: self.avatar.clone(),
            bio: if include_bio { self.bio.clone() } else { None },
        }
    }
}

impl TagRecord {
    pub fn to_ref(&self) -> TagRef {
        TagRef {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            color: self.color.clone(),
        }
    }
}

impl CategoryRecord {
    pub fn to_ref(&self) -> CategoryRef {
        CategoryRef {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            color: self.color.clone(),
            parent: None,
        }
    }
}
