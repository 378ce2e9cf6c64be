use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::analytics::{AuthorCount, CategoryCount, DailyStat, StatusCounts};
use crate::domain::entities::{
    ArticleFlags, ArticleMetrics, ArticleRecord, AuthorRecord, CategoryRecord, CommentRecord,
    TagRecord,
};
use crate::domain::types::{ArticleStatus, CommentStatus, EditorialStatus};

/// Column list matching [`ArticleRow`], qualified by the `a` alias.
pub(crate) const ARTICLE_COLUMNS: &str = "a.id, a.title, a.slug, a.content, a.excerpt, \
     a.type AS article_type, a.status, a.editorial_status, a.published_at, a.author_id, \
     a.editor_id, a.category_id, a.reading_time, a.is_featured, a.is_breaking, \
     a.is_editors_pick, a.is_sponsored, a.is_premium, a.allow_comments, a.views_count, \
     a.shares_count, a.likes_count, a.comments_count, a.bookmarks_count, \
     a.engagement_score, a.engagement_rate, a.created_at, a.updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ArticleRow {
    id: Uuid,
    title: String,
    slug: String,
    content: String,
    excerpt: String,
    article_type: String,
    status: ArticleStatus,
    editorial_status: EditorialStatus,
    published_at: Option<OffsetDateTime>,
    author_id: Uuid,
    editor_id: Option<Uuid>,
    category_id: Uuid,
    reading_time: i32,
    is_featured: bool,
    is_breaking: bool,
    is_editors_pick: bool,
    is_sponsored: bool,
    is_premium: bool,
    allow_comments: bool,
    views_count: i64,
    shares_count: i64,
    likes_count: i64,
    comments_count: i64,
    bookmarks_count: i64,
    engagement_score: f64,
    engagement_rate: f64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            excerpt: row.excerpt,
            article_type: row.article_type,
            status: row.status,
            editorial_status: row.editorial_status,
            published_at: row.published_at,
            author_id: row.author_id,
            editor_id: row.editor_id,
            category_id: row.category_id,
            reading_time: row.reading_time,
            flags: ArticleFlags {
                is_featured: row.is_featured,
                is_breaking: row.is_breaking,
                is_editors_pick: row.is_editors_pick,
                is_sponsored: row.is_sponsored,
                is_premium: row.is_premium,
                allow_comments: row.allow_comments,
            },
            metrics: ArticleMetrics {
                views_count: row.views_count,
                shares_count: row.shares_count,
                likes_count: row.likes_count,
                comments_count: row.comments_count,
                bookmarks_count: row.bookmarks_count,
                engagement_score: row.engagement_score,
                engagement_rate: row.engagement_rate,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AuthorRow {
    id: Uuid,
    name: String,
    username: String,
    avatar: Option<String>,
    bio: Option<String>,
    email: String,
    role: String,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            username: row.username,
            avatar: row.avatar,
            bio: row.bio,
            email: row.email,
            role: row.role,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    color: Option<String>,
    description: Option<String>,
    parent_id: Option<Uuid>,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            color: row.color,
            description: row.description,
            parent_id: row.parent_id,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TagRow {
    id: Uuid,
    name: String,
    slug: String,
    color: Option<String>,
    description: Option<String>,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            color: row.color,
            description: row.description,
        }
    }
}

/// A tag joined through `article_tag`.
#[derive(sqlx::FromRow)]
pub(crate) struct ArticleTagRow {
    pub(crate) article_id: Uuid,
    #[sqlx(flatten)]
    pub(crate) tag: TagRow,
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
    id: Uuid,
    article_id: Uuid,
    user_id: Uuid,
    parent_id: Option<Uuid>,
    body: String,
    status: CommentStatus,
    created_at: OffsetDateTime,
}

impl CommentRow {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            article_id: row.article_id,
            user_id: row.user_id,
            parent_id: row.parent_id,
            body: row.body,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TotalsRow {
    pub(crate) total: i64,
    pub(crate) published: i64,
    pub(crate) draft: i64,
    pub(crate) scheduled: i64,
    pub(crate) archived: i64,
    pub(crate) views: i64,
    pub(crate) shares: i64,
    pub(crate) comments: i64,
    pub(crate) avg_reading_time: f64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryCountRow {
    id: Uuid,
    name: String,
    slug: String,
    article_count: i64,
}

impl From<CategoryCountRow> for CategoryCount {
    fn from(row: CategoryCountRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            article_count: non_negative(row.article_count),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AuthorCountRow {
    id: Uuid,
    name: String,
    username: String,
    article_count: i64,
}

impl From<AuthorCountRow> for AuthorCount {
    fn from(row: AuthorCountRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            username: row.username,
            article_count: non_negative(row.article_count),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DailyRow {
    day: Date,
    articles: i64,
    views: i64,
    shares: i64,
    comments: i64,
}

impl From<DailyRow> for DailyStat {
    fn from(row: DailyRow) -> Self {
        Self {
            date: row.day,
            articles: non_negative(row.articles),
            views: row.views,
            shares: row.shares,
            comments: row.comments,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct StatusCountsRow {
    total: i64,
    draft: i64,
    published: i64,
    scheduled: i64,
    archived: i64,
    pending_review: i64,
}

impl From<StatusCountsRow> for StatusCounts {
    fn from(row: StatusCountsRow) -> Self {
        Self {
            total: non_negative(row.total),
            draft: non_negative(row.draft),
            published: non_negative(row.published),
            scheduled: non_negative(row.scheduled),
            archived: non_negative(row.archived),
            pending_review: non_negative(row.pending_review),
        }
    }
}

pub(crate) fn non_negative(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
