//! In-process persistence adapter.
//!
//! Implements the same repository traits as the Postgres adapter, with real
//! transaction semantics: writers are serialized behind a gate, readers see
//! the last committed dataset, and an uncommitted transaction leaves no trace.

mod dataset;
mod exec;
mod tx;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::application::pagination::Page;
use crate::application::query::{AnalyticsPlan, ArticlePlan};
use crate::application::repos::{ArticleTransaction, ArticlesRepo, ArticlesWriteRepo, RepoError};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::analytics::{AnalyticsSummary, StatusCounts};
use crate::domain::articles::BulkTransition;
use crate::domain::categories::validate_category_parent;
use crate::domain::entities::{
    ArticleRecord, ArticleView, AuthorRecord, CategoryRecord, CommentRecord, MetaEntry, TagRecord,
};
use crate::domain::error::DomainError;
use crate::domain::types::MetaEntityType;

use self::dataset::Dataset;
use self::tx::MemoryTransaction;

const LOCK_TARGET: &str = "infra::memory";

/// Source of "now" for time-relative predicates and write timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(OffsetDateTime),
}

impl Clock {
    pub fn now(&self) -> OffsetDateTime {
        match self {
            Clock::System => OffsetDateTime::now_utc(),
            Clock::Fixed(at) => *at,
        }
    }
}

pub(crate) struct Shared {
    data: RwLock<Dataset>,
    writer: Arc<Mutex<()>>,
    clock: Clock,
}

#[derive(Clone)]
pub struct MemoryRepositories {
    shared: Arc<Shared>,
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::new(Clock::System)
    }
}

impl MemoryRepositories {
    pub fn new(clock: Clock) -> Self {
        Self {
            shared: Arc::new(Shared {
                data: RwLock::new(Dataset::default()),
                writer: Arc::new(Mutex::new(())),
                clock,
            }),
        }
    }

    pub fn clock(&self) -> Clock {
        self.shared.clock
    }

    pub fn add_author(&self, author: AuthorRecord) {
        rw_write(&self.shared.data, LOCK_TARGET, "add_author")
            .authors
            .insert(author.id, author);
    }

    /// Rejects parents that are unknown or would close a cycle.
    pub fn add_category(&self, category: CategoryRecord) -> Result<(), DomainError> {
        let mut data = rw_write(&self.shared.data, LOCK_TARGET, "add_category");
        let existing: Vec<CategoryRecord> = data.categories.values().cloned().collect();
        validate_category_parent(&existing, category.id, category.parent_id)?;
        data.categories.insert(category.id, category);
        Ok(())
    }

    pub fn add_tag(&self, tag: TagRecord) {
        rw_write(&self.shared.data, LOCK_TARGET, "add_tag")
            .tags
            .insert(tag.id, tag);
    }

    /// Store an article row as-is, with its tag associations.
    pub fn add_article(&self, article: ArticleRecord, tag_ids: &[Uuid]) {
        let mut data = rw_write(&self.shared.data, LOCK_TARGET, "add_article");
        data.article_tags
            .extend(tag_ids.iter().map(|tag_id| (article.id, *tag_id)));
        data.articles.insert(article.id, article);
    }

    pub fn add_comment(&self, comment: CommentRecord) {
        rw_write(&self.shared.data, LOCK_TARGET, "add_comment")
            .comments
            .push(comment);
    }

    /// Committed row, bypassing plans and projections.
    pub fn article(&self, id: Uuid) -> Option<ArticleRecord> {
        rw_read(&self.shared.data, LOCK_TARGET, "article")
            .articles
            .get(&id)
            .cloned()
    }

    pub fn article_count(&self) -> usize {
        rw_read(&self.shared.data, LOCK_TARGET, "article_count")
            .articles
            .len()
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.shared.data, LOCK_TARGET, "tag_count").tags.len()
    }

    pub fn article_tag_ids(&self, id: Uuid) -> Vec<Uuid> {
        rw_read(&self.shared.data, LOCK_TARGET, "article_tag_ids")
            .tag_ids_for(id)
            .collect()
    }

    /// Association rows across all articles.
    pub fn association_count(&self) -> usize {
        rw_read(&self.shared.data, LOCK_TARGET, "association_count")
            .article_tags
            .len()
    }

    pub fn meta_count(&self) -> usize {
        rw_read(&self.shared.data, LOCK_TARGET, "meta_count").meta.len()
    }

    fn snapshot(&self, op: &'static str) -> std::sync::RwLockReadGuard<'_, Dataset> {
        rw_read(&self.shared.data, LOCK_TARGET, op)
    }
}

#[async_trait]
impl ArticlesRepo for MemoryRepositories {
    async fn fetch_page(&self, plan: &ArticlePlan) -> Result<Page<ArticleView>, RepoError> {
        let now = self.shared.clock.now();
        Ok(exec::fetch_page(&self.snapshot("fetch_page"), plan, now))
    }

    async fn fetch_one(&self, plan: &ArticlePlan) -> Result<Option<ArticleView>, RepoError> {
        let now = self.shared.clock.now();
        Ok(exec::fetch_one(&self.snapshot("fetch_one"), plan, now))
    }

    async fn analytics(&self, plan: &AnalyticsPlan) -> Result<AnalyticsSummary, RepoError> {
        Ok(exec::analytics(&self.snapshot("analytics"), plan))
    }

    async fn status_counts(&self) -> Result<StatusCounts, RepoError> {
        Ok(exec::status_counts(&self.snapshot("status_counts")))
    }

    async fn list_meta(
        &self,
        entity_type: MetaEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<MetaEntry>, RepoError> {
        let data = self.snapshot("list_meta");
        Ok(data
            .meta
            .iter()
            .filter(|((kind, id, _), _)| *kind == entity_type && *id == entity_id)
            .map(|((kind, id, key), value)| MetaEntry {
                entity_type: *kind,
                entity_id: *id,
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl ArticlesWriteRepo for MemoryRepositories {
    async fn begin(&self) -> Result<Box<dyn ArticleTransaction>, RepoError> {
        let gate = Arc::clone(&self.shared.writer).lock_owned().await;
        let working = self.snapshot("begin").clone();
        debug!("Memory transaction started");
        Ok(Box::new(MemoryTransaction::new(
            Arc::clone(&self.shared),
            working,
            gate,
        )))
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool, RepoError> {
        let _gate = self.shared.writer.lock().await;
        Ok(rw_write(&self.shared.data, LOCK_TARGET, "delete_article").remove_article(id))
    }

    async fn apply_bulk(&self, transition: BulkTransition, ids: &[Uuid]) -> Result<u64, RepoError> {
        let _gate = self.shared.writer.lock().await;
        let now = self.shared.clock.now();
        let mut data = rw_write(&self.shared.data, LOCK_TARGET, "apply_bulk");

        let mut changed = 0;
        for id in ids {
            let Some(article) = data.articles.get_mut(id) else {
                continue;
            };
            if transition.applies_to(article) {
                transition.apply(article, now);
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::pagination::PageRequest;
    use crate::application::query::{DetailLevel, ListingFilters, QueryComposer, RankingSettings};
    use crate::application::repos::ArticleWrite;
    use crate::domain::entities::{ArticleFlags, ArticleMetrics};
    use crate::domain::types::{ArticleStatus, CommentStatus, EditorialStatus};

    const NOW: OffsetDateTime = datetime!(2026-03-10 12:00 UTC);

    fn author(username: &str) -> AuthorRecord {
        AuthorRecord {
            id: Uuid::new_v4(),
            name: username.to_uppercase(),
            username: username.to_string(),
            avatar: None,
            bio: Some("bio".to_string()),
            email: format!("{username}@example.com"),
            role: "author".to_string(),
        }
    }

    fn category(slug: &str, parent_id: Option<Uuid>) -> CategoryRecord {
        CategoryRecord {
            id: Uuid::new_v4(),
            name: slug.to_string(),
            slug: slug.to_string(),
            color: None,
            description: None,
            parent_id,
        }
    }

    fn live(slug: &str, author: Uuid, category: Uuid, views: i64) -> ArticleRecord {
        ArticleRecord {
            id: Uuid::new_v4(),
            title: slug.to_string(),
            slug: slug.to_string(),
            content: "body".to_string(),
            excerpt: String::new(),
            article_type: "news".to_string(),
            status: ArticleStatus::Published,
            editorial_status: EditorialStatus::Published,
            published_at: Some(datetime!(2026-03-09 12:00 UTC)),
            author_id: author,
            editor_id: None,
            category_id: category,
            reading_time: 2,
            flags: ArticleFlags::default(),
            metrics: ArticleMetrics {
                views_count: views,
                ..ArticleMetrics::default()
            },
            created_at: datetime!(2026-03-09 10:00 UTC),
            updated_at: datetime!(2026-03-09 10:00 UTC),
        }
    }

    fn write_for(author: Uuid, category: Uuid, slug: &str) -> ArticleWrite {
        ArticleWrite {
            title: slug.to_string(),
            slug: slug.to_string(),
            content: "body".to_string(),
            excerpt: String::new(),
            article_type: "news".to_string(),
            status: ArticleStatus::Draft,
            editorial_status: EditorialStatus::Draft,
            published_at: None,
            author_id: author,
            editor_id: None,
            category_id: category,
            reading_time: 1,
            flags: ArticleFlags::default(),
        }
    }

    #[test]
    fn category_cycles_are_rejected_on_seed() {
        let repos = MemoryRepositories::new(Clock::Fixed(NOW));
        let root = category("haber", None);
        let root_id = root.id;
        repos.add_category(root).unwrap();

        let mut orphan = category("yetim", Some(Uuid::new_v4()));
        assert!(repos.add_category(orphan.clone()).is_err());
        orphan.parent_id = Some(root_id);
        assert!(repos.add_category(orphan).is_ok());
    }

    #[tokio::test]
    async fn category_listing_includes_direct_children() {
        let repos = MemoryRepositories::new(Clock::Fixed(NOW));
        let writer = author("ayse");
        let root = category("spor", None);
        let child = category("futbol", Some(root.id));
        let other = category("ekonomi", None);
        repos.add_author(writer.clone());
        for c in [root.clone(), child.clone(), other.clone()] {
            repos.add_category(c).unwrap();
        }
        repos.add_article(live("derbi", writer.id, child.id, 1), &[]);
        repos.add_article(live("transfer", writer.id, root.id, 2), &[]);
        repos.add_article(live("faiz", writer.id, other.id, 3), &[]);

        let composer = QueryComposer::new(RankingSettings::default());
        let filters = ListingFilters {
            category: Some("spor".to_string()),
            ..ListingFilters::default()
        };
        let plan = composer.plan_published_listing(&filters, PageRequest::default());
        let page = repos.fetch_page(&plan).await.unwrap();

        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|view| view.article.slug != "faiz"));
    }

    #[tokio::test]
    async fn detail_projection_limits_comments_to_approved_top_level() {
        let repos = MemoryRepositories::new(Clock::Fixed(NOW));
        let writer = author("mehmet");
        let cat = category("gundem", None);
        repos.add_author(writer.clone());
        repos.add_category(cat.clone()).unwrap();
        let article = live("secim", writer.id, cat.id, 0);
        let article_id = article.id;
        repos.add_article(article, &[]);

        let mut top_ids = Vec::new();
        for minute in 0..7u8 {
            let comment = CommentRecord {
                id: Uuid::new_v4(),
                article_id,
                user_id: writer.id,
                parent_id: None,
                body: format!("yorum {minute}"),
                status: CommentStatus::Approved,
                created_at: NOW - time::Duration::minutes(i64::from(minute)),
            };
            top_ids.push(comment.id);
            repos.add_comment(comment);
        }
        repos.add_comment(CommentRecord {
            id: Uuid::new_v4(),
            article_id,
            user_id: writer.id,
            parent_id: None,
            body: "spam".to_string(),
            status: CommentStatus::Spam,
            created_at: NOW,
        });
        repos.add_comment(CommentRecord {
            id: Uuid::new_v4(),
            article_id,
            user_id: writer.id,
            parent_id: Some(top_ids[0]),
            body: "yanit".to_string(),
            status: CommentStatus::Approved,
            created_at: NOW,
        });

        let composer = QueryComposer::new(RankingSettings::default());
        let plan = composer.plan_by_id(article_id, DetailLevel::Detail);
        let view = repos.fetch_one(&plan).await.unwrap().unwrap();

        assert_eq!(view.comments.len(), 5);
        assert_eq!(view.comments[0].comment.id, top_ids[0]);
        assert_eq!(view.comments[0].replies.len(), 1);
        assert!(view.author.and_then(|a| a.bio).is_some());
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let repos = MemoryRepositories::new(Clock::Fixed(NOW));
        let writer = author("zeynep");
        let cat = category("kultur", None);
        repos.add_author(writer.clone());
        repos.add_category(cat.clone()).unwrap();

        {
            let mut tx = repos.begin().await.unwrap();
            tx.insert_article(&write_for(writer.id, cat.id, "taslak"))
                .await
                .unwrap();
            tx.find_or_create_tag("Sanat").await.unwrap();
        }
        assert_eq!(repos.article_count(), 0);
        assert_eq!(repos.tag_count(), 0);

        let mut tx = repos.begin().await.unwrap();
        tx.insert_article(&write_for(writer.id, cat.id, "kalici"))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(repos.article_count(), 1);
    }

    #[tokio::test]
    async fn insert_checks_references_and_slug() {
        let repos = MemoryRepositories::new(Clock::Fixed(NOW));
        let writer = author("can");
        let cat = category("dunya", None);
        repos.add_author(writer.clone());
        repos.add_category(cat.clone()).unwrap();

        let mut tx = repos.begin().await.unwrap();
        let err = tx
            .insert_article(&write_for(Uuid::new_v4(), cat.id, "kimsesiz"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Integrity { .. }));

        tx.insert_article(&write_for(writer.id, cat.id, "ayni"))
            .await
            .unwrap();
        let err = tx
            .insert_article(&write_for(writer.id, cat.id, "ayni"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn status_counts_track_pending_review() {
        let repos = MemoryRepositories::new(Clock::Fixed(NOW));
        let writer = author("deniz");
        let cat = category("yasam", None);
        repos.add_author(writer.clone());
        repos.add_category(cat.clone()).unwrap();

        repos.add_article(live("a", writer.id, cat.id, 0), &[]);
        let mut pending = live("b", writer.id, cat.id, 0);
        pending.status = ArticleStatus::Draft;
        pending.editorial_status = EditorialStatus::PendingReview;
        repos.add_article(pending, &[]);

        let counts = repos.status_counts().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.published, 1);
        assert_eq!(counts.draft, 1);
        assert_eq!(counts.pending_review, 1);
    }
}
