#![allow(dead_code)]

use std::sync::Arc;

use newsdesk::application::articles::ArticleService;
use newsdesk::application::query::{QueryComposer, RankingSettings};
use newsdesk::application::repos::{ArticlesRepo, ArticlesWriteRepo};
use newsdesk::cache::{CacheConfig, TaggedCache};
use newsdesk::domain::entities::{
    ArticleFlags, ArticleMetrics, ArticleRecord, AuthorRecord, CategoryRecord, TagRecord,
};
use newsdesk::domain::types::{ArticleStatus, EditorialStatus};
use newsdesk::infra::memory::{Clock, MemoryRepositories};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// An in-memory newsdesk with one author and one root category.
pub struct Fixture {
    pub repos: MemoryRepositories,
    pub service: ArticleService,
    pub author: AuthorRecord,
    pub category: CategoryRecord,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(config: CacheConfig) -> Self {
        let repos = MemoryRepositories::new(Clock::System);
        let writer: Arc<dyn ArticlesWriteRepo> = Arc::new(repos.clone());
        Self::assemble(repos, writer, Arc::new(TaggedCache::new(config)))
    }

    /// Same dataset, but writes go through `writer`.
    pub fn with_writer(
        repos: MemoryRepositories,
        writer: Arc<dyn ArticlesWriteRepo>,
    ) -> Self {
        Self::assemble(repos, writer, Arc::new(TaggedCache::new(CacheConfig::default())))
    }

    /// Writes go through `writer`, which also sees the service's cache.
    pub fn with_shared_cache(
        repos: MemoryRepositories,
        writer: Arc<dyn ArticlesWriteRepo>,
        cache: Arc<TaggedCache>,
    ) -> Self {
        Self::assemble(repos, writer, cache)
    }

    fn assemble(
        repos: MemoryRepositories,
        writer: Arc<dyn ArticlesWriteRepo>,
        cache: Arc<TaggedCache>,
    ) -> Self {
        let reader: Arc<dyn ArticlesRepo> = Arc::new(repos.clone());
        let service = ArticleService::new(
            reader,
            writer,
            QueryComposer::new(RankingSettings::default()),
            cache,
        );

        let author = AuthorRecord {
            id: Uuid::new_v4(),
            name: "Ayşe Demir".to_string(),
            username: "ayse".to_string(),
            avatar: None,
            bio: Some("Economy desk".to_string()),
            email: "ayse@example.com".to_string(),
            role: "author".to_string(),
        };
        repos.add_author(author.clone());

        let category = category_record("ekonomi", None);
        repos
            .add_category(category.clone())
            .expect("root category is valid");

        Self {
            repos,
            service,
            author,
            category,
        }
    }

    pub fn add_category(&self, slug: &str, parent: Option<Uuid>) -> CategoryRecord {
        let category = category_record(slug, parent);
        self.repos
            .add_category(category.clone())
            .expect("category is valid");
        category
    }

    pub fn add_tag(&self, slug: &str) -> TagRecord {
        let tag = TagRecord {
            id: Uuid::new_v4(),
            name: slug.to_string(),
            slug: slug.to_string(),
            color: None,
            description: None,
        };
        self.repos.add_tag(tag.clone());
        tag
    }

    /// A live article in the root category, published an hour ago.
    pub fn published(&self, slug: &str) -> ArticleRecord {
        let now = OffsetDateTime::now_utc();
        ArticleRecord {
            id: Uuid::new_v4(),
            title: slug.replace('-', " "),
            slug: slug.to_string(),
            content: "Body".to_string(),
            excerpt: String::new(),
            article_type: "news".to_string(),
            status: ArticleStatus::Published,
            editorial_status: EditorialStatus::Published,
            published_at: Some(now - Duration::hours(1)),
            author_id: self.author.id,
            editor_id: None,
            category_id: self.category.id,
            reading_time: 3,
            flags: ArticleFlags {
                allow_comments: true,
                ..ArticleFlags::default()
            },
            metrics: ArticleMetrics::default(),
            created_at: now - Duration::hours(2),
            updated_at: now - Duration::hours(2),
        }
    }

    pub fn insert(&self, article: ArticleRecord, tags: &[Uuid]) -> ArticleRecord {
        self.repos.add_article(article.clone(), tags);
        article
    }

    pub fn seed(&self, slug: &str) -> ArticleRecord {
        self.insert(self.published(slug), &[])
    }
}

fn category_record(slug: &str, parent_id: Option<Uuid>) -> CategoryRecord {
    CategoryRecord {
        id: Uuid::new_v4(),
        name: slug.to_string(),
        slug: slug.to_string(),
        color: None,
        description: None,
        parent_id,
    }
}
