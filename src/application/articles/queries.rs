//! Cached read operations.
//!
//! Every read builds a plan, derives a cache key from the normalized caller
//! intent, and executes the plan only on a miss.

use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::query::{AuthorRef, DetailLevel, ListingFilters, ListingSort, SearchQuery};
use crate::cache::{CacheKey, CacheTag, KeyNamespace};
use crate::domain::analytics::{AnalyticsSummary, StatusCounts};
use crate::domain::entities::ArticleView;

use super::service::ArticleService;
use super::types::{ArticleServiceError, parse_article_id};

const ENTITY_TAGS: &[CacheTag] = &[CacheTag::Articles];

impl ArticleService {
    #[instrument(skip(self))]
    pub async fn find_by_id(
        &self,
        id: Uuid,
        level: DetailLevel,
    ) -> Result<Option<ArticleView>, ArticleServiceError> {
        let plan = self.composer.plan_by_id(id, level);
        let reader = &self.reader;
        self.cached(
            Ok(CacheKey::article_by_id(id, level)),
            ENTITY_TAGS,
            self.ttl().entity,
            || async move { reader.fetch_one(&plan).await },
        )
        .await
    }

    /// Like [`Self::find_by_id`] for ids supplied as text.
    pub async fn find_by_id_str(
        &self,
        id: &str,
        level: DetailLevel,
    ) -> Result<Option<ArticleView>, ArticleServiceError> {
        let id = parse_article_id(id)?;
        self.find_by_id(id, level).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_slug(
        &self,
        slug: &str,
        level: DetailLevel,
    ) -> Result<Option<ArticleView>, ArticleServiceError> {
        let plan = self.composer.plan_by_slug(slug, level);
        let reader = &self.reader;
        self.cached(
            Ok(CacheKey::article_by_slug(slug, level)),
            ENTITY_TAGS,
            self.ttl().entity,
            || async move { reader.fetch_one(&plan).await },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_published(
        &self,
        filters: &ListingFilters,
        page: PageRequest,
    ) -> Result<Page<ArticleView>, ArticleServiceError> {
        let filters = filters.normalized();
        let tags = listing_tags(&filters);
        self.listing(KeyNamespace::Published, &filters, page, &tags, self.ttl().listing)
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_featured(&self, limit: u32) -> Result<Vec<ArticleView>, ArticleServiceError> {
        let plan = self.composer.plan_featured(limit);
        let reader = &self.reader;
        self.cached(
            CacheKey::paged(KeyNamespace::Featured, &(), plan.page),
            &[CacheTag::Featured, CacheTag::Listings],
            self.ttl().featured,
            || async move { reader.fetch_page(&plan).await.map(|page| page.items) },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_popular(
        &self,
        window_days: u32,
        limit: u32,
    ) -> Result<Vec<ArticleView>, ArticleServiceError> {
        let plan = self.composer.plan_popular(window_days, limit);
        let reader = &self.reader;
        self.cached(
            CacheKey::paged(KeyNamespace::Popular, &window_days, plan.page),
            &[CacheTag::Popular, CacheTag::Listings],
            self.ttl().popular,
            || async move { reader.fetch_page(&plan).await.map(|page| page.items) },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_trending(
        &self,
        window_hours: u32,
        limit: u32,
    ) -> Result<Vec<ArticleView>, ArticleServiceError> {
        let plan = self.composer.plan_trending(window_hours, limit);
        let weights = self.composer.ranking().trending;
        let reader = &self.reader;
        self.cached(
            CacheKey::paged(KeyNamespace::Trending, &(window_hours, weights), plan.page),
            &[CacheTag::Trending, CacheTag::Listings],
            self.ttl().trending,
            || async move { reader.fetch_page(&plan).await.map(|page| page.items) },
        )
        .await
    }

    /// Articles in the category or any of its direct children.
    #[instrument(skip(self))]
    pub async fn list_by_category(
        &self,
        category_slug: &str,
        page: PageRequest,
    ) -> Result<Page<ArticleView>, ArticleServiceError> {
        let filters = ListingFilters {
            category: Some(category_slug.to_string()),
            ..ListingFilters::default()
        }
        .normalized();
        self.listing(
            KeyNamespace::Category,
            &filters,
            page,
            &[CacheTag::Categories, CacheTag::Listings],
            self.ttl().category,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_by_tag(
        &self,
        tag_slug: &str,
        page: PageRequest,
    ) -> Result<Page<ArticleView>, ArticleServiceError> {
        let filters = ListingFilters {
            tag: Some(tag_slug.to_string()),
            ..ListingFilters::default()
        }
        .normalized();
        self.listing(
            KeyNamespace::Tag,
            &filters,
            page,
            &[CacheTag::Tags, CacheTag::Listings],
            self.ttl().tag,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_by_author(
        &self,
        author: &AuthorRef,
        page: PageRequest,
    ) -> Result<Page<ArticleView>, ArticleServiceError> {
        let filters = ListingFilters {
            author: Some(author.clone()),
            ..ListingFilters::default()
        }
        .normalized();
        self.listing(
            KeyNamespace::Author,
            &filters,
            page,
            &[CacheTag::Authors, CacheTag::Listings],
            self.ttl().author,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &SearchQuery,
        page: PageRequest,
    ) -> Result<Page<ArticleView>, ArticleServiceError> {
        let query = query.normalized();
        let plan = self.composer.plan_search(&query, page);
        let reader = &self.reader;
        self.cached(
            CacheKey::paged(KeyNamespace::Search, &query, plan.page),
            &[CacheTag::Listings, CacheTag::Articles],
            self.ttl().search,
            || async move { reader.fetch_page(&plan).await },
        )
        .await
    }

    /// Live articles sharing the category or a tag with `article_id`.
    /// An unknown source article yields an empty list.
    #[instrument(skip(self))]
    pub async fn list_related(
        &self,
        article_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ArticleView>, ArticleServiceError> {
        let Some(source) = self.find_by_id(article_id, DetailLevel::Summary).await? else {
            return Ok(Vec::new());
        };

        let tag_ids: Vec<Uuid> = source.tags.iter().map(|tag| tag.id).collect();
        let plan = self.composer.plan_related(&source.article, &tag_ids, limit);
        let reader = &self.reader;
        self.cached(
            CacheKey::paged(KeyNamespace::Related, &article_id, plan.page),
            &[CacheTag::Related],
            self.ttl().related,
            || async move { reader.fetch_page(&plan).await.map(|page| page.items) },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_scheduled(
        &self,
        page: PageRequest,
    ) -> Result<Page<ArticleView>, ArticleServiceError> {
        let plan = self.composer.plan_scheduled(page);
        let reader = &self.reader;
        self.cached(
            CacheKey::paged(KeyNamespace::Scheduled, &(), plan.page),
            &[CacheTag::Listings],
            self.ttl().listing,
            || async move { reader.fetch_page(&plan).await },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_pending_review(
        &self,
        page: PageRequest,
    ) -> Result<Page<ArticleView>, ArticleServiceError> {
        let plan = self.composer.plan_pending_review(page);
        let reader = &self.reader;
        self.cached(
            CacheKey::paged(KeyNamespace::PendingReview, &(), plan.page),
            &[CacheTag::Listings],
            self.ttl().listing,
            || async move { reader.fetch_page(&plan).await },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_analytics(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<AnalyticsSummary, ArticleServiceError> {
        let plan = self.composer.plan_analytics_summary(from, to);
        let reader = &self.reader;
        self.cached(
            CacheKey::unpaged(KeyNamespace::Analytics, &plan),
            &[CacheTag::Stats],
            self.ttl().analytics,
            || async move { reader.analytics(&plan).await },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_status_counts(&self) -> Result<StatusCounts, ArticleServiceError> {
        let reader = &self.reader;
        self.cached(
            Ok(CacheKey::singleton(KeyNamespace::StatusCounts)),
            &[CacheTag::Stats],
            self.ttl().status_counts,
            || async move { reader.status_counts().await },
        )
        .await
    }

    async fn listing(
        &self,
        namespace: KeyNamespace,
        filters: &ListingFilters,
        page: PageRequest,
        tags: &[CacheTag],
        ttl: std::time::Duration,
    ) -> Result<Page<ArticleView>, ArticleServiceError> {
        let plan = self.composer.plan_published_listing(filters, page);
        let reader = &self.reader;
        self.cached(
            CacheKey::paged(namespace, filters, plan.page),
            tags,
            ttl,
            || async move { reader.fetch_page(&plan).await },
        )
        .await
    }
}

/// Tags for a published listing, narrowed by the options it uses.
fn listing_tags(filters: &ListingFilters) -> Vec<CacheTag> {
    let mut tags = vec![CacheTag::Listings, CacheTag::Latest];
    if filters.category.is_some() {
        tags.push(CacheTag::Categories);
    }
    if filters.tag.is_some() {
        tags.push(CacheTag::Tags);
    }
    if filters.author.is_some() {
        tags.push(CacheTag::Authors);
    }
    if filters.featured {
        tags.push(CacheTag::Featured);
    }
    match filters.sort {
        ListingSort::Popular => tags.push(CacheTag::Popular),
        ListingSort::Trending => tags.push(CacheTag::Trending),
        ListingSort::Latest | ListingSort::Oldest => {}
    }
    tags
}
