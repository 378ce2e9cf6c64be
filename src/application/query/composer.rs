//! Query Composer: turns caller intent into [`ArticlePlan`]s.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::entities::ArticleRecord;
use crate::domain::types::{ArticleStatus, EditorialStatus};

use super::filters::{AuthorRef, ListingFilters, ListingSort, SearchQuery, SearchSort};
use super::plan::{
    AnalyticsPlan, ArticlePlan, DetailLevel, LikePattern, OrderTerm, Predicate, Projection,
    RankingWeights, SortExpr,
};

const DEFAULT_TOP_N: u32 = 5;

/// Composite weights used by trending views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingSettings {
    /// Dedicated trending view (`listTrending`).
    pub trending: RankingWeights,
    /// `sort=trending` on published listings.
    pub listing_trending: RankingWeights,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            trending: RankingWeights {
                views: 0.4,
                shares: 0.0,
                comments: 0.6,
            },
            listing_trending: RankingWeights {
                views: 1.0,
                shares: 0.0,
                comments: 2.0,
            },
        }
    }
}

type ListingTransformer = fn(&ListingFilters, &mut Vec<Predicate>);

/// Applied in order; each one inspects a single option and is a no-op when
/// that option is unset.
const LISTING_TRANSFORMERS: &[ListingTransformer] = &[
    by_category,
    by_tag,
    by_author,
    only_featured,
    only_breaking,
    recent_days,
    by_article_type,
];

fn by_category(filters: &ListingFilters, predicates: &mut Vec<Predicate>) {
    if let Some(category) = &filters.category {
        predicates.push(Predicate::CategorySlug(category.clone()));
    }
}

fn by_tag(filters: &ListingFilters, predicates: &mut Vec<Predicate>) {
    if let Some(tag) = &filters.tag {
        predicates.push(Predicate::TagSlug(tag.clone()));
    }
}

fn by_author(filters: &ListingFilters, predicates: &mut Vec<Predicate>) {
    match &filters.author {
        Some(AuthorRef::Id(id)) => predicates.push(Predicate::AuthorId(*id)),
        Some(AuthorRef::Username(name)) => {
            predicates.push(Predicate::AuthorUsername(name.clone()))
        }
        None => {}
    }
}

fn only_featured(filters: &ListingFilters, predicates: &mut Vec<Predicate>) {
    if filters.featured {
        predicates.push(Predicate::Featured);
    }
}

fn only_breaking(filters: &ListingFilters, predicates: &mut Vec<Predicate>) {
    if filters.breaking {
        predicates.push(Predicate::Breaking);
    }
}

fn recent_days(filters: &ListingFilters, predicates: &mut Vec<Predicate>) {
    if let Some(days) = filters.recent_days {
        predicates.push(Predicate::PublishedWithinHours(i64::from(days) * 24));
    }
}

fn by_article_type(filters: &ListingFilters, predicates: &mut Vec<Predicate>) {
    if let Some(kind) = &filters.article_type {
        predicates.push(Predicate::ArticleType(kind.clone()));
    }
}

type SearchTransformer = fn(&SearchQuery, &mut Vec<Predicate>);

const SEARCH_TRANSFORMERS: &[SearchTransformer] = &[
    text_matches,
    in_category,
    any_tag,
    by_author_id,
    published_from,
    published_to,
];

fn text_matches(query: &SearchQuery, predicates: &mut Vec<Predicate>) {
    if !query.text.is_empty() {
        predicates.push(Predicate::Text(LikePattern::contains(&query.text)));
    }
}

fn in_category(query: &SearchQuery, predicates: &mut Vec<Predicate>) {
    if let Some(id) = query.category_id {
        predicates.push(Predicate::CategoryId(id));
    }
}

fn any_tag(query: &SearchQuery, predicates: &mut Vec<Predicate>) {
    if !query.tag_ids.is_empty() {
        predicates.push(Predicate::AnyTag(query.tag_ids.clone()));
    }
}

fn by_author_id(query: &SearchQuery, predicates: &mut Vec<Predicate>) {
    if let Some(id) = query.author_id {
        predicates.push(Predicate::AuthorId(id));
    }
}

fn published_from(query: &SearchQuery, predicates: &mut Vec<Predicate>) {
    if let Some(from) = query.date_from {
        predicates.push(Predicate::PublishedFrom(from));
    }
}

fn published_to(query: &SearchQuery, predicates: &mut Vec<Predicate>) {
    if let Some(to) = query.date_to {
        predicates.push(Predicate::PublishedTo(to));
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryComposer {
    ranking: RankingSettings,
}

impl QueryComposer {
    pub fn new(ranking: RankingSettings) -> Self {
        Self { ranking }
    }

    pub fn ranking(&self) -> &RankingSettings {
        &self.ranking
    }

    pub fn plan_by_id(&self, id: Uuid, level: DetailLevel) -> ArticlePlan {
        single(Predicate::Id(id), level)
    }

    pub fn plan_by_slug(&self, slug: &str, level: DetailLevel) -> ArticlePlan {
        single(Predicate::Slug(slug.to_string()), level)
    }

    pub fn plan_published_listing(&self, filters: &ListingFilters, page: PageRequest) -> ArticlePlan {
        let filters = filters.normalized();
        let mut predicates = vec![Predicate::Live];
        for transform in LISTING_TRANSFORMERS {
            transform(&filters, &mut predicates);
        }

        let order = match filters.sort {
            ListingSort::Popular => vec![OrderTerm::desc(SortExpr::Views)],
            ListingSort::Trending => vec![
                OrderTerm::desc(SortExpr::Composite(self.ranking.listing_trending)),
                OrderTerm::desc(SortExpr::PublishedAt),
            ],
            ListingSort::Oldest => vec![OrderTerm::asc(SortExpr::PublishedAt)],
            ListingSort::Latest => vec![OrderTerm::desc(SortExpr::PublishedAt)],
        };

        summary_plan(predicates, order, page)
    }

    pub fn plan_featured(&self, limit: u32) -> ArticlePlan {
        summary_plan(
            vec![Predicate::Live, Predicate::Featured],
            vec![OrderTerm::desc(SortExpr::PublishedAt)],
            PageRequest::first(limit),
        )
    }

    pub fn plan_search(&self, query: &SearchQuery, page: PageRequest) -> ArticlePlan {
        let query = query.normalized();
        let mut predicates = vec![Predicate::Live];
        for transform in SEARCH_TRANSFORMERS {
            transform(&query, &mut predicates);
        }

        let order = match query.sort {
            SearchSort::Relevance => vec![
                OrderTerm::desc(SortExpr::Relevance(LikePattern::contains(&query.text))),
                OrderTerm::desc(SortExpr::PublishedAt),
            ],
            SearchSort::Latest => vec![OrderTerm::desc(SortExpr::PublishedAt)],
            SearchSort::Oldest => vec![OrderTerm::asc(SortExpr::PublishedAt)],
            SearchSort::Popular => vec![OrderTerm::desc(SortExpr::Views)],
            SearchSort::Title => vec![OrderTerm::asc(SortExpr::Title)],
        };

        summary_plan(predicates, order, page)
    }

    /// Candidates share the category or a tag with `article`, which is excluded.
    pub fn plan_related(&self, article: &ArticleRecord, tag_ids: &[Uuid], limit: u32) -> ArticlePlan {
        let mut tag_ids = tag_ids.to_vec();
        tag_ids.sort_unstable();
        tag_ids.dedup();

        summary_plan(
            vec![
                Predicate::Live,
                Predicate::NotId(article.id),
                Predicate::RelatedTo {
                    category_id: article.category_id,
                    tag_ids: tag_ids.clone(),
                },
            ],
            vec![
                OrderTerm::desc(SortExpr::RelatedRank {
                    category_id: article.category_id,
                    tag_ids,
                }),
                OrderTerm::desc(SortExpr::Views),
                OrderTerm::desc(SortExpr::PublishedAt),
            ],
            PageRequest::first(limit),
        )
    }

    pub fn plan_trending(&self, window_hours: u32, limit: u32) -> ArticlePlan {
        summary_plan(
            vec![
                Predicate::Live,
                Predicate::PublishedWithinHours(i64::from(window_hours.max(1))),
            ],
            vec![
                OrderTerm::desc(SortExpr::Composite(self.ranking.trending)),
                OrderTerm::desc(SortExpr::PublishedAt),
            ],
            PageRequest::first(limit),
        )
    }

    pub fn plan_popular(&self, window_days: u32, limit: u32) -> ArticlePlan {
        summary_plan(
            vec![
                Predicate::Live,
                Predicate::PublishedWithinHours(i64::from(window_days.max(1)) * 24),
            ],
            vec![
                OrderTerm::desc(SortExpr::Views),
                OrderTerm::desc(SortExpr::Engagement),
            ],
            PageRequest::first(limit),
        )
    }

    /// Scheduled articles, soonest publication first.
    pub fn plan_scheduled(&self, page: PageRequest) -> ArticlePlan {
        summary_plan(
            vec![Predicate::Status(ArticleStatus::Scheduled)],
            vec![OrderTerm::asc(SortExpr::PublishedAt)],
            page,
        )
    }

    /// Review queue, oldest submission first.
    pub fn plan_pending_review(&self, page: PageRequest) -> ArticlePlan {
        summary_plan(
            vec![Predicate::EditorialStatus(EditorialStatus::PendingReview)],
            vec![OrderTerm::asc(SortExpr::CreatedAt)],
            page,
        )
    }

    pub fn plan_analytics_summary(&self, from: OffsetDateTime, to: OffsetDateTime) -> AnalyticsPlan {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        AnalyticsPlan {
            from,
            to,
            top_n: DEFAULT_TOP_N,
        }
    }
}

fn single(predicate: Predicate, level: DetailLevel) -> ArticlePlan {
    ArticlePlan {
        predicates: vec![predicate],
        order: Vec::new(),
        projection: Projection::for_level(level),
        page: PageRequest::first(1),
    }
    .with_stable_order()
}

fn summary_plan(predicates: Vec<Predicate>, order: Vec<OrderTerm>, page: PageRequest) -> ArticlePlan {
    ArticlePlan {
        predicates,
        order,
        projection: Projection::for_level(DetailLevel::Summary),
        page,
    }
    .with_stable_order()
}
