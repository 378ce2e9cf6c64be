//! In-process interpretation of query plans.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::pagination::Page;
use crate::application::query::{AnalyticsPlan, ArticlePlan, Direction, Predicate, SortExpr};
use crate::domain::analytics::{
    AnalyticsSummary, AnalyticsTotals, AuthorCount, CategoryCount, DailyStat, StatusCounts,
};
use crate::domain::articles::is_live;
use crate::domain::entities::{ArticleRecord, ArticleView};
use crate::domain::types::{ArticleStatus, EditorialStatus};

use super::dataset::Dataset;

pub(crate) fn fetch_page(data: &Dataset, plan: &ArticlePlan, now: OffsetDateTime) -> Page<ArticleView> {
    let matched = matching(data, plan, now);
    let total = matched.len() as u64;
    let offset = usize::try_from(plan.page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(plan.page.limit()).unwrap_or(usize::MAX);

    let items = matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|article| data.project(article, &plan.projection))
        .collect();
    Page::new(items, plan.page, total)
}

pub(crate) fn fetch_one(data: &Dataset, plan: &ArticlePlan, now: OffsetDateTime) -> Option<ArticleView> {
    matching(data, plan, now)
        .first()
        .map(|article| data.project(article, &plan.projection))
}

fn matching<'a>(data: &'a Dataset, plan: &ArticlePlan, now: OffsetDateTime) -> Vec<&'a ArticleRecord> {
    let mut matched: Vec<&ArticleRecord> = data
        .articles
        .values()
        .filter(|article| {
            plan.predicates
                .iter()
                .all(|predicate| satisfies(data, article, predicate, now))
        })
        .collect();

    matched.sort_by(|a, b| {
        plan.order
            .iter()
            .map(|term| {
                if term.expr == SortExpr::PublishedAt {
                    return by_publication(a, b, term.direction);
                }
                let ordering = compare(data, a, b, &term.expr);
                match term.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    matched
}

fn satisfies(data: &Dataset, article: &ArticleRecord, predicate: &Predicate, now: OffsetDateTime) -> bool {
    match predicate {
        Predicate::Live => is_live(article, now),
        Predicate::Status(status) => article.status == *status,
        Predicate::EditorialStatus(status) => article.editorial_status == *status,
        Predicate::Id(id) => article.id == *id,
        Predicate::Slug(slug) => article.slug == *slug,
        Predicate::NotId(id) => article.id != *id,
        Predicate::CategoryId(id) => article.category_id == *id,
        Predicate::CategorySlug(slug) => data.category_scope(slug).contains(&article.category_id),
        Predicate::TagSlug(slug) => data
            .tag_by_slug(slug)
            .is_some_and(|tag| data.has_any_tag(article.id, &[tag.id])),
        Predicate::AnyTag(ids) => data.has_any_tag(article.id, ids),
        Predicate::AuthorId(id) => article.author_id == *id,
        Predicate::AuthorUsername(username) => data
            .author_by_username(username)
            .is_some_and(|author| author.id == article.author_id),
        Predicate::Featured => article.flags.is_featured,
        Predicate::Breaking => article.flags.is_breaking,
        Predicate::ArticleType(kind) => article.article_type.eq_ignore_ascii_case(kind),
        Predicate::PublishedWithinHours(hours) => article
            .published_at
            .is_some_and(|published| published >= now - Duration::hours(*hours)),
        Predicate::PublishedFrom(from) => article.published_at.is_some_and(|p| p >= *from),
        Predicate::PublishedTo(to) => article.published_at.is_some_and(|p| p <= *to),
        Predicate::Text(pattern) => {
            pattern.matches(&article.title)
                || pattern.matches(&article.excerpt)
                || pattern.matches(&article.content)
        }
        Predicate::RelatedTo {
            category_id,
            tag_ids,
        } => article.category_id == *category_id || data.has_any_tag(article.id, tag_ids),
    }
}

/// Undated rows sort last in either direction.
fn by_publication(a: &ArticleRecord, b: &ArticleRecord, direction: Direction) -> Ordering {
    match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => match direction {
            Direction::Asc => x.cmp(&y),
            Direction::Desc => y.cmp(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ascending comparison for one sort expression.
fn compare(data: &Dataset, a: &ArticleRecord, b: &ArticleRecord, expr: &SortExpr) -> Ordering {
    match expr {
        SortExpr::PublishedAt => a.published_at.cmp(&b.published_at),
        SortExpr::CreatedAt => a.created_at.cmp(&b.created_at),
        SortExpr::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortExpr::Views => a.metrics.views_count.cmp(&b.metrics.views_count),
        SortExpr::Comments => a.metrics.comments_count.cmp(&b.metrics.comments_count),
        SortExpr::Engagement => a.metrics.engagement_score.total_cmp(&b.metrics.engagement_score),
        SortExpr::Composite(weights) => {
            let score = |r: &ArticleRecord| {
                weights.score(r.metrics.views_count, r.metrics.shares_count, r.metrics.comments_count)
            };
            score(a).total_cmp(&score(b))
        }
        SortExpr::Relevance(pattern) => {
            let score = |r: &ArticleRecord| {
                if pattern.matches(&r.title) {
                    3
                } else if pattern.matches(&r.excerpt) {
                    2
                } else if pattern.matches(&r.content) {
                    1
                } else {
                    0
                }
            };
            score(a).cmp(&score(b))
        }
        SortExpr::RelatedRank {
            category_id,
            tag_ids,
        } => {
            let score = |r: &ArticleRecord| {
                if r.category_id == *category_id {
                    3
                } else if data.has_any_tag(r.id, tag_ids) {
                    1
                } else {
                    0
                }
            };
            score(a).cmp(&score(b))
        }
        SortExpr::Id => a.id.cmp(&b.id),
    }
}

pub(crate) fn analytics(data: &Dataset, plan: &AnalyticsPlan) -> AnalyticsSummary {
    let in_window = |at: OffsetDateTime| at >= plan.from && at <= plan.to;

    let created: Vec<&ArticleRecord> = data
        .articles
        .values()
        .filter(|article| in_window(article.created_at))
        .collect();

    let mut totals = AnalyticsTotals::default();
    let mut reading_minutes = 0i64;
    let mut per_category: HashMap<Uuid, u64> = HashMap::new();
    let mut per_author: HashMap<Uuid, u64> = HashMap::new();
    for article in &created {
        totals.total += 1;
        match article.status {
            ArticleStatus::Published => totals.published += 1,
            ArticleStatus::Draft => totals.draft += 1,
            ArticleStatus::Scheduled => totals.scheduled += 1,
            ArticleStatus::Archived => totals.archived += 1,
        }
        totals.views += article.metrics.views_count;
        totals.shares += article.metrics.shares_count;
        totals.comments += article.metrics.comments_count;
        reading_minutes += i64::from(article.reading_time);
        *per_category.entry(article.category_id).or_default() += 1;
        *per_author.entry(article.author_id).or_default() += 1;
    }
    if totals.total > 0 {
        totals.avg_reading_time = reading_minutes as f64 / totals.total as f64;
    }

    let top_n = plan.top_n as usize;
    let mut top_categories: Vec<CategoryCount> = per_category
        .into_iter()
        .filter_map(|(id, article_count)| {
            data.categories.get(&id).map(|category| CategoryCount {
                id,
                name: category.name.clone(),
                slug: category.slug.clone(),
                article_count,
            })
        })
        .collect();
    top_categories.sort_by(|a, b| b.article_count.cmp(&a.article_count).then(a.name.cmp(&b.name)));
    top_categories.truncate(top_n);

    let mut top_authors: Vec<AuthorCount> = per_author
        .into_iter()
        .filter_map(|(id, article_count)| {
            data.authors.get(&id).map(|author| AuthorCount {
                id,
                name: author.name.clone(),
                username: author.username.clone(),
                article_count,
            })
        })
        .collect();
    top_authors.sort_by(|a, b| b.article_count.cmp(&a.article_count).then(a.name.cmp(&b.name)));
    top_authors.truncate(top_n);

    let mut daily: BTreeMap<time::Date, DailyStat> = BTreeMap::new();
    for article in data.articles.values() {
        let Some(published) = article.published_at.filter(|at| in_window(*at)) else {
            continue;
        };
        let date = published.date();
        let stat = daily.entry(date).or_insert(DailyStat {
            date,
            articles: 0,
            views: 0,
            shares: 0,
            comments: 0,
        });
        stat.articles += 1;
        stat.views += article.metrics.views_count;
        stat.shares += article.metrics.shares_count;
        stat.comments += article.metrics.comments_count;
    }

    AnalyticsSummary {
        from: plan.from,
        to: plan.to,
        totals,
        top_categories,
        top_authors,
        daily: daily.into_values().collect(),
    }
}

pub(crate) fn status_counts(data: &Dataset) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for article in data.articles.values() {
        counts.total += 1;
        match article.status {
            ArticleStatus::Draft => counts.draft += 1,
            ArticleStatus::Published => counts.published += 1,
            ArticleStatus::Scheduled => counts.scheduled += 1,
            ArticleStatus::Archived => counts.archived += 1,
        }
        if article.editorial_status == EditorialStatus::PendingReview {
            counts.pending_review += 1;
        }
    }
    counts
}
