//! Aggregated article statistics.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsTotals {
    pub total: u64,
    pub published: u64,
    pub draft: u64,
    pub scheduled: u64,
    pub archived: u64,
    pub views: i64,
    pub shares: i64,
    pub comments: i64,
    /// Minutes; zero when the window holds no articles.
    pub avg_reading_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub article_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub article_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: Date,
    pub articles: u64,
    pub views: i64,
    pub shares: i64,
    pub comments: i64,
}

/// Totals and rankings cover articles created inside the window; the daily
/// series covers articles published inside it, keyed by publication date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
    pub totals: AnalyticsTotals,
    pub top_categories: Vec<CategoryCount>,
    pub top_authors: Vec<AuthorCount>,
    pub daily: Vec<DailyStat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: u64,
    pub draft: u64,
    pub published: u64,
    pub scheduled: u64,
    pub archived: u64,
    pub pending_review: u64,
}
