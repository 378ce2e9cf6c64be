//! Caller intent for listings and search, before it becomes a plan.
//!
//! Unrecognized or blank options are ignored rather than rejected; a filter
//! only narrows a result when it carries a usable value.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingSort {
    #[default]
    Latest,
    Popular,
    Trending,
    Oldest,
}

impl ListingSort {
    /// Unknown values fall back to [`ListingSort::Latest`].
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "popular" => ListingSort::Popular,
            "trending" => ListingSort::Trending,
            "oldest" => ListingSort::Oldest,
            _ => ListingSort::Latest,
        }
    }
}

/// Author reference accepted by filters: an id or a username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum AuthorRef {
    Id(Uuid),
    Username(String),
}

impl AuthorRef {
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match Uuid::parse_str(trimmed) {
            Ok(id) => AuthorRef::Id(id),
            Err(_) => AuthorRef::Username(trimmed.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ListingFilters {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author: Option<AuthorRef>,
    pub featured: bool,
    pub breaking: bool,
    pub recent_days: Option<u32>,
    #[serde(rename = "type")]
    pub article_type: Option<String>,
    pub sort: ListingSort,
}

impl ListingFilters {
    /// Canonical form used both for planning and for cache fingerprints.
    pub fn normalized(&self) -> Self {
        Self {
            category: normalize_slug(self.category.as_deref()),
            tag: normalize_slug(self.tag.as_deref()),
            author: match &self.author {
                Some(AuthorRef::Username(name)) => AuthorRef::parse(name),
                other => other.clone(),
            },
            featured: self.featured,
            breaking: self.breaking,
            recent_days: self.recent_days.filter(|days| *days > 0),
            article_type: normalize_slug(self.article_type.as_deref()),
            sort: self.sort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSort {
    #[default]
    Relevance,
    Latest,
    Oldest,
    Popular,
    Title,
}

impl SearchSort {
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "latest" | "published_at" => SearchSort::Latest,
            "oldest" => SearchSort::Oldest,
            "popular" | "views" => SearchSort::Popular,
            "title" => SearchSort::Title,
            _ => SearchSort::Relevance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub category_id: Option<Uuid>,
    /// Any-of. An empty list leaves the result unfiltered.
    pub tag_ids: Vec<Uuid>,
    pub author_id: Option<Uuid>,
    pub date_from: Option<OffsetDateTime>,
    pub date_to: Option<OffsetDateTime>,
    pub sort: SearchSort,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn normalized(&self) -> Self {
        let mut tag_ids = self.tag_ids.clone();
        tag_ids.sort_unstable();
        tag_ids.dedup();

        let text = self.text.trim().to_string();
        let sort = if text.is_empty() && self.sort == SearchSort::Relevance {
            SearchSort::Latest
        } else {
            self.sort
        };

        Self {
            text,
            category_id: self.category_id,
            tag_ids,
            author_id: self.author_id,
            date_from: self.date_from,
            date_to: self.date_to,
            sort,
        }
    }
}

fn normalize_slug(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}
