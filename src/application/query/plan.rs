//! Query plans: a fully specified, not yet executed description of a read.
//!
//! Plans never embed the wall clock. Time-relative predicates (`Live`,
//! `PublishedWithinHours`) are resolved by the executing adapter, so two
//! plans built from the same caller intent are always equal.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::types::{ArticleStatus, EditorialStatus};

/// Breadth and depth of related data fetched with an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    #[default]
    Summary,
    Full,
    Detail,
}

impl DetailLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            DetailLevel::Summary => "summary",
            DetailLevel::Full => "full",
            DetailLevel::Detail => "detail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentProjection {
    /// Maximum number of top-level approved comments, newest first.
    pub limit: u32,
    pub with_replies: bool,
}

/// Eager-fetch shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub author: bool,
    pub author_bio: bool,
    pub category: bool,
    pub category_parent: bool,
    pub tags: bool,
    pub editor: bool,
    pub comments: Option<CommentProjection>,
}

pub const DETAIL_COMMENT_LIMIT: u32 = 5;

impl Projection {
    pub fn for_level(level: DetailLevel) -> Self {
        match level {
            DetailLevel::Summary => Self {
                author: true,
                author_bio: false,
                category: true,
                category_parent: false,
                tags: true,
                editor: false,
                comments: None,
            },
            DetailLevel::Full => Self {
                author_bio: true,
                ..Self::for_level(DetailLevel::Summary)
            },
            DetailLevel::Detail => Self {
                category_parent: true,
                editor: true,
                comments: Some(CommentProjection {
                    limit: DETAIL_COMMENT_LIMIT,
                    with_replies: true,
                }),
                ..Self::for_level(DetailLevel::Full)
            },
        }
    }
}

/// Case-insensitive `LIKE` pattern whose user-supplied part is escaped.
///
/// `%`, `_` and `\` in the needle match only themselves; `\` is the escape
/// character, which is also the Postgres default for `ILIKE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LikePattern(String);

impl LikePattern {
    pub fn contains(needle: &str) -> Self {
        Self(format!("%{}%", escape_like(needle)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Evaluate the pattern in-process with `ILIKE` semantics.
    pub fn matches(&self, haystack: &str) -> bool {
        let pattern = parse_like(&self.0);
        let text: Vec<char> = haystack.chars().flat_map(char::to_lowercase).collect();
        like_match(&pattern, &text)
    }
}

pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    Literal(char),
    AnyOne,
    AnyMany,
}

fn parse_like(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        let token = match ch {
            '\\' => match chars.next() {
                Some(escaped) => LikeToken::Literal(escaped),
                None => LikeToken::Literal('\\'),
            },
            '%' => LikeToken::AnyMany,
            '_' => LikeToken::AnyOne,
            other => LikeToken::Literal(other),
        };
        match token {
            LikeToken::Literal(c) => tokens.extend(c.to_lowercase().map(LikeToken::Literal)),
            other => tokens.push(other),
        }
    }
    tokens
}

fn like_match(pattern: &[LikeToken], text: &[char]) -> bool {
    // Iterative wildcard match with single-star backtracking.
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(LikeToken::AnyMany) => {
                star = Some((p, t));
                p += 1;
            }
            Some(LikeToken::AnyOne) => {
                p += 1;
                t += 1;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|token| *token == LikeToken::AnyMany)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Predicate {
    /// Published and `published_at` not in the future.
    Live,
    Status(ArticleStatus),
    EditorialStatus(EditorialStatus),
    Id(Uuid),
    Slug(String),
    NotId(Uuid),
    CategoryId(Uuid),
    /// The category with this slug or any of its direct children.
    CategorySlug(String),
    TagSlug(String),
    AnyTag(Vec<Uuid>),
    AuthorId(Uuid),
    AuthorUsername(String),
    Featured,
    Breaking,
    ArticleType(String),
    PublishedWithinHours(i64),
    PublishedFrom(OffsetDateTime),
    PublishedTo(OffsetDateTime),
    /// Title, excerpt or content matches.
    Text(LikePattern),
    /// Same category or at least one shared tag.
    RelatedTo {
        category_id: Uuid,
        tag_ids: Vec<Uuid>,
    },
}

/// Coefficients combining engagement counters into one score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub views: f64,
    pub shares: f64,
    pub comments: f64,
}

impl RankingWeights {
    pub fn score(&self, views: i64, shares: i64, comments: i64) -> f64 {
        views as f64 * self.views + shares as f64 * self.shares + comments as f64 * self.comments
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SortExpr {
    PublishedAt,
    CreatedAt,
    Title,
    Views,
    Comments,
    Engagement,
    Composite(RankingWeights),
    /// 3 title, 2 excerpt, 1 content, 0 otherwise.
    Relevance(LikePattern),
    /// 3 same category, 1 shared tag only, 0 otherwise.
    RelatedRank {
        category_id: Uuid,
        tag_ids: Vec<Uuid>,
    },
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub expr: SortExpr,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn asc(expr: SortExpr) -> Self {
        Self {
            expr,
            direction: Direction::Asc,
        }
    }

    pub fn desc(expr: SortExpr) -> Self {
        Self {
            expr,
            direction: Direction::Desc,
        }
    }
}

/// A composed article read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticlePlan {
    pub predicates: Vec<Predicate>,
    pub order: Vec<OrderTerm>,
    pub projection: Projection,
    pub page: PageRequest,
}

impl ArticlePlan {
    /// Plans always end with a unique tie-break so pagination is stable.
    pub(crate) fn with_stable_order(mut self) -> Self {
        if !self
            .order
            .last()
            .is_some_and(|term| term.expr == SortExpr::Id)
        {
            self.order.push(OrderTerm::desc(SortExpr::Id));
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsPlan {
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
    pub top_n: u32,
}
