//! Query Composer: caller intent in, executable plans out.

mod composer;
mod filters;
mod plan;

pub use composer::{QueryComposer, RankingSettings};
pub use filters::{AuthorRef, ListingFilters, ListingSort, SearchQuery, SearchSort};
pub use plan::{
    AnalyticsPlan, ArticlePlan, CommentProjection, DETAIL_COMMENT_LIMIT, DetailLevel, Direction,
    LikePattern, OrderTerm, Predicate, Projection, RankingWeights, SortExpr, escape_like,
};
