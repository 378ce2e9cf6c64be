//! Article reads and writes over the query composer and the tagged cache.

mod commands;
mod queries;
mod service;
mod types;

pub use service::ArticleService;
pub use types::{
    ArticleInput, ArticleServiceError, DEFAULT_ARTICLE_TYPE, DEFAULT_FEATURED_LIMIT,
    DEFAULT_POPULAR_DAYS, DEFAULT_RELATED_LIMIT, DEFAULT_TRENDING_HOURS, TagInput,
    parse_article_id,
};
