//! Invalidation tags stamped on cache entries.

use std::fmt;

/// Coarse label attached to cache entries. A write that dirties a tag purges
/// every entry carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheTag {
    Articles,
    Listings,
    Related,
    Trending,
    Popular,
    Latest,
    Stats,
    Categories,
    Tags,
    Authors,
    Featured,
}

/// Everything an article write can affect.
pub const ARTICLE_WRITE_TAGS: [CacheTag; 11] = [
    CacheTag::Articles,
    CacheTag::Listings,
    CacheTag::Related,
    CacheTag::Trending,
    CacheTag::Popular,
    CacheTag::Latest,
    CacheTag::Stats,
    CacheTag::Categories,
    CacheTag::Tags,
    CacheTag::Authors,
    CacheTag::Featured,
];

impl CacheTag {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheTag::Articles => "articles",
            CacheTag::Listings => "listings",
            CacheTag::Related => "related",
            CacheTag::Trending => "trending",
            CacheTag::Popular => "popular",
            CacheTag::Latest => "latest",
            CacheTag::Stats => "stats",
            CacheTag::Categories => "categories",
            CacheTag::Tags => "tags",
            CacheTag::Authors => "authors",
            CacheTag::Featured => "featured",
        }
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
