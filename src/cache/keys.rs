//! Cache key construction.
//!
//! A key is `namespace:identity[:page]`. Entity lookups use the id or slug
//! directly; listings use a SHA-256 fingerprint of the normalized caller
//! intent, so identical inputs always share a key and distinct query shapes
//! never do.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::query::DetailLevel;

use super::store::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyNamespace {
    ArticleById,
    ArticleBySlug,
    Published,
    Featured,
    Trending,
    Popular,
    Category,
    Tag,
    Author,
    Search,
    Related,
    Scheduled,
    PendingReview,
    Analytics,
    StatusCounts,
}

impl KeyNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyNamespace::ArticleById => "article:id",
            KeyNamespace::ArticleBySlug => "article:slug",
            KeyNamespace::Published => "listing:published",
            KeyNamespace::Featured => "listing:featured",
            KeyNamespace::Trending => "listing:trending",
            KeyNamespace::Popular => "listing:popular",
            KeyNamespace::Category => "listing:category",
            KeyNamespace::Tag => "listing:tag",
            KeyNamespace::Author => "listing:author",
            KeyNamespace::Search => "search",
            KeyNamespace::Related => "related",
            KeyNamespace::Scheduled => "listing:scheduled",
            KeyNamespace::PendingReview => "listing:pending_review",
            KeyNamespace::Analytics => "analytics",
            KeyNamespace::StatusCounts => "stats:status_counts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: KeyNamespace,
    value: String,
}

impl CacheKey {
    pub fn article_by_id(id: Uuid, level: DetailLevel) -> Self {
        let namespace = KeyNamespace::ArticleById;
        Self {
            namespace,
            value: format!("{}:{id}:{}", namespace.as_str(), level.as_str()),
        }
    }

    /// The slug sits between a fixed prefix and a fixed level suffix, so it
    /// may contain any character without making keys ambiguous.
    pub fn article_by_slug(slug: &str, level: DetailLevel) -> Self {
        let namespace = KeyNamespace::ArticleBySlug;
        Self {
            namespace,
            value: format!("{}:{slug}:{}", namespace.as_str(), level.as_str()),
        }
    }

    /// Every detail-level variant of the by-id and by-slug lookups.
    pub fn article_variants(id: Uuid, slug: Option<&str>) -> Vec<Self> {
        const LEVELS: [DetailLevel; 3] = [DetailLevel::Summary, DetailLevel::Full, DetailLevel::Detail];

        let mut keys: Vec<Self> = LEVELS
            .iter()
            .map(|level| Self::article_by_id(id, *level))
            .collect();
        if let Some(slug) = slug {
            keys.extend(LEVELS.iter().map(|level| Self::article_by_slug(slug, *level)));
        }
        keys
    }

    /// Paginated view keyed by the fingerprint of `intent`.
    pub fn paged<T: Serialize + ?Sized>(
        namespace: KeyNamespace,
        intent: &T,
        page: PageRequest,
    ) -> Result<Self, CacheError> {
        let fingerprint = fingerprint(intent)?;
        Ok(Self {
            namespace,
            value: format!(
                "{}:{fingerprint}:p{}:n{}",
                namespace.as_str(),
                page.page(),
                page.per_page()
            ),
        })
    }

    pub fn unpaged<T: Serialize + ?Sized>(
        namespace: KeyNamespace,
        intent: &T,
    ) -> Result<Self, CacheError> {
        let fingerprint = fingerprint(intent)?;
        Ok(Self {
            namespace,
            value: format!("{}:{fingerprint}", namespace.as_str()),
        })
    }

    pub fn singleton(namespace: KeyNamespace) -> Self {
        Self {
            namespace,
            value: namespace.as_str().to_string(),
        }
    }

    pub fn namespace(&self) -> KeyNamespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Hex SHA-256 of the JSON encoding of `value`.
///
/// Intent types serialize their fields in declaration order and hold no
/// hash maps, so the encoding is canonical.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, CacheError> {
    let bytes = serde_json::to_vec(value).map_err(CacheError::Encode)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::query::{ListingFilters, ListingSort};

    #[test]
    fn identical_intent_shares_key() {
        let filters = ListingFilters {
            category: Some("ekonomi".to_string()),
            ..ListingFilters::default()
        };
        let a = CacheKey::paged(KeyNamespace::Published, &filters, PageRequest::new(2, 20)).unwrap();
        let b = CacheKey::paged(KeyNamespace::Published, &filters.clone(), PageRequest::new(2, 20))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_shapes_never_collide() {
        let latest = ListingFilters::default();
        let popular = ListingFilters {
            sort: ListingSort::Popular,
            ..ListingFilters::default()
        };

        let keys = [
            CacheKey::paged(KeyNamespace::Published, &latest, PageRequest::new(1, 20)).unwrap(),
            CacheKey::paged(KeyNamespace::Published, &latest, PageRequest::new(2, 20)).unwrap(),
            CacheKey::paged(KeyNamespace::Published, &latest, PageRequest::new(1, 10)).unwrap(),
            CacheKey::paged(KeyNamespace::Published, &popular, PageRequest::new(1, 20)).unwrap(),
            CacheKey::paged(KeyNamespace::Featured, &latest, PageRequest::new(1, 20)).unwrap(),
        ];
        for (i, left) in keys.iter().enumerate() {
            for right in &keys[i + 1..] {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn entity_variants_cover_every_level() {
        let id = Uuid::new_v4();
        let keys = CacheKey::article_variants(id, Some("secim"));
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&CacheKey::article_by_slug("secim", DetailLevel::Detail)));
        assert!(keys.contains(&CacheKey::article_by_id(id, DetailLevel::Summary)));
        assert_eq!(CacheKey::article_variants(id, None).len(), 3);
    }

    #[test]
    fn slug_keys_are_namespaced() {
        let key = CacheKey::article_by_slug("a:b", DetailLevel::Full);
        assert_eq!(key.as_str(), "article:slug:a:b:full");
        assert_eq!(key.namespace(), KeyNamespace::ArticleBySlug);
    }
}
