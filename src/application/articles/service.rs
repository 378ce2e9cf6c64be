use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::application::query::QueryComposer;
use crate::application::repos::{ArticlesRepo, ArticlesWriteRepo, RepoError};
use crate::cache::{CacheError, CacheKey, CacheTag, InvalidationCoordinator, TaggedCache, TtlPolicy};

use super::types::ArticleServiceError;

/// Cached article reads and coordinated article writes.
#[derive(Clone)]
pub struct ArticleService {
    pub(crate) reader: Arc<dyn ArticlesRepo>,
    pub(crate) writer: Arc<dyn ArticlesWriteRepo>,
    pub(crate) composer: QueryComposer,
    pub(crate) cache: Arc<TaggedCache>,
    pub(crate) invalidator: InvalidationCoordinator,
}

impl ArticleService {
    pub fn new(
        reader: Arc<dyn ArticlesRepo>,
        writer: Arc<dyn ArticlesWriteRepo>,
        composer: QueryComposer,
        cache: Arc<TaggedCache>,
    ) -> Self {
        let invalidator = InvalidationCoordinator::new(Arc::clone(&cache));
        Self {
            reader,
            writer,
            composer,
            cache,
            invalidator,
        }
    }

    pub fn cache(&self) -> &Arc<TaggedCache> {
        &self.cache
    }

    pub fn composer(&self) -> &QueryComposer {
        &self.composer
    }

    pub fn invalidator(&self) -> &InvalidationCoordinator {
        &self.invalidator
    }

    pub(crate) fn ttl(&self) -> &TtlPolicy {
        &self.cache.config().ttl
    }

    /// Memoize `compute` under `key`. A key that cannot be built degrades
    /// to a direct computation.
    pub(crate) async fn cached<T, F, Fut>(
        &self,
        key: Result<CacheKey, CacheError>,
        tags: &[CacheTag],
        ttl: Duration,
        compute: F,
    ) -> Result<T, ArticleServiceError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        match key {
            Ok(key) => Ok(self.cache.get_or_compute(&key, tags, ttl, compute).await?),
            Err(err) => {
                warn!(error = %err, "Cache key could not be built, computing directly");
                Ok(compute().await?)
            }
        }
    }
}
