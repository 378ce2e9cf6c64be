use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use newsdesk::application::query::DetailLevel;
use newsdesk::application::repos::RepoError;
use newsdesk::cache::metric_names::{
    METRIC_CACHE_COMPUTE_MS, METRIC_CACHE_EVICT, METRIC_CACHE_FALLBACK, METRIC_CACHE_HIT,
    METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS,
};
use newsdesk::cache::{
    CacheConfig, CacheKey, CacheTag, InvalidationCoordinator, KeyNamespace, TaggedCache,
};
use uuid::Uuid;

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Hit, miss, compute latency and eviction on a one-entry cache.
    let cache = Arc::new(TaggedCache::new(CacheConfig {
        max_entries: 1,
        ..CacheConfig::default()
    }));
    let first = CacheKey::article_by_id(Uuid::new_v4(), DetailLevel::Summary);
    let second = CacheKey::article_by_id(Uuid::new_v4(), DetailLevel::Summary);
    for key in [&first, &first, &second] {
        let _: u8 = cache
            .get_or_compute(key, &[CacheTag::Articles], Duration::from_secs(60), || async {
                Ok::<_, RepoError>(1)
            })
            .await
            .expect("compute succeeds");
    }

    // Invalidation through the coordinator.
    let coordinator = InvalidationCoordinator::new(Arc::clone(&cache));
    coordinator.article_upserted(Uuid::new_v4(), "metrik");

    // Bypass on a disabled cache counts as a fallback.
    let disabled = TaggedCache::new(CacheConfig::disabled());
    let _: u8 = disabled
        .get_or_compute(
            &CacheKey::singleton(KeyNamespace::StatusCounts),
            &[CacheTag::Stats],
            Duration::from_secs(60),
            || async { Ok::<_, RepoError>(2) },
        )
        .await
        .expect("compute succeeds");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        METRIC_CACHE_HIT,
        METRIC_CACHE_MISS,
        METRIC_CACHE_EVICT,
        METRIC_CACHE_FALLBACK,
        METRIC_CACHE_INVALIDATED,
        METRIC_CACHE_COMPUTE_MS,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
