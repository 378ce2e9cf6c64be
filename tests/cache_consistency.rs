mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::Fixture;
use newsdesk::application::articles::ArticleInput;
use newsdesk::application::pagination::PageRequest;
use newsdesk::application::query::{DetailLevel, ListingFilters};
use newsdesk::application::repos::RepoError;
use newsdesk::cache::{CacheConfig, CacheKey, CacheTag, KeyNamespace, TaggedCache};
use newsdesk::domain::types::{ArticleStatus, EditorialStatus};

fn counting_cache() -> TaggedCache {
    TaggedCache::new(CacheConfig::default())
}

#[tokio::test]
async fn repeated_reads_compute_once() {
    let cache = counting_cache();
    let key = CacheKey::singleton(KeyNamespace::StatusCounts);
    let calls = AtomicUsize::new(0);
    let counter = &calls;

    let compute = move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, RepoError>(vec![3_u64, 1, 4])
    };

    let first = cache
        .get_or_compute(&key, &[CacheTag::Stats], Duration::from_secs(60), compute)
        .await
        .expect("compute succeeds");
    let second = cache
        .get_or_compute(&key, &[CacheTag::Stats], Duration::from_secs(60), compute)
        .await
        .expect("compute succeeds");

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn compute_errors_are_not_cached() {
    let cache = counting_cache();
    let key = CacheKey::singleton(KeyNamespace::StatusCounts);

    let failed: Result<u64, RepoError> = cache
        .get_or_compute(&key, &[CacheTag::Stats], Duration::from_secs(60), || async {
            Err(RepoError::Timeout)
        })
        .await;
    assert!(matches!(failed, Err(RepoError::Timeout)));
    assert!(!cache.contains(&key));

    let value: u64 = cache
        .get_or_compute(&key, &[CacheTag::Stats], Duration::from_secs(60), || async {
            Ok::<_, RepoError>(7)
        })
        .await
        .expect("second compute succeeds");
    assert_eq!(value, 7);
}

#[tokio::test]
async fn invalidating_articles_forces_a_fresh_read() {
    let fixture = Fixture::new();
    let article = fixture.seed("manset");
    let key = CacheKey::article_by_id(article.id, DetailLevel::Summary);

    let first = fixture
        .service
        .find_by_id(article.id, DetailLevel::Summary)
        .await
        .expect("read succeeds")
        .expect("article exists");
    assert_eq!(first.article.title, "manset");
    assert!(fixture.service.cache().contains(&key));

    // Change the row behind the cache's back.
    let mut renamed = article.clone();
    renamed.title = "Yeni manşet".to_string();
    fixture.repos.add_article(renamed, &[]);

    let stale = fixture
        .service
        .find_by_id(article.id, DetailLevel::Summary)
        .await
        .expect("read succeeds")
        .expect("article exists");
    assert_eq!(stale.article.title, "manset");

    fixture.service.cache().invalidate_tags(&[CacheTag::Articles]);
    assert!(!fixture.service.cache().contains(&key));

    let fresh = fixture
        .service
        .find_by_id(article.id, DetailLevel::Summary)
        .await
        .expect("read succeeds")
        .expect("article exists");
    assert_eq!(fresh.article.title, "Yeni manşet");
}

#[tokio::test]
async fn invalidation_leaves_unrelated_tags_alone() {
    let cache = counting_cache();
    let stats = CacheKey::singleton(KeyNamespace::StatusCounts);
    let entity = CacheKey::article_by_slug("manset", DetailLevel::Summary);

    let _: u8 = cache
        .get_or_compute(&stats, &[CacheTag::Stats], Duration::from_secs(60), || async {
            Ok::<_, RepoError>(1)
        })
        .await
        .expect("compute succeeds");
    let _: u8 = cache
        .get_or_compute(&entity, &[CacheTag::Articles], Duration::from_secs(60), || async {
            Ok::<_, RepoError>(2)
        })
        .await
        .expect("compute succeeds");

    let removed = cache.invalidate_tags(&[CacheTag::Articles]);
    assert_eq!(removed, 1);
    assert!(cache.contains(&stats));
    assert!(!cache.contains(&entity));
    assert_eq!(cache.keys_tagged(CacheTag::Articles), 0);
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_their_ttl() {
    let cache = counting_cache();
    let key = CacheKey::singleton(KeyNamespace::StatusCounts);

    let _: u8 = cache
        .get_or_compute(&key, &[CacheTag::Stats], Duration::from_secs(300), || async {
            Ok::<_, RepoError>(1)
        })
        .await
        .expect("compute succeeds");
    assert!(cache.contains(&key));

    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(!cache.contains(&key));
}

#[tokio::test]
async fn concurrent_misses_share_one_computation() {
    let cache = Arc::new(counting_cache());
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::singleton(KeyNamespace::StatusCounts);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let calls = Arc::clone(&calls);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute(&key, &[CacheTag::Stats], Duration::from_secs(60), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, RepoError>(42_u32)
                })
                .await
        }));
    }

    for handle in handles {
        let value = handle.await.expect("task completes").expect("compute succeeds");
        assert_eq!(value, 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn value_computed_across_an_invalidation_is_not_stored() {
    let cache = counting_cache();
    let key = CacheKey::singleton(KeyNamespace::StatusCounts);
    let shared = &cache;

    let value: u8 = cache
        .get_or_compute(&key, &[CacheTag::Stats], Duration::from_secs(60), move || async move {
            shared.invalidate_tags(&[CacheTag::Stats]);
            Ok::<_, RepoError>(9)
        })
        .await
        .expect("compute succeeds");

    assert_eq!(value, 9);
    assert!(!cache.contains(&key));
}

#[tokio::test]
async fn disabled_cache_always_computes() {
    let fixture = Fixture::with_cache(CacheConfig::disabled());
    let article = fixture.seed("dogrudan");

    for _ in 0..2 {
        let view = fixture
            .service
            .find_by_id(article.id, DetailLevel::Summary)
            .await
            .expect("read succeeds");
        assert!(view.is_some());
    }
    assert!(fixture.service.cache().is_empty());
}

#[tokio::test]
async fn created_article_shows_up_in_cached_listing() {
    let fixture = Fixture::new();
    fixture.seed("onceki");

    let before = fixture
        .service
        .list_published(&ListingFilters::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(before.total, 1);

    let mut input = ArticleInput::draft(
        "Yeni bütçe açıklandı",
        "Bütçe detayları",
        fixture.author.id,
        fixture.category.id,
    );
    input.status = ArticleStatus::Published;
    input.editorial_status = EditorialStatus::Published;
    let created = fixture.service.create(input).await.expect("create succeeds");

    let after = fixture
        .service
        .list_published(&ListingFilters::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(after.total, 2);
    assert!(after.items.iter().any(|view| view.article.id == created.article.id));
}

#[tokio::test]
async fn bulk_change_refreshes_entity_and_counts() {
    let fixture = Fixture::new();
    let article = fixture.seed("arsivlenecek");

    let counts = fixture.service.get_status_counts().await.expect("counts");
    assert_eq!(counts.published, 1);
    let view = fixture
        .service
        .find_by_id(article.id, DetailLevel::Summary)
        .await
        .expect("read succeeds")
        .expect("article exists");
    assert_eq!(view.article.status, ArticleStatus::Published);

    let changed = fixture
        .service
        .bulk_archive(&[article.id])
        .await
        .expect("bulk succeeds");
    assert_eq!(changed, 1);

    let counts = fixture.service.get_status_counts().await.expect("counts");
    assert_eq!(counts.published, 0);
    assert_eq!(counts.archived, 1);
    let view = fixture
        .service
        .find_by_id(article.id, DetailLevel::Summary)
        .await
        .expect("read succeeds")
        .expect("article exists");
    assert_eq!(view.article.status, ArticleStatus::Archived);
}

#[tokio::test]
async fn lru_bound_evicts_oldest_entries() {
    let cache = TaggedCache::new(CacheConfig {
        max_entries: 2,
        ..CacheConfig::default()
    });

    for slug in ["bir", "iki", "uc"] {
        let key = CacheKey::article_by_slug(slug, DetailLevel::Summary);
        let _: u8 = cache
            .get_or_compute(&key, &[CacheTag::Articles], Duration::from_secs(60), || async {
                Ok::<_, RepoError>(0)
            })
            .await
            .expect("compute succeeds");
    }

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.keys_tagged(CacheTag::Articles), 2);
    assert!(!cache.contains(&CacheKey::article_by_slug("bir", DetailLevel::Summary)));
}
