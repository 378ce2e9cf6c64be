mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Fixture;
use newsdesk::application::articles::{ArticleInput, ArticleServiceError, TagInput};
use newsdesk::application::query::{DetailLevel, QueryComposer, RankingSettings};
use newsdesk::application::repos::{
    ArticleTransaction, ArticleWrite, ArticlesRepo, ArticlesWriteRepo, RepoError,
};
use newsdesk::cache::{CacheConfig, CacheKey, CacheTag, TaggedCache};
use newsdesk::domain::articles::BulkTransition;
use newsdesk::domain::entities::{ArticleRecord, ArticleView, MetaEntry, TagRecord};
use newsdesk::domain::error::DomainError;
use newsdesk::domain::types::{ArticleStatus, EditorialStatus, MetaEntityType};
use newsdesk::infra::memory::{Clock, MemoryRepositories};
use serde_json::json;
use uuid::Uuid;

/// Delegates to the memory adapter, but every metadata upsert fails.
struct FailingMetaRepo {
    inner: MemoryRepositories,
}

#[async_trait]
impl ArticlesWriteRepo for FailingMetaRepo {
    async fn begin(&self) -> Result<Box<dyn ArticleTransaction>, RepoError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FailingMetaTransaction { inner }))
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool, RepoError> {
        self.inner.delete_article(id).await
    }

    async fn apply_bulk(&self, transition: BulkTransition, ids: &[Uuid]) -> Result<u64, RepoError> {
        self.inner.apply_bulk(transition, ids).await
    }
}

struct FailingMetaTransaction {
    inner: Box<dyn ArticleTransaction>,
}

#[async_trait]
impl ArticleTransaction for FailingMetaTransaction {
    async fn slug_exists(&mut self, slug: &str) -> Result<bool, RepoError> {
        self.inner.slug_exists(slug).await
    }

    async fn find_article(&mut self, id: Uuid) -> Result<Option<ArticleRecord>, RepoError> {
        self.inner.find_article(id).await
    }

    async fn insert_article(&mut self, write: &ArticleWrite) -> Result<ArticleRecord, RepoError> {
        self.inner.insert_article(write).await
    }

    async fn update_article(
        &mut self,
        id: Uuid,
        write: &ArticleWrite,
    ) -> Result<ArticleRecord, RepoError> {
        self.inner.update_article(id, write).await
    }

    async fn find_tag(&mut self, id: Uuid) -> Result<Option<TagRecord>, RepoError> {
        self.inner.find_tag(id).await
    }

    async fn find_or_create_tag(&mut self, name: &str) -> Result<TagRecord, RepoError> {
        self.inner.find_or_create_tag(name).await
    }

    async fn replace_article_tags(
        &mut self,
        article_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), RepoError> {
        self.inner.replace_article_tags(article_id, tag_ids).await
    }

    async fn set_meta(&mut self, _entry: &MetaEntry) -> Result<(), RepoError> {
        Err(RepoError::from_persistence("metadata store unavailable"))
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.inner.rollback().await
    }
}

/// Fills the entity cache from the store right before the row is removed,
/// the way a concurrent reader would.
struct ReadDuringDeleteRepo {
    inner: MemoryRepositories,
    cache: Arc<TaggedCache>,
    composer: QueryComposer,
}

#[async_trait]
impl ArticlesWriteRepo for ReadDuringDeleteRepo {
    async fn begin(&self) -> Result<Box<dyn ArticleTransaction>, RepoError> {
        self.inner.begin().await
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool, RepoError> {
        let plan = self.composer.plan_by_id(id, DetailLevel::Full);
        let reader = &self.inner;
        let _: Option<ArticleView> = self
            .cache
            .get_or_compute(
                &CacheKey::article_by_id(id, DetailLevel::Full),
                &[CacheTag::Articles],
                Duration::from_secs(3600),
                move || async move { reader.fetch_one(&plan).await },
            )
            .await?;
        self.inner.delete_article(id).await
    }

    async fn apply_bulk(&self, transition: BulkTransition, ids: &[Uuid]) -> Result<u64, RepoError> {
        self.inner.apply_bulk(transition, ids).await
    }
}

fn input(fixture: &Fixture, title: &str) -> ArticleInput {
    ArticleInput::draft(title, "Haber metni", fixture.author.id, fixture.category.id)
}

#[tokio::test]
async fn failed_metadata_upsert_rolls_back_the_whole_write() {
    let repos = MemoryRepositories::new(Clock::System);
    let writer: Arc<dyn ArticlesWriteRepo> = Arc::new(FailingMetaRepo {
        inner: repos.clone(),
    });
    let fixture = Fixture::with_writer(repos, writer);
    let existing_tag = fixture.add_tag("ekonomi");

    let mut request = input(&fixture, "Enflasyon rakamları açıklandı");
    request.tags = vec![
        TagInput::Id(existing_tag.id),
        TagInput::Name("Enflasyon".to_string()),
    ];
    request.meta = BTreeMap::from([("source".to_string(), json!("ajans"))]);

    let err = fixture
        .service
        .create(request)
        .await
        .expect_err("metadata failure aborts the write");
    assert!(matches!(
        err,
        ArticleServiceError::Repo(RepoError::Persistence(_))
    ));

    assert_eq!(fixture.repos.article_count(), 0);
    assert_eq!(fixture.repos.association_count(), 0);
    assert_eq!(fixture.repos.meta_count(), 0);
    // The tag created by name inside the transaction is gone too.
    assert_eq!(fixture.repos.tag_count(), 1);

    // The writer gate was released by the rollback.
    let mut plain = input(&fixture, "Yeni deneme");
    plain.meta.clear();
    let created = fixture.service.create(plain).await.expect("create succeeds");
    assert_eq!(fixture.repos.article_count(), 1);
    assert_eq!(created.article.slug, "yeni-deneme");
}

#[tokio::test]
async fn create_syncs_tags_and_metadata() {
    let fixture = Fixture::new();
    let existing = fixture.add_tag("enflasyon");

    let mut request = input(&fixture, "Faiz Kararı");
    request.tags = vec![
        TagInput::Name("Enflasyon".to_string()),
        TagInput::Name("Merkez Bankası".to_string()),
        TagInput::Id(existing.id),
        TagInput::Name("  ".to_string()),
    ];
    request.meta = BTreeMap::from([
        ("source".to_string(), json!("ajans")),
        ("priority".to_string(), json!(2)),
    ]);

    let created = fixture.service.create(request).await.expect("create succeeds");

    assert_eq!(created.article.slug, "faiz-karari");
    assert_eq!(created.article.article_type, "news");
    let mut tag_slugs: Vec<&str> = created.tags.iter().map(|tag| tag.slug.as_str()).collect();
    tag_slugs.sort_unstable();
    assert_eq!(tag_slugs, vec!["enflasyon", "merkez-bankasi"]);
    assert_eq!(fixture.repos.tag_count(), 2);

    let reader: &dyn ArticlesRepo = &fixture.repos;
    let meta = reader
        .list_meta(MetaEntityType::Article, created.article.id)
        .await
        .expect("meta read succeeds");
    assert_eq!(meta.len(), 2);
    assert!(meta
        .iter()
        .any(|entry| entry.key == "source" && entry.value == json!("ajans")));
}

#[tokio::test]
async fn generated_slugs_get_numeric_suffixes() {
    let fixture = Fixture::new();

    let first = fixture
        .service
        .create(input(&fixture, "Seçim Sonuçları"))
        .await
        .expect("create succeeds");
    let second = fixture
        .service
        .create(input(&fixture, "Seçim Sonuçları"))
        .await
        .expect("create succeeds");

    assert_eq!(first.article.slug, "secim-sonuclari");
    assert_eq!(second.article.slug, "secim-sonuclari-2");
}

#[tokio::test]
async fn explicit_duplicate_slug_is_rejected() {
    let fixture = Fixture::new();
    fixture.seed("manset");

    let mut request = input(&fixture, "Başka başlık");
    request.slug = Some("manset".to_string());

    let err = fixture
        .service
        .create(request)
        .await
        .expect_err("slug is taken");
    assert!(matches!(
        err,
        ArticleServiceError::Domain(DomainError::Validation { field: "slug", .. })
    ));
    assert_eq!(fixture.repos.article_count(), 1);
}

#[tokio::test]
async fn unknown_category_is_an_integrity_failure() {
    let fixture = Fixture::new();
    let mut request = input(&fixture, "Kategorisiz");
    request.category_id = Uuid::new_v4();

    let err = fixture
        .service
        .create(request)
        .await
        .expect_err("category is missing");
    assert!(matches!(
        err,
        ArticleServiceError::Repo(RepoError::Integrity { .. })
    ));
    assert_eq!(fixture.repos.article_count(), 0);
}

#[tokio::test]
async fn blank_title_is_rejected_before_any_write() {
    let fixture = Fixture::new();
    let err = fixture
        .service
        .create(input(&fixture, "   "))
        .await
        .expect_err("title is required");
    assert!(matches!(err, ArticleServiceError::Domain(_)));
    assert_eq!(fixture.repos.article_count(), 0);
}

#[tokio::test]
async fn update_keeps_slug_and_replaces_tags() {
    let fixture = Fixture::new();
    let first_tag = fixture.add_tag("ilk");

    let mut request = input(&fixture, "Asıl başlık");
    request.tags = vec![TagInput::Id(first_tag.id)];
    let created = fixture.service.create(request).await.expect("create succeeds");

    // Warm the entity cache so the update has something to purge.
    fixture
        .service
        .find_by_slug(&created.article.slug, DetailLevel::Summary)
        .await
        .expect("read succeeds");

    let mut change = input(&fixture, "Düzeltilmiş başlık");
    change.slug = Some("yok-sayilir".to_string());
    change.tags = vec![TagInput::Name("ikinci".to_string())];
    let updated = fixture
        .service
        .update(created.article.id, change)
        .await
        .expect("update succeeds");

    assert_eq!(updated.article.slug, "asil-baslik");
    assert_eq!(updated.article.title, "Düzeltilmiş başlık");
    let slugs: Vec<&str> = updated.tags.iter().map(|tag| tag.slug.as_str()).collect();
    assert_eq!(slugs, vec!["ikinci"]);

    let cached = fixture
        .service
        .find_by_slug("asil-baslik", DetailLevel::Summary)
        .await
        .expect("read succeeds")
        .expect("article exists");
    assert_eq!(cached.article.title, "Düzeltilmiş başlık");
}

#[tokio::test]
async fn update_of_missing_article_is_not_found() {
    let fixture = Fixture::new();
    let err = fixture
        .service
        .update(Uuid::new_v4(), input(&fixture, "Hayalet"))
        .await
        .expect_err("article is missing");
    assert!(matches!(
        err,
        ArticleServiceError::Domain(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn bulk_publish_touches_only_approved_articles() {
    let fixture = Fixture::new();

    let mut ids = Vec::new();
    let mut approved = Vec::new();
    for (index, editorial) in [
        EditorialStatus::Approved,
        EditorialStatus::Draft,
        EditorialStatus::Approved,
        EditorialStatus::PendingReview,
        EditorialStatus::Approved,
    ]
    .into_iter()
    .enumerate()
    {
        let mut article = fixture.published(&format!("toplu-{index}"));
        article.status = ArticleStatus::Draft;
        article.editorial_status = editorial;
        article.published_at = None;
        let article = fixture.insert(article, &[]);
        if editorial == EditorialStatus::Approved {
            approved.push(article.id);
        }
        ids.push(article.id);
    }
    ids.push(Uuid::new_v4());

    let changed = fixture
        .service
        .bulk_publish(&ids)
        .await
        .expect("bulk succeeds");
    assert_eq!(changed, approved.len() as u64);

    for id in &ids[..5] {
        let article = fixture.repos.article(*id).expect("article exists");
        if approved.contains(id) {
            assert_eq!(article.status, ArticleStatus::Published);
            assert_eq!(article.editorial_status, EditorialStatus::Published);
            assert!(article.published_at.is_some());
        } else {
            assert_eq!(article.status, ArticleStatus::Draft);
            assert!(article.published_at.is_none());
        }
    }

    // Running it again finds nothing left in the approved state.
    let again = fixture
        .service
        .bulk_publish(&ids)
        .await
        .expect("bulk succeeds");
    assert_eq!(again, 0);
}

#[tokio::test]
async fn bulk_feature_and_unpublish_respect_preconditions() {
    let fixture = Fixture::new();
    let live = fixture.seed("canli");
    let mut featured = fixture.published("zaten-one-cikan");
    featured.flags.is_featured = true;
    let featured = fixture.insert(featured, &[]);
    let mut draft = fixture.published("taslak");
    draft.status = ArticleStatus::Draft;
    let draft = fixture.insert(draft, &[]);

    let changed = fixture
        .service
        .bulk_feature(&[live.id, featured.id, draft.id, live.id])
        .await
        .expect("bulk succeeds");
    assert_eq!(changed, 1);

    let changed = fixture
        .service
        .bulk_unpublish(&[live.id, featured.id, draft.id])
        .await
        .expect("bulk succeeds");
    assert_eq!(changed, 2);
    let unpublished = fixture.repos.article(live.id).expect("article exists");
    assert_eq!(unpublished.status, ArticleStatus::Draft);
    assert_eq!(unpublished.editorial_status, EditorialStatus::Approved);
}

#[tokio::test]
async fn delete_removes_row_and_cached_lookups() {
    let fixture = Fixture::new();
    let tag = fixture.add_tag("silinecek");
    let article = fixture.insert(fixture.published("gecici"), &[tag.id]);

    fixture
        .service
        .find_by_id(article.id, DetailLevel::Full)
        .await
        .expect("read succeeds");
    let key = CacheKey::article_by_id(article.id, DetailLevel::Full);
    assert!(fixture.service.cache().contains(&key));

    let deleted = fixture.service.delete(&article).await.expect("delete succeeds");
    assert!(deleted);
    assert!(!fixture.service.cache().contains(&key));
    assert_eq!(fixture.service.cache().keys_tagged(CacheTag::Articles), 0);
    assert_eq!(fixture.repos.article_count(), 0);
    assert_eq!(fixture.repos.association_count(), 0);

    let again = fixture.service.delete(&article).await.expect("delete succeeds");
    assert!(!again);
}

#[tokio::test]
async fn read_racing_a_delete_is_not_served_afterwards() {
    let repos = MemoryRepositories::new(Clock::System);
    let cache = Arc::new(TaggedCache::new(CacheConfig::default()));
    let writer: Arc<dyn ArticlesWriteRepo> = Arc::new(ReadDuringDeleteRepo {
        inner: repos.clone(),
        cache: Arc::clone(&cache),
        composer: QueryComposer::new(RankingSettings::default()),
    });
    let fixture = Fixture::with_shared_cache(repos, writer, cache);
    let article = fixture.seed("yarisan-okuma");

    let deleted = fixture.service.delete(&article).await.expect("delete succeeds");
    assert!(deleted);
    assert_eq!(fixture.repos.article_count(), 0);

    let key = CacheKey::article_by_id(article.id, DetailLevel::Full);
    assert!(!fixture.service.cache().contains(&key));
    let view = fixture
        .service
        .find_by_id(article.id, DetailLevel::Full)
        .await
        .expect("read succeeds");
    assert!(view.is_none());
}
