//! Coordinated writes.
//!
//! Create and update run the row write, tag sync and metadata upserts in one
//! transaction. Invalidation follows the commit; the caller then gets the
//! article re-read with its relations.

use std::collections::BTreeSet;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::query::DetailLevel;
use crate::application::repos::{ArticleTransaction, ArticleWrite, RepoError};
use crate::domain::articles::{BulkTransition, reading_time_minutes, resolve_publication};
use crate::domain::entities::{ArticleRecord, ArticleView, MetaEntry};
use crate::domain::error::DomainError;
use crate::domain::slug::{SlugError, derive_slug, slug_candidates};
use crate::domain::types::MetaEntityType;

use super::service::ArticleService;
use super::types::{
    ArticleInput, ArticleServiceError, DEFAULT_ARTICLE_TYPE, TagInput, ensure_non_empty,
};

impl ArticleService {
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create(&self, input: ArticleInput) -> Result<ArticleView, ArticleServiceError> {
        validate(&input)?;

        let mut tx = self.writer.begin().await?;
        let article = match write_article(tx.as_mut(), None, &input).await {
            Ok(article) => article,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;

        info!(article_id = %article.id, slug = %article.slug, "Article created");
        self.invalidator.article_upserted(article.id, &article.slug);
        self.reload(article.id).await
    }

    #[instrument(skip(self, input), fields(article_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        input: ArticleInput,
    ) -> Result<ArticleView, ArticleServiceError> {
        validate(&input)?;

        let mut tx = self.writer.begin().await?;
        let existing = match tx.find_article(id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => return Err(abort(tx, DomainError::not_found("article").into()).await),
            Err(err) => return Err(abort(tx, err.into()).await),
        };
        let article = match write_article(tx.as_mut(), Some(&existing), &input).await {
            Ok(article) => article,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;

        info!(article_id = %article.id, "Article updated");
        self.invalidator.article_upserted(article.id, &article.slug);
        self.reload(article.id).await
    }

    /// Invalidate, delete, then invalidate again so a read that raced the
    /// delete cannot leave the removed row cached. Returns whether a row was
    /// removed.
    #[instrument(skip(self, article), fields(article_id = %article.id))]
    pub async fn delete(&self, article: &ArticleRecord) -> Result<bool, ArticleServiceError> {
        self.invalidator.article_deleted(article.id, &article.slug);
        let deleted = self.writer.delete_article(article.id).await?;
        if deleted {
            self.invalidator.article_deleted(article.id, &article.slug);
        }
        info!(deleted, "Article delete processed");
        Ok(deleted)
    }

    pub async fn bulk_publish(&self, ids: &[Uuid]) -> Result<u64, ArticleServiceError> {
        self.bulk(BulkTransition::Publish, ids).await
    }

    pub async fn bulk_unpublish(&self, ids: &[Uuid]) -> Result<u64, ArticleServiceError> {
        self.bulk(BulkTransition::Unpublish, ids).await
    }

    pub async fn bulk_feature(&self, ids: &[Uuid]) -> Result<u64, ArticleServiceError> {
        self.bulk(BulkTransition::Feature, ids).await
    }

    pub async fn bulk_archive(&self, ids: &[Uuid]) -> Result<u64, ArticleServiceError> {
        self.bulk(BulkTransition::Archive, ids).await
    }

    #[instrument(skip_all, fields(transition = transition.as_str(), requested = ids.len()))]
    async fn bulk(&self, transition: BulkTransition, ids: &[Uuid]) -> Result<u64, ArticleServiceError> {
        let mut unique: Vec<Uuid> = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let changed = self.writer.apply_bulk(transition, &unique).await?;
        self.invalidator.articles_bulk_changed(transition, &unique);
        info!(changed, "Bulk transition applied");
        Ok(changed)
    }

    async fn reload(&self, id: Uuid) -> Result<ArticleView, ArticleServiceError> {
        self.find_by_id(id, DetailLevel::Full)
            .await?
            .ok_or_else(|| RepoError::from_persistence("article missing after commit").into())
    }
}

fn validate(input: &ArticleInput) -> Result<(), ArticleServiceError> {
    ensure_non_empty(&input.title, "title")?;
    ensure_non_empty(&input.content, "content")?;
    for key in input.meta.keys() {
        ensure_non_empty(key, "meta")?;
    }
    Ok(())
}

/// Roll back and hand back the error that caused it.
async fn abort(tx: Box<dyn ArticleTransaction>, err: ArticleServiceError) -> ArticleServiceError {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, "Rollback failed; transaction is discarded on drop");
    }
    warn!(error = %err, "Article write rolled back");
    err
}

async fn write_article(
    tx: &mut dyn ArticleTransaction,
    existing: Option<&ArticleRecord>,
    input: &ArticleInput,
) -> Result<ArticleRecord, ArticleServiceError> {
    let now = OffsetDateTime::now_utc();
    let slug = match existing {
        Some(existing) => existing.slug.clone(),
        None => unique_slug(tx, input).await?,
    };

    let published_at = match existing {
        Some(existing) if input.published_at.is_none() => {
            resolve_publication(input.status, existing.published_at, now)?
        }
        _ => resolve_publication(input.status, input.published_at, now)?,
    };

    let write = ArticleWrite {
        title: input.title.trim().to_string(),
        slug,
        content: input.content.clone(),
        excerpt: input.excerpt.trim().to_string(),
        article_type: input
            .article_type
            .as_deref()
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .unwrap_or(DEFAULT_ARTICLE_TYPE)
            .to_lowercase(),
        status: input.status,
        editorial_status: input.editorial_status,
        published_at,
        author_id: input.author_id,
        editor_id: input.editor_id,
        category_id: input.category_id,
        reading_time: reading_time_minutes(&input.content),
        flags: input.flags,
    };

    let article = match existing {
        Some(existing) => tx.update_article(existing.id, &write).await?,
        None => tx.insert_article(&write).await?,
    };

    let tag_ids = resolve_tags(tx, &input.tags).await?;
    tx.replace_article_tags(article.id, &tag_ids).await?;

    for (key, value) in &input.meta {
        tx.set_meta(&MetaEntry {
            entity_type: MetaEntityType::Article,
            entity_id: article.id,
            key: key.clone(),
            value: value.clone(),
        })
        .await?;
    }

    Ok(article)
}

async fn unique_slug(
    tx: &mut dyn ArticleTransaction,
    input: &ArticleInput,
) -> Result<String, ArticleServiceError> {
    let explicit = input.slug.as_deref().filter(|slug| !slug.trim().is_empty());
    let base = derive_slug(explicit.unwrap_or(input.title.as_str())).map_err(slug_error)?;

    if explicit.is_some() {
        if tx.slug_exists(&base).await? {
            return Err(DomainError::validation("slug", format!("`{base}` is already in use")).into());
        }
        return Ok(base);
    }

    for candidate in slug_candidates(&base) {
        if !tx.slug_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(slug_error(SlugError::Exhausted { base }))
}

fn slug_error(err: SlugError) -> ArticleServiceError {
    DomainError::validation("slug", err.to_string()).into()
}

/// Existing ids are checked, names are found or created; the result is
/// deduplicated.
async fn resolve_tags(
    tx: &mut dyn ArticleTransaction,
    inputs: &[TagInput],
) -> Result<Vec<Uuid>, ArticleServiceError> {
    let mut ids = BTreeSet::new();
    for input in inputs {
        let id = match input {
            TagInput::Id(id) => match tx.find_tag(*id).await? {
                Some(tag) => tag.id,
                None => return Err(DomainError::not_found("tag").into()),
            },
            TagInput::Name(name) => {
                if name.trim().is_empty() {
                    continue;
                }
                tx.find_or_create_tag(name.trim()).await?.id
            }
        };
        ids.insert(id);
    }
    Ok(ids.into_iter().collect())
}
