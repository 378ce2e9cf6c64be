use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{
    ArticleTransaction, ArticleWrite, ArticlesWriteRepo, RepoError,
};
use crate::domain::articles::BulkTransition;
use crate::domain::entities::{ArticleRecord, MetaEntry, TagRecord};
use crate::domain::slug::derive_slug;
use crate::domain::types::MetaEntityType;

use super::PostgresRepositories;
use super::rows::{ARTICLE_COLUMNS, ArticleRow, TagRow};
use super::util::map_sqlx_error;

const TAG_COLUMNS: &str = "id, name, slug, color, description";

/// `SET` clause and precondition for each bulk transition.
fn bulk_statement(transition: BulkTransition) -> &'static str {
    match transition {
        BulkTransition::Publish => {
            "UPDATE articles \
             SET status = 'published'::article_status, \
                 editorial_status = 'published'::editorial_status, \
                 published_at = COALESCE(published_at, now()), \
                 updated_at = now() \
             WHERE id = ANY($1) AND editorial_status = 'approved'::editorial_status"
        }
        BulkTransition::Unpublish => {
            "UPDATE articles \
             SET status = 'draft'::article_status, \
                 editorial_status = 'approved'::editorial_status, \
                 updated_at = now() \
             WHERE id = ANY($1) AND status = 'published'::article_status"
        }
        BulkTransition::Feature => {
            "UPDATE articles \
             SET is_featured = TRUE, updated_at = now() \
             WHERE id = ANY($1) AND status = 'published'::article_status AND NOT is_featured"
        }
        BulkTransition::Archive => {
            "UPDATE articles \
             SET status = 'archived'::article_status, \
                 editorial_status = 'archived'::editorial_status, \
                 updated_at = now() \
             WHERE id = ANY($1) AND status <> 'archived'::article_status"
        }
    }
}

#[async_trait]
impl ArticlesWriteRepo for PostgresRepositories {
    async fn begin(&self) -> Result<Box<dyn ArticleTransaction>, RepoError> {
        let tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgArticleTransaction { tx }))
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM entity_meta WHERE entity_type = $1 AND entity_id = $2")
            .bind(MetaEntityType::Article.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_bulk(&self, transition: BulkTransition, ids: &[Uuid]) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(bulk_statement(transition))
            .bind(ids)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        debug!(
            transition = transition.as_str(),
            changed = result.rows_affected(),
            "Bulk statement executed"
        );
        Ok(result.rows_affected())
    }
}

/// Wraps one `sqlx` transaction. Dropping it without commit rolls back.
pub(crate) struct PgArticleTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ArticleTransaction for PgArticleTransaction {
    async fn slug_exists(&mut self, slug: &str) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM articles WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_article(&mut self, id: Uuid) -> Result<Option<ArticleRecord>, RepoError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(ArticleRecord::from))
    }

    async fn insert_article(&mut self, write: &ArticleWrite) -> Result<ArticleRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "INSERT INTO articles AS a ( \
                 id, title, slug, content, excerpt, type, status, editorial_status, \
                 published_at, author_id, editor_id, category_id, reading_time, \
                 is_featured, is_breaking, is_editors_pick, is_sponsored, is_premium, \
                 allow_comments, created_at, updated_at \
             ) VALUES ( \
                 $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                 $14, $15, $16, $17, $18, $19, $20, $20 \
             ) \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&write.title)
            .bind(&write.slug)
            .bind(&write.content)
            .bind(&write.excerpt)
            .bind(&write.article_type)
            .bind(write.status)
            .bind(write.editorial_status)
            .bind(write.published_at)
            .bind(write.author_id)
            .bind(write.editor_id)
            .bind(write.category_id)
            .bind(write.reading_time)
            .bind(write.flags.is_featured)
            .bind(write.flags.is_breaking)
            .bind(write.flags.is_editors_pick)
            .bind(write.flags.is_sponsored)
            .bind(write.flags.is_premium)
            .bind(write.flags.allow_comments)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_article(
        &mut self,
        id: Uuid,
        write: &ArticleWrite,
    ) -> Result<ArticleRecord, RepoError> {
        let sql = format!(
            "UPDATE articles AS a \
             SET title = $2, slug = $3, content = $4, excerpt = $5, type = $6, \
                 status = $7, editorial_status = $8, published_at = $9, \
                 author_id = $10, editor_id = $11, category_id = $12, reading_time = $13, \
                 is_featured = $14, is_breaking = $15, is_editors_pick = $16, \
                 is_sponsored = $17, is_premium = $18, allow_comments = $19, \
                 updated_at = $20 \
             WHERE a.id = $1 \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .bind(&write.title)
            .bind(&write.slug)
            .bind(&write.content)
            .bind(&write.excerpt)
            .bind(&write.article_type)
            .bind(write.status)
            .bind(write.editorial_status)
            .bind(write.published_at)
            .bind(write.author_id)
            .bind(write.editor_id)
            .bind(write.category_id)
            .bind(write.reading_time)
            .bind(write.flags.is_featured)
            .bind(write.flags.is_breaking)
            .bind(write.flags.is_editors_pick)
            .bind(write.flags.is_sponsored)
            .bind(write.flags.is_premium)
            .bind(write.flags.allow_comments)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_tag(&mut self, id: Uuid) -> Result<Option<TagRecord>, RepoError> {
        let sql = format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = $1");
        let row = sqlx::query_as::<_, TagRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(TagRecord::from))
    }

    async fn find_or_create_tag(&mut self, name: &str) -> Result<TagRecord, RepoError> {
        let slug = derive_slug(name).map_err(|err| RepoError::InvalidInput {
            message: err.to_string(),
        })?;
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sql = format!(
            "INSERT INTO tags (id, name, slug) VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug \
             RETURNING {TAG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TagRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(slug)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn replace_article_tags(
        &mut self,
        article_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM article_tag WHERE article_id = $1")
            .bind(article_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if tag_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO article_tag (article_id, tag_id) \
             SELECT $1, tag_id FROM UNNEST($2::uuid[]) AS tag_id",
        )
        .bind(article_id)
        .bind(tag_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn set_meta(&mut self, entry: &MetaEntry) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO entity_meta (entity_type, entity_id, key, value) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (entity_type, entity_id, key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(&entry.key)
        .bind(&entry.value)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}
