use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::application::repos::{ArticleTransaction, ArticleWrite, RepoError};
use crate::cache::lock::rw_write;
use crate::domain::entities::{ArticleMetrics, ArticleRecord, MetaEntry, TagRecord};
use crate::domain::slug::derive_slug;

use super::Shared;
use super::dataset::Dataset;

/// Copy-on-write transaction: changes land in a private copy of the
/// committed dataset, published in one swap on commit. The writer gate is
/// held until the transaction ends.
pub(crate) struct MemoryTransaction {
    shared: Arc<Shared>,
    working: Dataset,
    _gate: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    pub(crate) fn new(shared: Arc<Shared>, working: Dataset, gate: OwnedMutexGuard<()>) -> Self {
        Self {
            shared,
            working,
            _gate: gate,
        }
    }

    fn check_references(&self, write: &ArticleWrite) -> Result<(), RepoError> {
        if !self.working.authors.contains_key(&write.author_id) {
            return Err(RepoError::integrity("author does not exist"));
        }
        if write
            .editor_id
            .is_some_and(|editor_id| !self.working.authors.contains_key(&editor_id))
        {
            return Err(RepoError::integrity("editor does not exist"));
        }
        if !self.working.categories.contains_key(&write.category_id) {
            return Err(RepoError::integrity("category does not exist"));
        }
        Ok(())
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.working
            .articles
            .values()
            .any(|article| article.slug == slug && Some(article.id) != except)
    }
}

fn apply_write(article: &mut ArticleRecord, write: &ArticleWrite) {
    article.title = write.title.clone();
    article.slug = write.slug.clone();
    article.content = write.content.clone();
    article.excerpt = write.excerpt.clone();
    article.article_type = write.article_type.clone();
    article.status = write.status;
    article.editorial_status = write.editorial_status;
    article.published_at = write.published_at;
    article.author_id = write.author_id;
    article.editor_id = write.editor_id;
    article.category_id = write.category_id;
    article.reading_time = write.reading_time;
    article.flags = write.flags;
}

#[async_trait]
impl ArticleTransaction for MemoryTransaction {
    async fn slug_exists(&mut self, slug: &str) -> Result<bool, RepoError> {
        Ok(self.slug_taken(slug, None))
    }

    async fn find_article(&mut self, id: Uuid) -> Result<Option<ArticleRecord>, RepoError> {
        Ok(self.working.articles.get(&id).cloned())
    }

    async fn insert_article(&mut self, write: &ArticleWrite) -> Result<ArticleRecord, RepoError> {
        self.check_references(write)?;
        if self.slug_taken(&write.slug, None) {
            return Err(RepoError::Duplicate {
                constraint: "articles_slug_key".to_string(),
            });
        }

        let now = self.shared.clock.now();
        let mut article = ArticleRecord {
            id: Uuid::new_v4(),
            title: String::new(),
            slug: String::new(),
            content: String::new(),
            excerpt: String::new(),
            article_type: String::new(),
            status: write.status,
            editorial_status: write.editorial_status,
            published_at: None,
            author_id: write.author_id,
            editor_id: None,
            category_id: write.category_id,
            reading_time: 0,
            flags: write.flags,
            metrics: ArticleMetrics::default(),
            created_at: now,
            updated_at: now,
        };
        apply_write(&mut article, write);
        self.working.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update_article(
        &mut self,
        id: Uuid,
        write: &ArticleWrite,
    ) -> Result<ArticleRecord, RepoError> {
        self.check_references(write)?;
        if self.slug_taken(&write.slug, Some(id)) {
            return Err(RepoError::Duplicate {
                constraint: "articles_slug_key".to_string(),
            });
        }

        let now = self.shared.clock.now();
        let article = self.working.articles.get_mut(&id).ok_or(RepoError::NotFound)?;
        apply_write(article, write);
        article.updated_at = now;
        Ok(article.clone())
    }

    async fn find_tag(&mut self, id: Uuid) -> Result<Option<TagRecord>, RepoError> {
        Ok(self.working.tags.get(&id).cloned())
    }

    async fn find_or_create_tag(&mut self, name: &str) -> Result<TagRecord, RepoError> {
        let slug = derive_slug(name).map_err(|err| RepoError::InvalidInput {
            message: err.to_string(),
        })?;
        if let Some(tag) = self.working.tag_by_slug(&slug) {
            return Ok(tag.clone());
        }

        let tag = TagRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug,
            color: None,
            description: None,
        };
        self.working.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn replace_article_tags(
        &mut self,
        article_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), RepoError> {
        if !self.working.articles.contains_key(&article_id) {
            return Err(RepoError::NotFound);
        }
        if let Some(missing) = tag_ids.iter().find(|id| !self.working.tags.contains_key(*id)) {
            return Err(RepoError::integrity(format!("tag {missing} does not exist")));
        }

        self.working
            .article_tags
            .retain(|(article, _)| *article != article_id);
        self.working
            .article_tags
            .extend(tag_ids.iter().map(|tag_id| (article_id, *tag_id)));
        Ok(())
    }

    async fn set_meta(&mut self, entry: &MetaEntry) -> Result<(), RepoError> {
        if entry.key.trim().is_empty() {
            return Err(RepoError::InvalidInput {
                message: "metadata key must not be empty".to_string(),
            });
        }
        self.working.meta.insert(
            (entry.entity_type, entry.entity_id, entry.key.clone()),
            entry.value.clone(),
        );
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let this = *self;
        *rw_write(&this.shared.data, "infra::memory", "commit") = this.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        Ok(())
    }
}
