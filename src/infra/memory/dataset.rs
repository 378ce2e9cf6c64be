//! Committed state of the in-memory store and view projection.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use uuid::Uuid;

use crate::application::query::{CommentProjection, Projection};
use crate::domain::categories::category_with_children;
use crate::domain::entities::{
    ArticleRecord, ArticleView, AuthorRecord, CategoryRecord, CommentRecord, CommentThread,
    TagRecord,
};
use crate::domain::types::{CommentStatus, MetaEntityType};

pub(crate) type MetaKey = (MetaEntityType, Uuid, String);

#[derive(Debug, Clone, Default)]
pub(crate) struct Dataset {
    pub(crate) articles: HashMap<Uuid, ArticleRecord>,
    pub(crate) categories: HashMap<Uuid, CategoryRecord>,
    pub(crate) tags: HashMap<Uuid, TagRecord>,
    /// `(article_id, tag_id)` association rows.
    pub(crate) article_tags: BTreeSet<(Uuid, Uuid)>,
    pub(crate) authors: HashMap<Uuid, AuthorRecord>,
    pub(crate) comments: Vec<CommentRecord>,
    pub(crate) meta: BTreeMap<MetaKey, serde_json::Value>,
}

impl Dataset {
    pub(crate) fn tag_ids_for(&self, article_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.article_tags
            .range((article_id, Uuid::nil())..=(article_id, Uuid::max()))
            .map(|(_, tag_id)| *tag_id)
    }

    pub(crate) fn has_any_tag(&self, article_id: Uuid, tag_ids: &[Uuid]) -> bool {
        self.tag_ids_for(article_id).any(|id| tag_ids.contains(&id))
    }

    pub(crate) fn tag_by_slug(&self, slug: &str) -> Option<&TagRecord> {
        self.tags.values().find(|tag| tag.slug == slug)
    }

    pub(crate) fn category_by_slug(&self, slug: &str) -> Option<&CategoryRecord> {
        self.categories.values().find(|category| category.slug == slug)
    }

    pub(crate) fn category_scope(&self, slug: &str) -> Vec<Uuid> {
        let Some(root) = self.category_by_slug(slug) else {
            return Vec::new();
        };
        let categories: Vec<CategoryRecord> = self.categories.values().cloned().collect();
        category_with_children(&categories, root.id)
    }

    pub(crate) fn author_by_username(&self, username: &str) -> Option<&AuthorRecord> {
        self.authors.values().find(|author| author.username == username)
    }

    pub(crate) fn remove_article(&mut self, id: Uuid) -> bool {
        if self.articles.remove(&id).is_none() {
            return false;
        }
        self.article_tags.retain(|(article_id, _)| *article_id != id);
        self.comments.retain(|comment| comment.article_id != id);
        self.meta
            .retain(|(entity_type, entity_id, _), _| !(*entity_type == MetaEntityType::Article && *entity_id == id));
        true
    }

    pub(crate) fn project(&self, article: &ArticleRecord, projection: &Projection) -> ArticleView {
        let mut view = ArticleView::bare(article.clone());

        if projection.author {
            view.author = self
                .authors
                .get(&article.author_id)
                .map(|author| author.to_ref(projection.author_bio));
        }
        if projection.editor {
            view.editor = article
                .editor_id
                .and_then(|id| self.authors.get(&id))
                .map(|editor| editor.to_ref(false));
        }
        if projection.category {
            view.category = self.categories.get(&article.category_id).map(|category| {
                let mut reference = category.to_ref();
                if projection.category_parent {
                    reference.parent = category
                        .parent_id
                        .and_then(|id| self.categories.get(&id))
                        .map(|parent| Box::new(parent.to_ref()));
                }
                reference
            });
        }
        if projection.tags {
            let mut tags: Vec<_> = self
                .tag_ids_for(article.id)
                .filter_map(|id| self.tags.get(&id))
                .map(TagRecord::to_ref)
                .collect();
            tags.sort_by(|a, b| a.name.cmp(&b.name));
            view.tags = tags;
        }
        if let Some(comments) = projection.comments {
            view.comments = self.comment_threads(article.id, comments);
        }

        view
    }

    fn comment_threads(&self, article_id: Uuid, projection: CommentProjection) -> Vec<CommentThread> {
        let approved = |comment: &&CommentRecord| {
            comment.article_id == article_id && comment.status == CommentStatus::Approved
        };

        let mut top: Vec<&CommentRecord> = self
            .comments
            .iter()
            .filter(approved)
            .filter(|comment| comment.parent_id.is_none())
            .collect();
        top.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        top.truncate(projection.limit as usize);

        top.into_iter()
            .map(|comment| {
                let replies = if projection.with_replies {
                    let mut replies: Vec<&CommentRecord> = self
                        .comments
                        .iter()
                        .filter(approved)
                        .filter(|reply| reply.parent_id == Some(comment.id))
                        .collect();
                    replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                    replies.into_iter().map(|reply| self.thread(reply, Vec::new())).collect()
                } else {
                    Vec::new()
                };
                self.thread(comment, replies)
            })
            .collect()
    }

    fn thread(&self, comment: &CommentRecord, replies: Vec<CommentThread>) -> CommentThread {
        CommentThread {
            comment: comment.clone(),
            author: self.authors.get(&comment.user_id).map(|user| user.to_ref(false)),
            replies,
        }
    }
}
