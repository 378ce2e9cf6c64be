use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::application::pagination::Page;
use crate::application::query::{AnalyticsPlan, ArticlePlan, CommentProjection, Projection};
use crate::application::repos::{ArticlesRepo, RepoError};
use crate::domain::analytics::{AnalyticsSummary, AnalyticsTotals, StatusCounts};
use crate::domain::entities::{
    ArticleRecord, ArticleView, AuthorRecord, CategoryRecord, CommentRecord, CommentThread,
    MetaEntry, TagRef, TagRecord,
};
use crate::domain::types::MetaEntityType;

use super::PostgresRepositories;
use super::render::{push_order, push_predicates};
use super::rows::{
    ARTICLE_COLUMNS, ArticleRow, ArticleTagRow, AuthorCountRow, AuthorRow, CategoryCountRow,
    CategoryRow, CommentRow, DailyRow, StatusCountsRow, TotalsRow, non_negative,
};
use super::util::map_sqlx_error;

/// Related rows fetched in batches for a set of articles.
#[derive(Default)]
struct Relations {
    authors: HashMap<Uuid, AuthorRecord>,
    categories: HashMap<Uuid, CategoryRecord>,
    tags: HashMap<Uuid, Vec<TagRef>>,
    comments: HashMap<Uuid, Vec<CommentRecord>>,
    replies: HashMap<Uuid, Vec<CommentRecord>>,
}

impl PostgresRepositories {
    async fn fetch_articles(
        &self,
        plan: &ArticlePlan,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ArticleRecord>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(ARTICLE_COLUMNS);
        qb.push(" FROM articles a WHERE TRUE");
        push_predicates(&mut qb, &plan.predicates);
        push_order(&mut qb, &plan.order);
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let rows = qb
            .build_query_as::<ArticleRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(ArticleRecord::from).collect())
    }

    async fn count_articles(&self, plan: &ArticlePlan) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM articles a WHERE TRUE");
        push_predicates(&mut qb, &plan.predicates);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn load_relations(
        &self,
        articles: &[ArticleRecord],
        projection: &Projection,
    ) -> Result<Relations, RepoError> {
        let mut relations = Relations::default();
        if articles.is_empty() {
            return Ok(relations);
        }
        let article_ids: Vec<Uuid> = articles.iter().map(|a| a.id).collect();

        let mut user_ids: HashSet<Uuid> = HashSet::new();
        if projection.author {
            user_ids.extend(articles.iter().map(|a| a.author_id));
        }
        if projection.editor {
            user_ids.extend(articles.iter().filter_map(|a| a.editor_id));
        }

        if let Some(comments) = projection.comments {
            self.load_comments(&article_ids, comments, &mut relations)
                .await?;
            user_ids.extend(
                relations
                    .comments
                    .values()
                    .chain(relations.replies.values())
                    .flatten()
                    .map(|comment| comment.user_id),
            );
        }

        if !user_ids.is_empty() {
            let ids: Vec<Uuid> = user_ids.into_iter().collect();
            let rows = sqlx::query_as::<_, AuthorRow>(
                "SELECT id, name, username, avatar, bio, email, role FROM users WHERE id = ANY($1)",
            )
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
            relations.authors = rows
                .into_iter()
                .map(AuthorRecord::from)
                .map(|author| (author.id, author))
                .collect();
        }

        if projection.category {
            let ids: Vec<Uuid> = articles.iter().map(|a| a.category_id).collect();
            let rows = sqlx::query_as::<_, CategoryRow>(
                "SELECT c.id, c.name, c.slug, c.color, c.description, c.parent_id \
                 FROM categories c \
                 WHERE c.id = ANY($1) \
                    OR c.id IN (SELECT parent_id FROM categories WHERE id = ANY($1))",
            )
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
            relations.categories = rows
                .into_iter()
                .map(CategoryRecord::from)
                .map(|category| (category.id, category))
                .collect();
        }

        if projection.tags {
            let rows = sqlx::query_as::<_, ArticleTagRow>(
                "SELECT at.article_id, t.id, t.name, t.slug, t.color, t.description \
                 FROM article_tag at INNER JOIN tags t ON t.id = at.tag_id \
                 WHERE at.article_id = ANY($1) \
                 ORDER BY t.name",
            )
            .bind(&article_ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
            for row in rows {
                let tag = TagRecord::from(row.tag);
                relations
                    .tags
                    .entry(row.article_id)
                    .or_default()
                    .push(tag.to_ref());
            }
        }

        Ok(relations)
    }

    async fn load_comments(
        &self,
        article_ids: &[Uuid],
        projection: CommentProjection,
        relations: &mut Relations,
    ) -> Result<(), RepoError> {
        let top = sqlx::query_as::<_, CommentRow>(
            "SELECT id, article_id, user_id, parent_id, body, status, created_at FROM ( \
                 SELECT c.*, row_number() OVER ( \
                     PARTITION BY c.article_id ORDER BY c.created_at DESC, c.id DESC \
                 ) AS position \
                 FROM comments c \
                 WHERE c.article_id = ANY($1) AND c.parent_id IS NULL \
                   AND c.status = 'approved'::comment_status \
             ) ranked \
             WHERE position <= $2 \
             ORDER BY article_id, created_at DESC, id DESC",
        )
        .bind(article_ids)
        .bind(i64::from(projection.limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let parent_ids: Vec<Uuid> = top.iter().map(|row| row.id()).collect();
        for row in top {
            let comment = CommentRecord::from(row);
            relations
                .comments
                .entry(comment.article_id)
                .or_default()
                .push(comment);
        }

        if projection.with_replies && !parent_ids.is_empty() {
            let replies = sqlx::query_as::<_, CommentRow>(
                "SELECT id, article_id, user_id, parent_id, body, status, created_at \
                 FROM comments \
                 WHERE parent_id = ANY($1) AND status = 'approved'::comment_status \
                 ORDER BY created_at",
            )
            .bind(parent_ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
            for row in replies {
                let reply = CommentRecord::from(row);
                if let Some(parent) = reply.parent_id {
                    relations.replies.entry(parent).or_default().push(reply);
                }
            }
        }
        Ok(())
    }
}

impl Relations {
    fn assemble(&mut self, article: ArticleRecord, projection: &Projection) -> ArticleView {
        let mut view = ArticleView::bare(article);
        let article = &view.article;

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
            view.tags = self.tags.get(&article.id).cloned().unwrap_or_default();
        }
        if projection.comments.is_some() {
            let comments = self.comments.remove(&article.id).unwrap_or_default();
            view.comments = comments
                .into_iter()
                .map(|comment| {
                    let replies = self
                        .replies
                        .remove(&comment.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|reply| thread(&self.authors, reply, Vec::new()))
                        .collect();
                    thread(&self.authors, comment, replies)
                })
                .collect();
        }
        view
    }
}

fn thread(
    authors: &HashMap<Uuid, AuthorRecord>,
    comment: CommentRecord,
    replies: Vec<CommentThread>,
) -> CommentThread {
    CommentThread {
        author: authors.get(&comment.user_id).map(|user| user.to_ref(false)),
        comment,
        replies,
    }
}

#[async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn fetch_page(&self, plan: &ArticlePlan) -> Result<Page<ArticleView>, RepoError> {
        let total = self.count_articles(plan).await?;
        let offset = i64::try_from(plan.page.offset()).unwrap_or(i64::MAX);
        let limit = i64::try_from(plan.page.limit()).unwrap_or(i64::MAX);

        let articles = self.fetch_articles(plan, limit, offset).await?;
        let mut relations = self.load_relations(&articles, &plan.projection).await?;
        let items = articles
            .into_iter()
            .map(|article| relations.assemble(article, &plan.projection))
            .collect();
        Ok(Page::new(items, plan.page, total))
    }

    async fn fetch_one(&self, plan: &ArticlePlan) -> Result<Option<ArticleView>, RepoError> {
        let mut articles = self.fetch_articles(plan, 1, 0).await?;
        let Some(article) = articles.pop() else {
            return Ok(None);
        };
        let mut relations = self
            .load_relations(std::slice::from_ref(&article), &plan.projection)
            .await?;
        Ok(Some(relations.assemble(article, &plan.projection)))
    }

    async fn analytics(&self, plan: &AnalyticsPlan) -> Result<AnalyticsSummary, RepoError> {
        let totals = sqlx::query_as::<_, TotalsRow>(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status = 'published'::article_status) AS published, \
                    COUNT(*) FILTER (WHERE status = 'draft'::article_status) AS draft, \
                    COUNT(*) FILTER (WHERE status = 'scheduled'::article_status) AS scheduled, \
                    COUNT(*) FILTER (WHERE status = 'archived'::article_status) AS archived, \
                    COALESCE(SUM(views_count), 0)::bigint AS views, \
                    COALESCE(SUM(shares_count), 0)::bigint AS shares, \
                    COALESCE(SUM(comments_count), 0)::bigint AS comments, \
                    COALESCE(AVG(reading_time), 0)::float8 AS avg_reading_time \
             FROM articles \
             WHERE created_at BETWEEN $1 AND $2",
        )
        .bind(plan.from)
        .bind(plan.to)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let top_n = i64::from(plan.top_n);
        let top_categories = sqlx::query_as::<_, CategoryCountRow>(
            "SELECT c.id, c.name, c.slug, COUNT(*) AS article_count \
             FROM articles a INNER JOIN categories c ON c.id = a.category_id \
             WHERE a.created_at BETWEEN $1 AND $2 \
             GROUP BY c.id, c.name, c.slug \
             ORDER BY article_count DESC, c.name \
             LIMIT $3",
        )
        .bind(plan.from)
        .bind(plan.to)
        .bind(top_n)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let top_authors = sqlx::query_as::<_, AuthorCountRow>(
            "SELECT u.id, u.name, u.username, COUNT(*) AS article_count \
             FROM articles a INNER JOIN users u ON u.id = a.author_id \
             WHERE a.created_at BETWEEN $1 AND $2 \
             GROUP BY u.id, u.name, u.username \
             ORDER BY article_count DESC, u.name \
             LIMIT $3",
        )
        .bind(plan.from)
        .bind(plan.to)
        .bind(top_n)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let daily = sqlx::query_as::<_, DailyRow>(
            "SELECT (published_at AT TIME ZONE 'UTC')::date AS day, \
                    COUNT(*) AS articles, \
                    COALESCE(SUM(views_count), 0)::bigint AS views, \
                    COALESCE(SUM(shares_count), 0)::bigint AS shares, \
                    COALESCE(SUM(comments_count), 0)::bigint AS comments \
             FROM articles \
             WHERE published_at BETWEEN $1 AND $2 \
             GROUP BY day \
             ORDER BY day",
        )
        .bind(plan.from)
        .bind(plan.to)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(AnalyticsSummary {
            from: plan.from,
            to: plan.to,
            totals: AnalyticsTotals {
                total: non_negative(totals.total),
                published: non_negative(totals.published),
                draft: non_negative(totals.draft),
                scheduled: non_negative(totals.scheduled),
                archived: non_negative(totals.archived),
                views: totals.views,
                shares: totals.shares,
                comments: totals.comments,
                avg_reading_time: totals.avg_reading_time,
            },
            top_categories: top_categories.into_iter().map(Into::into).collect(),
            top_authors: top_authors.into_iter().map(Into::into).collect(),
            daily: daily.into_iter().map(Into::into).collect(),
        })
    }

    async fn status_counts(&self) -> Result<StatusCounts, RepoError> {
        let row = sqlx::query_as::<_, StatusCountsRow>(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status = 'draft'::article_status) AS draft, \
                    COUNT(*) FILTER (WHERE status = 'published'::article_status) AS published, \
                    COUNT(*) FILTER (WHERE status = 'scheduled'::article_status) AS scheduled, \
                    COUNT(*) FILTER (WHERE status = 'archived'::article_status) AS archived, \
                    COUNT(*) FILTER ( \
                        WHERE editorial_status = 'pending_review'::editorial_status \
                    ) AS pending_review \
             FROM articles",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn list_meta(
        &self,
        entity_type: MetaEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<MetaEntry>, RepoError> {
        let rows: Vec<(String, serde_json::Value)> = sqlx::query_as(
            "SELECT key, value FROM entity_meta \
             WHERE entity_type = $1 AND entity_id = $2 \
             ORDER BY key",
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(key, value)| MetaEntry {
                entity_type,
                entity_id,
                key,
                value,
            })
            .collect())
    }
}
