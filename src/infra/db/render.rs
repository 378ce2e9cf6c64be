//! Rendering of query plans onto `sqlx::QueryBuilder`.
//!
//! Every user-supplied value is bound; only fixed SQL fragments are pushed.
//! Time-relative predicates use the database clock.

use sqlx::{Postgres, QueryBuilder};

use crate::application::query::{Direction, OrderTerm, Predicate, SortExpr};

const TAG_EXISTS_ANY: &str = "EXISTS (SELECT 1 FROM article_tag at \
     WHERE at.article_id = a.id AND at.tag_id = ANY(";

pub(crate) fn push_predicates(qb: &mut QueryBuilder<'_, Postgres>, predicates: &[Predicate]) {
    for predicate in predicates {
        qb.push(" AND ");
        push_predicate(qb, predicate);
    }
}

fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::Live => {
            qb.push(
                "(a.status = 'published'::article_status \
                 AND a.published_at IS NOT NULL AND a.published_at <= now())",
            );
        }
        Predicate::Status(status) => {
            qb.push("a.status = ").push_bind(*status);
        }
        Predicate::EditorialStatus(status) => {
            qb.push("a.editorial_status = ").push_bind(*status);
        }
        Predicate::Id(id) => {
            qb.push("a.id = ").push_bind(*id);
        }
        Predicate::Slug(slug) => {
            qb.push("a.slug = ").push_bind(slug.clone());
        }
        Predicate::NotId(id) => {
            qb.push("a.id <> ").push_bind(*id);
        }
        Predicate::CategoryId(id) => {
            qb.push("a.category_id = ").push_bind(*id);
        }
        Predicate::CategorySlug(slug) => {
            qb.push("a.category_id IN (SELECT c.id FROM categories c WHERE c.slug = ")
                .push_bind(slug.clone())
                .push(" OR c.parent_id = (SELECT p.id FROM categories p WHERE p.slug = ")
                .push_bind(slug.clone())
                .push("))");
        }
        Predicate::TagSlug(slug) => {
            qb.push(
                "EXISTS (SELECT 1 FROM article_tag at INNER JOIN tags t ON t.id = at.tag_id \
                 WHERE at.article_id = a.id AND t.slug = ",
            )
            .push_bind(slug.clone())
            .push(")");
        }
        Predicate::AnyTag(ids) => {
            qb.push(TAG_EXISTS_ANY).push_bind(ids.clone()).push("))");
        }
        Predicate::AuthorId(id) => {
            qb.push("a.author_id = ").push_bind(*id);
        }
        Predicate::AuthorUsername(username) => {
            qb.push("a.author_id = (SELECT u.id FROM users u WHERE u.username = ")
                .push_bind(username.clone())
                .push(")");
        }
        Predicate::Featured => {
            qb.push("a.is_featured");
        }
        Predicate::Breaking => {
            qb.push("a.is_breaking");
        }
        Predicate::ArticleType(kind) => {
            qb.push("lower(a.type) = lower(")
                .push_bind(kind.clone())
                .push(")");
        }
        Predicate::PublishedWithinHours(hours) => {
            let hours = i32::try_from(*hours).unwrap_or(i32::MAX);
            qb.push("a.published_at >= now() - make_interval(hours => ")
                .push_bind(hours)
                .push(")");
        }
        Predicate::PublishedFrom(from) => {
            qb.push("a.published_at >= ").push_bind(*from);
        }
        Predicate::PublishedTo(to) => {
            qb.push("a.published_at <= ").push_bind(*to);
        }
        Predicate::Text(pattern) => {
            let pattern = pattern.as_str();
            qb.push("(a.title ILIKE ")
                .push_bind(pattern.to_string())
                .push(" OR a.excerpt ILIKE ")
                .push_bind(pattern.to_string())
                .push(" OR a.content ILIKE ")
                .push_bind(pattern.to_string())
                .push(")");
        }
        Predicate::RelatedTo {
            category_id,
            tag_ids,
        } => {
            qb.push("(a.category_id = ")
                .push_bind(*category_id)
                .push(" OR ")
                .push(TAG_EXISTS_ANY)
                .push_bind(tag_ids.clone())
                .push(")))");
        }
    }
}

pub(crate) fn push_order(qb: &mut QueryBuilder<'_, Postgres>, order: &[OrderTerm]) {
    for (index, term) in order.iter().enumerate() {
        qb.push(if index == 0 { " ORDER BY " } else { ", " });
        push_sort_expr(qb, &term.expr);
        qb.push(match term.direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
        if term.expr == SortExpr::PublishedAt {
            qb.push(" NULLS LAST");
        }
    }
}

fn push_sort_expr(qb: &mut QueryBuilder<'_, Postgres>, expr: &SortExpr) {
    match expr {
        SortExpr::PublishedAt => {
            qb.push("a.published_at");
        }
        SortExpr::CreatedAt => {
            qb.push("a.created_at");
        }
        SortExpr::Title => {
            qb.push("lower(a.title)");
        }
        SortExpr::Views => {
            qb.push("a.views_count");
        }
        SortExpr::Comments => {
            qb.push("a.comments_count");
        }
        SortExpr::Engagement => {
            qb.push("a.engagement_score");
        }
        SortExpr::Composite(weights) => {
            qb.push("(a.views_count * ")
                .push_bind(weights.views)
                .push("::float8 + a.shares_count * ")
                .push_bind(weights.shares)
                .push("::float8 + a.comments_count * ")
                .push_bind(weights.comments)
                .push("::float8)");
        }
        SortExpr::Relevance(pattern) => {
            let pattern = pattern.as_str();
            qb.push("CASE WHEN a.title ILIKE ")
                .push_bind(pattern.to_string())
                .push(" THEN 3 WHEN a.excerpt ILIKE ")
                .push_bind(pattern.to_string())
                .push(" THEN 2 WHEN a.content ILIKE ")
                .push_bind(pattern.to_string())
                .push(" THEN 1 ELSE 0 END");
        }
        SortExpr::RelatedRank {
            category_id,
            tag_ids,
        } => {
            qb.push("CASE WHEN a.category_id = ")
                .push_bind(*category_id)
                .push(" THEN 3 WHEN ")
                .push(TAG_EXISTS_ANY)
                .push_bind(tag_ids.clone())
                .push(")) THEN 1 ELSE 0 END");
        }
        SortExpr::Id => {
            qb.push("a.id");
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::application::query::{LikePattern, RankingWeights};

    fn render(predicates: &[Predicate], order: &[OrderTerm]) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT a.id FROM articles a WHERE TRUE");
        push_predicates(&mut qb, predicates);
        push_order(&mut qb, order);
        qb.sql().to_string()
    }

    #[test]
    fn user_values_are_bound() {
        let sql = render(
            &[Predicate::Live, Predicate::Text(LikePattern::contains("50%"))],
            &[],
        );
        assert!(sql.contains("a.title ILIKE $1"));
        assert!(sql.contains("a.content ILIKE $3"));
        assert!(!sql.contains("50"));
    }

    #[test]
    fn publication_order_puts_nulls_last() {
        let sql = render(
            &[],
            &[
                OrderTerm::desc(SortExpr::PublishedAt),
                OrderTerm::desc(SortExpr::Id),
            ],
        );
        assert!(sql.ends_with("ORDER BY a.published_at DESC NULLS LAST, a.id DESC"));
    }

    #[test]
    fn related_rank_binds_category_and_tags() {
        let sql = render(
            &[],
            &[OrderTerm::desc(SortExpr::RelatedRank {
                category_id: Uuid::new_v4(),
                tag_ids: vec![Uuid::new_v4()],
            })],
        );
        assert!(sql.contains("CASE WHEN a.category_id = $1 THEN 3"));
        assert!(sql.contains("ANY($2)) THEN 1 ELSE 0 END DESC"));
    }

    #[test]
    fn composite_weights_are_bound_as_floats() {
        let sql = render(
            &[],
            &[OrderTerm::desc(SortExpr::Composite(RankingWeights {
                views: 0.4,
                shares: 0.0,
                comments: 0.6,
            }))],
        );
        assert!(sql.contains("a.views_count * $1::float8"));
    }
}
