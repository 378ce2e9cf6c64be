//! Category tree invariants.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::entities::CategoryRecord;
use crate::domain::error::DomainError;

/// Check that giving `category` the parent `parent` keeps the categories a tree.
pub fn validate_category_parent(
    categories: &[CategoryRecord],
    category: Uuid,
    parent: Option<Uuid>,
) -> Result<(), DomainError> {
    let Some(parent) = parent else {
        return Ok(());
    };

    if parent == category {
        return Err(DomainError::CategoryTree {
            category,
            parent,
            reason: "a category cannot be its own parent",
        });
    }

    let parents: HashMap<Uuid, Option<Uuid>> =
        categories.iter().map(|c| (c.id, c.parent_id)).collect();

    if !parents.contains_key(&parent) {
        return Err(DomainError::not_found("category"));
    }

    let mut seen = HashSet::new();
    let mut cursor = Some(parent);
    while let Some(current) = cursor {
        if current == category {
            return Err(DomainError::CategoryTree {
                category,
                parent,
                reason: "the new parent descends from this category",
            });
        }
        if !seen.insert(current) {
            break;
        }
        cursor = parents.get(&current).copied().flatten();
    }

    Ok(())
}

/// Ids of `root` and its direct children.
pub fn category_with_children(categories: &[CategoryRecord], root: Uuid) -> Vec<Uuid> {
    let mut ids = vec![root];
    ids.extend(
        categories
            .iter()
            .filter(|c| c.parent_id == Some(root))
            .map(|c| c.id),
    );
    ids
}
