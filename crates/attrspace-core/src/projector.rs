//! # Result Projector
//!
//! Materializes the attribute tree of one entity.
//!
//! The walk follows reference values depth-first through the data graph, so
//! unlike query matching it needs explicit cycle protection: a `visited` set
//! owned by the top-level call expands each entity in full the first time it
//! is reached and renders every later occurrence as an id-only node with no
//! attributes. Child ordering follows the underlying storage iteration;
//! callers needing a specific order must sort.

use crate::codec;
use crate::schema::{self, IndexProfile};
use crate::store::TableStore;
use crate::types::{AttrNode, EntityTree, SpaceError, ValueNode};
use std::collections::BTreeSet;

/// Project the full attribute tree rooted at `id`.
///
/// # Errors
///
/// `NoEntity` if `id` is absent.
pub fn get_entity<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    id: &str,
) -> Result<EntityTree, SpaceError> {
    if !schema::entity_exists(store, id)? {
        return Err(SpaceError::NoEntity(id.to_string()));
    }
    let mut visited = BTreeSet::new();
    project(store, profile, id, &mut visited)
}

fn project<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    id: &str,
    visited: &mut BTreeSet<String>,
) -> Result<EntityTree, SpaceError> {
    visited.insert(id.to_string());

    let mut attributes = Vec::new();
    for (name, value) in schema::attributes_of(store, profile, id)? {
        let node = if codec::is_literal(&value) {
            ValueNode::Literal(codec::literal_text(&value).to_string())
        } else if visited.contains(&value) {
            ValueNode::Entity(EntityTree::leaf(value))
        } else if schema::entity_exists(store, &value)? {
            ValueNode::Entity(project(store, profile, &value, visited)?)
        } else {
            // A reference left dangling mid-cascade projects as a bare id.
            ValueNode::Entity(EntityTree::leaf(value))
        };
        attributes.push(AttrNode { name, value: node });
    }

    Ok(EntityTree {
        id: id.to_string(),
        attributes,
    })
}

// =============================================================================
// TESTS
// =============================================================================
