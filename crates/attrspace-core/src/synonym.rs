//! # Mapping-Aware Evaluation
//!
//! The opt-in layer that lets a query match through stored synonymy
//! mappings.
//!
//! At each node the sibling conditions are partitioned into non-empty
//! blocks; a block may be satisfied by its own conditions or by a stored
//! alternative for its attribute set. A partitioning succeeds when every
//! block admits some alternative; the node succeeds when any partitioning
//! does. Enumeration short-circuits on the first success, and block
//! alternatives are cached by index set so a block shared by many
//! partitionings is serialized once.
//!
//! Alternatives are looked up under the focused entity's scope first, then
//! the generic scope, and run in both directions: a block equal to a row's
//! original may be replaced by any of its synonyms, and a block equal to one
//! of a row's synonyms may be replaced by the original the entity actually
//! holds. Alternatives are evaluated by the plain per-node path (no
//! re-partitioning at the same node); recursion through reference values
//! stays mapping-aware.

use crate::matcher;
use crate::primitives::MAX_PARTITION_SIBLINGS;
use crate::query::{Condition, SearchOptions, Term};
use crate::schema::{self, IndexProfile, MappingRow};
use crate::store::TableStore;
use crate::types::{AttrSet, Bindings, Scope, SpaceError};
use std::collections::BTreeMap;

/// Mapping-aware counterpart of the plain conjunction.
pub(crate) fn complies_mapped<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    id: &str,
    conditions: &[Condition],
    env: &Bindings,
    options: &SearchOptions,
) -> Result<Option<Bindings>, SpaceError> {
    if conditions.is_empty() {
        return Ok(Some(env.clone()));
    }

    let mut rows = schema::mappings_for_scope(store, &Scope::Entity(id.to_string()))?;
    rows.extend(schema::mappings_for_scope(store, &Scope::Generic)?);

    // Without mappings in reach, or past the partitioning bound, the node
    // degenerates to the plain conjunction.
    if rows.is_empty() || conditions.len() > MAX_PARTITION_SIBLINGS {
        return matcher::comply_all(store, profile, id, conditions, env, options);
    }

    let mut search = MappedNode {
        store,
        profile,
        id,
        conditions,
        options,
        rows,
        alternatives: BTreeMap::new(),
    };
    let mut blocks: Vec<Vec<usize>> = Vec::new();
    search.enumerate(0, &mut blocks, env)
}

// =============================================================================
// PARTITION ENUMERATION
// =============================================================================

struct MappedNode<'a, S> {
    store: &'a S,
    profile: IndexProfile,
    id: &'a str,
    conditions: &'a [Condition],
    options: &'a SearchOptions,
    rows: Vec<MappingRow>,
    /// Block index set -> the condition lists that may satisfy the block.
    alternatives: BTreeMap<Vec<usize>, Vec<Vec<Condition>>>,
}

impl<S: TableStore> MappedNode<'_, S> {
    /// Place condition `idx` into every block of the partition under
    /// construction (or a fresh one), recursing; a complete partition is
    /// evaluated block by block. First success wins.
    fn enumerate(
        &mut self,
        idx: usize,
        blocks: &mut Vec<Vec<usize>>,
        env: &Bindings,
    ) -> Result<Option<Bindings>, SpaceError> {
        if idx == self.conditions.len() {
            let snapshot = blocks.clone();
            return self.satisfy_blocks(&snapshot, 0, env);
        }
        for b in 0..=blocks.len() {
            let created = b == blocks.len();
            if created {
                blocks.push(Vec::new());
            }
            blocks[b].push(idx);
            let result = self.enumerate(idx + 1, blocks, env)?;
            blocks[b].pop();
            if created {
                blocks.pop();
            }
            if result.is_some() {
                return Ok(result);
            }
        }
        Ok(None)
    }

    /// Satisfy the blocks of one partition left to right, backtracking
    /// across each block's alternatives.
    fn satisfy_blocks(
        &mut self,
        blocks: &[Vec<usize>],
        at: usize,
        env: &Bindings,
    ) -> Result<Option<Bindings>, SpaceError> {
        let Some(block) = blocks.get(at) else {
            return Ok(Some(env.clone()));
        };
        for alternative in self.alternatives_for(block)? {
            let Some(extended) = matcher::comply_all(
                self.store,
                self.profile,
                self.id,
                &alternative,
                env,
                self.options,
            )?
            else {
                continue;
            };
            if let Some(full) = self.satisfy_blocks(blocks, at + 1, &extended)? {
                return Ok(Some(full));
            }
        }
        Ok(None)
    }

    /// The condition lists that may satisfy a block: the block itself, plus
    /// every stored substitute for its concrete attribute set.
    fn alternatives_for(&mut self, block: &[usize]) -> Result<Vec<Vec<Condition>>, SpaceError> {
        if let Some(cached) = self.alternatives.get(block) {
            return Ok(cached.clone());
        }

        let identity: Vec<Condition> = block
            .iter()
            .map(|&i| self.conditions[i].clone())
            .collect();
        let mut alts = vec![identity];

        if let Some(set) = block_attr_set(self.conditions, block) {
            for row in &self.rows {
                if row.original == set {
                    for synonym in &row.synonyms {
                        alts.push(set_to_conditions(synonym));
                    }
                }
                if row.synonyms.iter().any(|s| *s == set) {
                    alts.push(set_to_conditions(&row.original));
                }
            }
        }

        self.alternatives.insert(block.to_vec(), alts.clone());
        Ok(alts)
    }
}

// =============================================================================
// BLOCK / ATTRSET CONVERSION
// =============================================================================

/// The attribute set of a block, when every member has a constant name and
/// value. Blocks with wildcards, variables, or a root shape have no set and
/// therefore no stored alternatives.
fn block_attr_set(conditions: &[Condition], block: &[usize]) -> Option<AttrSet> {
    let mut set = AttrSet::new();
    for &i in block {
        let c = &conditions[i];
        let name = match c.name.as_ref()? {
            Term::Const(n) => n.clone(),
            _ => return None,
        };
        let value = match &c.value {
            Term::Const(v) => v.clone(),
            _ => return None,
        };
        set.insert((name, value));
    }
    Some(set)
}

/// Reconstitute a stored attribute set as leaf conditions.
///
/// Stored pairs are data, not query syntax, so the terms are constants by
/// construction rather than re-parsed.
fn set_to_conditions(set: &AttrSet) -> Vec<Condition> {
    set.iter()
        .map(|(name, value)| Condition {
            name: Some(Term::Const(name.clone())),
            value: Term::Const(value.clone()),
            children: Vec::new(),
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
