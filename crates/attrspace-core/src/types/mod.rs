//! # Core Type Definitions
//!
//! Shared types for the attrspace data space:
//! - Attribute sets and mapping scopes (`AttrSet`, `Scope`)
//! - Projected entity trees (`EntityTree`, `AttrNode`, `ValueNode`)
//! - Variable binding environments (`Bindings`)
//! - Error types (`SpaceError`)
//!
//! ## Determinism Guarantees
//!
//! All collection types here are `BTreeMap`/`BTreeSet` so that iteration
//! order is deterministic regardless of insertion order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

// =============================================================================
// ATTRIBUTE SETS & MAPPING SCOPES
// =============================================================================

/// An unordered set of `(name, value)` attribute pairs.
///
/// Used as the key shape of a synonymy mapping. Values are stored verbatim,
/// quotes included for literals.
pub type AttrSet = BTreeSet<(String, String)>;

/// Build an [`AttrSet`] from borrowed pairs.
#[must_use]
pub fn attr_set(pairs: &[(&str, &str)]) -> AttrSet {
    pairs
        .iter()
        .map(|(n, v)| ((*n).to_string(), (*v).to_string()))
        .collect()
}

/// The scope of a synonymy mapping.
///
/// A specific scope ties the mapping to one entity (and requires its
/// `original` pairs to exist on that entity at insertion time); a generic
/// mapping applies to every entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Mapping held by a single entity.
    Entity(String),
    /// Mapping applicable to any entity.
    Generic,
}

impl Scope {
    /// Parse a scope from its surface form: `*` is generic, anything else is
    /// a specific entity id.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == crate::primitives::ANY {
            Self::Generic
        } else {
            Self::Entity(s.to_string())
        }
    }

    /// The surface form used in mapping keys.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Entity(id) => id,
            Self::Generic => crate::primitives::ANY,
        }
    }
}

// =============================================================================
// PROJECTED ENTITY TREES
// =============================================================================

/// A projected entity with its attribute tree.
///
/// Produced by `get_entity`. An entity that was already expanded earlier in
/// the same projection appears again as an id-only node with no attributes
/// (cycle break at first occurrence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTree {
    /// The entity id this subtree is rooted at.
    pub id: String,
    /// Outgoing attributes in storage iteration order.
    pub attributes: Vec<AttrNode>,
}

/// One attribute edge of a projected entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrNode {
    /// The attribute name.
    pub name: String,
    /// The attribute value, literal or expanded reference.
    pub value: ValueNode,
}

/// The value side of a projected attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueNode {
    /// A literal string value, without its surrounding quotes.
    Literal(String),
    /// A reference to another entity, expanded in place.
    Entity(EntityTree),
}

impl EntityTree {
    /// Create a tree with no attributes (also the cycle-break shape).
    #[must_use]
    pub fn leaf(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Vec::new(),
        }
    }

    /// Flatten the direct attributes back to raw `(name, value)` pairs, with
    /// literal values re-quoted to their stored surface form.
    #[must_use]
    pub fn flatten(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .map(|a| {
                let raw = match &a.value {
                    ValueNode::Literal(s) => format!("\"{s}\""),
                    ValueNode::Entity(t) => t.id.clone(),
                };
                (a.name.clone(), raw)
            })
            .collect()
    }
}

// =============================================================================
// VARIABLE BINDINGS
// =============================================================================

/// A variable binding environment.
///
/// Bindings are threaded through the matcher by value: speculative branches
/// clone the environment and the caller adopts the extension only on success.
/// Backtracking therefore never has to unwind anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(BTreeMap<String, String>);

impl Bindings {
    /// Create an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the value bound to a variable name.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&str> {
        self.0.get(var).map(String::as_str)
    }

    /// Return a new environment extending `self` with `var = value`.
    #[must_use]
    pub fn bind(&self, var: &str, value: &str) -> Self {
        let mut next = self.0.clone();
        next.insert(var.to_string(), value.to_string());
        Self(next)
    }

    /// Whether some variable is already bound to `value`.
    ///
    /// Candidate bindings equal to an already-bound value are skipped at
    /// enumeration sites (the distinctness rule).
    #[must_use]
    pub fn has_value(&self, value: &str) -> bool {
        self.0.values().any(|v| v == value)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no variables are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by data-space operations.
///
/// - No silent failures; every fallible operation returns `Result<T, SpaceError>`
/// - Multi-precondition mutations validate everything before the first write
/// - Catastrophic storage errors propagate verbatim via `Storage`
#[derive(Debug, Error)]
pub enum SpaceError {
    /// A user string contains the reserved invalid token, is empty or
    /// oversized, or an argument has the wrong shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The entity id is already present.
    #[error("entity already exists: {0}")]
    EntityExists(String),

    /// The referenced entity is absent.
    #[error("no such entity: {0}")]
    NoEntity(String),

    /// The exact (owner, name, value) triple is already stored.
    #[error("attribute already exists: {0} {1} {2}")]
    AttributeExists(String, String, String),

    /// No attribute matched the request.
    #[error("no such attribute on entity {0}")]
    NoAttribute(String),

    /// The identical synonym is already recorded for this (scope, original).
    #[error("mapping already exists")]
    MappingExists,

    /// No mapping matched the request.
    #[error("no such mapping")]
    NoMapping,

    /// The underlying key-value store could not be opened.
    #[error("could not open store: {0}")]
    StoreOpen(String),

    /// A catastrophic key-value store error (I/O, corruption).
    #[error("storage error: {0}")]
    Storage(String),
}

// =============================================================================
// TESTS
// =============================================================================
