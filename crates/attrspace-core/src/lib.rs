//! # attrspace-core
//!
//! An embedded entity/attribute data space backed by an ordered key-value
//! store.
//!
//! Entities are opaque string ids carrying a multiset of (name, value)
//! attribute pairs; a value is either a quoted literal or a reference to
//! another entity. On top of the store the crate answers tree-structured
//! pattern queries with constants, wildcards, and unifying variables, and
//! optionally expands queries through declared attribute synonymy mappings.
//!
//! ## Architectural Constraints
//!
//! - Single-threaded: one logical operation at a time, no async, no network
//! - All durable state lives in the key-value store; indexes are a cache of
//!   the primary table and can be rebuilt from it
//! - Behavior is identical across index profiles; indexes only accelerate

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod matcher;
pub mod mutation;
pub mod primitives;
pub mod projector;
pub mod query;
pub mod schema;
pub mod space;
pub mod storage;
pub mod store;
pub mod synonym;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{attr_set, AttrNode, AttrSet, Bindings, EntityTree, Scope, SpaceError, ValueNode};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use matcher::search;
pub use mutation::MutationEngine;
pub use projector::get_entity;
pub use query::{Condition, SearchOptions, Term};
pub use schema::IndexProfile;
pub use space::{DataSpace, StorageBackend};
pub use storage::RedbStore;
pub use store::{MemStore, Table, TableStore};

// =============================================================================
// RE-EXPORTS: Reserved Tokens
// =============================================================================

pub use primitives::{ANY, INVALID_TOKEN, SEPARATOR};
