//! # DataSpace
//!
//! The public surface of the data space, combining a storage backend with an
//! index profile.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `BTreeMap`-backed, volatile, useful for tests and scratch
//!   spaces
//! - `Persistent`: redb-backed, disk-resident
//!
//! A `DataSpace` owns its store handles exclusively for its lifetime and
//! executes one logical operation at a time; it is not reentrant, and index
//! tables may transiently disagree with the primary table in the middle of a
//! mutation.

use crate::matcher;
use crate::mutation::MutationEngine;
use crate::projector;
use crate::query::{Condition, SearchOptions};
use crate::schema::IndexProfile;
use crate::storage::RedbStore;
use crate::store::MemStore;
use crate::types::{attr_set, EntityTree, Scope, SpaceError};
use std::path::Path;

/// Storage backend for a data space.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory tables (fast, volatile).
    InMemory(MemStore),
    /// Disk-backed tables using redb.
    Persistent(RedbStore),
}

// NOTE: StorageBackend does NOT implement Clone.
// A database handle cannot be safely duplicated.

/// An embedded entity/attribute data space.
#[derive(Debug)]
pub struct DataSpace {
    backend: StorageBackend,
    profile: IndexProfile,
}

impl DataSpace {
    /// Open or create a persistent data space at `path`.
    ///
    /// # Errors
    ///
    /// `StoreOpen` if the underlying store cannot be opened.
    pub fn open(path: impl AsRef<Path>, profile: IndexProfile) -> Result<Self, SpaceError> {
        let store = RedbStore::open(path)?;
        Ok(Self {
            backend: StorageBackend::Persistent(store),
            profile,
        })
    }

    /// Create a volatile in-memory data space.
    #[must_use]
    pub fn in_memory(profile: IndexProfile) -> Self {
        Self {
            backend: StorageBackend::InMemory(MemStore::new()),
            profile,
        }
    }

    /// The active index profile.
    #[must_use]
    pub fn profile(&self) -> IndexProfile {
        self.profile
    }

    /// Whether this space persists to disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Close the space, releasing its store handles.
    pub fn close(self) {
        drop(self);
    }

    /// Truncate every table.
    pub fn clear(&mut self) -> Result<(), SpaceError> {
        match &mut self.backend {
            StorageBackend::InMemory(store) => MutationEngine::clear(store),
            StorageBackend::Persistent(store) => MutationEngine::clear(store),
        }
    }

    // =========================================================================
    // ENTITIES & ATTRIBUTES
    // =========================================================================

    /// Insert a new entity.
    pub fn insert_entity(&mut self, id: &str) -> Result<(), SpaceError> {
        match &mut self.backend {
            StorageBackend::InMemory(store) => MutationEngine::insert_entity(store, id),
            StorageBackend::Persistent(store) => MutationEngine::insert_entity(store, id),
        }
    }

    /// Delete an entity, cascading to its attributes, every reference to it,
    /// and every mapping scoped on it.
    pub fn delete_entity(&mut self, id: &str) -> Result<(), SpaceError> {
        let profile = self.profile;
        match &mut self.backend {
            StorageBackend::InMemory(store) => MutationEngine::delete_entity(store, profile, id),
            StorageBackend::Persistent(store) => MutationEngine::delete_entity(store, profile, id),
        }
    }

    /// Insert an attribute triple. `value` is a literal when quoted,
    /// otherwise a reference to an existing entity.
    pub fn insert_attribute(&mut self, id: &str, name: &str, value: &str) -> Result<(), SpaceError> {
        let profile = self.profile;
        match &mut self.backend {
            StorageBackend::InMemory(store) => {
                MutationEngine::insert_attribute(store, profile, id, name, value)
            }
            StorageBackend::Persistent(store) => {
                MutationEngine::insert_attribute(store, profile, id, name, value)
            }
        }
    }

    /// Delete attributes; `*` widens the name, the value, or both.
    pub fn delete_attribute(&mut self, id: &str, name: &str, value: &str) -> Result<(), SpaceError> {
        let profile = self.profile;
        match &mut self.backend {
            StorageBackend::InMemory(store) => {
                MutationEngine::delete_attribute(store, profile, id, name, value)
            }
            StorageBackend::Persistent(store) => {
                MutationEngine::delete_attribute(store, profile, id, name, value)
            }
        }
    }

    // =========================================================================
    // MAPPINGS
    // =========================================================================

    /// Record that `original` (held by the scope entity, or by anyone for the
    /// `*` scope) may be substituted by `synonym`.
    pub fn insert_mapping(
        &mut self,
        scope: &str,
        original: &[(&str, &str)],
        synonym: &[(&str, &str)],
    ) -> Result<(), SpaceError> {
        let scope = Scope::parse(scope);
        let original = attr_set(original);
        let synonym = attr_set(synonym);
        match &mut self.backend {
            StorageBackend::InMemory(store) => {
                MutationEngine::insert_mapping(store, &scope, &original, &synonym)
            }
            StorageBackend::Persistent(store) => {
                MutationEngine::insert_mapping(store, &scope, &original, &synonym)
            }
        }
    }

    /// Delete mappings. `None` is the wildcard: `(Some, Some)` removes one
    /// synonym, `(Some, None)` a whole original, `(None, None)` the whole
    /// scope.
    pub fn delete_mapping(
        &mut self,
        scope: &str,
        original: Option<&[(&str, &str)]>,
        synonym: Option<&[(&str, &str)]>,
    ) -> Result<(), SpaceError> {
        let scope = Scope::parse(scope);
        let original = original.map(attr_set);
        let synonym = synonym.map(attr_set);
        match &mut self.backend {
            StorageBackend::InMemory(store) => {
                MutationEngine::delete_mapping(store, &scope, original.as_ref(), synonym.as_ref())
            }
            StorageBackend::Persistent(store) => {
                MutationEngine::delete_mapping(store, &scope, original.as_ref(), synonym.as_ref())
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Evaluate a query tree and return the matching entity ids.
    pub fn search(
        &self,
        root: &Condition,
        options: SearchOptions,
    ) -> Result<Vec<String>, SpaceError> {
        match &self.backend {
            StorageBackend::InMemory(store) => {
                matcher::search(store, self.profile, root, &options)
            }
            StorageBackend::Persistent(store) => {
                matcher::search(store, self.profile, root, &options)
            }
        }
    }

    /// Materialize the full attribute tree of one entity.
    pub fn get_entity(&self, id: &str) -> Result<EntityTree, SpaceError> {
        match &self.backend {
            StorageBackend::InMemory(store) => projector::get_entity(store, self.profile, id),
            StorageBackend::Persistent(store) => projector::get_entity(store, self.profile, id),
        }
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Re-derive every index table from the primary table.
    pub fn rebuild_indexes(&mut self) -> Result<(), SpaceError> {
        let profile = self.profile;
        match &mut self.backend {
            StorageBackend::InMemory(store) => MutationEngine::rebuild_indexes(store, profile),
            StorageBackend::Persistent(store) => MutationEngine::rebuild_indexes(store, profile),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
