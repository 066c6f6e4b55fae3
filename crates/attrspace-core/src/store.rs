//! # Store Facade
//!
//! Typed access to the ordered key-value store underneath the data space.
//!
//! The facade is a trait so the engine code above it is backend-agnostic:
//! `MemStore` keeps everything in `BTreeMap`s (volatile, deterministic), and
//! `storage::RedbStore` persists through redb. Both expose the same seven
//! logical tables and the same five primitives: point get, point put, point
//! delete, truncate, and a full forward scan. Prefix scans are forward scans
//! filtered against a prefix.
//!
//! On top of the primitives, three provided methods treat a value cell as a
//! separator-delimited set of tokens. Engine code never parses cells by hand.

use crate::primitives::SEPARATOR;
use crate::types::SpaceError;
use std::collections::BTreeMap;

// =============================================================================
// LOGICAL TABLES
// =============================================================================

/// The seven logical tables of the physical schema.
///
/// `Primary` and `Mappings` always exist; the inverted pair is maintained in
/// the `Inverted` profile and above; the three scalar indexes only in `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Table {
    /// Entity rows (`enc(id)`) and attribute rows (`enc(id) S enc(name)`).
    Primary,
    /// Synonymy mappings: `enc(scope) S enc(serialized original)` to synonyms.
    Mappings,
    /// Inverted by value then name: `enc(value) S enc(name)` to owner ids.
    ValueNameIndex,
    /// Inverted by owner then value: `enc(id) S enc(value)` to names.
    OwnerValueIndex,
    /// Scalar: `enc(name)` to owner ids.
    NameIndex,
    /// Scalar: `enc(value)` to owner ids.
    ValueIndex,
    /// Scalar: `enc(id)` to names.
    OwnerIndex,
}

impl Table {
    /// All tables, in schema order.
    pub const ALL: [Table; 7] = [
        Table::Primary,
        Table::Mappings,
        Table::ValueNameIndex,
        Table::OwnerValueIndex,
        Table::NameIndex,
        Table::ValueIndex,
        Table::OwnerIndex,
    ];

    /// Stable storage name of the table.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Table::Primary => "store",
            Table::Mappings => "mappings",
            Table::ValueNameIndex => "value_name_idx",
            Table::OwnerValueIndex => "owner_value_idx",
            Table::NameIndex => "name_idx",
            Table::ValueIndex => "value_idx",
            Table::OwnerIndex => "owner_idx",
        }
    }

    /// Dense index used by array-backed backends.
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            Table::Primary => 0,
            Table::Mappings => 1,
            Table::ValueNameIndex => 2,
            Table::OwnerValueIndex => 3,
            Table::NameIndex => 4,
            Table::ValueIndex => 5,
            Table::OwnerIndex => 6,
        }
    }
}

// =============================================================================
// TABLESTORE TRAIT
// =============================================================================

/// The store facade every backend implements.
///
/// Keys and values are storage-form strings (already codec-encoded). All
/// operations are synchronous; atomicity is per operation, whatever the
/// backend guarantees.
pub trait TableStore {
    /// Point lookup.
    fn get(&self, table: Table, key: &str) -> Result<Option<String>, SpaceError>;

    /// Insert or overwrite.
    fn put(&mut self, table: Table, key: &str, value: &str) -> Result<(), SpaceError>;

    /// Point delete. Returns whether a row was removed.
    fn delete(&mut self, table: Table, key: &str) -> Result<bool, SpaceError>;

    /// Remove every row of the table.
    fn truncate(&mut self, table: Table) -> Result<(), SpaceError>;

    /// Full forward scan in key order.
    fn scan(&self, table: Table) -> Result<Vec<(String, String)>, SpaceError>;

    /// Forward scan filtered to keys starting with `prefix`.
    fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, String)>, SpaceError> {
        Ok(self
            .scan(table)?
            .into_iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect())
    }

    // =========================================================================
    // MULTI-VALUE CELL HELPERS
    // =========================================================================

    /// Whether `token` is one of the separator-delimited tokens of the cell.
    fn value_contains(&self, table: Table, key: &str, token: &str) -> Result<bool, SpaceError> {
        match self.get(table, key)? {
            Some(cell) => Ok(cell.split(SEPARATOR).any(|t| t == token)),
            None => Ok(false),
        }
    }

    /// Append `token` to the cell, creating it if absent. No-op when the
    /// token is already present.
    fn add_to_value(&mut self, table: Table, key: &str, token: &str) -> Result<(), SpaceError> {
        match self.get(table, key)? {
            Some(cell) => {
                if cell.split(SEPARATOR).any(|t| t == token) {
                    return Ok(());
                }
                let appended = format!("{cell}{SEPARATOR}{token}");
                self.put(table, key, &appended)
            }
            None => self.put(table, key, token),
        }
    }

    /// Remove `token` from the cell, deleting the row when the cell becomes
    /// empty. Returns whether anything changed.
    fn remove_from_value(
        &mut self,
        table: Table,
        key: &str,
        token: &str,
    ) -> Result<bool, SpaceError> {
        let Some(cell) = self.get(table, key)? else {
            return Ok(false);
        };
        if cell == token {
            self.delete(table, key)?;
            return Ok(true);
        }
        let remaining: Vec<&str> = cell.split(SEPARATOR).filter(|t| *t != token).collect();
        if remaining.len() == cell.split(SEPARATOR).count() {
            return Ok(false);
        }
        if remaining.is_empty() {
            self.delete(table, key)?;
        } else {
            self.put(table, key, &remaining.join(SEPARATOR))?;
        }
        Ok(true)
    }
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// A volatile backend over `BTreeMap`s.
///
/// Iteration order matches the persistent backend (lexicographic by key), so
/// the two are observationally interchangeable.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    tables: [BTreeMap<String, String>; 7],
}

impl MemStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn len(&self, table: Table) -> usize {
        self.tables[table.slot()].len()
    }

    /// Whether a table has no rows.
    #[must_use]
    pub fn is_empty(&self, table: Table) -> bool {
        self.tables[table.slot()].is_empty()
    }
}

impl TableStore for MemStore {
    fn get(&self, table: Table, key: &str) -> Result<Option<String>, SpaceError> {
        Ok(self.tables[table.slot()].get(key).cloned())
    }

    fn put(&mut self, table: Table, key: &str, value: &str) -> Result<(), SpaceError> {
        self.tables[table.slot()].insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &str) -> Result<bool, SpaceError> {
        Ok(self.tables[table.slot()].remove(key).is_some())
    }

    fn truncate(&mut self, table: Table) -> Result<(), SpaceError> {
        self.tables[table.slot()].clear();
        Ok(())
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, String)>, SpaceError> {
        Ok(self.tables[table.slot()]
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
