//! # redb-backed Table Storage
//!
//! The persistent store facade backend, using the redb embedded database:
//! - ACID per-operation transactions
//! - Crash safety (copy-on-write B-trees)
//! - Zero configuration
//!
//! Each logical table of the physical schema is one redb table. All tables
//! are created when the store is opened, so later reads never race a missing
//! table. Every facade call is its own transaction; the data space layers
//! above provide no cross-operation atomicity.

use crate::store::{Table, TableStore};
use crate::types::SpaceError;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

const PRIMARY: TableDefinition<&str, &str> = TableDefinition::new(Table::Primary.name());
const MAPPINGS: TableDefinition<&str, &str> = TableDefinition::new(Table::Mappings.name());
const VALUE_NAME_IDX: TableDefinition<&str, &str> =
    TableDefinition::new(Table::ValueNameIndex.name());
const OWNER_VALUE_IDX: TableDefinition<&str, &str> =
    TableDefinition::new(Table::OwnerValueIndex.name());
const NAME_IDX: TableDefinition<&str, &str> = TableDefinition::new(Table::NameIndex.name());
const VALUE_IDX: TableDefinition<&str, &str> = TableDefinition::new(Table::ValueIndex.name());
const OWNER_IDX: TableDefinition<&str, &str> = TableDefinition::new(Table::OwnerIndex.name());

const fn definition(table: Table) -> TableDefinition<'static, &'static str, &'static str> {
    match table {
        Table::Primary => PRIMARY,
        Table::Mappings => MAPPINGS,
        Table::ValueNameIndex => VALUE_NAME_IDX,
        Table::OwnerValueIndex => OWNER_VALUE_IDX,
        Table::NameIndex => NAME_IDX,
        Table::ValueIndex => VALUE_IDX,
        Table::OwnerIndex => OWNER_IDX,
    }
}

/// A disk-backed table store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns `SpaceError::StoreOpen` if the database cannot be created or
    /// its tables cannot be initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SpaceError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| SpaceError::StoreOpen(e.to_string()))?;

        // Initialize every table up front.
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| SpaceError::StoreOpen(e.to_string()))?;
            for table in Table::ALL {
                let _ = write_txn
                    .open_table(definition(table))
                    .map_err(|e| SpaceError::StoreOpen(e.to_string()))?;
            }
            write_txn
                .commit()
                .map_err(|e| SpaceError::StoreOpen(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), SpaceError> {
        self.db
            .compact()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl TableStore for RedbStore {
    fn get(&self, table: Table, key: &str) -> Result<Option<String>, SpaceError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        let t = read_txn
            .open_table(definition(table))
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        let value = t
            .get(key)
            .map_err(|e| SpaceError::Storage(e.to_string()))?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn put(&mut self, table: Table, key: &str, value: &str) -> Result<(), SpaceError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        {
            let mut t = write_txn
                .open_table(definition(table))
                .map_err(|e| SpaceError::Storage(e.to_string()))?;
            t.insert(key, value)
                .map_err(|e| SpaceError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &str) -> Result<bool, SpaceError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        let removed;
        {
            let mut t = write_txn
                .open_table(definition(table))
                .map_err(|e| SpaceError::Storage(e.to_string()))?;
            removed = t
                .remove(key)
                .map_err(|e| SpaceError::Storage(e.to_string()))?
                .is_some();
        }
        write_txn
            .commit()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        Ok(removed)
    }

    fn truncate(&mut self, table: Table) -> Result<(), SpaceError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        write_txn
            .delete_table(definition(table))
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        // Recreate immediately so later reads find the table.
        let _ = write_txn
            .open_table(definition(table))
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        write_txn
            .commit()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        Ok(())
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, String)>, SpaceError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SpaceError::Storage(e.to_string()))?;
        let t = read_txn
            .open_table(definition(table))
            .map_err(|e| SpaceError::Storage(e.to_string()))?;

        let mut rows = Vec::new();
        for entry in t.iter().map_err(|e| SpaceError::Storage(e.to_string()))? {
            let (key, value) = entry.map_err(|e| SpaceError::Storage(e.to_string()))?;
            rows.push((key.value().to_string(), value.value().to_string()));
        }
        Ok(rows)
    }
}

// =============================================================================
// TESTS
// =============================================================================
