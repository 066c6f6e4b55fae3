//! # Persistent Storage Backends
//!
//! Disk-backed implementations of the store facade.

pub mod redb_store;

pub use redb_store::RedbStore;
