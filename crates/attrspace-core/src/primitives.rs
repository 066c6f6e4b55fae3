//! # Reserved Tokens & Limits
//!
//! Hardcoded constants shared by every layer of the data space.
//!
//! The two reserved byte sequences are part of the persisted format: any two
//! implementations that agree on them (and on the logical schema) can read
//! each other's stores. They are compiled in and immutable at runtime.

/// The field separator joining encoded components inside composite keys and
/// multi-valued cells.
///
/// The codec guarantees the separator never appears inside an encoded
/// component, so splitting a key or cell by it is unambiguous.
pub const SEPARATOR: &str = "///";

/// The reserved invalid token.
///
/// Occurrences of [`SEPARATOR`] inside user strings are replaced by this
/// token before storage. User strings that already contain it are rejected
/// outright; it may never enter the store unescaped.
pub const INVALID_TOKEN: &str = "VeRysTr4nGEsTr1Ngn0b0dYW1lLeVerW4NTt0Use4s1d0RKey";

/// The wildcard token, matching any name or value without binding.
pub const ANY: &str = "*";

/// The sigil introducing a query variable; the suffix is the variable name.
pub const VAR_SIGIL: char = '$';

/// Cell value stored for a bare entity row in the primary table.
pub const ENTITY_MARKER: &str = "1";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for entity ids.
///
/// Ids longer than this are rejected before any write.
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum length for attribute names.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for attribute values (64 KB).
///
/// Prevents memory exhaustion from malformed input.
pub const MAX_VALUE_LENGTH: usize = 65536;

/// Maximum number of sibling conditions a mapping-aware search will
/// partition at one node.
///
/// Set partitions grow as the Bell numbers; this bound keeps a single node's
/// enumeration computationally bounded.
pub const MAX_PARTITION_SIBLINGS: usize = 12;
