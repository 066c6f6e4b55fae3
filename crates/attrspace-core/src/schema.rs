//! # Physical Schema
//!
//! The key/value layout of the six logical table shapes, and the read paths
//! over them. Everything above this module speaks entity ids, attribute
//! names, raw values, and attribute sets; everything below speaks encoded
//! keys and separator-joined cells.
//!
//! | table | key | value |
//! |---|---|---|
//! | `Primary` | `enc(id)` / `enc(id) S enc(name)` | `"1"` / value tokens |
//! | `Mappings` | `enc(scope) S enc(serialize(original))` | serialized synonyms |
//! | `ValueNameIndex` | `enc(value) S enc(name)` | owner ids |
//! | `OwnerValueIndex` | `enc(id) S enc(value)` | names |
//! | `NameIndex` | `enc(name)` | owner ids |
//! | `ValueIndex` | `enc(value)` | owner ids |
//! | `OwnerIndex` | `enc(id)` | names |
//!
//! Index tables are pure accelerants: every row is derivable from `Primary`,
//! and read paths must produce identical answers whichever profile is active.

use crate::codec;
use crate::primitives::{ENTITY_MARKER, SEPARATOR};
use crate::store::{Table, TableStore};
use crate::types::{AttrSet, Scope, SpaceError};

// =============================================================================
// INDEX PROFILES
// =============================================================================

/// Which auxiliary index tables a data space maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexProfile {
    /// Only the primary table and the mappings table.
    StoreOnly,
    /// Plus the two compound inverted indexes.
    Inverted,
    /// Plus the three scalar indexes.
    All,
}

impl IndexProfile {
    /// Whether the compound inverted indexes are maintained.
    #[must_use]
    pub const fn inverted(self) -> bool {
        !matches!(self, Self::StoreOnly)
    }

    /// Whether the scalar indexes are maintained.
    #[must_use]
    pub const fn scalar(self) -> bool {
        matches!(self, Self::All)
    }
}

// =============================================================================
// KEY BUILDERS
// =============================================================================

/// Key of an entity row.
pub fn entity_key(id: &str) -> Result<String, SpaceError> {
    codec::encode(id)
}

/// Key of an attribute row: `enc(id) S enc(name)`.
pub fn attr_key(id: &str, name: &str) -> Result<String, SpaceError> {
    Ok(codec::join(&[&codec::encode(id)?, &codec::encode(name)?]))
}

/// Generic two-component index key.
pub fn pair_key(first: &str, second: &str) -> Result<String, SpaceError> {
    Ok(codec::join(&[
        &codec::encode(first)?,
        &codec::encode(second)?,
    ]))
}

/// Key of a mapping row: `enc(scope) S enc(serialize(original))`.
pub fn mapping_key(scope: &Scope, original: &AttrSet) -> Result<String, SpaceError> {
    Ok(codec::join(&[
        &codec::encode(scope.as_str())?,
        &codec::encode(&serialize_set(original)?)?,
    ]))
}

/// Prefix shared by every mapping row of one scope.
pub fn mapping_scope_prefix(scope: &Scope) -> Result<String, SpaceError> {
    Ok(format!("{}{}", codec::encode(scope.as_str())?, SEPARATOR))
}

// =============================================================================
// ATTRIBUTE-SET SERIALIZATION
// =============================================================================

/// Canonical serialization of an attribute set: the JSON array of its
/// `[name, value]` pairs in sorted order.
///
/// The output is codec-encoded by the key builders before it touches the
/// store, so the separator never appears raw inside a key or cell.
pub fn serialize_set(set: &AttrSet) -> Result<String, SpaceError> {
    let pairs: Vec<&(String, String)> = set.iter().collect();
    serde_json::to_string(&pairs).map_err(|e| SpaceError::Storage(e.to_string()))
}

/// Inverse of [`serialize_set`].
pub fn deserialize_set(s: &str) -> Result<AttrSet, SpaceError> {
    let pairs: Vec<(String, String)> =
        serde_json::from_str(s).map_err(|e| SpaceError::Storage(e.to_string()))?;
    Ok(pairs.into_iter().collect())
}

// =============================================================================
// PRIMARY-TABLE READ PATHS
// =============================================================================

/// Whether an entity row exists.
pub fn entity_exists<S: TableStore>(store: &S, id: &str) -> Result<bool, SpaceError> {
    Ok(store.get(Table::Primary, &entity_key(id)?)?.is_some())
}

/// All entity ids, in key order.
///
/// Entity rows are the primary keys without a separator; attribute rows
/// always contain one.
pub fn all_entities<S: TableStore>(store: &S) -> Result<Vec<String>, SpaceError> {
    Ok(store
        .scan(Table::Primary)?
        .into_iter()
        .filter(|(k, _)| !k.contains(SEPARATOR))
        .map(|(k, _)| codec::decode(&k))
        .collect())
}

/// The decoded values stored under `(id, name)`, in cell order.
pub fn values_for_name<S: TableStore>(
    store: &S,
    id: &str,
    name: &str,
) -> Result<Vec<String>, SpaceError> {
    let Some(cell) = store.get(Table::Primary, &attr_key(id, name)?)? else {
        return Ok(Vec::new());
    };
    Ok(codec::split(&cell).map(codec::decode).collect())
}

/// Whether the exact (id, name, value) triple is stored.
pub fn has_triple<S: TableStore>(
    store: &S,
    id: &str,
    name: &str,
    value: &str,
) -> Result<bool, SpaceError> {
    store.value_contains(Table::Primary, &attr_key(id, name)?, &codec::encode(value)?)
}

/// The full (name, value) multiset of an entity, decoded.
///
/// Uses the owner index when the profile maintains it, otherwise a prefix
/// scan of the primary table.
pub fn attributes_of<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    id: &str,
) -> Result<Vec<(String, String)>, SpaceError> {
    let mut pairs = Vec::new();
    if profile.scalar() {
        let Some(names_cell) = store.get(Table::OwnerIndex, &entity_key(id)?)? else {
            return Ok(pairs);
        };
        for enc_name in codec::split(&names_cell) {
            let name = codec::decode(enc_name);
            for value in values_for_name(store, id, &name)? {
                pairs.push((name.clone(), value));
            }
        }
    } else {
        let prefix = format!("{}{}", entity_key(id)?, SEPARATOR);
        for (key, cell) in store.scan_prefix(Table::Primary, &prefix)? {
            let Some(enc_name) = codec::split(&key).nth(1) else {
                continue;
            };
            let name = codec::decode(enc_name);
            for token in codec::split(&cell) {
                pairs.push((name.clone(), codec::decode(token)));
            }
        }
    }
    Ok(pairs)
}

/// The names under which `id` stores `value`.
///
/// Uses the owner/value inverted index when available, otherwise a prefix
/// scan of the primary table.
pub fn names_for_value<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    id: &str,
    value: &str,
) -> Result<Vec<String>, SpaceError> {
    if profile.inverted() {
        let Some(cell) = store.get(Table::OwnerValueIndex, &pair_key(id, value)?)? else {
            return Ok(Vec::new());
        };
        return Ok(codec::split(&cell).map(codec::decode).collect());
    }

    let enc_value = codec::encode(value)?;
    let prefix = format!("{}{}", entity_key(id)?, SEPARATOR);
    let mut names = Vec::new();
    for (key, cell) in store.scan_prefix(Table::Primary, &prefix)? {
        if codec::split(&cell).any(|t| t == enc_value) {
            if let Some(enc_name) = codec::split(&key).nth(1) {
                names.push(codec::decode(enc_name));
            }
        }
    }
    Ok(names)
}

/// Every (owner, name) pair holding `value` as an attribute value.
///
/// Strategy by profile: scalar value index plus owner/value index, else the
/// value/name inverted index, else a full scan of the primary table.
pub fn owners_of_value<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    value: &str,
) -> Result<Vec<(String, String)>, SpaceError> {
    let mut hits = Vec::new();

    if profile.scalar() {
        let Some(owners_cell) = store.get(Table::ValueIndex, &codec::encode(value)?)? else {
            return Ok(hits);
        };
        for enc_owner in codec::split(&owners_cell) {
            let owner = codec::decode(enc_owner);
            for name in names_for_value(store, profile, &owner, value)? {
                hits.push((owner.clone(), name));
            }
        }
        return Ok(hits);
    }

    if profile.inverted() {
        let prefix = format!("{}{}", codec::encode(value)?, SEPARATOR);
        for (key, cell) in store.scan_prefix(Table::ValueNameIndex, &prefix)? {
            let Some(enc_name) = codec::split(&key).nth(1) else {
                continue;
            };
            let name = codec::decode(enc_name);
            for enc_owner in codec::split(&cell) {
                hits.push((codec::decode(enc_owner), name.clone()));
            }
        }
        return Ok(hits);
    }

    let enc_value = codec::encode(value)?;
    for (key, cell) in store.scan(Table::Primary)? {
        if !key.contains(SEPARATOR) {
            continue;
        }
        if codec::split(&cell).any(|t| t == enc_value) {
            let mut parts = codec::split(&key);
            let owner = parts.next().map(codec::decode);
            let name = parts.next().map(codec::decode);
            if let (Some(owner), Some(name)) = (owner, name) {
                hits.push((owner, name));
            }
        }
    }
    Ok(hits)
}

// =============================================================================
// MAPPINGS-TABLE READ PATHS
// =============================================================================

/// A mapping row, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    /// Storage key of the row.
    pub key: String,
    /// The original attribute set (from the key).
    pub original: AttrSet,
    /// The recorded synonym sets (from the cell).
    pub synonyms: Vec<AttrSet>,
}

fn parse_mapping_row(key: &str, cell: &str) -> Result<MappingRow, SpaceError> {
    let enc_original = codec::split(key).nth(1).ok_or_else(|| {
        SpaceError::Storage(format!("malformed mapping key: {key}"))
    })?;
    let original = deserialize_set(&codec::decode(enc_original))?;
    let mut synonyms = Vec::new();
    for token in codec::split(cell) {
        synonyms.push(deserialize_set(&codec::decode(token))?);
    }
    Ok(MappingRow {
        key: key.to_string(),
        original,
        synonyms,
    })
}

/// Re-read one mapping row by key.
pub fn mapping_row_at<S: TableStore>(
    store: &S,
    key: &str,
) -> Result<Option<MappingRow>, SpaceError> {
    match store.get(Table::Mappings, key)? {
        Some(cell) => Ok(Some(parse_mapping_row(key, &cell)?)),
        None => Ok(None),
    }
}

/// Every mapping row of one scope.
pub fn mappings_for_scope<S: TableStore>(
    store: &S,
    scope: &Scope,
) -> Result<Vec<MappingRow>, SpaceError> {
    let prefix = mapping_scope_prefix(scope)?;
    let mut rows = Vec::new();
    for (key, cell) in store.scan_prefix(Table::Mappings, &prefix)? {
        rows.push(parse_mapping_row(&key, &cell)?);
    }
    Ok(rows)
}

/// The synonym sets recorded for `(scope, original)`, if any.
pub fn synonyms_of<S: TableStore>(
    store: &S,
    scope: &Scope,
    original: &AttrSet,
) -> Result<Vec<AttrSet>, SpaceError> {
    let Some(cell) = store.get(Table::Mappings, &mapping_key(scope, original)?)? else {
        return Ok(Vec::new());
    };
    let mut synonyms = Vec::new();
    for token in codec::split(&cell) {
        synonyms.push(deserialize_set(&codec::decode(token))?);
    }
    Ok(synonyms)
}

/// Whether the primary table marks `id` with the entity marker.
pub fn put_entity_row<S: TableStore>(store: &mut S, id: &str) -> Result<(), SpaceError> {
    store.put(Table::Primary, &entity_key(id)?, ENTITY_MARKER)
}

// =============================================================================
// TESTS
// =============================================================================
