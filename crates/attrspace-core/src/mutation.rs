//! # Mutation Engine
//!
//! All writes to the data space go through this module. Every operation
//! validates its whole precondition set before the first write, keeps each
//! enabled index table in sync with the primary table, and cascades mapping
//! cleanup so the well-formedness invariant holds again when it returns.
//!
//! Index maintenance rules per removed triple (id, name, value):
//! - the inverted pair mirrors triples exactly, so removal is unconditional;
//! - `NameIndex`/`OwnerIndex` rows live as long as `(id, name)` has any value;
//! - a `ValueIndex` row lives as long as `id` holds `value` under any name,
//!   which the owner/value index answers after its own update.

use crate::codec;
use crate::primitives::{ANY, MAX_ID_LENGTH, MAX_NAME_LENGTH, MAX_VALUE_LENGTH};
use crate::schema::{self, IndexProfile};
use crate::store::{Table, TableStore};
use crate::types::{AttrSet, Scope, SpaceError};
use tracing::debug;

/// The MutationEngine consolidates all data-space mutation operations.
pub struct MutationEngine;

// =============================================================================
// INPUT VALIDATION
// =============================================================================

fn validate_component(kind: &str, s: &str, max_len: usize) -> Result<(), SpaceError> {
    if s.is_empty() {
        return Err(SpaceError::InvalidInput(format!("{kind} must not be empty")));
    }
    if s.len() > max_len {
        return Err(SpaceError::InvalidInput(format!(
            "{kind} exceeds {max_len} bytes"
        )));
    }
    // Encoding rejects the reserved token; probe it here so validation
    // completes before any write.
    codec::encode(s)?;
    Ok(())
}

fn validate_id(id: &str) -> Result<(), SpaceError> {
    validate_component("entity id", id, MAX_ID_LENGTH)
}

fn validate_name(name: &str) -> Result<(), SpaceError> {
    validate_component("attribute name", name, MAX_NAME_LENGTH)
}

fn validate_value(value: &str) -> Result<(), SpaceError> {
    validate_component("attribute value", value, MAX_VALUE_LENGTH)
}

fn validate_pairs(set: &AttrSet) -> Result<(), SpaceError> {
    if set.is_empty() {
        return Err(SpaceError::InvalidInput(
            "attribute set must not be empty".to_string(),
        ));
    }
    for (name, value) in set {
        validate_name(name)?;
        validate_value(value)?;
    }
    Ok(())
}

impl MutationEngine {
    // =========================================================================
    // ENTITIES
    // =========================================================================

    /// Insert a new entity.
    ///
    /// # Errors
    ///
    /// `EntityExists` if the id is already present; `InvalidInput` for
    /// malformed ids.
    pub fn insert_entity<S: TableStore>(store: &mut S, id: &str) -> Result<(), SpaceError> {
        validate_id(id)?;
        if schema::entity_exists(store, id)? {
            return Err(SpaceError::EntityExists(id.to_string()));
        }
        debug!(id, "insert entity");
        schema::put_entity_row(store, id)
    }

    /// Delete an entity and cascade.
    ///
    /// Removes the entity row, all its outgoing attributes, every attribute
    /// anywhere whose value references it, and every mapping scoped on it.
    pub fn delete_entity<S: TableStore>(
        store: &mut S,
        profile: IndexProfile,
        id: &str,
    ) -> Result<(), SpaceError> {
        validate_id(id)?;
        if !schema::entity_exists(store, id)? {
            return Err(SpaceError::NoEntity(id.to_string()));
        }
        debug!(id, "delete entity");

        store.delete(Table::Primary, &schema::entity_key(id)?)?;

        // Outgoing attributes first, so a self-reference is not visited twice.
        for (name, value) in schema::attributes_of(store, profile, id)? {
            Self::remove_triple(store, profile, id, &name, &value)?;
        }

        // Incoming references: every surviving (owner, name) with value == id.
        for (owner, name) in schema::owners_of_value(store, profile, id)? {
            Self::remove_triple(store, profile, &owner, &name, id)?;
        }

        // Mappings scoped on the deleted entity.
        let scope = Scope::Entity(id.to_string());
        for row in schema::mappings_for_scope(store, &scope)? {
            store.delete(Table::Mappings, &row.key)?;
        }

        Ok(())
    }

    // =========================================================================
    // ATTRIBUTES
    // =========================================================================

    /// Insert an attribute triple.
    ///
    /// # Errors
    ///
    /// `NoEntity` if the owner is absent, or if the value is a reference to
    /// an absent entity; `AttributeExists` if the exact triple is already
    /// stored.
    pub fn insert_attribute<S: TableStore>(
        store: &mut S,
        profile: IndexProfile,
        id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), SpaceError> {
        validate_id(id)?;
        validate_name(name)?;
        validate_value(value)?;

        if !schema::entity_exists(store, id)? {
            return Err(SpaceError::NoEntity(id.to_string()));
        }
        if !codec::is_literal(value) && !schema::entity_exists(store, value)? {
            return Err(SpaceError::NoEntity(value.to_string()));
        }
        if schema::has_triple(store, id, name, value)? {
            return Err(SpaceError::AttributeExists(
                id.to_string(),
                name.to_string(),
                value.to_string(),
            ));
        }
        debug!(id, name, value, "insert attribute");

        store.add_to_value(
            Table::Primary,
            &schema::attr_key(id, name)?,
            &codec::encode(value)?,
        )?;
        Self::index_add(store, profile, id, name, value)
    }

    /// Delete attributes, with `*` accepted for the name, the value, or both.
    ///
    /// # Errors
    ///
    /// `NoEntity` if the owner is absent; `NoAttribute` if nothing matched.
    pub fn delete_attribute<S: TableStore>(
        store: &mut S,
        profile: IndexProfile,
        id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), SpaceError> {
        validate_id(id)?;
        let any_name = name == ANY;
        let any_value = value == ANY;
        if !any_name {
            validate_name(name)?;
        }
        if !any_value {
            validate_value(value)?;
        }
        if !schema::entity_exists(store, id)? {
            return Err(SpaceError::NoEntity(id.to_string()));
        }

        let targets: Vec<(String, String)> = match (any_name, any_value) {
            (true, true) => schema::attributes_of(store, profile, id)?,
            (true, false) => schema::names_for_value(store, profile, id, value)?
                .into_iter()
                .map(|n| (n, value.to_string()))
                .collect(),
            (false, true) => schema::values_for_name(store, id, name)?
                .into_iter()
                .map(|v| (name.to_string(), v))
                .collect(),
            (false, false) => {
                if schema::has_triple(store, id, name, value)? {
                    vec![(name.to_string(), value.to_string())]
                } else {
                    Vec::new()
                }
            }
        };

        if targets.is_empty() {
            return Err(SpaceError::NoAttribute(id.to_string()));
        }
        debug!(id, count = targets.len(), "delete attributes");

        for (n, v) in targets {
            Self::remove_triple(store, profile, id, &n, &v)?;
        }
        Ok(())
    }

    // =========================================================================
    // MAPPINGS
    // =========================================================================

    /// Record a synonym set for `(scope, original)`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for empty sets or subset overlap between original and
    /// synonym; `NoEntity`/`NoAttribute` when a specific scope is absent or
    /// does not currently hold every original pair; `MappingExists` when the
    /// identical synonym is already recorded.
    pub fn insert_mapping<S: TableStore>(
        store: &mut S,
        scope: &Scope,
        original: &AttrSet,
        synonym: &AttrSet,
    ) -> Result<(), SpaceError> {
        validate_pairs(original)?;
        validate_pairs(synonym)?;
        if original.is_subset(synonym) || synonym.is_subset(original) {
            return Err(SpaceError::InvalidInput(
                "original and synonym must not contain one another".to_string(),
            ));
        }
        if let Scope::Entity(id) = scope {
            validate_id(id)?;
            if !schema::entity_exists(store, id)? {
                return Err(SpaceError::NoEntity(id.clone()));
            }
            for (name, value) in original {
                if !schema::has_triple(store, id, name, value)? {
                    return Err(SpaceError::NoAttribute(id.clone()));
                }
            }
        }

        let key = schema::mapping_key(scope, original)?;
        let token = codec::encode(&schema::serialize_set(synonym)?)?;
        if store.value_contains(Table::Mappings, &key, &token)? {
            return Err(SpaceError::MappingExists);
        }
        debug!(scope = scope.as_str(), "insert mapping");
        store.add_to_value(Table::Mappings, &key, &token)
    }

    /// Delete mappings.
    ///
    /// `original = None` and `synonym = None` both mean the wildcard. The
    /// three accepted shapes: exact synonym, every synonym of one original,
    /// every mapping of the scope.
    pub fn delete_mapping<S: TableStore>(
        store: &mut S,
        scope: &Scope,
        original: Option<&AttrSet>,
        synonym: Option<&AttrSet>,
    ) -> Result<(), SpaceError> {
        if let Scope::Entity(id) = scope {
            validate_id(id)?;
            if !schema::entity_exists(store, id)? {
                return Err(SpaceError::NoEntity(id.clone()));
            }
        }
        debug!(scope = scope.as_str(), "delete mapping");

        match (original, synonym) {
            (Some(original), Some(synonym)) => {
                let key = schema::mapping_key(scope, original)?;
                let token = codec::encode(&schema::serialize_set(synonym)?)?;
                if !store.remove_from_value(Table::Mappings, &key, &token)? {
                    return Err(SpaceError::NoMapping);
                }
                Ok(())
            }
            (Some(original), None) => {
                let key = schema::mapping_key(scope, original)?;
                if !store.delete(Table::Mappings, &key)? {
                    return Err(SpaceError::NoMapping);
                }
                Ok(())
            }
            (None, None) => {
                let rows = schema::mappings_for_scope(store, scope)?;
                if rows.is_empty() {
                    return Err(SpaceError::NoMapping);
                }
                for row in rows {
                    store.delete(Table::Mappings, &row.key)?;
                }
                Ok(())
            }
            (None, Some(_)) => Err(SpaceError::InvalidInput(
                "cannot match a synonym under a wildcard original".to_string(),
            )),
        }
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Truncate every table.
    pub fn clear<S: TableStore>(store: &mut S) -> Result<(), SpaceError> {
        for table in Table::ALL {
            store.truncate(table)?;
        }
        Ok(())
    }

    /// Re-derive every index table from the primary table.
    ///
    /// Indexes are a cache of the primary table; this is the recovery path
    /// after a crash that may have left them inconsistent.
    pub fn rebuild_indexes<S: TableStore>(
        store: &mut S,
        profile: IndexProfile,
    ) -> Result<(), SpaceError> {
        for table in [
            Table::ValueNameIndex,
            Table::OwnerValueIndex,
            Table::NameIndex,
            Table::ValueIndex,
            Table::OwnerIndex,
        ] {
            store.truncate(table)?;
        }

        for (key, cell) in store.scan(Table::Primary)? {
            let mut parts = codec::split(&key);
            let Some(enc_id) = parts.next() else { continue };
            let Some(enc_name) = parts.next() else {
                continue; // entity row
            };
            let id = codec::decode(enc_id);
            let name = codec::decode(enc_name);
            for token in cell.split(crate::primitives::SEPARATOR) {
                let value = codec::decode(token);
                Self::index_add(store, profile, &id, &name, &value)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn index_add<S: TableStore>(
        store: &mut S,
        profile: IndexProfile,
        id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), SpaceError> {
        if profile.inverted() {
            store.add_to_value(
                Table::ValueNameIndex,
                &schema::pair_key(value, name)?,
                &codec::encode(id)?,
            )?;
            store.add_to_value(
                Table::OwnerValueIndex,
                &schema::pair_key(id, value)?,
                &codec::encode(name)?,
            )?;
        }
        if profile.scalar() {
            store.add_to_value(Table::NameIndex, &codec::encode(name)?, &codec::encode(id)?)?;
            store.add_to_value(Table::ValueIndex, &codec::encode(value)?, &codec::encode(id)?)?;
            store.add_to_value(Table::OwnerIndex, &codec::encode(id)?, &codec::encode(name)?)?;
        }
        Ok(())
    }

    /// Remove one concrete triple, keep every index consistent, and cascade
    /// mapping cleanup for the removed pair.
    fn remove_triple<S: TableStore>(
        store: &mut S,
        profile: IndexProfile,
        id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), SpaceError> {
        let akey = schema::attr_key(id, name)?;
        store.remove_from_value(Table::Primary, &akey, &codec::encode(value)?)?;
        let name_exhausted = store.get(Table::Primary, &akey)?.is_none();

        if profile.inverted() {
            store.remove_from_value(
                Table::ValueNameIndex,
                &schema::pair_key(value, name)?,
                &codec::encode(id)?,
            )?;
            store.remove_from_value(
                Table::OwnerValueIndex,
                &schema::pair_key(id, value)?,
                &codec::encode(name)?,
            )?;
        }
        if profile.scalar() {
            if name_exhausted {
                store.remove_from_value(
                    Table::NameIndex,
                    &codec::encode(name)?,
                    &codec::encode(id)?,
                )?;
                store.remove_from_value(
                    Table::OwnerIndex,
                    &codec::encode(id)?,
                    &codec::encode(name)?,
                )?;
            }
            let value_survives = store
                .get(Table::OwnerValueIndex, &schema::pair_key(id, value)?)?
                .is_some();
            if !value_survives {
                store.remove_from_value(
                    Table::ValueIndex,
                    &codec::encode(value)?,
                    &codec::encode(id)?,
                )?;
            }
        }

        Self::cascade_mapping_removal(store, id, name, value)
    }

    /// Prune a removed pair out of every mapping scoped on its owner.
    ///
    /// A set that loses the pair shrinks; an original that shrinks to empty
    /// drops its row; a synonym that shrinks to empty is dropped; after
    /// pruning, synonyms that contain or are contained by the original are
    /// dropped to restore well-formedness.
    fn cascade_mapping_removal<S: TableStore>(
        store: &mut S,
        id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), SpaceError> {
        let scope = Scope::Entity(id.to_string());
        let pair = (name.to_string(), value.to_string());

        let keys: Vec<String> = schema::mappings_for_scope(store, &scope)?
            .into_iter()
            .map(|row| row.key)
            .collect();
        for key in keys {
            // Rewriting an earlier row can merge into a later one; always
            // work from the row's current state.
            let Some(row) = schema::mapping_row_at(store, &key)? else {
                continue;
            };
            let in_original = row.original.contains(&pair);
            let in_synonyms = row.synonyms.iter().any(|s| s.contains(&pair));
            if !in_original && !in_synonyms {
                continue;
            }

            let mut original = row.original.clone();
            original.remove(&pair);
            store.delete(Table::Mappings, &row.key)?;
            if original.is_empty() {
                continue;
            }

            let mut synonyms: Vec<AttrSet> = row
                .synonyms
                .into_iter()
                .map(|mut s| {
                    s.remove(&pair);
                    s
                })
                .filter(|s| !s.is_empty())
                .collect();
            synonyms.retain(|s| !original.is_subset(s) && !s.is_subset(&original));
            if synonyms.is_empty() {
                continue;
            }

            let new_key = schema::mapping_key(&scope, &original)?;
            for syn in &synonyms {
                store.add_to_value(
                    Table::Mappings,
                    &new_key,
                    &codec::encode(&schema::serialize_set(syn)?)?,
                )?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use crate::types::attr_set;

    fn space(profile: IndexProfile) -> (MemStore, IndexProfile) {
        (MemStore::new(), profile)
    }

    #[test]
    fn insert_entity_then_duplicate_fails() {
        let (mut store, _) = space(IndexProfile::All);

        MutationEngine::insert_entity(&mut store, "a").expect("insert");
        assert!(matches!(
            MutationEngine::insert_entity(&mut store, "a"),
            Err(SpaceError::EntityExists(_))
        ));
    }

    #[test]
    fn insert_entity_rejects_reserved_token() {
        let (mut store, _) = space(IndexProfile::All);
        let bad = format!("x{}y", crate::primitives::INVALID_TOKEN);

        assert!(matches!(
            MutationEngine::insert_entity(&mut store, &bad),
            Err(SpaceError::InvalidInput(_))
        ));
        assert!(schema::all_entities(&store).expect("scan").is_empty());
    }

    #[test]
    fn insert_attribute_requires_owner_and_target() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "a").expect("insert");

        // Missing owner.
        assert!(matches!(
            MutationEngine::insert_attribute(&mut store, profile, "ghost", "k", "\"v\""),
            Err(SpaceError::NoEntity(_))
        ));
        // Reference to a missing entity.
        assert!(matches!(
            MutationEngine::insert_attribute(&mut store, profile, "a", "k", "ghost"),
            Err(SpaceError::NoEntity(_))
        ));
        // Literal needs no target.
        MutationEngine::insert_attribute(&mut store, profile, "a", "k", "\"v\"").expect("insert");
    }

    #[test]
    fn duplicate_triple_rejected_but_same_name_new_value_allowed() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "a").expect("insert");

        MutationEngine::insert_attribute(&mut store, profile, "a", "k", "\"v1\"").expect("insert");
        assert!(matches!(
            MutationEngine::insert_attribute(&mut store, profile, "a", "k", "\"v1\""),
            Err(SpaceError::AttributeExists(_, _, _))
        ));
        MutationEngine::insert_attribute(&mut store, profile, "a", "k", "\"v2\"").expect("insert");

        let attrs = schema::attributes_of(&store, profile, "a").expect("attrs");
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn delete_attribute_exact_updates_every_index() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "a").expect("insert");
        MutationEngine::insert_entity(&mut store, "b").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "k", "b").expect("insert");

        MutationEngine::delete_attribute(&mut store, profile, "a", "k", "b").expect("delete");

        assert!(schema::attributes_of(&store, profile, "a")
            .expect("attrs")
            .is_empty());
        assert!(schema::owners_of_value(&store, profile, "b")
            .expect("owners")
            .is_empty());
        assert!(store.is_empty(Table::ValueNameIndex));
        assert!(store.is_empty(Table::OwnerValueIndex));
        assert!(store.is_empty(Table::NameIndex));
        assert!(store.is_empty(Table::ValueIndex));
        assert!(store.is_empty(Table::OwnerIndex));
    }

    #[test]
    fn delete_attribute_wildcard_value() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "a").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "k", "\"v1\"").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "k", "\"v2\"").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "m", "\"v3\"").expect("insert");

        MutationEngine::delete_attribute(&mut store, profile, "a", "k", ANY).expect("delete");

        let attrs = schema::attributes_of(&store, profile, "a").expect("attrs");
        assert_eq!(attrs, vec![("m".to_string(), "\"v3\"".to_string())]);
    }

    #[test]
    fn delete_attribute_wildcard_name() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "a").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "k1", "\"v\"").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "k2", "\"v\"").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "k3", "\"w\"").expect("insert");

        MutationEngine::delete_attribute(&mut store, profile, "a", ANY, "\"v\"").expect("delete");

        let attrs = schema::attributes_of(&store, profile, "a").expect("attrs");
        assert_eq!(attrs, vec![("k3".to_string(), "\"w\"".to_string())]);
    }

    #[test]
    fn delete_attribute_nothing_matched() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "a").expect("insert");

        assert!(matches!(
            MutationEngine::delete_attribute(&mut store, profile, "a", ANY, ANY),
            Err(SpaceError::NoAttribute(_))
        ));
        assert!(matches!(
            MutationEngine::delete_attribute(&mut store, profile, "ghost", ANY, ANY),
            Err(SpaceError::NoEntity(_))
        ));
    }

    #[test]
    fn delete_entity_cascades_incoming_references() {
        for profile in [
            IndexProfile::StoreOnly,
            IndexProfile::Inverted,
            IndexProfile::All,
        ] {
            let (mut store, _) = space(profile);
            MutationEngine::insert_entity(&mut store, "a").expect("insert");
            MutationEngine::insert_entity(&mut store, "b").expect("insert");
            MutationEngine::insert_attribute(&mut store, profile, "a", "k", "b").expect("insert");
            MutationEngine::insert_attribute(&mut store, profile, "b", "k", "\"v\"")
                .expect("insert");

            MutationEngine::delete_entity(&mut store, profile, "b").expect("delete");

            assert!(!schema::entity_exists(&store, "b").expect("exists"));
            // The dangling reference a -k-> b is gone.
            assert!(schema::attributes_of(&store, profile, "a")
                .expect("attrs")
                .is_empty());
            assert!(schema::owners_of_value(&store, profile, "b")
                .expect("owners")
                .is_empty());
        }
    }

    #[test]
    fn delete_entity_with_self_loop() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "x").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "x", "k", "x").expect("insert");

        MutationEngine::delete_entity(&mut store, profile, "x").expect("delete");

        assert!(schema::all_entities(&store).expect("scan").is_empty());
        for table in Table::ALL {
            assert!(store.is_empty(table), "table {table:?} not empty");
        }
    }

    #[test]
    fn insert_mapping_validates_everything_first() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "e").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "e", "k1", "\"s1\"")
            .expect("insert");

        let original = attr_set(&[("k1", "\"s1\"")]);
        let synonym = attr_set(&[("k3", "\"s2\"")]);

        // Subset overlap.
        assert!(matches!(
            MutationEngine::insert_mapping(
                &mut store,
                &Scope::Entity("e".to_string()),
                &original,
                &original
            ),
            Err(SpaceError::InvalidInput(_))
        ));
        // Original pair not held by the scope entity.
        assert!(matches!(
            MutationEngine::insert_mapping(
                &mut store,
                &Scope::Entity("e".to_string()),
                &attr_set(&[("k9", "\"zz\"")]),
                &synonym
            ),
            Err(SpaceError::NoAttribute(_))
        ));
        // Absent scope entity.
        assert!(matches!(
            MutationEngine::insert_mapping(
                &mut store,
                &Scope::Entity("ghost".to_string()),
                &original,
                &synonym
            ),
            Err(SpaceError::NoEntity(_))
        ));

        MutationEngine::insert_mapping(
            &mut store,
            &Scope::Entity("e".to_string()),
            &original,
            &synonym,
        )
        .expect("insert");
        assert!(matches!(
            MutationEngine::insert_mapping(
                &mut store,
                &Scope::Entity("e".to_string()),
                &original,
                &synonym
            ),
            Err(SpaceError::MappingExists)
        ));
    }

    #[test]
    fn generic_mapping_needs_no_attribute_backing() {
        let (mut store, _) = space(IndexProfile::All);
        MutationEngine::insert_mapping(
            &mut store,
            &Scope::Generic,
            &attr_set(&[("k1", "\"s1\"")]),
            &attr_set(&[("k2", "\"s2\"")]),
        )
        .expect("insert");

        let rows = schema::mappings_for_scope(&store, &Scope::Generic).expect("rows");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn delete_mapping_shapes() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "e").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "e", "k1", "\"s1\"")
            .expect("insert");
        let scope = Scope::Entity("e".to_string());
        let original = attr_set(&[("k1", "\"s1\"")]);
        let syn1 = attr_set(&[("k3", "\"s2\"")]);
        let syn2 = attr_set(&[("k4", "\"s3\"")]);

        MutationEngine::insert_mapping(&mut store, &scope, &original, &syn1).expect("insert");
        MutationEngine::insert_mapping(&mut store, &scope, &original, &syn2).expect("insert");

        // Exact.
        MutationEngine::delete_mapping(&mut store, &scope, Some(&original), Some(&syn1))
            .expect("delete");
        assert_eq!(
            schema::synonyms_of(&store, &scope, &original).expect("syns"),
            vec![syn2.clone()]
        );
        assert!(matches!(
            MutationEngine::delete_mapping(&mut store, &scope, Some(&original), Some(&syn1)),
            Err(SpaceError::NoMapping)
        ));

        // All synonyms of one original.
        MutationEngine::delete_mapping(&mut store, &scope, Some(&original), None)
            .expect("delete");
        assert!(schema::mappings_for_scope(&store, &scope)
            .expect("rows")
            .is_empty());

        // Whole scope.
        MutationEngine::insert_mapping(&mut store, &scope, &original, &syn1).expect("insert");
        MutationEngine::delete_mapping(&mut store, &scope, None, None).expect("delete");
        assert!(matches!(
            MutationEngine::delete_mapping(&mut store, &scope, None, None),
            Err(SpaceError::NoMapping)
        ));
    }

    #[test]
    fn attribute_removal_prunes_participating_mappings() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "e").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "e", "k1", "\"s1\"")
            .expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "e", "k2", "\"s2\"")
            .expect("insert");
        let scope = Scope::Entity("e".to_string());

        MutationEngine::insert_mapping(
            &mut store,
            &scope,
            &attr_set(&[("k1", "\"s1\""), ("k2", "\"s2\"")]),
            &attr_set(&[("k3", "\"s3\"")]),
        )
        .expect("insert");

        // Removing one pair of the original shrinks it in place.
        MutationEngine::delete_attribute(&mut store, profile, "e", "k2", "\"s2\"")
            .expect("delete");

        let rows = schema::mappings_for_scope(&store, &scope).expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].original, attr_set(&[("k1", "\"s1\"")]));
        assert_eq!(rows[0].synonyms, vec![attr_set(&[("k3", "\"s3\"")])]);

        // Removing the last original pair drops the row entirely.
        MutationEngine::delete_attribute(&mut store, profile, "e", "k1", "\"s1\"")
            .expect("delete");
        assert!(schema::mappings_for_scope(&store, &scope)
            .expect("rows")
            .is_empty());
    }

    #[test]
    fn mapping_cascade_restores_subset_invariant() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "e").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "e", "k1", "\"s1\"")
            .expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "e", "k2", "\"s2\"")
            .expect("insert");
        let scope = Scope::Entity("e".to_string());

        // Synonym shares pair (k2, "s2") with the original; pruning the
        // shared pair leaves the synonym equal to a subset of the original.
        MutationEngine::insert_mapping(
            &mut store,
            &scope,
            &attr_set(&[("k1", "\"s1\""), ("k2", "\"s2\"")]),
            &attr_set(&[("k1", "\"s1\""), ("k9", "\"x\"")]),
        )
        .expect("insert");

        MutationEngine::delete_attribute(&mut store, profile, "e", "k2", "\"s2\"")
            .expect("delete");

        // Original shrank to {(k1,"s1")}, which is a subset of the synonym
        // {(k1,"s1"),(k9,"x")}; the synonym must be dropped, emptying the row.
        assert!(schema::mappings_for_scope(&store, &scope)
            .expect("rows")
            .is_empty());
    }

    #[test]
    fn rebuild_indexes_rederives_from_primary() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "a").expect("insert");
        MutationEngine::insert_entity(&mut store, "b").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "k", "b").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "m", "\"v\"").expect("insert");

        let before: Vec<_> = [
            Table::ValueNameIndex,
            Table::OwnerValueIndex,
            Table::NameIndex,
            Table::ValueIndex,
            Table::OwnerIndex,
        ]
        .iter()
        .map(|t| store.scan(*t).expect("scan"))
        .collect();

        MutationEngine::rebuild_indexes(&mut store, profile).expect("rebuild");

        let after: Vec<_> = [
            Table::ValueNameIndex,
            Table::OwnerValueIndex,
            Table::NameIndex,
            Table::ValueIndex,
            Table::OwnerIndex,
        ]
        .iter()
        .map(|t| store.scan(*t).expect("scan"))
        .collect();

        assert_eq!(before, after);
    }

    #[test]
    fn clear_truncates_everything() {
        let (mut store, profile) = space(IndexProfile::All);
        MutationEngine::insert_entity(&mut store, "a").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "a", "k", "\"v\"").expect("insert");

        MutationEngine::clear(&mut store).expect("clear");

        for table in Table::ALL {
            assert!(store.is_empty(table));
        }
    }
}
