//! # Query Evaluator
//!
//! The recursive tree-matcher behind `search`.
//!
//! Evaluation is depth-first over the condition tree. Sibling conditions are
//! satisfied left to right with backtracking: every way of satisfying a
//! condition is a candidate environment, and a later sibling's failure sends
//! the search back to the next candidate of an earlier one. Environments are
//! passed by value into speculative branches, so backtracking never unwinds
//! shared state.
//!
//! Matching terminates structurally: recursion descends the finite query
//! tree, never the (possibly cyclic) data graph on its own.

use crate::codec;
use crate::query::{Condition, SearchOptions, Term};
use crate::schema::{self, IndexProfile};
use crate::store::TableStore;
use crate::synonym;
use crate::types::{Bindings, SpaceError};
use tracing::debug;

/// Evaluate a query tree and collect the matching entity ids.
///
/// A constant root considers the single entity iff present; a wildcard or
/// variable root considers every entity, and a root variable binds to the
/// candidate id for the remainder of the search under that root.
///
/// # Errors
///
/// `InvalidInput` if the root is not a root-shaped condition.
pub fn search<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    root: &Condition,
    options: &SearchOptions,
) -> Result<Vec<String>, SpaceError> {
    if !root.is_root() {
        return Err(SpaceError::InvalidInput(
            "query root must be a root condition".to_string(),
        ));
    }
    debug!(
        children = root.children.len(),
        use_mappings = options.use_mappings,
        "search"
    );

    let candidates = match &root.value {
        Term::Const(id) => {
            if schema::entity_exists(store, id)? {
                vec![id.clone()]
            } else {
                Vec::new()
            }
        }
        Term::Any | Term::Var(_) => schema::all_entities(store)?,
    };

    let mut matches = Vec::new();
    for id in candidates {
        let env = match &root.value {
            Term::Var(name) => Bindings::new().bind(name, &id),
            _ => Bindings::new(),
        };
        if complies(store, profile, &id, &root.children, &env, options)?.is_some() {
            matches.push(id);
        }
    }
    Ok(matches)
}

/// Whether every condition can be satisfied against `id` under some
/// extension of `env`; the successful extension is returned.
///
/// With mappings enabled this is the partition-enumerating path; otherwise
/// the plain conjunction.
pub(crate) fn complies<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    id: &str,
    conditions: &[Condition],
    env: &Bindings,
    options: &SearchOptions,
) -> Result<Option<Bindings>, SpaceError> {
    if options.use_mappings {
        synonym::complies_mapped(store, profile, id, conditions, env, options)
    } else {
        comply_all(store, profile, id, conditions, env, options)
    }
}

/// Plain conjunction over sibling conditions, with backtracking.
pub(crate) fn comply_all<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    id: &str,
    conditions: &[Condition],
    env: &Bindings,
    options: &SearchOptions,
) -> Result<Option<Bindings>, SpaceError> {
    let Some((first, rest)) = conditions.split_first() else {
        return Ok(Some(env.clone()));
    };
    for candidate in satisfy(store, profile, id, first, env, options)? {
        if let Some(full) = comply_all(store, profile, id, rest, &candidate, options)? {
            return Ok(Some(full));
        }
    }
    Ok(None)
}

// =============================================================================
// PER-CONDITION SATISFACTION
// =============================================================================

/// Every environment extension under which `c` holds against `id`.
///
/// Four cases by which of the name and value slots are fixed after
/// substituting bound variables. Each case picks the cheapest physical path
/// the active profile offers; answers are profile-independent.
fn satisfy<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    id: &str,
    c: &Condition,
    env: &Bindings,
    options: &SearchOptions,
) -> Result<Vec<Bindings>, SpaceError> {
    let name_term = c
        .name
        .as_ref()
        .map_or(Term::Any, |t| t.resolve(env));
    let value_term = c.value.resolve(env);

    match (name_term.as_const(), value_term.as_const()) {
        // Both fixed: one membership probe.
        (Some(name), Some(value)) => {
            if !schema::has_triple(store, id, name, value)? {
                return Ok(Vec::new());
            }
            descend(store, profile, value, &c.children, env, options)
        }

        // Name fixed, value free: iterate the cell under (id, name).
        (Some(name), None) => {
            let mut out = Vec::new();
            for value in schema::values_for_name(store, id, name)? {
                let Some(bound) = bind_free(&value_term, &value, env) else {
                    continue;
                };
                out.extend(descend(store, profile, &value, &c.children, &bound, options)?);
            }
            Ok(out)
        }

        // Name free, value fixed: names via the owner/value index or a scan.
        (None, Some(value)) => {
            let names = schema::names_for_value(store, profile, id, value)?;
            match &name_term {
                Term::Var(var) => {
                    let mut out = Vec::new();
                    for name in names {
                        if env.has_value(&name) {
                            continue;
                        }
                        let bound = env.bind(var, &name);
                        out.extend(descend(
                            store, profile, value, &c.children, &bound, options,
                        )?);
                    }
                    Ok(out)
                }
                _ => {
                    if names.is_empty() {
                        return Ok(Vec::new());
                    }
                    descend(store, profile, value, &c.children, env, options)
                }
            }
        }

        // Both free: existence over the full (name, value) multiset.
        (None, None) => {
            let mut out = Vec::new();
            for (name, value) in schema::attributes_of(store, profile, id)? {
                let Some(after_name) = bind_free(&name_term, &name, env) else {
                    continue;
                };
                let Some(after_value) = bind_free(&value_term, &value, &after_name) else {
                    continue;
                };
                out.extend(descend(
                    store,
                    profile,
                    &value,
                    &c.children,
                    &after_value,
                    options,
                )?);
            }
            Ok(out)
        }
    }
}

/// Extend `env` for a free slot meeting `candidate`.
///
/// Wildcards bind nothing; a free variable binds to the candidate unless the
/// candidate equals a value already bound in the environment (the
/// distinctness rule), in which case the candidate is skipped.
fn bind_free(term: &Term, candidate: &str, env: &Bindings) -> Option<Bindings> {
    match term {
        Term::Any => Some(env.clone()),
        Term::Var(var) => {
            if env.has_value(candidate) {
                None
            } else {
                Some(env.bind(var, candidate))
            }
        }
        // Fixed slots are handled before binding sites are reached.
        Term::Const(_) => None,
    }
}

/// Recurse through a matched value into the child conditions.
///
/// Literals never recurse: a literal leaf with children is trivially
/// satisfied. A reference value re-enters `complies` with the referenced
/// entity as the new focus.
fn descend<S: TableStore>(
    store: &S,
    profile: IndexProfile,
    value: &str,
    children: &[Condition],
    env: &Bindings,
    options: &SearchOptions,
) -> Result<Vec<Bindings>, SpaceError> {
    if codec::is_literal(value) || children.is_empty() {
        return Ok(vec![env.clone()]);
    }
    Ok(complies(store, profile, value, children, env, options)?
        .into_iter()
        .collect())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MutationEngine;
    use crate::store::MemStore;

    const PROFILES: [IndexProfile; 3] = [
        IndexProfile::StoreOnly,
        IndexProfile::Inverted,
        IndexProfile::All,
    ];

    fn chain_store(profile: IndexProfile) -> MemStore {
        // A -k-> B -k-> C
        let mut store = MemStore::new();
        for id in ["A", "B", "C"] {
            MutationEngine::insert_entity(&mut store, id).expect("insert");
        }
        MutationEngine::insert_attribute(&mut store, profile, "A", "k", "B").expect("insert");
        MutationEngine::insert_attribute(&mut store, profile, "B", "k", "C").expect("insert");
        store
    }

    fn run(store: &MemStore, profile: IndexProfile, root: &Condition) -> Vec<String> {
        search(store, profile, root, &SearchOptions::new()).expect("search")
    }

    #[test]
    fn constant_root_without_conditions_checks_presence() {
        for profile in PROFILES {
            let store = chain_store(profile);
            assert_eq!(run(&store, profile, &Condition::root("A", vec![])), ["A"]);
            assert!(run(&store, profile, &Condition::root("Z", vec![])).is_empty());
        }
    }

    #[test]
    fn nested_constants_follow_references() {
        for profile in PROFILES {
            let store = chain_store(profile);
            let root = Condition::root(
                "A",
                vec![Condition::leaf(
                    "k",
                    "*",
                    vec![Condition::leaf("k", "C", vec![])],
                )],
            );
            assert_eq!(run(&store, profile, &root), ["A"]);
        }
    }

    #[test]
    fn wildcard_root_collects_every_match() {
        for profile in PROFILES {
            let store = chain_store(profile);
            let root = Condition::root("*", vec![Condition::leaf("k", "*", vec![])]);
            assert_eq!(run(&store, profile, &root), ["A", "B"]);
        }
    }

    #[test]
    fn name_wildcard_matches_any_name_with_value() {
        for profile in PROFILES {
            let store = chain_store(profile);
            let root = Condition::root("*", vec![Condition::leaf("*", "B", vec![])]);
            assert_eq!(run(&store, profile, &root), ["A"]);
        }
    }

    #[test]
    fn existence_check_when_both_slots_are_wildcards() {
        for profile in PROFILES {
            let mut store = chain_store(profile);
            MutationEngine::insert_entity(&mut store, "lonely").expect("insert");

            let root = Condition::root("*", vec![Condition::leaf("*", "*", vec![])]);
            assert_eq!(run(&store, profile, &root), ["A", "B"]);
        }
    }

    #[test]
    fn literal_value_never_recurses() {
        for profile in PROFILES {
            let mut store = MemStore::new();
            MutationEngine::insert_entity(&mut store, "e").expect("insert");
            MutationEngine::insert_attribute(&mut store, profile, "e", "k", "\"text\"")
                .expect("insert");

            // Children under a literal are trivially satisfied.
            let root = Condition::root(
                "e",
                vec![Condition::leaf(
                    "k",
                    "\"text\"",
                    vec![Condition::leaf("impossible", "\"x\"", vec![])],
                )],
            );
            assert_eq!(run(&store, profile, &root), ["e"]);
        }
    }

    #[test]
    fn root_variable_unifies_with_child_value() {
        for profile in PROFILES {
            // P -rel-> P, Q -rel-> Q, Q -rel-> P
            let mut store = MemStore::new();
            for id in ["P", "Q", "R"] {
                MutationEngine::insert_entity(&mut store, id).expect("insert");
            }
            MutationEngine::insert_attribute(&mut store, profile, "P", "rel", "P")
                .expect("insert");
            MutationEngine::insert_attribute(&mut store, profile, "Q", "rel", "Q")
                .expect("insert");
            MutationEngine::insert_attribute(&mut store, profile, "Q", "rel", "P")
                .expect("insert");

            let root = Condition::root("$x", vec![Condition::leaf("rel", "$x", vec![])]);
            assert_eq!(run(&store, profile, &root), ["P", "Q"]);
        }
    }

    #[test]
    fn sibling_backtracking_retries_earlier_bindings() {
        for profile in PROFILES {
            // e -k-> a, e -k-> b, e -m-> b: only $x = b satisfies both.
            let mut store = MemStore::new();
            for id in ["e", "a", "b"] {
                MutationEngine::insert_entity(&mut store, id).expect("insert");
            }
            MutationEngine::insert_attribute(&mut store, profile, "e", "k", "a").expect("insert");
            MutationEngine::insert_attribute(&mut store, profile, "e", "k", "b").expect("insert");
            MutationEngine::insert_attribute(&mut store, profile, "e", "m", "b").expect("insert");

            let root = Condition::root(
                "e",
                vec![
                    Condition::leaf("k", "$x", vec![]),
                    Condition::leaf("m", "$x", vec![]),
                ],
            );
            assert_eq!(run(&store, profile, &root), ["e"]);
        }
    }

    #[test]
    fn variable_skips_values_already_bound_elsewhere() {
        for profile in PROFILES {
            // e -k-> a with $x already bound to a by the root: candidate a is
            // filtered at the enumeration site, so $y cannot rebind it.
            let mut store = MemStore::new();
            for id in ["e", "a"] {
                MutationEngine::insert_entity(&mut store, id).expect("insert");
            }
            MutationEngine::insert_attribute(&mut store, profile, "e", "k", "a").expect("insert");
            MutationEngine::insert_attribute(&mut store, profile, "a", "k", "\"v\"")
                .expect("insert");

            let root = Condition::root("$x", vec![Condition::leaf("k", "$y", vec![])]);
            // Candidate e: $x=e, $y binds a. Candidate a: $x=a, $y would bind
            // "v"; fine. Both still match through distinct values.
            assert_eq!(run(&store, profile, &root), ["a", "e"]);

            // But a self-loop cannot satisfy two distinct variables.
            let mut looped = MemStore::new();
            MutationEngine::insert_entity(&mut looped, "s").expect("insert");
            MutationEngine::insert_attribute(&mut looped, profile, "s", "k", "s")
                .expect("insert");
            let root = Condition::root("$x", vec![Condition::leaf("k", "$y", vec![])]);
            assert!(run(&looped, profile, &root).is_empty());
        }
    }

    #[test]
    fn non_root_condition_rejected() {
        let store = MemStore::new();
        let not_root = Condition::leaf("k", "v", vec![]);
        assert!(matches!(
            search(&store, IndexProfile::All, &not_root, &SearchOptions::new()),
            Err(SpaceError::InvalidInput(_))
        ));
    }

    #[test]
    fn profiles_agree_on_a_mixed_query() {
        let mut results = Vec::new();
        for profile in PROFILES {
            let mut store = chain_store(profile);
            MutationEngine::insert_attribute(&mut store, profile, "C", "tag", "\"leaf\"")
                .expect("insert");
            let root = Condition::root(
                "$e",
                vec![Condition::leaf(
                    "k",
                    "$t",
                    vec![Condition::leaf("tag", "\"leaf\"", vec![])],
                )],
            );
            results.push(run(&store, profile, &root));
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
        assert_eq!(results[0], vec!["B".to_string()]);
    }
}
