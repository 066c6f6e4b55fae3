//! # Key Codec
//!
//! Lossless escaping of user strings for composite keys and multi-valued
//! cells.
//!
//! A user string is encoded by replacing every occurrence of the field
//! separator with the reserved invalid token; decoding reverses the
//! substitution. A string that already contains the invalid token cannot be
//! represented and is rejected. Because the separator never survives inside
//! an encoded component, composite keys and cells can be split by the
//! separator without ambiguity.

use crate::primitives::{ANY, INVALID_TOKEN, SEPARATOR, VAR_SIGIL};
use crate::types::SpaceError;

/// Encode a user string to its storage form.
///
/// # Errors
///
/// Returns `SpaceError::InvalidInput` if `s` contains the reserved invalid
/// token.
pub fn encode(s: &str) -> Result<String, SpaceError> {
    if s.contains(INVALID_TOKEN) {
        return Err(SpaceError::InvalidInput(
            "string contains the reserved token".to_string(),
        ));
    }
    Ok(s.replace(SEPARATOR, INVALID_TOKEN))
}

/// Decode a storage-form string back to the user string.
#[must_use]
pub fn decode(s: &str) -> String {
    s.replace(INVALID_TOKEN, SEPARATOR)
}

/// Join encoded components into a composite key or cell.
#[must_use]
pub fn join(components: &[&str]) -> String {
    components.join(SEPARATOR)
}

/// Split a composite key or cell into its encoded components.
pub fn split(s: &str) -> impl Iterator<Item = &str> {
    s.split(SEPARATOR)
}

// =============================================================================
// LEXICAL RECOGNIZERS
// =============================================================================

/// Whether a value denotes a literal string (surrounded by double quotes).
#[must_use]
pub fn is_literal(v: &str) -> bool {
    v.len() >= 2 && v.starts_with('"') && v.ends_with('"')
}

/// Whether a token is a query variable (`$name`).
#[must_use]
pub fn is_variable(v: &str) -> bool {
    v.starts_with(VAR_SIGIL)
}

/// Whether a token is the wildcard.
#[must_use]
pub fn is_any(v: &str) -> bool {
    v == ANY
}

/// The inner text of a literal value, quotes stripped.
///
/// Callers must have checked [`is_literal`] first; a non-literal is returned
/// unchanged.
#[must_use]
pub fn literal_text(v: &str) -> &str {
    if is_literal(v) {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

// =============================================================================
// TESTS
// =============================================================================
