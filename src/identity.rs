//! External identifier synthesis.
//!
//! Units carry no permanent ids in memory, so every save derives fresh
//! external identifiers from the graph itself. The derivation is a pure
//! function of the graph: the same input graph yields the same ids on every
//! call, which is what makes repeated saves reproducible and the relational
//! upserts idempotent. Identifiers are opaque and format-scoped; they mean
//! nothing outside the artifact they were written into.
//!
//! Employees are the exception: they own a globally unique key already, and
//! that key is used verbatim in every format.

use crate::models::{OrgGraph, UnitId};
use sha2::{Digest, Sha256};

/// Synthesizes the textual external id for a unit.
///
/// Shape: `{kind}_{slug}_{hash}` with a `_{index}` suffix for non-root
/// units, where `kind` is the lowercase three-letter kind prefix, `slug`
/// the whitespace-collapsed lowercase name, `hash` a structural digest of
/// the root-to-unit name path reduced mod 10000, and `index` the 1-based
/// sibling position. The path digest keeps two same-named units under
/// different parents distinct within one export.
#[must_use]
pub fn unit_external_id(graph: &OrgGraph, id: UnitId) -> String {
    let node = graph.unit(id);
    let kind_lower = node.kind().as_str().to_lowercase();
    let kind3 = &kind_lower[..3];
    let slug = slugify(node.name());
    let hash = structural_hash(graph, id) % 10_000;

    match graph.sibling_index(id) {
        Some(index) => format!("{kind3}_{slug}_{hash}_{}", index + 1),
        None => format!("{kind3}_{slug}_{hash}"),
    }
}

/// Synthesizes the numeric id used by the relational schema for a unit.
///
/// Derived from the same structural digest as [`unit_external_id`], folded
/// to a non-negative `i64` so it fits an `INTEGER PRIMARY KEY` column.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn unit_numeric_id(graph: &OrgGraph, id: UnitId) -> i64 {
    (structural_hash(graph, id) & i64::MAX as u64) as i64
}

/// Synthesizes the numeric id for a role row.
///
/// Roles are unique per unit, not globally, so the digest covers the owning
/// unit's numeric id plus the role name.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn role_numeric_id(unit_numeric: i64, role_name: &str) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(unit_numeric.to_le_bytes());
    hasher.update(b"/");
    hasher.update(role_name.as_bytes());
    let digest = hasher.finalize();
    (fold_digest(digest.as_slice()) & i64::MAX as u64) as i64
}

/// Composes the external key for a role from its owning unit's id.
#[must_use]
pub fn role_external_key(unit_external_id: &str, role_name: &str) -> String {
    format!("{unit_external_id}/{role_name}")
}

/// Digest of the unit's position in the tree: kind, sibling index and the
/// full name path from the root. Stateless per call.
fn structural_hash(graph: &OrgGraph, id: UnitId) -> u64 {
    let node = graph.unit(id);
    let mut hasher = Sha256::new();
    hasher.update(node.kind().as_str().as_bytes());
    for name in graph.path_names(id) {
        hasher.update(b"/");
        hasher.update(name.as_bytes());
    }
    if let Some(index) = graph.sibling_index(id) {
        hasher.update(index.to_le_bytes());
    }
    let digest = hasher.finalize();
    fold_digest(digest.as_slice())
}

fn fold_digest(digest: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn slugify(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}
