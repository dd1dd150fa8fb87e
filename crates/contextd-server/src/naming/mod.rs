// src/naming/mod.rs
// Deterministic database/collection naming and collision resolution.
//
// Every logical entity lives in a physical vector-store collection whose name is derived
// deterministically from its scope, so two callers naming the same project always land in
// the same place without a side lookup table. Collisions (two different logical names that
// hash or truncate to the same physical name) are broken with a numeric suffix, grounded on
// the teacher's multi-tenant collection resolver in backend/src/memory/storage/qdrant/multi_store.rs.

use contextd_types::DatabaseScope;
use sha2::{Digest, Sha256};

const MAX_PHYSICAL_NAME_LEN: usize = 63;
const MAX_SUFFIX_ATTEMPTS: u32 = 99;

/// Deterministic logical database name for a scope.
pub fn database_name(scope: &DatabaseScope) -> String {
    match scope {
        DatabaseScope::Shared => "shared".to_string(),
        DatabaseScope::Project(id) => format!("project_{}", hash_id(id)),
        DatabaseScope::User(id) => format!("user_{}", hash_id(id)),
    }
}

/// Truncated, filesystem/collection-name-safe hash of an arbitrary identifier.
///
/// Project paths and user ids may contain characters a vector backend's collection name
/// can't (slashes, spaces, unicode); hashing sidesteps that entirely and keeps names short.
fn hash_id(id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();
    hex::encode_prefix(&digest, 16)
}

/// Physical collection name for a (database, logical collection) pair, with collision
/// resolution: if `exists` reports the deterministic name already taken by something other
/// than this logical identity, a `_NN` suffix (01..=99) is appended until a free slot is
/// found. Resolution is idempotent: calling it twice for the same logical identity against
/// an unchanged backend returns the same physical name both times.
pub fn physical_collection<F>(db: &str, collection: &str, mut exists_for_other: F) -> Result<String, String>
where
    F: FnMut(&str) -> bool,
{
    let base = sanitize(&format!("{db}__{collection}"));
    if !exists_for_other(&base) {
        return Ok(base);
    }
    for n in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = truncate_for_suffix(&base, n);
        if !exists_for_other(&candidate) {
            return Ok(candidate);
        }
    }
    Err(format!(
        "exhausted {MAX_SUFFIX_ATTEMPTS} collision-suffix attempts for collection '{collection}' in database '{db}'"
    ))
}

fn truncate_for_suffix(base: &str, n: u32) -> String {
    let suffix = format!("_{n:02}");
    let keep = MAX_PHYSICAL_NAME_LEN.saturating_sub(suffix.len());
    let mut truncated: String = base.chars().take(keep).collect();
    truncated.push_str(&suffix);
    truncated
}

fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.len() > MAX_PHYSICAL_NAME_LEN {
        cleaned.chars().take(MAX_PHYSICAL_NAME_LEN).collect()
    } else {
        cleaned
    }
}

/// Tiny hex-encoding helper kept local to avoid pulling in a whole `hex` crate for 16 bytes.
mod hex {
    pub fn encode_prefix(bytes: &[u8], take: usize) -> String {
        bytes
            .iter()
            .take(take)
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_name_is_deterministic() {
        let scope = DatabaseScope::Project("/home/alice/repo".to_string());
        assert_eq!(database_name(&scope), database_name(&scope));
    }

    #[test]
    fn database_name_differs_across_scopes() {
        let a = DatabaseScope::Project("/home/alice/repo".to_string());
        let b = DatabaseScope::Project("/home/bob/repo".to_string());
        assert_ne!(database_name(&a), database_name(&b));
    }

    #[test]
    fn shared_scope_has_fixed_name() {
        assert_eq!(database_name(&DatabaseScope::Shared), "shared");
    }

    #[test]
    fn physical_collection_returns_base_when_free() {
        let name = physical_collection("db1", "checkpoints", |_| false).unwrap();
        assert_eq!(name, "db1__checkpoints");
    }

    #[test]
    fn physical_collection_suffixes_on_collision() {
        let mut seen_base = true;
        let name = physical_collection("db1", "checkpoints", |candidate| {
            if candidate == "db1__checkpoints" && seen_base {
                seen_base = false;
                true
            } else {
                false
            }
        })
        .unwrap();
        assert_eq!(name, "db1__checkpoints_01");
    }

    #[test]
    fn physical_collection_resolution_is_idempotent() {
        let first = physical_collection("db1", "remediations", |_| false).unwrap();
        let second = physical_collection("db1", "remediations", |_| false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn physical_collection_errors_when_exhausted() {
        let result = physical_collection("db1", "memories", |_| true);
        assert!(result.is_err());
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize("a/b c"), "a_b_c");
    }
}
