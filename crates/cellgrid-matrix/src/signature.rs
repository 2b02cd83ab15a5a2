//! Cell signatures.
//!
//! A signature is the SHA-256 hex digest over the cell's `(role, member)`
//! pairs sorted by role (LEFT < RIGHT < DOCUMENT < QUESTION) then member id.
//! It is the per-matrix dedup key and must be computed by the application;
//! the store never derives it.

use cellgrid_core::model::EntityRole;
use sha2::{Digest, Sha256};

/// Compute the signature for a cell's `(role, entity_set_member_id)` pairs.
/// Input order is irrelevant.
pub fn cell_signature(pairs: &[(EntityRole, i64)]) -> String {
    let mut sorted = pairs.to_vec();
    sorted.sort();
    let mut hasher = Sha256::new();
    for (role, member_id) in &sorted {
        hasher.update(role.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(member_id.to_le_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_order_insensitive() {
        let a = cell_signature(&[(EntityRole::Document, 3), (EntityRole::Question, 10)]);
        let b = cell_signature(&[(EntityRole::Question, 10), (EntityRole::Document, 3)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_distinguishes_roles() {
        // Swapping LEFT and RIGHT members is a different cell.
        let a = cell_signature(&[
            (EntityRole::Left, 1),
            (EntityRole::Right, 2),
            (EntityRole::Question, 10),
        ]);
        let b = cell_signature(&[
            (EntityRole::Left, 2),
            (EntityRole::Right, 1),
            (EntityRole::Question, 10),
        ]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_signature_distinguishes_members() {
        let a = cell_signature(&[(EntityRole::Document, 3), (EntityRole::Question, 10)]);
        let b = cell_signature(&[(EntityRole::Document, 4), (EntityRole::Question, 10)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let sig = cell_signature(&[(EntityRole::Document, 1), (EntityRole::Question, 2)]);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
