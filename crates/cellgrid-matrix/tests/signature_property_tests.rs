//! Property tests for cell signature stability.

use proptest::prelude::*;

use cellgrid_core::model::EntityRole;
use cellgrid_matrix::signature::cell_signature;

fn role_strategy() -> impl Strategy<Value = EntityRole> {
    prop_oneof![
        Just(EntityRole::Left),
        Just(EntityRole::Right),
        Just(EntityRole::Document),
        Just(EntityRole::Question),
    ]
}

fn pairs_strategy() -> impl Strategy<Value = Vec<(EntityRole, i64)>> {
    prop::collection::vec((role_strategy(), 1i64..10_000), 1..5)
}

proptest! {
    #[test]
    fn signature_is_order_insensitive(pairs in pairs_strategy(), seed in any::<u64>()) {
        let mut shuffled = pairs.clone();
        // Deterministic permutation from the seed.
        let len = shuffled.len();
        for i in (1..len).rev() {
            let j = (seed as usize).wrapping_mul(i + 1) % (i + 1);
            shuffled.swap(i, j);
        }
        prop_assert_eq!(cell_signature(&pairs), cell_signature(&shuffled));
    }

    #[test]
    fn signature_is_deterministic(pairs in pairs_strategy()) {
        prop_assert_eq!(cell_signature(&pairs), cell_signature(&pairs));
    }

    #[test]
    fn different_members_give_different_signatures(
        member_a in 1i64..10_000,
        member_b in 1i64..10_000,
        question in 1i64..10_000,
    ) {
        prop_assume!(member_a != member_b);
        let a = cell_signature(&[
            (EntityRole::Document, member_a),
            (EntityRole::Question, question),
        ]);
        let b = cell_signature(&[
            (EntityRole::Document, member_b),
            (EntityRole::Question, question),
        ]);
        prop_assert_ne!(a, b);
    }

    #[test]
    fn swapping_correlation_sides_changes_signature(
        left in 1i64..10_000,
        right in 1i64..10_000,
        question in 1i64..10_000,
    ) {
        prop_assume!(left != right);
        let forward = cell_signature(&[
            (EntityRole::Left, left),
            (EntityRole::Right, right),
            (EntityRole::Question, question),
        ]);
        let reverse = cell_signature(&[
            (EntityRole::Left, right),
            (EntityRole::Right, left),
            (EntityRole::Question, question),
        ]);
        prop_assert_ne!(forward, reverse);
    }
}
