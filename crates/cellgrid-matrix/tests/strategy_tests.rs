//! Fan-out tests for the standard and cross-correlation strategies.

mod common;

use std::collections::HashSet;

use cellgrid_core::model::{CellType, EntityRole, EntityType, MatrixType};
use cellgrid_matrix::strategies::{CellStrategy, StrategyInput};

use common::{Harness, COMPANY_ID};

async fn correlation_snapshot(
    harness: &Harness,
    document_ids: &[i64],
    question_ids: &[i64],
) -> (i64, i64, Vec<cellgrid_matrix::EntitySetSnapshot>, i64) {
    let matrix = harness.create_matrix(MatrixType::Correlation).await;
    let doc_set = harness.create_set(&matrix, EntityType::Document).await;
    let question_set = harness.create_set(&matrix, EntityType::Question).await;
    harness.add_members(&doc_set, document_ids).await;
    harness.add_members(&question_set, question_ids).await;
    let snapshot = harness.entity_sets.snapshot(matrix.id, COMPANY_ID).await;
    (doc_set.id, question_set.id, snapshot, matrix.id)
}

#[tokio::test]
async fn test_standard_new_document_pairs_with_every_question() {
    let harness = Harness::new();
    let matrix = harness.create_matrix(MatrixType::Standard).await;
    let doc_set = harness.create_set(&matrix, EntityType::Document).await;
    let question_set = harness.create_set(&matrix, EntityType::Question).await;
    harness.add_members(&doc_set, &[1, 2, 3]).await;
    harness.add_members(&question_set, &[10, 20]).await;

    let snapshot = harness.entity_sets.snapshot(matrix.id, COMPANY_ID).await;
    let strategy = CellStrategy::for_matrix_type(MatrixType::Standard);
    let specs = strategy
        .specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id: doc_set.id,
            new_entity_id: 3,
        })
        .unwrap();

    assert_eq!(specs.len(), 2);
    for spec in &specs {
        assert_eq!(spec.cell_type, CellType::Standard);
        assert_eq!(spec.refs.len(), 2);
        let doc = spec.ref_with_role(EntityRole::Document).unwrap();
        let question = spec.ref_with_role(EntityRole::Question).unwrap();
        assert_eq!(doc.entity_id, 3);
        assert_eq!(doc.entity_order, 0);
        assert_eq!(question.entity_order, 1);
    }
    let question_ids: HashSet<i64> = specs
        .iter()
        .map(|s| s.ref_with_role(EntityRole::Question).unwrap().entity_id)
        .collect();
    assert_eq!(question_ids, HashSet::from([10, 20]));
}

#[tokio::test]
async fn test_standard_new_question_pairs_with_every_document() {
    let harness = Harness::new();
    let matrix = harness.create_matrix(MatrixType::Standard).await;
    let doc_set = harness.create_set(&matrix, EntityType::Document).await;
    let question_set = harness.create_set(&matrix, EntityType::Question).await;
    harness.add_members(&doc_set, &[1, 2]).await;
    harness.add_members(&question_set, &[10]).await;

    let snapshot = harness.entity_sets.snapshot(matrix.id, COMPANY_ID).await;
    let strategy = CellStrategy::for_matrix_type(MatrixType::Standard);
    let specs = strategy
        .specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id: question_set.id,
            new_entity_id: 10,
        })
        .unwrap();

    assert_eq!(specs.len(), 2);
    let doc_ids: HashSet<i64> = specs
        .iter()
        .map(|s| s.ref_with_role(EntityRole::Document).unwrap().entity_id)
        .collect();
    assert_eq!(doc_ids, HashSet::from([1, 2]));
}

#[tokio::test]
async fn test_standard_without_counterpart_set_is_empty() {
    let harness = Harness::new();
    let matrix = harness.create_matrix(MatrixType::Standard).await;
    let doc_set = harness.create_set(&matrix, EntityType::Document).await;
    harness.add_members(&doc_set, &[1]).await;

    let snapshot = harness.entity_sets.snapshot(matrix.id, COMPANY_ID).await;
    let strategy = CellStrategy::for_matrix_type(MatrixType::Standard);
    let specs = strategy
        .specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id: doc_set.id,
            new_entity_id: 1,
        })
        .unwrap();
    assert!(specs.is_empty());
}

#[tokio::test]
async fn test_correlation_new_document_yields_ordered_pairs_both_ways() {
    let harness = Harness::new();
    let (doc_set_id, _, snapshot, _) =
        correlation_snapshot(&harness, &[1, 2, 3, 4], &[10]).await;

    let strategy = CellStrategy::for_matrix_type(MatrixType::Correlation);
    let specs = strategy
        .specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id: doc_set_id,
            new_entity_id: 4,
        })
        .unwrap();

    // 2·(n−1)·k = 2·3·1 = 6 cells for the pairs involving document 4 only.
    assert_eq!(specs.len(), 6);
    let pairs: HashSet<(i64, i64)> = specs
        .iter()
        .map(|s| {
            (
                s.ref_with_role(EntityRole::Left).unwrap().entity_id,
                s.ref_with_role(EntityRole::Right).unwrap().entity_id,
            )
        })
        .collect();
    assert_eq!(
        pairs,
        HashSet::from([(4, 1), (4, 2), (4, 3), (1, 4), (2, 4), (3, 4)])
    );
    for spec in &specs {
        assert_eq!(spec.cell_type, CellType::Correlation);
        assert_eq!(spec.refs.len(), 3);
        // No self-pairs.
        let left = spec.ref_with_role(EntityRole::Left).unwrap().entity_id;
        let right = spec.ref_with_role(EntityRole::Right).unwrap().entity_id;
        assert_ne!(left, right);
    }
}

#[tokio::test]
async fn test_correlation_each_pair_gets_every_question() {
    let harness = Harness::new();
    let (doc_set_id, _, snapshot, _) =
        correlation_snapshot(&harness, &[1, 2], &[10, 20, 30]).await;

    let strategy = CellStrategy::for_matrix_type(MatrixType::Correlation);
    let specs = strategy
        .specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id: doc_set_id,
            new_entity_id: 1,
        })
        .unwrap();

    // 2 ordered pairs × 3 questions.
    assert_eq!(specs.len(), 6);
    let questions_for_pair: HashSet<i64> = specs
        .iter()
        .filter(|s| {
            s.ref_with_role(EntityRole::Left).unwrap().entity_id == 1
                && s.ref_with_role(EntityRole::Right).unwrap().entity_id == 2
        })
        .map(|s| s.ref_with_role(EntityRole::Question).unwrap().entity_id)
        .collect();
    assert_eq!(questions_for_pair, HashSet::from([10, 20, 30]));
}

#[tokio::test]
async fn test_correlation_new_question_yields_all_ordered_pairs() {
    let harness = Harness::new();
    let (_, question_set_id, snapshot, _) =
        correlation_snapshot(&harness, &[1, 2, 3], &[10]).await;

    let strategy = CellStrategy::for_matrix_type(MatrixType::Correlation);
    let specs = strategy
        .specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id: question_set_id,
            new_entity_id: 10,
        })
        .unwrap();

    // n·(n−1) ordered pairs for the new question.
    assert_eq!(specs.len(), 6);
}

#[tokio::test]
async fn test_correlation_single_document_yields_nothing() {
    let harness = Harness::new();
    let (doc_set_id, _, snapshot, _) = correlation_snapshot(&harness, &[1], &[10]).await;

    let strategy = CellStrategy::for_matrix_type(MatrixType::Correlation);
    let specs = strategy
        .specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id: doc_set_id,
            new_entity_id: 1,
        })
        .unwrap();
    assert!(specs.is_empty());
}

#[tokio::test]
async fn test_correlation_empty_questions_yields_nothing() {
    let harness = Harness::new();
    let (doc_set_id, _, snapshot, _) = correlation_snapshot(&harness, &[1, 2], &[]).await;

    let strategy = CellStrategy::for_matrix_type(MatrixType::Correlation);
    let specs = strategy
        .specs_for_new_entity(&StrategyInput {
            sets: &snapshot,
            entity_set_id: doc_set_id,
            new_entity_id: 1,
        })
        .unwrap();
    assert!(specs.is_empty());
}

#[tokio::test]
async fn test_strategy_is_pure() {
    let harness = Harness::new();
    let (doc_set_id, _, snapshot, _) =
        correlation_snapshot(&harness, &[1, 2, 3], &[10, 20]).await;

    let strategy = CellStrategy::for_matrix_type(MatrixType::Correlation);
    let input = StrategyInput {
        sets: &snapshot,
        entity_set_id: doc_set_id,
        new_entity_id: 2,
    };
    let first: HashSet<String> = strategy
        .specs_for_new_entity(&input)
        .unwrap()
        .iter()
        .map(|s| s.signature())
        .collect();
    let second: HashSet<String> = strategy
        .specs_for_new_entity(&input)
        .unwrap()
        .iter()
        .map(|s| s.signature())
        .collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 8);
}
