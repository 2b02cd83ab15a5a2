//! Reprocessing service selection and re-enqueueing tests.

mod common;

use cellgrid_core::model::{EntityRole, EntityType, MatrixType};
use cellgrid_core::queue::{queue_names, MessageQueue};
use cellgrid_matrix::reprocess::{EntitySetFilter, ReprocessRequest, ReprocessingService};

use common::{Harness, COMPANY_ID};

struct Seeded {
    harness: Harness,
    service: ReprocessingService,
    matrix_id: i64,
    doc_set_id: i64,
    cell_ids: Vec<i64>,
}

/// 2 documents × 2 questions standard grid, four cells, no jobs yet.
async fn seed() -> Seeded {
    let harness = Harness::new();
    let matrix = harness.create_matrix(MatrixType::Standard).await;
    let doc_set = harness.create_set(&matrix, EntityType::Document).await;
    let question_set = harness.create_set(&matrix, EntityType::Question).await;
    harness.add_members(&doc_set, &[1, 2]).await;
    harness.add_members(&question_set, &[10, 20]).await;

    let (cells, _) = harness
        .batch
        .batch_create_matrix_cells_and_jobs(
            matrix.id,
            COMPANY_ID,
            &[doc_set.id, question_set.id],
            false,
        )
        .await
        .unwrap();
    assert_eq!(cells.len(), 4);

    let service = ReprocessingService::new(harness.store.clone(), harness.batch.clone());
    Seeded {
        matrix_id: matrix.id,
        doc_set_id: doc_set.id,
        cell_ids: cells.iter().map(|c| c.id).collect(),
        harness,
        service,
    }
}

#[tokio::test]
async fn test_whole_matrix_reprocesses_every_cell() {
    let seeded = seed().await;
    let count = seeded
        .service
        .reprocess_matrix_cells(
            seeded.matrix_id,
            COMPANY_ID,
            &ReprocessRequest::whole_matrix(),
        )
        .await
        .unwrap();
    assert_eq!(count, 4);

    let mut receiver = seeded
        .harness
        .queue
        .consume(queue_names::QA_WORKER)
        .await
        .unwrap();
    for _ in 0..4 {
        assert!(receiver.recv().await.is_some());
    }
}

#[tokio::test]
async fn test_explicit_cell_selection() {
    let seeded = seed().await;
    let chosen = vec![seeded.cell_ids[0], seeded.cell_ids[2]];
    let count = seeded
        .service
        .reprocess_matrix_cells(
            seeded.matrix_id,
            COMPANY_ID,
            &ReprocessRequest::cells(chosen.clone()),
        )
        .await
        .unwrap();
    assert_eq!(count, 2);

    for cell_id in chosen {
        assert_eq!(seeded.harness.store.qa_jobs_for_cell(cell_id).await.len(), 1);
    }
    assert!(seeded
        .harness
        .store
        .qa_jobs_for_cell(seeded.cell_ids[1])
        .await
        .is_empty());
}

#[tokio::test]
async fn test_entity_set_filter_selects_matching_cells() {
    let seeded = seed().await;
    // Only cells whose DOCUMENT ref is document 1: one per question.
    let count = seeded
        .service
        .reprocess_matrix_cells(
            seeded.matrix_id,
            COMPANY_ID,
            &ReprocessRequest::filters(vec![EntitySetFilter {
                entity_set_id: seeded.doc_set_id,
                entity_ids: vec![1],
                role: EntityRole::Document,
            }]),
        )
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_filter_with_wrong_role_matches_nothing() {
    let seeded = seed().await;
    let count = seeded
        .service
        .reprocess_matrix_cells(
            seeded.matrix_id,
            COMPANY_ID,
            &ReprocessRequest::filters(vec![EntitySetFilter {
                entity_set_id: seeded.doc_set_id,
                entity_ids: vec![1],
                // Standard cells have no LEFT refs.
                role: EntityRole::Left,
            }]),
        )
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_empty_request_selects_nothing() {
    let seeded = seed().await;
    let count = seeded
        .service
        .reprocess_matrix_cells(seeded.matrix_id, COMPANY_ID, &ReprocessRequest::default())
        .await
        .unwrap();
    assert_eq!(count, 0);
}
