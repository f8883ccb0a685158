mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::*;
use futures::future::join_all;
use rollstock::{
    errors::ServiceError,
    models::ItemPatch,
    repositories::{InMemoryRepository, InventoryRepository},
    services::{AllocationEngine, Consumption, NewScrap},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn double_submitted_cut_is_applied_twice_not_lost() {
    let engine = memory_engine();
    let roll = roll(&engine, 1.0, 10.0).await;

    let request = Consumption::cut(roll.id, 1.0, 3.0);
    let (a, b) = tokio::join!(
        engine.register_consumption(request.clone()),
        engine.register_consumption(request)
    );
    a.unwrap();
    b.unwrap();

    let after = engine.repository().get(roll.id).await.unwrap().unwrap();
    assert_close(after.consumed_area, 6.0);
    assert_close(after.remaining_length, 4.0);
    assert_eq!(
        engine
            .repository()
            .get_transactions_by_item(roll.id)
            .await
            .unwrap()
            .len(),
        2
    );
    assert_store_consistent(engine.repository().as_ref()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cuts_never_overdraw() {
    let engine = memory_engine();
    let roll = roll(&engine, 1.0, 10.0).await;

    let tasks = (0..20).map(|_| {
        let engine = engine.clone();
        let id = roll.id;
        tokio::spawn(async move {
            engine
                .register_consumption(Consumption::cut(id, 1.0, 1.0))
                .await
        })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completed"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 10);
    for rejected in results.iter().filter(|r| r.is_err()) {
        assert_matches!(rejected, Err(ServiceError::CapacityError(_)));
    }

    let after = engine.repository().get(roll.id).await.unwrap().unwrap();
    assert_eq!(after.remaining_length, 0.0);
    assert!(!after.is_available);
    assert_store_consistent(engine.repository().as_ref()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scraps_respect_parent_capacity() {
    let engine = memory_engine();
    let parent = roll(&engine, 1.0, 10.0).await;

    let tasks = (0..8).map(|_| {
        let engine = engine.clone();
        let id = parent.id;
        tokio::spawn(async move { engine.create_scrap(NewScrap::new(id, 1.0, 2.0)).await })
    });
    let created = join_all(tasks)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();
    assert_eq!(created, 5);

    let scraps = engine.repository().get_by_origin(parent.id).await.unwrap();
    assert_close(rollstock::queries::total_scrap_area(&scraps), 10.0);
}

#[tokio::test]
async fn writer_outside_the_engine_causes_conflict() {
    let repo = Arc::new(InMemoryRepository::new());
    let engine = AllocationEngine::new(repo.clone());
    let roll = roll(&engine, 1.0, 10.0).await;

    // Stale patch built from the version read before the engine's write.
    let stale = ItemPatch {
        quantity: Some(2),
        ..Default::default()
    }
    .expecting(roll.version);

    engine
        .register_consumption(Consumption::cut(roll.id, 1.0, 1.0))
        .await
        .unwrap();

    assert_matches!(
        repo.update(roll.id, stale).await,
        Err(ServiceError::ConcurrentModification(id)) if id == roll.id
    );
}
