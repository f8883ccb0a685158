mod common;

use assert_matches::assert_matches;
use common::*;
use rollstock::{
    errors::ServiceError,
    models::{Category, ItemKind, ItemPatch, NewItem, NewTransaction},
    repositories::{ConsumptionCommit, InventoryRepository},
    services::{Consumption, DeletePolicy, NewScrap},
};
use uuid::Uuid;

fn new_roll(name: &str) -> NewItem {
    NewItem::fresh(
        ItemKind::Roll,
        name.to_string(),
        Category::Ppf,
        None,
        1.52,
        15.0,
        1,
        Some(1),
        None,
        Some("rack 3".into()),
    )
}

#[tokio::test]
async fn stores_and_reads_back_items() {
    let engine = sql_engine().await;
    let repo = engine.repository();

    let stored = repo.add(new_roll("Matte PPF")).await.unwrap();
    assert_eq!(stored.code, "BOB001");
    assert_eq!(stored.version, 0);

    let loaded = repo.get(stored.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Matte PPF");
    assert_eq!(loaded.category, Category::Ppf);
    assert_eq!(loaded.min_quantity, Some(1));
    assert_eq!(loaded.observation.as_deref(), Some("rack 3"));
    assert_eq!(loaded.remaining_length, 15.0);
    assert!(loaded.is_available);

    assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn rejects_invalid_records() {
    let engine = sql_engine().await;
    let mut bad = new_roll("Bad");
    bad.width = 0.0;
    assert_matches!(
        engine.repository().add(bad).await,
        Err(ServiceError::ValidationError(_))
    );
    assert!(engine.repository().get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_checks_version() {
    let engine = sql_engine().await;
    let repo = engine.repository();
    let stored = repo.add(new_roll("Gloss PPF")).await.unwrap();

    let updated = repo
        .update(
            stored.id,
            ItemPatch {
                quantity: Some(3),
                ..Default::default()
            }
            .expecting(0),
        )
        .await
        .unwrap();
    assert_eq!(updated.quantity, 3);
    assert_eq!(updated.version, 1);

    assert_matches!(
        repo.update(
            stored.id,
            ItemPatch {
                quantity: Some(4),
                ..Default::default()
            }
            .expecting(0)
        )
        .await,
        Err(ServiceError::ConcurrentModification(_))
    );
    assert_matches!(
        repo.update(Uuid::new_v4(), ItemPatch::default()).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn codes_survive_deletion() {
    let engine = sql_engine().await;
    let repo = engine.repository();
    let first = repo.add(new_roll("A")).await.unwrap();
    repo.delete(first.id).await.unwrap();
    let second = repo.add(new_roll("B")).await.unwrap();
    assert_eq!(second.code, "BOB002");

    assert_matches!(repo.delete(first.id).await, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn failed_commit_writes_nothing() {
    let engine = sql_engine().await;
    let repo = engine.repository();
    let roll = repo.add(new_roll("Roll")).await.unwrap();

    let commit = ConsumptionCommit {
        item_id: roll.id,
        patch: ItemPatch {
            consumed_area: Some(1.0),
            ..Default::default()
        }
        .expecting(roll.version + 7),
        transaction: NewTransaction::cut(roll.id, 1.0, 1.0),
        scrap: None,
    };
    assert_matches!(
        repo.commit_consumption(commit).await,
        Err(ServiceError::ConcurrentModification(_))
    );
    assert!(repo.get_all_transactions().await.unwrap().is_empty());
    assert_eq!(
        repo.get(roll.id).await.unwrap().unwrap().consumed_area,
        0.0
    );
}

#[tokio::test]
async fn end_to_end_against_sqlite() {
    let engine = sql_engine().await;
    let roll = roll(&engine, 1.52, 30.0).await;

    let outcome = engine
        .register_consumption(Consumption::cut(roll.id, 1.52, 5.0).with_scrap(0.5, 2.0))
        .await
        .unwrap();
    assert_close(outcome.item.remaining_length, 25.0);
    assert_close(outcome.item.remaining_area, 38.0);
    assert_close(outcome.item.consumed_area, 7.6);
    let scrap = outcome.scrap.unwrap();
    assert_eq!(scrap.code, "RET001");

    let repo = engine.repository();
    let stored_tx = repo
        .get_transaction(outcome.transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_close(stored_tx.area, 7.6);
    assert_eq!(repo.get_by_origin(roll.id).await.unwrap().len(), 1);
    assert_eq!(repo.get_transactions_by_item(roll.id).await.unwrap().len(), 1);

    assert_matches!(
        engine
            .create_scrap(NewScrap::new(roll.id, 1.52, 30.0))
            .await,
        Err(ServiceError::CapacityError(_))
    );
    assert_store_consistent(repo.as_ref()).await;
}

#[tokio::test]
async fn deleting_an_item_keeps_its_history() {
    let engine = sql_engine().await;
    let roll = roll(&engine, 1.0, 10.0).await;
    engine
        .register_consumption(Consumption::cut(roll.id, 1.0, 2.0))
        .await
        .unwrap();

    engine.delete_item(roll.id).await.unwrap();
    let repo = engine.repository();
    assert!(repo.get(roll.id).await.unwrap().is_none());
    assert_eq!(repo.get_transactions_by_item(roll.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_adds_get_distinct_codes() {
    let engine = sql_engine().await;
    let repo = engine.repository().clone();

    let adds = (0..10).map(|i| {
        let repo = repo.clone();
        tokio::spawn(async move { repo.add(new_roll(&format!("Roll {}", i))).await })
    });
    let mut codes: Vec<String> = futures::future::join_all(adds)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().code)
        .collect();
    codes.sort();

    let expected: Vec<String> = (1..=10).map(|n| format!("BOB{:03}", n)).collect();
    assert_eq!(codes, expected);
    assert_eq!(repo.add(new_roll("Next")).await.unwrap().code, "BOB011");
}

#[tokio::test]
async fn delete_many_rolls_back_when_an_id_is_missing() {
    let engine = sql_engine().await;
    let repo = engine.repository();
    let roll = roll(&engine, 1.0, 10.0).await;
    let scrap = engine
        .create_scrap(NewScrap::new(roll.id, 0.5, 1.0))
        .await
        .unwrap();

    assert_matches!(
        repo.delete_many(&[scrap.id, Uuid::new_v4(), roll.id]).await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(repo.get_all().await.unwrap().len(), 2);

    repo.delete_many(&[scrap.id, roll.id]).await.unwrap();
    assert!(repo.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn cascade_delete_removes_scrap_chain_in_one_step() {
    let engine = sql_engine().await.with_delete_policy(DeletePolicy::CascadeScraps);
    let roll = roll(&engine, 1.0, 10.0).await;
    let scrap = engine
        .create_scrap(NewScrap::new(roll.id, 1.0, 2.0))
        .await
        .unwrap();
    let nested = engine
        .create_scrap(NewScrap::new(scrap.id, 0.5, 0.5))
        .await
        .unwrap();

    let removed = engine.delete_item(roll.id).await.unwrap();
    assert_eq!(removed, vec![nested.id, scrap.id, roll.id]);
    assert!(engine.repository().get_all().await.unwrap().is_empty());
}
