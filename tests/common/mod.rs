#![allow(dead_code)]

use std::sync::Arc;

use rollstock::{
    models::{Category, Item},
    repositories::{InMemoryRepository, InventoryRepository, SqlInventoryRepository},
    services::{AllocationEngine, DeletePolicy, RollDetails},
};

/// Tolerance for float comparisons on derived areas.
pub const TOLERANCE: f64 = 1e-6;

pub fn memory_engine() -> AllocationEngine<InMemoryRepository> {
    AllocationEngine::new(Arc::new(InMemoryRepository::new()))
}

pub fn memory_engine_with(policy: DeletePolicy) -> AllocationEngine<InMemoryRepository> {
    memory_engine().with_delete_policy(policy)
}

/// Engine over a fresh, migrated in-memory SQLite database.
pub async fn sql_engine() -> AllocationEngine<SqlInventoryRepository> {
    let repo = SqlInventoryRepository::connect("sqlite::memory:", 1, true)
        .await
        .expect("sqlite in-memory database");
    AllocationEngine::new(Arc::new(repo))
}

pub async fn roll<R>(engine: &AllocationEngine<R>, width: f64, length: f64) -> Item
where
    R: InventoryRepository + ?Sized,
{
    engine
        .create_roll(RollDetails::new("Test roll", Category::WindowTinting, width, length))
        .await
        .expect("roll created")
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

/// Every stored record satisfies the area invariants.
pub async fn assert_store_consistent<R>(repo: &R)
where
    R: InventoryRepository + ?Sized,
{
    for item in repo.get_all().await.expect("snapshot") {
        if let Err(violation) = item.check_invariants(TOLERANCE) {
            panic!("{violation}");
        }
    }
}
