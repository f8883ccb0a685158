use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{AppConfig, StorageBackend};
use crate::errors::ServiceError;
use crate::models::{Item, ItemPatch, NewItem, NewTransaction, Transaction};

pub mod memory;
pub mod sql;

pub use memory::InMemoryRepository;
pub use sql::SqlInventoryRepository;

/// Writes of one consumption event, committed together or not at all.
#[derive(Debug, Clone)]
pub struct ConsumptionCommit {
    pub item_id: Uuid,
    pub patch: ItemPatch,
    pub transaction: NewTransaction,
    pub scrap: Option<NewItem>,
}

#[derive(Debug, Clone)]
pub struct ConsumptionOutcome {
    pub item: Item,
    pub transaction: Transaction,
    pub scrap: Option<Item>,
}

/// Keyed storage for items and the transaction log, with secondary lookup
/// by `originId` and by `itemId`. Implementations assign ids, codes,
/// versions and timestamps.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Full snapshot in insertion order.
    async fn get_all(&self) -> Result<Vec<Item>, ServiceError>;

    async fn get(&self, id: Uuid) -> Result<Option<Item>, ServiceError>;

    async fn add(&self, item: NewItem) -> Result<Item, ServiceError>;

    /// Merges `patch` into the stored record and bumps `version` and `updatedAt`.
    async fn update(&self, id: Uuid, patch: ItemPatch) -> Result<Item, ServiceError>;

    /// Removes one record. Children and transactions are left alone.
    async fn delete(&self, id: Uuid) -> Result<(), ServiceError>;

    async fn get_by_origin(&self, origin_id: Uuid) -> Result<Vec<Item>, ServiceError>;

    async fn add_transaction(&self, tx: NewTransaction) -> Result<Transaction, ServiceError>;

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, ServiceError>;

    async fn get_all_transactions(&self) -> Result<Vec<Transaction>, ServiceError>;

    async fn get_transactions_by_item(&self, item_id: Uuid)
        -> Result<Vec<Transaction>, ServiceError>;

    /// Applies the roll update, appends the cut and inserts the optional scrap atomically.
    async fn commit_consumption(
        &self,
        commit: ConsumptionCommit,
    ) -> Result<ConsumptionOutcome, ServiceError>;

    /// Removes every listed record, or none of them when one is missing.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), ServiceError>;
}

/// Fetches an item or fails with `NotFound`.
pub async fn require_item<R>(repo: &R, id: Uuid) -> Result<Item, ServiceError>
where
    R: InventoryRepository + ?Sized,
{
    repo.get(id)
        .await?
        .ok_or_else(|| ServiceError::item_not_found(id))
}

/// Opens the repository selected by configuration.
pub async fn open(config: &AppConfig) -> Result<Arc<dyn InventoryRepository>, ServiceError> {
    match config.storage_backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryRepository::new())),
        StorageBackend::Sql => {
            let repo = SqlInventoryRepository::connect(
                &config.database_url,
                config.db_max_connections,
                config.auto_migrate,
            )
            .await?;
            Ok(Arc::new(repo))
        }
    }
}
