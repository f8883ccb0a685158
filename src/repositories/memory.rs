use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ConsumptionCommit, ConsumptionOutcome, InventoryRepository};
use crate::errors::ServiceError;
use crate::models::{Item, ItemKind, ItemPatch, NewItem, NewTransaction, Transaction};

#[derive(Debug, Default)]
struct Store {
    items: HashMap<Uuid, Item>,
    order: Vec<Uuid>,
    by_origin: HashMap<Uuid, Vec<Uuid>>,
    transactions: Vec<Transaction>,
    by_item: HashMap<Uuid, Vec<usize>>,
    sequences: HashMap<ItemKind, u64>,
}

impl Store {
    fn next_code(&mut self, kind: ItemKind) -> String {
        let counter = self.sequences.entry(kind).or_insert(0);
        *counter += 1;
        kind.format_code(*counter)
    }

    fn insert_item(&mut self, new: NewItem) -> Result<Item, ServiceError> {
        new.check_required()?;
        let code = self.next_code(new.kind);
        let item = new.into_item(Uuid::new_v4(), code, Utc::now());
        if let Some(origin) = item.origin_id {
            self.by_origin.entry(origin).or_default().push(item.id);
        }
        self.order.push(item.id);
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    /// Validates the patch against the stored record without writing.
    fn patched(&self, id: Uuid, patch: &ItemPatch) -> Result<Item, ServiceError> {
        let current = self
            .items
            .get(&id)
            .ok_or_else(|| ServiceError::item_not_found(id))?;
        if let Some(expected) = patch.expected_version {
            if current.version != expected {
                return Err(ServiceError::ConcurrentModification(id));
            }
        }
        let mut next = current.clone();
        patch.apply(&mut next);
        next.version = current.version + 1;
        next.updated_at = Utc::now();
        Ok(next)
    }

    fn remove_item(&mut self, id: Uuid) -> Result<(), ServiceError> {
        let removed = self
            .items
            .remove(&id)
            .ok_or_else(|| ServiceError::item_not_found(id))?;
        self.order.retain(|existing| *existing != id);
        if let Some(origin) = removed.origin_id {
            if let Some(children) = self.by_origin.get_mut(&origin) {
                children.retain(|child| *child != id);
            }
        }
        Ok(())
    }

    fn insert_transaction(&mut self, tx: NewTransaction) -> Transaction {
        let tx = tx.into_transaction(Uuid::new_v4(), Utc::now());
        self.by_item
            .entry(tx.item_id)
            .or_default()
            .push(self.transactions.len());
        self.transactions.push(tx.clone());
        tx
    }
}

/// Process-local store guarded by a single `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryRepository for InMemoryRepository {
    async fn get_all(&self) -> Result<Vec<Item>, ServiceError> {
        let store = self.store.read().await;
        Ok(store
            .order
            .iter()
            .filter_map(|id| store.items.get(id).cloned())
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Item>, ServiceError> {
        Ok(self.store.read().await.items.get(&id).cloned())
    }

    async fn add(&self, item: NewItem) -> Result<Item, ServiceError> {
        let mut store = self.store.write().await;
        let item = store.insert_item(item)?;
        debug!(id = %item.id, code = %item.code, "item stored");
        Ok(item)
    }

    async fn update(&self, id: Uuid, patch: ItemPatch) -> Result<Item, ServiceError> {
        let mut store = self.store.write().await;
        let next = store.patched(id, &patch)?;
        store.items.insert(id, next.clone());
        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store.write().await.remove_item(id)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        if let Some(missing) = ids.iter().find(|id| !store.items.contains_key(id)) {
            return Err(ServiceError::item_not_found(*missing));
        }
        for id in ids {
            // Skips ids listed twice.
            if store.items.contains_key(id) {
                store.remove_item(*id)?;
            }
        }
        Ok(())
    }

    async fn get_by_origin(&self, origin_id: Uuid) -> Result<Vec<Item>, ServiceError> {
        let store = self.store.read().await;
        Ok(store
            .by_origin
            .get(&origin_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| store.items.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_transaction(&self, tx: NewTransaction) -> Result<Transaction, ServiceError> {
        Ok(self.store.write().await.insert_transaction(tx))
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, ServiceError> {
        let store = self.store.read().await;
        Ok(store.transactions.iter().find(|tx| tx.id == id).cloned())
    }

    async fn get_all_transactions(&self) -> Result<Vec<Transaction>, ServiceError> {
        Ok(self.store.read().await.transactions.clone())
    }

    async fn get_transactions_by_item(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<Transaction>, ServiceError> {
        let store = self.store.read().await;
        Ok(store
            .by_item
            .get(&item_id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|pos| store.transactions[*pos].clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit_consumption(
        &self,
        commit: ConsumptionCommit,
    ) -> Result<ConsumptionOutcome, ServiceError> {
        let mut store = self.store.write().await;

        // Everything fallible runs before the first write.
        let item = store.patched(commit.item_id, &commit.patch)?;
        if let Some(scrap) = &commit.scrap {
            scrap.check_required()?;
        }

        store.items.insert(item.id, item.clone());
        let transaction = store.insert_transaction(commit.transaction);
        let scrap = match commit.scrap {
            Some(scrap) => Some(store.insert_item(scrap)?),
            None => None,
        };

        Ok(ConsumptionOutcome {
            item,
            transaction,
            scrap,
        })
    }
}
