use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// Per-item mutation queue. Holding the guard for an item serializes every
/// read-validate-write cycle on it, so two submissions of the same cut cannot
/// both pass validation against the same remaining area.
///
/// Entries only live while some task holds or waits on them.
#[derive(Debug, Clone, Default)]
pub struct ItemLocks {
    locks: Arc<LockMap>,
}

/// Exclusive hold on one item. Dropping it removes the item's entry when no
/// other task is queued on it.
#[derive(Debug)]
pub struct ItemGuard {
    id: Uuid,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ItemGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds one reference; any other belongs to a waiter.
        self.locks
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: Uuid) -> ItemGuard {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = self.locks.entry(id).or_default().clone();
        let guard = mutex.lock_owned().await;
        ItemGuard {
            id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Locks a parent and then one of its children. Always parent first, so
    /// operations on the same family never wait on each other in a cycle.
    pub async fn lock_pair(&self, parent: Uuid, child: Uuid) -> (ItemGuard, Option<ItemGuard>) {
        let parent_guard = self.lock(parent).await;
        let child_guard = if child == parent {
            None
        } else {
            Some(self.lock(child).await)
        };
        (parent_guard, child_guard)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_item_is_serialized() {
        let locks = ItemLocks::new();
        let id = Uuid::new_v4();
        let guard = locks.lock(id).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_items_do_not_block() {
        let locks = ItemLocks::new();
        let _a = locks.lock(Uuid::new_v4()).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock(Uuid::new_v4()))
            .await
            .expect("independent items must not contend");
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = ItemLocks::new();
        let id = Uuid::new_v4();
        drop(locks.lock(id).await);
        assert!(locks.is_empty());

        let (parent, child) = locks.lock_pair(id, Uuid::new_v4()).await;
        assert_eq!(locks.len(), 2);
        drop(child);
        assert_eq!(locks.len(), 1);
        drop(parent);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn entry_survives_while_a_waiter_is_queued() {
        let locks = ItemLocks::new();
        let id = Uuid::new_v4();
        let guard = locks.lock(id).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(id).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
