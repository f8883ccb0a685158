use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::ItemKind;

/// Changes emitted by the allocation engine after a successful commit, so
/// presentation layers can refresh without polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated {
        id: Uuid,
        kind: ItemKind,
    },
    ItemUpdated(Uuid),
    ItemDeleted(Uuid),
    ConsumptionRegistered {
        item_id: Uuid,
        transaction_id: Uuid,
        area: f64,
        scrap_id: Option<Uuid>,
    },
}

impl InventoryEvent {
    /// The item whose state changed.
    pub fn item_id(&self) -> Uuid {
        match self {
            InventoryEvent::ItemCreated { id, .. } => *id,
            InventoryEvent::ItemUpdated(id) | InventoryEvent::ItemDeleted(id) => *id,
            InventoryEvent::ConsumptionRegistered { item_id, .. } => *item_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<InventoryEvent>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<InventoryEvent>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<InventoryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously, waiting for channel capacity.
    pub async fn send(&self, event: InventoryEvent) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Best-effort delivery: the mutation this event describes is already
    /// committed, so a full or closed channel is only logged.
    pub fn notify(&self, event: InventoryEvent) {
        if let Err(e) = self.sender.try_send(event) {
            warn!(error = %e, "Dropping inventory change notification");
        }
    }
}

/// Drains the channel, logging every change.
pub async fn process_events(mut rx: mpsc::Receiver<InventoryEvent>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            InventoryEvent::ItemCreated { id, kind } => {
                info!(item_id = %id, kind = %kind, "item created");
            }
            InventoryEvent::ItemUpdated(id) => info!(item_id = %id, "item updated"),
            InventoryEvent::ItemDeleted(id) => info!(item_id = %id, "item deleted"),
            InventoryEvent::ConsumptionRegistered {
                item_id,
                transaction_id,
                area,
                scrap_id,
            } => {
                info!(
                    item_id = %item_id,
                    transaction_id = %transaction_id,
                    area,
                    scrap_id = ?scrap_id,
                    "consumption registered"
                );
            }
        }
    }

    info!("Event channel closed, stopping event processing loop");
}
