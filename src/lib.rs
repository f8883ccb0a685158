//! Rollstock
//!
//! Inventory and allocation core for roll-based film stock: rolls, the scraps
//! cut from them, and the log of consumption cuts.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod entities;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod migrator;
pub mod models;
pub mod queries;
pub mod repositories;
pub mod services;
pub mod units;

use std::sync::Arc;
use tokio::sync::mpsc;

pub use config::AppConfig;
pub use errors::ServiceError;
pub use models::{Category, Item, ItemKind, Transaction, TransactionKind};
pub use queries::QueryService;
pub use repositories::InventoryRepository;
pub use services::allocation::{AllocationEngine, DeletePolicy};

/// The engine and query façade wired to the configured repository.
#[derive(Clone)]
pub struct Inventory {
    pub config: AppConfig,
    pub engine: AllocationEngine,
    pub queries: QueryService,
}

impl Inventory {
    /// Opens the configured backend. The returned receiver yields change
    /// notifications; hand it to [`events::process_events`] or drop it.
    pub async fn open(
        config: AppConfig,
    ) -> Result<(Self, mpsc::Receiver<events::InventoryEvent>), ServiceError> {
        let repo = repositories::open(&config).await?;
        let (sender, rx) = events::EventSender::channel(config.event_channel_capacity);
        Ok((Self::with_repository(config, repo, Some(sender)), rx))
    }

    pub fn with_repository(
        config: AppConfig,
        repo: Arc<dyn InventoryRepository>,
        events: Option<events::EventSender>,
    ) -> Self {
        let mut engine = AllocationEngine::new(repo.clone()).with_delete_policy(config.delete_policy);
        if let Some(sender) = events {
            engine = engine.with_events(sender);
        }
        Self {
            config,
            engine,
            queries: QueryService::new(repo),
        }
    }
}
