use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{ConsumptionCommit, ConsumptionOutcome, InventoryRepository};
use crate::entities::{code_sequences, items, transactions};
use crate::errors::ServiceError;
use crate::migrator::Migrator;
use crate::models::{Item, ItemKind, ItemPatch, NewItem, NewTransaction, Transaction};

/// Durable store over sea-orm (SQLite on device, Postgres when shared).
#[derive(Clone)]
pub struct SqlInventoryRepository {
    db: Arc<DatabaseConnection>,
}

impl SqlInventoryRepository {
    pub fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Establishes a connection pool and optionally brings the schema up to date.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        migrate: bool,
    ) -> Result<Self, ServiceError> {
        let mut options = ConnectOptions::new(database_url.to_string());
        // Each connection to an in-memory SQLite database sees its own database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            max_connections.max(1)
        };
        options
            .max_connections(max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(30))
            .sqlx_logging(false);

        let db = Database::connect(options).await.map_err(|e| {
            error!(error = %e, "Failed to connect to inventory database");
            ServiceError::DatabaseError(e)
        })?;
        info!(max_connections, "Connected to inventory database");

        let repo = Self::from_connection(Arc::new(db));
        if migrate {
            repo.run_migrations().await?;
        }
        Ok(repo)
    }

    pub async fn run_migrations(&self) -> Result<(), ServiceError> {
        info!("Running database migrations");
        let start = std::time::Instant::now();
        let result = Migrator::up(self.db.as_ref(), None)
            .await
            .map_err(ServiceError::DatabaseError);
        match &result {
            Ok(_) => info!("Database migrations completed in {:?}", start.elapsed()),
            Err(e) => error!("Database migrations failed after {:?}: {}", start.elapsed(), e),
        }
        result
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn flatten(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

fn version_column_value(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

/// Hands out the next number for `kind` with one upsert, so the row lock
/// serializes concurrent writers on a shared database.
async fn next_code<C: ConnectionTrait>(conn: &C, kind: ItemKind) -> Result<String, ServiceError> {
    let prefix = kind.code_prefix().to_string();
    let row = code_sequences::Entity::insert(code_sequences::ActiveModel {
        prefix: Set(prefix.clone()),
        last_value: Set(1),
    })
    .on_conflict(
        OnConflict::column(code_sequences::Column::Prefix)
            .value(
                code_sequences::Column::LastValue,
                Expr::col((code_sequences::Entity, code_sequences::Column::LastValue)).add(1),
            )
            .to_owned(),
    )
    .exec_with_returning(conn)
    .await?;

    let next = u64::try_from(row.last_value).map_err(|_| {
        ServiceError::db_error(format!(
            "code sequence {} holds invalid value {}",
            prefix, row.last_value
        ))
    })?;
    Ok(kind.format_code(next))
}

async fn insert_item<C: ConnectionTrait>(conn: &C, new: NewItem) -> Result<Item, ServiceError> {
    new.check_required()?;
    let code = next_code(conn, new.kind).await?;
    let item = new.into_item(Uuid::new_v4(), code, Utc::now());
    items::ActiveModel::try_from(&item)?.insert(conn).await?;
    debug!(id = %item.id, code = %item.code, "item stored");
    Ok(item)
}

/// Compare-and-swap on `version`: a writer that slipped in between the read
/// and this write makes the filter match nothing.
async fn apply_patch<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    patch: &ItemPatch,
) -> Result<Item, ServiceError> {
    let current = items::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::item_not_found(id))?;
    let current = Item::try_from(current)?;

    if let Some(expected) = patch.expected_version {
        if current.version != expected {
            return Err(ServiceError::ConcurrentModification(id));
        }
    }

    let mut next = current.clone();
    patch.apply(&mut next);
    next.version = current.version + 1;
    next.updated_at = Utc::now();

    let result = items::Entity::update_many()
        .set(items::ActiveModel::try_from(&next)?)
        .filter(items::Column::Id.eq(id))
        .filter(items::Column::Version.eq(version_column_value(current.version)))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(id));
    }
    Ok(next)
}

async fn insert_transaction<C: ConnectionTrait>(
    conn: &C,
    tx: NewTransaction,
) -> Result<Transaction, ServiceError> {
    let tx = tx.into_transaction(Uuid::new_v4(), Utc::now());
    transactions::ActiveModel::from(&tx).insert(conn).await?;
    Ok(tx)
}

fn into_items(models: Vec<items::Model>) -> Result<Vec<Item>, ServiceError> {
    models.into_iter().map(Item::try_from).collect()
}

fn into_transactions(models: Vec<transactions::Model>) -> Result<Vec<Transaction>, ServiceError> {
    models.into_iter().map(Transaction::try_from).collect()
}

#[async_trait]
impl InventoryRepository for SqlInventoryRepository {
    async fn get_all(&self) -> Result<Vec<Item>, ServiceError> {
        let models = items::Entity::find()
            .order_by_asc(items::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        into_items(models)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Item>, ServiceError> {
        items::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Item::try_from)
            .transpose()
    }

    async fn add(&self, item: NewItem) -> Result<Item, ServiceError> {
        self.db
            .transaction::<_, Item, ServiceError>(|txn| {
                Box::pin(async move { insert_item(txn, item).await })
            })
            .await
            .map_err(flatten)
    }

    async fn update(&self, id: Uuid, patch: ItemPatch) -> Result<Item, ServiceError> {
        self.db
            .transaction::<_, Item, ServiceError>(|txn| {
                Box::pin(async move { apply_patch(txn, id, &patch).await })
            })
            .await
            .map_err(flatten)
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = items::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::item_not_found(id));
        }
        Ok(())
    }

    /// All-or-nothing: one missing id rolls the whole batch back.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<(), ServiceError> {
        let ids: Vec<Uuid> = ids.iter().copied().collect::<HashSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.db
            .transaction::<_, (), ServiceError>(|txn| {
                Box::pin(async move {
                    let found: HashSet<Uuid> = items::Entity::find()
                        .filter(items::Column::Id.is_in(ids.clone()))
                        .all(txn)
                        .await?
                        .into_iter()
                        .map(|model| model.id)
                        .collect();
                    if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
                        return Err(ServiceError::item_not_found(*missing));
                    }

                    let result = items::Entity::delete_many()
                        .filter(items::Column::Id.is_in(ids.clone()))
                        .exec(txn)
                        .await?;
                    debug!(removed = result.rows_affected, "items deleted");
                    Ok(())
                })
            })
            .await
            .map_err(flatten)
    }

    async fn get_by_origin(&self, origin_id: Uuid) -> Result<Vec<Item>, ServiceError> {
        let models = items::Entity::find()
            .filter(items::Column::OriginId.eq(origin_id))
            .order_by_asc(items::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        into_items(models)
    }

    async fn add_transaction(&self, tx: NewTransaction) -> Result<Transaction, ServiceError> {
        insert_transaction(self.db.as_ref(), tx).await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, ServiceError> {
        transactions::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn get_all_transactions(&self) -> Result<Vec<Transaction>, ServiceError> {
        let models = transactions::Entity::find()
            .order_by_asc(transactions::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        into_transactions(models)
    }

    async fn get_transactions_by_item(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<Transaction>, ServiceError> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::ItemId.eq(item_id))
            .order_by_asc(transactions::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        into_transactions(models)
    }

    async fn commit_consumption(
        &self,
        commit: ConsumptionCommit,
    ) -> Result<ConsumptionOutcome, ServiceError> {
        self.db
            .transaction::<_, ConsumptionOutcome, ServiceError>(|txn| {
                Box::pin(async move {
                    let item = apply_patch(txn, commit.item_id, &commit.patch).await?;
                    let transaction = insert_transaction(txn, commit.transaction).await?;
                    let scrap = match commit.scrap {
                        Some(scrap) => Some(insert_item(txn, scrap).await?),
                        None => None,
                    };
                    Ok(ConsumptionOutcome {
                        item,
                        transaction,
                        scrap,
                    })
                })
            })
            .await
            .map_err(flatten)
    }
}
