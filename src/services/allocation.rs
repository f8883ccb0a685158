//! Allocation engine: the only writer of an item's remaining width, length
//! and area, consumed area and availability.
//!
//! Every mutation runs under the per-item lock of the record whose
//! capacity it checks, validates all of its sub-steps, and only then writes.
//! Writes carry the version that was read, so a writer outside the engine
//! produces `ConcurrentModification` instead of a lost update.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{EventSender, InventoryEvent};
use crate::metrics;
use crate::models::item::ensure_positive;
use crate::models::{Category, Item, ItemKind, ItemPatch, NewItem, NewTransaction, AREA_EPSILON};
use crate::repositories::{
    require_item, ConsumptionCommit, ConsumptionOutcome, InventoryRepository,
};
use crate::services::locks::ItemLocks;

/// What deleting an item does to the scraps cut from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletePolicy {
    /// Scraps keep pointing at the deleted origin.
    #[default]
    Orphan,
    /// Scraps of the item, and scraps of those scraps, are deleted with it.
    CascadeScraps,
}

/// Descriptive fields of a roll, used both to create one and to replace one wholesale.
#[derive(Debug, Clone, PartialEq, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollDetails {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub category: Category,
    pub width: f64,
    pub length: f64,
    #[validate(range(min = 1))]
    pub quantity: u32,
    pub min_quantity: Option<u32>,
    pub price: Option<Decimal>,
    #[validate(length(max = 500))]
    pub observation: Option<String>,
}

impl RollDetails {
    pub fn new(name: impl Into<String>, category: Category, width: f64, length: f64) -> Self {
        Self {
            name: name.into(),
            category,
            width,
            length,
            quantity: 1,
            min_quantity: None,
            price: None,
            observation: None,
        }
    }

    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        ensure_positive("width", self.width)?;
        ensure_positive("length", self.length)
    }
}

#[derive(Debug, Clone, PartialEq, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScrap {
    pub origin_id: Uuid,
    pub width: f64,
    pub length: f64,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[validate(length(max = 500))]
    pub observation: Option<String>,
}

impl NewScrap {
    pub fn new(origin_id: Uuid, width: f64, length: f64) -> Self {
        Self {
            origin_id,
            width,
            length,
            quantity: 1,
            observation: None,
        }
    }

    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        ensure_positive("width", self.width)?;
        ensure_positive("length", self.length)
    }
}

#[derive(Debug, Clone, PartialEq, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditScrap {
    pub width: f64,
    pub length: f64,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[validate(length(max = 500))]
    pub observation: Option<String>,
}

impl EditScrap {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        ensure_positive("width", self.width)?;
        ensure_positive("length", self.length)
    }
}

/// A cut of `width x length` from a roll, optionally keeping part of the cut piece as a scrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumption {
    pub item_id: Uuid,
    pub width: f64,
    pub length: f64,
    #[serde(default)]
    pub create_scrap: bool,
    pub scrap_width: Option<f64>,
    pub scrap_length: Option<f64>,
}

impl Consumption {
    pub fn cut(item_id: Uuid, width: f64, length: f64) -> Self {
        Self {
            item_id,
            width,
            length,
            create_scrap: false,
            scrap_width: None,
            scrap_length: None,
        }
    }

    pub fn with_scrap(mut self, width: f64, length: f64) -> Self {
        self.create_scrap = true;
        self.scrap_width = Some(width);
        self.scrap_length = Some(length);
        self
    }

    /// Missing or non-positive scrap dimensions fail as `CapacityError`.
    fn scrap_dimensions(&self) -> Result<Option<(f64, f64)>, ServiceError> {
        if !self.create_scrap {
            return Ok(None);
        }
        match (self.scrap_width, self.scrap_length) {
            (Some(width), Some(length)) if width > 0.0 && length > 0.0 => {
                Ok(Some((width, length)))
            }
            (Some(width), Some(length)) => Err(ServiceError::capacity(format!(
                "Scrap area {}x{} must be greater than zero",
                width, length
            ))),
            _ => Err(ServiceError::capacity(
                "Scrap width and length are required to keep a scrap",
            )),
        }
    }
}

/// Rounds float residue left by subtraction back to zero.
fn snap(value: f64) -> f64 {
    if value.abs() < AREA_EPSILON {
        0.0
    } else {
        value
    }
}

fn scrap_name(parent: &Item) -> String {
    format!("Scrap of {}", parent.name)
}

/// Patch that sets a record back to an untouched `width x length` face.
fn reset_face(width: f64, length: f64) -> ItemPatch {
    let area = width * length;
    ItemPatch {
        width: Some(width),
        length: Some(length),
        remaining_width: Some(width),
        remaining_length: Some(length),
        remaining_area: Some(area),
        consumed_area: Some(0.0),
        is_available: Some(area > AREA_EPSILON),
        ..Default::default()
    }
}

pub struct AllocationEngine<R: InventoryRepository + ?Sized = dyn InventoryRepository> {
    repo: Arc<R>,
    locks: ItemLocks,
    events: Option<EventSender>,
    delete_policy: DeletePolicy,
}

impl<R: InventoryRepository + ?Sized> Clone for AllocationEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            locks: self.locks.clone(),
            events: self.events.clone(),
            delete_policy: self.delete_policy,
        }
    }
}

impl<R: InventoryRepository + ?Sized> AllocationEngine<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            locks: ItemLocks::new(),
            events: None,
            delete_policy: DeletePolicy::default(),
        }
    }

    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    fn emit(&self, event: InventoryEvent) {
        if let Some(events) = &self.events {
            events.notify(event);
        }
    }

    fn observe<T>(
        &self,
        operation: &'static str,
        result: Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        if let Err(err) = &result {
            metrics::record_failure(operation, err);
            match err {
                ServiceError::DatabaseError(_)
                | ServiceError::InternalError(_)
                | ServiceError::EventError(_) => {
                    error!(operation, kind = err.kind(), error = %err, "operation failed")
                }
                _ => warn!(operation, kind = err.kind(), error = %err, "operation rejected"),
            }
        }
        result
    }

    fn created(&self, item: &Item) {
        metrics::record_item_created(item.kind);
        self.emit(InventoryEvent::ItemCreated {
            id: item.id,
            kind: item.kind,
        });
    }

    /// Checks that a scrap of `width x length x quantity` fits its parent:
    /// no wider than the parent, and the summed footprint of all scraps of the
    /// parent (minus `exclude`, the scrap being edited) within its nominal area.
    async fn check_scrap_fits(
        &self,
        parent: &Item,
        width: f64,
        length: f64,
        quantity: u32,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if width > parent.width + AREA_EPSILON {
            return Err(ServiceError::capacity(format!(
                "Scrap width {} exceeds parent item width {}",
                width, parent.width
            )));
        }

        let existing: f64 = self
            .repo
            .get_by_origin(parent.id)
            .await?
            .iter()
            .filter(|scrap| Some(scrap.id) != exclude)
            .map(Item::footprint)
            .sum();
        let requested = width * length * f64::from(quantity);

        if existing + requested > parent.nominal_area() + AREA_EPSILON {
            return Err(ServiceError::capacity(
                "Total scrap area exceeds available parent item area",
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, details), fields(name = %details.name))]
    pub async fn create_roll(&self, details: RollDetails) -> Result<Item, ServiceError> {
        let result = async {
            details.check()?;
            let item = self
                .repo
                .add(NewItem::fresh(
                    ItemKind::Roll,
                    details.name,
                    details.category,
                    None,
                    details.width,
                    details.length,
                    details.quantity,
                    details.min_quantity,
                    details.price,
                    details.observation,
                ))
                .await?;
            self.created(&item);
            info!(id = %item.id, code = %item.code, "roll created");
            Ok(item)
        }
        .await;
        self.observe("create_roll", result)
    }

    #[instrument(skip(self, scrap), fields(origin_id = %scrap.origin_id))]
    pub async fn create_scrap(&self, scrap: NewScrap) -> Result<Item, ServiceError> {
        let result = async {
            scrap.check()?;
            let _guard = self.locks.lock(scrap.origin_id).await;

            let parent = require_item(self.repo.as_ref(), scrap.origin_id).await?;
            self.check_scrap_fits(&parent, scrap.width, scrap.length, scrap.quantity, None)
                .await?;

            let item = self
                .repo
                .add(NewItem::fresh(
                    ItemKind::Scrap,
                    scrap_name(&parent),
                    parent.category,
                    Some(parent.id),
                    scrap.width,
                    scrap.length,
                    scrap.quantity,
                    None,
                    parent.price,
                    scrap.observation,
                ))
                .await?;
            self.created(&item);
            info!(id = %item.id, code = %item.code, parent = %parent.code, "scrap created");
            Ok(item)
        }
        .await;
        self.observe("create_scrap", result)
    }

    /// Edit variant of scrap creation: the scrap's own previous footprint is
    /// left out of the capacity check and the record is updated in place.
    #[instrument(skip(self, edit))]
    pub async fn edit_scrap(&self, id: Uuid, edit: EditScrap) -> Result<Item, ServiceError> {
        let result = async {
            edit.check()?;
            let origin_id = self.scrap_origin(id).await?;
            let _guards = self.locks.lock_pair(origin_id, id).await;

            let scrap = require_item(self.repo.as_ref(), id).await?;
            let parent = require_item(self.repo.as_ref(), origin_id).await?;
            self.check_scrap_fits(&parent, edit.width, edit.length, edit.quantity, Some(id))
                .await?;

            let patch = ItemPatch {
                quantity: Some(edit.quantity),
                observation: Some(edit.observation),
                ..reset_face(edit.width, edit.length)
            }
            .expecting(scrap.version);

            let item = self.repo.update(id, patch).await?;
            self.emit(InventoryEvent::ItemUpdated(id));
            info!(id = %id, code = %item.code, "scrap edited");
            Ok(item)
        }
        .await;
        self.observe("edit_scrap", result)
    }

    async fn scrap_origin(&self, id: Uuid) -> Result<Uuid, ServiceError> {
        let scrap = require_item(self.repo.as_ref(), id).await?;
        if !scrap.is_scrap() {
            return Err(ServiceError::validation(format!(
                "{} is not a scrap",
                scrap.code
            )));
        }
        scrap.origin_id.ok_or_else(|| {
            ServiceError::InternalError(format!("scrap {} has no origin", scrap.code))
        })
    }

    /// Removes `width x length` from a roll's remaining length and logs the cut.
    /// With `create_scrap`, part of the cut piece is kept as a new scrap of the roll.
    ///
    /// Remaining width is never reduced, although the cut is bounded by it.
    #[instrument(skip(self, request), fields(item_id = %request.item_id))]
    pub async fn register_consumption(
        &self,
        request: Consumption,
    ) -> Result<ConsumptionOutcome, ServiceError> {
        let result = async {
            ensure_positive("width", request.width)?;
            ensure_positive("length", request.length)?;
            let scrap_dimensions = request.scrap_dimensions()?;

            let _guard = self.locks.lock(request.item_id).await;
            let item = require_item(self.repo.as_ref(), request.item_id).await?;
            if !item.is_roll() {
                return Err(ServiceError::validation(format!(
                    "{} is not a roll; consumption is only registered against rolls",
                    item.code
                )));
            }

            if request.width > item.remaining_width + AREA_EPSILON {
                return Err(ServiceError::capacity(format!(
                    "Cut width {} exceeds remaining width {}",
                    request.width, item.remaining_width
                )));
            }
            if request.length > item.remaining_length + AREA_EPSILON {
                return Err(ServiceError::capacity(format!(
                    "Cut length {} exceeds remaining length {}",
                    request.length, item.remaining_length
                )));
            }

            let cut_area = request.width * request.length;
            let available = item.nominal_area() - item.consumed_area;
            if cut_area > available + AREA_EPSILON {
                return Err(ServiceError::capacity(format!(
                    "Cut area {:.4} exceeds available area {:.4}",
                    cut_area, available
                )));
            }

            let remaining_length = snap(item.remaining_length - request.length);
            if remaining_length < 0.0 {
                return Err(ServiceError::capacity(
                    "Cut would leave a negative remaining length",
                ));
            }

            let scrap = match scrap_dimensions {
                Some((width, length)) => {
                    if width * length > cut_area + AREA_EPSILON {
                        return Err(ServiceError::capacity(
                            "Scrap area cannot exceed the consumed area",
                        ));
                    }
                    self.check_scrap_fits(&item, width, length, 1, None).await?;
                    Some(NewItem::fresh(
                        ItemKind::Scrap,
                        scrap_name(&item),
                        item.category,
                        Some(item.id),
                        width,
                        length,
                        1,
                        None,
                        item.price,
                        None,
                    ))
                }
                None => None,
            };

            let consumed_area = item.consumed_area + cut_area;
            let remaining_area = snap(item.nominal_area() - consumed_area);
            let patch = ItemPatch {
                remaining_length: Some(remaining_length),
                remaining_area: Some(remaining_area),
                consumed_area: Some(consumed_area),
                is_available: Some(remaining_area > AREA_EPSILON),
                ..Default::default()
            }
            .expecting(item.version);

            let outcome = self
                .repo
                .commit_consumption(ConsumptionCommit {
                    item_id: item.id,
                    patch,
                    transaction: NewTransaction::cut(item.id, request.width, request.length),
                    scrap,
                })
                .await?;

            metrics::record_consumption();
            if let Some(scrap) = &outcome.scrap {
                self.created(scrap);
            }
            self.emit(InventoryEvent::ConsumptionRegistered {
                item_id: item.id,
                transaction_id: outcome.transaction.id,
                area: outcome.transaction.area,
                scrap_id: outcome.scrap.as_ref().map(|s| s.id),
            });
            info!(
                code = %outcome.item.code,
                area = cut_area,
                remaining_length = outcome.item.remaining_length,
                remaining_area = outcome.item.remaining_area,
                "consumption registered"
            );
            Ok(outcome)
        }
        .await;
        self.observe("register_consumption", result)
    }

    /// Replaces a roll's descriptive fields and resets its face to the new
    /// nominal size: consumed area goes back to 0 even though the cut history
    /// stays in the transaction log.
    #[instrument(skip(self, details))]
    pub async fn edit_roll(&self, id: Uuid, details: RollDetails) -> Result<Item, ServiceError> {
        let result = async {
            details.check()?;
            let _guard = self.locks.lock(id).await;

            let current = require_item(self.repo.as_ref(), id).await?;
            if !current.is_roll() {
                return Err(ServiceError::validation(format!(
                    "{} is not a roll",
                    current.code
                )));
            }

            let patch = ItemPatch {
                name: Some(details.name),
                category: Some(details.category),
                quantity: Some(details.quantity),
                min_quantity: Some(details.min_quantity),
                price: Some(details.price),
                observation: Some(details.observation),
                ..reset_face(details.width, details.length)
            }
            .expecting(current.version);

            let item = self.repo.update(id, patch).await?;
            self.emit(InventoryEvent::ItemUpdated(id));
            if current.consumed_area > 0.0 {
                warn!(
                    code = %item.code,
                    discarded_consumed_area = current.consumed_area,
                    "roll edit reset consumption state"
                );
            }
            info!(id = %id, code = %item.code, "roll edited");
            Ok(item)
        }
        .await;
        self.observe("edit_roll", result)
    }

    /// Sets the unit count of an item. For scraps this re-runs the capacity
    /// check against the origin, since quantity multiplies the footprint.
    #[instrument(skip(self))]
    pub async fn adjust_quantity(&self, id: Uuid, quantity: u32) -> Result<Item, ServiceError> {
        if quantity == 0 {
            return self.observe(
                "adjust_quantity",
                Err(ServiceError::validation("quantity must be at least 1")),
            );
        }

        let current = match require_item(self.repo.as_ref(), id).await {
            Ok(item) => item,
            Err(e) => return self.observe("adjust_quantity", Err(e)),
        };
        if current.is_scrap() {
            return self
                .edit_scrap(
                    id,
                    EditScrap {
                        width: current.width,
                        length: current.length,
                        quantity,
                        observation: current.observation,
                    },
                )
                .await;
        }

        let result = async {
            let _guard = self.locks.lock(id).await;
            let current = require_item(self.repo.as_ref(), id).await?;
            let patch = ItemPatch {
                quantity: Some(quantity),
                ..Default::default()
            }
            .expecting(current.version);
            let item = self.repo.update(id, patch).await?;
            self.emit(InventoryEvent::ItemUpdated(id));
            info!(code = %item.code, quantity, "quantity adjusted");
            Ok(item)
        }
        .await;
        self.observe("adjust_quantity", result)
    }

    /// Deletes an item. Transactions are never removed; scraps are handled by
    /// the configured [`DeletePolicy`]. Returns the ids that were removed.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let result = async {
            let _guard = self.locks.lock(id).await;
            require_item(self.repo.as_ref(), id).await?;

            let mut doomed = match self.delete_policy {
                DeletePolicy::Orphan => Vec::new(),
                DeletePolicy::CascadeScraps => self.descendants(id).await?,
            };
            // Deepest scraps first, the item itself last.
            doomed.reverse();
            doomed.push(id);

            self.repo.delete_many(&doomed).await?;
            for removed in &doomed {
                self.emit(InventoryEvent::ItemDeleted(*removed));
            }
            info!(id = %id, removed = doomed.len(), policy = ?self.delete_policy, "item deleted");
            Ok(doomed)
        }
        .await;
        self.observe("delete_item", result)
    }

    /// Scraps cut from `id`, transitively, in breadth-first order.
    async fn descendants(&self, id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            for child in self.repo.get_by_origin(next).await? {
                if child.id != id && !found.contains(&child.id) {
                    found.push(child.id);
                    queue.push_back(child.id);
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryRepository;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn engine() -> AllocationEngine<InMemoryRepository> {
        AllocationEngine::new(Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn create_roll_starts_untouched() {
        let engine = engine();
        let roll = engine
            .create_roll(RollDetails::new("Ceramic 20", Category::WindowTinting, 1.52, 30.0))
            .await
            .unwrap();
        assert_eq!(roll.kind, ItemKind::Roll);
        assert_eq!(roll.code, "BOB001");
        assert_eq!(roll.remaining_width, 1.52);
        assert_eq!(roll.remaining_length, 30.0);
        assert!((roll.remaining_area - 45.6).abs() < 1e-9);
        assert_eq!(roll.consumed_area, 0.0);
        assert!(roll.is_available);
    }

    #[tokio::test]
    async fn create_roll_rejects_bad_input() {
        let engine = engine();
        let mut details = RollDetails::new("Gloss black", Category::Wrap, 0.0, 25.0);
        assert_matches!(
            engine.create_roll(details.clone()).await,
            Err(ServiceError::ValidationError(_))
        );
        details.width = 1.52;
        details.quantity = 0;
        assert_matches!(
            engine.create_roll(details).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn scrap_inherits_parent_identity() {
        let engine = engine();
        let mut details = RollDetails::new("Clear PPF", Category::Ppf, 1.52, 15.0);
        details.price = Some(dec!(120.50));
        let roll = engine.create_roll(details).await.unwrap();

        let scrap = engine
            .create_scrap(NewScrap::new(roll.id, 0.5, 1.2))
            .await
            .unwrap();
        assert_eq!(scrap.kind, ItemKind::Scrap);
        assert_eq!(scrap.code, "RET001");
        assert_eq!(scrap.name, "Scrap of Clear PPF");
        assert_eq!(scrap.category, Category::Ppf);
        assert_eq!(scrap.origin_id, Some(roll.id));
        assert_eq!(scrap.price, roll.price);
        assert!((scrap.remaining_area - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn scrap_wider_than_parent_is_rejected() {
        let engine = engine();
        let roll = engine
            .create_roll(RollDetails::new("Satin", Category::Wrap, 1.0, 10.0))
            .await
            .unwrap();
        assert_matches!(
            engine.create_scrap(NewScrap::new(roll.id, 1.2, 0.5)).await,
            Err(ServiceError::CapacityError(_))
        );
    }

    #[tokio::test]
    async fn scrap_of_missing_parent_is_not_found() {
        let engine = engine();
        assert_matches!(
            engine.create_scrap(NewScrap::new(Uuid::new_v4(), 0.5, 0.5)).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn consumption_requires_a_roll() {
        let engine = engine();
        let roll = engine
            .create_roll(RollDetails::new("Satin", Category::Wrap, 1.0, 10.0))
            .await
            .unwrap();
        let scrap = engine
            .create_scrap(NewScrap::new(roll.id, 0.5, 2.0))
            .await
            .unwrap();
        assert_matches!(
            engine
                .register_consumption(Consumption::cut(scrap.id, 0.1, 0.1))
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn scrap_request_without_area_is_a_capacity_error() {
        let engine = engine();
        let roll = engine
            .create_roll(RollDetails::new("Satin", Category::Wrap, 1.0, 10.0))
            .await
            .unwrap();
        let mut missing_length = Consumption::cut(roll.id, 1.0, 1.0);
        missing_length.create_scrap = true;
        missing_length.scrap_width = Some(0.5);
        assert_matches!(
            engine.register_consumption(missing_length).await,
            Err(ServiceError::CapacityError(_))
        );
        assert_matches!(
            engine
                .register_consumption(Consumption::cut(roll.id, 1.0, 1.0).with_scrap(0.0, 2.0))
                .await,
            Err(ServiceError::CapacityError(_))
        );
        assert_matches!(
            engine
                .register_consumption(Consumption::cut(roll.id, 1.0, 1.0).with_scrap(0.5, -1.0))
                .await,
            Err(ServiceError::CapacityError(_))
        );

        let untouched = engine.repository().get(roll.id).await.unwrap().unwrap();
        assert_eq!(untouched.consumed_area, 0.0);
        assert!(engine.repository().get_by_origin(roll.id).await.unwrap().is_empty());
        assert!(engine.repository().get_all_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_items_leave_no_lock_entries() {
        let engine = engine();
        let missing = Uuid::new_v4();
        assert_matches!(
            engine
                .register_consumption(Consumption::cut(missing, 0.1, 0.1))
                .await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            engine.create_scrap(NewScrap::new(missing, 0.1, 0.1)).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            engine
                .edit_roll(missing, RollDetails::new("Gone", Category::Wrap, 1.0, 1.0))
                .await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(engine.delete_item(missing).await, Err(ServiceError::NotFound(_)));
        assert!(engine.locks.is_empty());

        let roll = engine
            .create_roll(RollDetails::new("Satin", Category::Wrap, 1.0, 10.0))
            .await
            .unwrap();
        engine
            .register_consumption(Consumption::cut(roll.id, 1.0, 1.0))
            .await
            .unwrap();
        assert!(engine.locks.is_empty());
    }

    #[tokio::test]
    async fn adjust_quantity_on_scrap_rechecks_capacity() {
        let engine = engine();
        let roll = engine
            .create_roll(RollDetails::new("Satin", Category::Wrap, 1.0, 10.0))
            .await
            .unwrap();
        let scrap = engine
            .create_scrap(NewScrap::new(roll.id, 1.0, 4.0))
            .await
            .unwrap();

        let doubled = engine.adjust_quantity(scrap.id, 2).await.unwrap();
        assert_eq!(doubled.quantity, 2);
        assert_matches!(
            engine.adjust_quantity(scrap.id, 3).await,
            Err(ServiceError::CapacityError(_))
        );
        assert_matches!(
            engine.adjust_quantity(roll.id, 0).await,
            Err(ServiceError::ValidationError(_))
        );
        let restocked = engine.adjust_quantity(roll.id, 5).await.unwrap();
        assert_eq!(restocked.quantity, 5);
        assert_eq!(restocked.remaining_area, roll.remaining_area);
    }

    #[tokio::test]
    async fn events_follow_mutations() {
        let (sender, mut rx) = EventSender::channel(16);
        let engine = engine().with_events(sender);
        let roll = engine
            .create_roll(RollDetails::new("Satin", Category::Wrap, 1.0, 10.0))
            .await
            .unwrap();
        let outcome = engine
            .register_consumption(Consumption::cut(roll.id, 1.0, 2.0).with_scrap(0.5, 1.0))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(InventoryEvent::ItemCreated {
                id: roll.id,
                kind: ItemKind::Roll
            })
        );
        let scrap_id = outcome.scrap.as_ref().map(|s| s.id);
        assert_eq!(
            rx.recv().await,
            Some(InventoryEvent::ItemCreated {
                id: scrap_id.unwrap(),
                kind: ItemKind::Scrap
            })
        );
        assert_matches!(
            rx.recv().await,
            Some(InventoryEvent::ConsumptionRegistered { item_id, scrap_id: sid, .. })
                if item_id == roll.id && sid == scrap_id
        );
    }
}
