use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;

/// Tolerance used for all area and length comparisons, in m / m².
pub const AREA_EPSILON: f64 = 1e-9;

/// Roll (purchased stock) or scrap (offcut of another item).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemKind {
    Roll,
    Scrap,
}

impl ItemKind {
    /// Prefix of the human-readable code: `BOB` (bobina) for rolls, `RET` (retalho) for scraps.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            ItemKind::Roll => "BOB",
            ItemKind::Scrap => "RET",
        }
    }

    pub fn format_code(&self, number: u64) -> String {
        format!("{}{:03}", self.code_prefix(), number)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    WindowTinting,
    #[serde(rename = "ppf")]
    #[strum(serialize = "ppf")]
    Ppf,
    Wrap,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::WindowTinting => "Window Tinting",
            Category::Ppf => "PPF",
            Category::Wrap => "Wrap",
        }
    }
}

/// A roll or a scrap. Field names serialize in camelCase so records stay
/// compatible with the browser key-value store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub code: String,
    pub kind: ItemKind,
    pub name: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<Uuid>,
    pub width: f64,
    pub length: f64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub remaining_width: f64,
    pub remaining_length: f64,
    pub remaining_area: f64,
    pub consumed_area: f64,
    pub is_available: bool,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_roll(&self) -> bool {
        self.kind == ItemKind::Roll
    }

    pub fn is_scrap(&self) -> bool {
        self.kind == ItemKind::Scrap
    }

    /// Nominal `width * length` of one unit.
    pub fn nominal_area(&self) -> f64 {
        self.width * self.length
    }

    /// Area this record occupies against its origin's capacity: `width * length * quantity`.
    pub fn footprint(&self) -> f64 {
        self.nominal_area() * f64::from(self.quantity)
    }

    pub fn is_low_stock(&self) -> bool {
        matches!(self.min_quantity, Some(min) if self.quantity <= min)
    }

    /// Checks the area invariants: `remainingArea == width*length - consumedArea`,
    /// `0 <= consumedArea <= width*length`, and remaining dimensions bounded by nominal ones.
    pub fn check_invariants(&self, tolerance: f64) -> Result<(), String> {
        let nominal = self.nominal_area();
        if (self.remaining_area - (nominal - self.consumed_area)).abs() > tolerance {
            return Err(format!(
                "{}: remaining area {} != {} - {}",
                self.code, self.remaining_area, nominal, self.consumed_area
            ));
        }
        if self.consumed_area < -tolerance || self.consumed_area > nominal + tolerance {
            return Err(format!(
                "{}: consumed area {} outside [0, {}]",
                self.code, self.consumed_area, nominal
            ));
        }
        if self.remaining_width > self.width + tolerance
            || self.remaining_length > self.length + tolerance
        {
            return Err(format!("{}: remaining face exceeds nominal size", self.code));
        }
        if self.remaining_length < -tolerance || self.remaining_area < -tolerance {
            return Err(format!("{}: negative remaining state", self.code));
        }
        if self.is_available != (self.remaining_area > AREA_EPSILON) {
            return Err(format!("{}: availability flag out of sync", self.code));
        }
        Ok(())
    }
}

/// Fields of an item about to be inserted. The repository assigns
/// `id`, `code`, `version` and timestamps.
#[derive(Debug, Clone, PartialEq, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub kind: ItemKind,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub category: Category,
    pub origin_id: Option<Uuid>,
    pub width: f64,
    pub length: f64,
    #[validate(range(min = 1))]
    pub quantity: u32,
    pub min_quantity: Option<u32>,
    pub price: Option<Decimal>,
    #[validate(length(max = 500))]
    pub observation: Option<String>,
    pub remaining_width: f64,
    pub remaining_length: f64,
    pub remaining_area: f64,
    pub consumed_area: f64,
    pub is_available: bool,
}

impl NewItem {
    /// An untouched item: remaining face equals the nominal size and nothing is consumed.
    #[allow(clippy::too_many_arguments)]
    pub fn fresh(
        kind: ItemKind,
        name: String,
        category: Category,
        origin_id: Option<Uuid>,
        width: f64,
        length: f64,
        quantity: u32,
        min_quantity: Option<u32>,
        price: Option<Decimal>,
        observation: Option<String>,
    ) -> Self {
        let area = width * length;
        Self {
            kind,
            name,
            category,
            origin_id,
            width,
            length,
            quantity,
            min_quantity,
            price,
            observation,
            remaining_width: width,
            remaining_length: length,
            remaining_area: area,
            consumed_area: 0.0,
            is_available: area > AREA_EPSILON,
        }
    }

    /// Rejects records the store must never hold.
    pub fn check_required(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.name.trim().is_empty() {
            return Err(ServiceError::validation("name is required"));
        }
        ensure_positive("width", self.width)?;
        ensure_positive("length", self.length)?;
        if self.kind == ItemKind::Scrap && self.origin_id.is_none() {
            return Err(ServiceError::validation("a scrap requires an originId"));
        }
        Ok(())
    }

    /// Materializes the record with repository-assigned identity.
    pub fn into_item(self, id: Uuid, code: String, now: DateTime<Utc>) -> Item {
        Item {
            id,
            code,
            kind: self.kind,
            name: self.name,
            category: self.category,
            origin_id: self.origin_id,
            width: self.width,
            length: self.length,
            quantity: self.quantity,
            min_quantity: self.min_quantity,
            price: self.price,
            observation: self.observation,
            remaining_width: self.remaining_width,
            remaining_length: self.remaining_length,
            remaining_area: self.remaining_area,
            consumed_area: self.consumed_area,
            is_available: self.is_available,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update merged into an existing record. `None` leaves a field untouched;
/// the nested options of nullable fields allow clearing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<Category>,
    pub width: Option<f64>,
    pub length: Option<f64>,
    pub quantity: Option<u32>,
    pub min_quantity: Option<Option<u32>>,
    pub price: Option<Option<Decimal>>,
    pub observation: Option<Option<String>>,
    pub remaining_width: Option<f64>,
    pub remaining_length: Option<f64>,
    pub remaining_area: Option<f64>,
    pub consumed_area: Option<f64>,
    pub is_available: Option<bool>,
    /// Optimistic lock: the write is rejected unless the stored version matches.
    pub expected_version: Option<u64>,
}

impl ItemPatch {
    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn apply(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(width) = self.width {
            item.width = width;
        }
        if let Some(length) = self.length {
            item.length = length;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(min_quantity) = self.min_quantity {
            item.min_quantity = min_quantity;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(observation) = &self.observation {
            item.observation = observation.clone();
        }
        if let Some(remaining_width) = self.remaining_width {
            item.remaining_width = remaining_width;
        }
        if let Some(remaining_length) = self.remaining_length {
            item.remaining_length = remaining_length;
        }
        if let Some(remaining_area) = self.remaining_area {
            item.remaining_area = remaining_area;
        }
        if let Some(consumed_area) = self.consumed_area {
            item.consumed_area = consumed_area;
        }
        if let Some(is_available) = self.is_available {
            item.is_available = is_available;
        }
    }
}

pub(crate) fn ensure_positive(field: &str, value: f64) -> Result<(), ServiceError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ServiceError::ValidationError(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}
