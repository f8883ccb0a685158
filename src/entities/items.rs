use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use std::str::FromStr;

use crate::errors::ServiceError;
use crate::models::{Category, Item, ItemKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub kind: String,
    pub name: String,
    pub category: String,
    pub origin_id: Option<Uuid>,
    pub width: f64,
    pub length: f64,
    pub quantity: i32,
    pub min_quantity: Option<i32>,
    pub price: Option<Decimal>,
    pub observation: Option<String>,
    pub remaining_width: f64,
    pub remaining_length: f64,
    pub remaining_area: f64,
    pub consumed_area: f64,
    pub is_available: bool,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn to_u32(field: &str, value: i32) -> Result<u32, ServiceError> {
    u32::try_from(value)
        .map_err(|_| ServiceError::InternalError(format!("stored {} is negative: {}", field, value)))
}

fn to_i32(field: &str, value: u32) -> Result<i32, ServiceError> {
    i32::try_from(value)
        .map_err(|_| ServiceError::validation(format!("{} is too large: {}", field, value)))
}

impl TryFrom<Model> for Item {
    type Error = ServiceError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = ItemKind::from_str(&model.kind).map_err(|_| {
            ServiceError::InternalError(format!("unknown item kind '{}'", model.kind))
        })?;
        let category = Category::from_str(&model.category).map_err(|_| {
            ServiceError::InternalError(format!("unknown category '{}'", model.category))
        })?;

        Ok(Item {
            id: model.id,
            code: model.code,
            kind,
            name: model.name,
            category,
            origin_id: model.origin_id,
            width: model.width,
            length: model.length,
            quantity: to_u32("quantity", model.quantity)?,
            min_quantity: model
                .min_quantity
                .map(|min| to_u32("min_quantity", min))
                .transpose()?,
            price: model.price,
            observation: model.observation,
            remaining_width: model.remaining_width,
            remaining_length: model.remaining_length,
            remaining_area: model.remaining_area,
            consumed_area: model.consumed_area,
            is_available: model.is_available,
            version: u64::try_from(model.version).unwrap_or_default(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl TryFrom<&Item> for ActiveModel {
    type Error = ServiceError;

    fn try_from(item: &Item) -> Result<Self, Self::Error> {
        Ok(ActiveModel {
            id: Set(item.id),
            code: Set(item.code.clone()),
            kind: Set(item.kind.to_string()),
            name: Set(item.name.clone()),
            category: Set(item.category.to_string()),
            origin_id: Set(item.origin_id),
            width: Set(item.width),
            length: Set(item.length),
            quantity: Set(to_i32("quantity", item.quantity)?),
            min_quantity: Set(item
                .min_quantity
                .map(|min| to_i32("minQuantity", min))
                .transpose()?),
            price: Set(item.price),
            observation: Set(item.observation.clone()),
            remaining_width: Set(item.remaining_width),
            remaining_length: Set(item.remaining_length),
            remaining_area: Set(item.remaining_area),
            consumed_area: Set(item.consumed_area),
            is_available: Set(item.is_available),
            version: Set(i64::try_from(item.version).unwrap_or(i64::MAX)),
            created_at: Set(item.created_at),
            updated_at: Set(item.updated_at),
        })
    }
}
