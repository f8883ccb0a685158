use sea_orm::entity::prelude::*;
use sea_orm::Set;
use std::str::FromStr;

use crate::errors::ServiceError;
use crate::models::{Transaction, TransactionKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: Uuid,
    pub r#type: String, // Storing as string in DB, converted to/from TransactionKind
    pub width: f64,
    pub length: f64,
    pub area: f64,
    pub created_at: DateTimeUtc,
}

// No foreign key constraint: the log outlives deleted items.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::items::Entity",
        from = "Column::ItemId",
        to = "super::items::Column::Id"
    )]
    Item,
}

impl Related<super::items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transaction {
    type Error = ServiceError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = TransactionKind::from_str(&model.r#type).map_err(|_| {
            ServiceError::InternalError(format!("unknown transaction type '{}'", model.r#type))
        })?;
        Ok(Transaction {
            id: model.id,
            item_id: model.item_id,
            kind,
            width: model.width,
            length: model.length,
            area: model.area,
            created_at: model.created_at,
        })
    }
}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        ActiveModel {
            id: Set(tx.id),
            item_id: Set(tx.item_id),
            r#type: Set(tx.kind.to_string()),
            width: Set(tx.width),
            length: Set(tx.length),
            area: Set(tx.area),
            created_at: Set(tx.created_at),
        }
    }
}
