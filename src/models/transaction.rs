use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Types of inventory transactions. Only cuts are recorded today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionKind {
    Cut,
}

/// Write-once log record of a consumption event against a roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub item_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub width: f64,
    pub length: f64,
    pub area: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub item_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub width: f64,
    pub length: f64,
    pub area: f64,
}

impl NewTransaction {
    pub fn cut(item_id: Uuid, width: f64, length: f64) -> Self {
        Self {
            item_id,
            kind: TransactionKind::Cut,
            width,
            length,
            area: width * length,
        }
    }

    pub fn into_transaction(self, id: Uuid, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            item_id: self.item_id,
            kind: self.kind,
            width: self.width,
            length: self.length,
            area: self.area,
            created_at: now,
        }
    }
}
