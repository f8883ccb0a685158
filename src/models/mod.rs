//! Entity model: items (rolls and scraps) and the consumption log.

pub mod item;
pub mod transaction;

pub use item::{Category, Item, ItemKind, ItemPatch, NewItem, AREA_EPSILON};
pub use transaction::{NewTransaction, Transaction, TransactionKind};
