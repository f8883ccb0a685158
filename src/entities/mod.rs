//! sea-orm entities backing [`crate::repositories::SqlInventoryRepository`].

pub mod code_sequences;
pub mod items;
pub mod transactions;
