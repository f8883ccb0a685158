//! Read-only views over repository snapshots.
//!
//! The free functions are pure; [`QueryService`] fetches a snapshot and
//! applies them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumString, IntoEnumIterator};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Category, Item, ItemKind, Transaction, TransactionKind};
use crate::repositories::InventoryRepository;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilter {
    pub category: Option<Category>,
    pub kind: Option<ItemKind>,
    pub name_contains: Option<String>,
    /// Lower bound on remaining width.
    pub min_width: Option<f64>,
    /// Lower bound on remaining length.
    pub min_length: Option<f64>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(category) = self.category {
            if item.category != category {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if item.kind != kind {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            let needle = needle.trim().to_lowercase();
            if !needle.is_empty()
                && !item.name.to_lowercase().contains(&needle)
                && !item.code.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(min) = self.min_width {
            if item.remaining_width < min {
                return false;
            }
        }
        if let Some(min) = self.min_length {
            if item.remaining_length < min {
                return false;
            }
        }
        true
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortField {
    Code,
    Name,
    Category,
    Width,
    Length,
    RemainingArea,
    Quantity,
    #[default]
    CreatedAt,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl ItemSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    fn compare(&self, a: &Item, b: &Item) -> Ordering {
        let ordering = match self.field {
            SortField::Code => compare_text(&a.code, &b.code),
            SortField::Name => compare_text(&a.name, &b.name),
            SortField::Category => compare_text(a.category.label(), b.category.label()),
            SortField::Width => a.width.total_cmp(&b.width),
            SortField::Length => a.length.total_cmp(&b.length),
            SortField::RemainingArea => a.remaining_area.total_cmp(&b.remaining_area),
            SortField::Quantity => a.quantity.cmp(&b.quantity),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Filters then sorts a snapshot. The sort is stable, so ties keep the
/// snapshot's insertion order.
pub fn list_items(items: &[Item], filter: &ItemFilter, sort: ItemSort) -> Vec<Item> {
    let mut listed: Vec<Item> = items.iter().filter(|i| filter.matches(i)).cloned().collect();
    listed.sort_by(|a, b| sort.compare(a, b));
    listed
}

pub fn scraps_of(items: &[Item], item_id: Uuid) -> Vec<Item> {
    items
        .iter()
        .filter(|i| i.origin_id == Some(item_id))
        .cloned()
        .collect()
}

/// Cuts logged against `item_id`, newest first. Equal timestamps list the
/// later-appended transaction first.
pub fn consumption_history(transactions: &[Transaction], item_id: Uuid) -> Vec<Transaction> {
    let mut history: Vec<Transaction> = transactions
        .iter()
        .filter(|t| t.item_id == item_id && t.kind == TransactionKind::Cut)
        .cloned()
        .collect();
    history.reverse();
    history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    history
}

pub fn total_scrap_area(scraps: &[Item]) -> f64 {
    scraps.iter().map(Item::footprint).sum()
}

pub fn low_stock(item: &Item) -> bool {
    item.is_low_stock()
}

pub fn low_stock_items(items: &[Item]) -> Vec<Item> {
    items.iter().filter(|i| low_stock(i)).cloned().collect()
}

/// Exact, case-insensitive code lookup. Scanned QR labels carry the code.
pub fn find_by_code<'a>(items: &'a [Item], code: &str) -> Option<&'a Item> {
    let code = code.trim();
    items.iter().find(|i| i.code.eq_ignore_ascii_case(code))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: Option<Category>,
    pub rolls: usize,
    pub scraps: usize,
    /// Σ remainingArea * quantity
    pub remaining_area: f64,
    pub low_stock: usize,
}

/// One row per category, in declaration order, including empty categories.
pub fn inventory_summary(items: &[Item]) -> Vec<CategorySummary> {
    let mut rows: BTreeMap<Category, CategorySummary> = Category::iter()
        .map(|c| {
            (
                c,
                CategorySummary {
                    category: Some(c),
                    ..Default::default()
                },
            )
        })
        .collect();

    for item in items {
        if let Some(row) = rows.get_mut(&item.category) {
            match item.kind {
                ItemKind::Roll => row.rolls += 1,
                ItemKind::Scrap => row.scraps += 1,
            }
            row.remaining_area += item.remaining_area * f64::from(item.quantity);
            if item.is_low_stock() {
                row.low_stock += 1;
            }
        }
    }
    rows.into_values().collect()
}

/// Async entry point for presentation layers.
pub struct QueryService<R: InventoryRepository + ?Sized = dyn InventoryRepository> {
    repo: Arc<R>,
}

impl<R: InventoryRepository + ?Sized> Clone for QueryService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R: InventoryRepository + ?Sized> QueryService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Item>, ServiceError> {
        self.repo.get(id).await
    }

    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        filter: &ItemFilter,
        sort: ItemSort,
    ) -> Result<Vec<Item>, ServiceError> {
        let items = self.repo.get_all().await?;
        Ok(list_items(&items, filter, sort))
    }

    pub async fn scraps_of(&self, item_id: Uuid) -> Result<Vec<Item>, ServiceError> {
        self.repo.get_by_origin(item_id).await
    }

    pub async fn consumption_history(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<Transaction>, ServiceError> {
        let transactions = self.repo.get_transactions_by_item(item_id).await?;
        Ok(consumption_history(&transactions, item_id))
    }

    pub async fn total_scrap_area(&self, item_id: Uuid) -> Result<f64, ServiceError> {
        Ok(total_scrap_area(&self.scraps_of(item_id).await?))
    }

    pub async fn low_stock_items(&self) -> Result<Vec<Item>, ServiceError> {
        Ok(low_stock_items(&self.repo.get_all().await?))
    }

    pub async fn inventory_summary(&self) -> Result<Vec<CategorySummary>, ServiceError> {
        Ok(inventory_summary(&self.repo.get_all().await?))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Item>, ServiceError> {
        let items = self.repo.get_all().await?;
        Ok(find_by_code(&items, code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewItem;
    use chrono::{Duration, Utc};
    use rstest::rstest;

    fn item(code: &str, name: &str, category: Category, width: f64, length: f64) -> Item {
        NewItem::fresh(
            ItemKind::Roll,
            name.into(),
            category,
            None,
            width,
            length,
            1,
            None,
            None,
            None,
        )
        .into_item(Uuid::new_v4(), code.into(), Utc::now())
    }

    fn sample() -> Vec<Item> {
        vec![
            item("BOB001", "beta", Category::Wrap, 1.52, 20.0),
            item("BOB002", "Alpha", Category::Ppf, 1.0, 10.0),
            item("BOB003", "alpha", Category::Wrap, 0.75, 30.0),
        ]
    }

    fn codes(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.code.as_str()).collect()
    }

    #[rstest]
    #[case(SortField::Name, SortDirection::Asc, vec!["BOB002", "BOB003", "BOB001"])]
    #[case(SortField::Name, SortDirection::Desc, vec!["BOB001", "BOB002", "BOB003"])]
    #[case(SortField::Width, SortDirection::Asc, vec!["BOB003", "BOB002", "BOB001"])]
    #[case(SortField::Length, SortDirection::Desc, vec!["BOB003", "BOB001", "BOB002"])]
    #[case(SortField::Category, SortDirection::Asc, vec!["BOB002", "BOB001", "BOB003"])]
    fn sorts_stably(
        #[case] field: SortField,
        #[case] direction: SortDirection,
        #[case] expected: Vec<&str>,
    ) {
        let listed = list_items(&sample(), &ItemFilter::default(), ItemSort::new(field, direction));
        assert_eq!(codes(&listed), expected);
    }

    #[test]
    fn filters_on_remaining_dimensions_and_name() {
        let mut items = sample();
        items[1].remaining_length = 2.0;
        let filter = ItemFilter {
            name_contains: Some("ALP".into()),
            min_length: Some(5.0),
            ..Default::default()
        };
        assert_eq!(codes(&list_items(&items, &filter, ItemSort::default())), vec!["BOB003"]);

        let filter = ItemFilter {
            category: Some(Category::Wrap),
            min_width: Some(1.0),
            ..Default::default()
        };
        assert_eq!(codes(&list_items(&items, &filter, ItemSort::default())), vec!["BOB001"]);
    }

    #[test]
    fn scrap_area_sums_footprints() {
        let parent = Uuid::new_v4();
        let mut a = item("RET001", "a", Category::Wrap, 0.5, 2.0);
        a.origin_id = Some(parent);
        a.quantity = 2;
        let mut b = item("RET002", "b", Category::Wrap, 1.0, 1.0);
        b.origin_id = Some(parent);
        let items = vec![a, b, item("BOB001", "c", Category::Wrap, 1.0, 1.0)];

        let scraps = scraps_of(&items, parent);
        assert_eq!(scraps.len(), 2);
        assert!((total_scrap_area(&scraps) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn history_is_newest_first_with_ties_by_append_order() {
        let item_id = Uuid::new_v4();
        let now = Utc::now();
        let tx = |offset: i64| Transaction {
            id: Uuid::new_v4(),
            item_id,
            kind: TransactionKind::Cut,
            width: 1.0,
            length: 1.0,
            area: 1.0,
            created_at: now + Duration::seconds(offset),
        };
        let log = vec![tx(0), tx(5), tx(5), tx(1)];
        let history = consumption_history(&log, item_id);
        let ids: Vec<Uuid> = history.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![log[2].id, log[1].id, log[3].id, log[0].id]);
        assert!(consumption_history(&log, Uuid::new_v4()).is_empty());
    }

    #[test]
    fn low_stock_and_summary() {
        let mut items = sample();
        items[0].min_quantity = Some(1);
        items[2].remaining_area = 10.0;
        items[2].quantity = 2;

        assert_eq!(codes(&low_stock_items(&items)), vec!["BOB001"]);

        let summary = inventory_summary(&items);
        assert_eq!(summary.len(), 3);
        let wrap = summary
            .iter()
            .find(|row| row.category == Some(Category::Wrap))
            .unwrap();
        assert_eq!(wrap.rolls, 2);
        assert_eq!(wrap.scraps, 0);
        assert_eq!(wrap.low_stock, 1);
        assert!((wrap.remaining_area - (1.52 * 20.0 + 20.0)).abs() < 1e-9);
        let tint = summary
            .iter()
            .find(|row| row.category == Some(Category::WindowTinting))
            .unwrap();
        assert_eq!(tint.rolls, 0);
    }

    #[test]
    fn code_lookup_ignores_case() {
        let items = sample();
        assert_eq!(find_by_code(&items, " bob002 ").map(|i| i.name.as_str()), Some("Alpha"));
        assert!(find_by_code(&items, "RET001").is_none());
    }
}
