//! Catalog item domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use streetmerch_core::{CatalogCategory, CatalogItemId};

/// Number of items shown in the featured strip.
pub const FEATURED_LIMIT: usize = 4;

/// A purchasable item.
///
/// `inventory` is never negative. It only goes down when an order containing
/// the item is confirmed paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub name: String,
    pub description: Option<String>,
    /// Unit price in the site's display currency.
    pub price: Decimal,
    pub image_url: Option<String>,
    pub category: CatalogCategory,
    /// Variant labels (sizes). Empty when the item has no variants.
    pub sizes: Vec<String>,
    pub inventory: i32,
    pub active: bool,
    pub featured: bool,
    /// Only members with a verified identity may buy this item.
    pub exclusive: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new catalog item. New items start active.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCatalogItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    pub category: CatalogCategory,
    #[serde(default)]
    pub sizes: Vec<String>,
    pub inventory: i32,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub exclusive: bool,
}

/// Partial update of a catalog item. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub category: Option<CatalogCategory>,
    pub sizes: Option<Vec<String>>,
    pub inventory: Option<i32>,
    pub active: Option<bool>,
    pub featured: Option<bool>,
    pub exclusive: Option<bool>,
}

impl CatalogItemUpdate {
    /// Apply the update to an in-memory item.
    pub fn apply_to(&self, item: &mut CatalogItem) {
        if let Some(name) = &self.name {
            item.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(image_url) = &self.image_url {
            item.image_url = Some(image_url.clone());
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(sizes) = &self.sizes {
            item.sizes.clone_from(sizes);
        }
        if let Some(inventory) = self.inventory {
            item.inventory = inventory;
        }
        if let Some(active) = self.active {
            item.active = active;
        }
        if let Some(featured) = self.featured {
            item.featured = featured;
        }
        if let Some(exclusive) = self.exclusive {
            item.exclusive = exclusive;
        }
    }
}

/// Storefront listing filter. Listings only ever include active items.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CatalogFilter {
    pub category: Option<CatalogCategory>,
    #[serde(default)]
    pub featured_only: bool,
}

impl CatalogFilter {
    #[must_use]
    pub fn matches(&self, item: &CatalogItem) -> bool {
        item.active
            && self.category.is_none_or(|c| c == item.category)
            && (!self.featured_only || item.featured)
    }
}

/// Display order: limited drops first, then featured, then newest.
pub fn sort_for_display(items: &mut [CatalogItem]) {
    items.sort_by(|a, b| {
        let a_limited = a.category == CatalogCategory::Limited;
        let b_limited = b.category == CatalogCategory::Limited;
        b_limited
            .cmp(&a_limited)
            .then(b.featured.cmp(&a.featured))
            .then(b.created_at.cmp(&a.created_at))
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn item(id: i32, category: CatalogCategory, featured: bool, age_days: i64) -> CatalogItem {
        let created_at = Utc::now() - Duration::days(age_days);
        CatalogItem {
            id: CatalogItemId::new(id),
            name: format!("item {id}"),
            description: None,
            price: Decimal::new(5000, 2),
            image_url: None,
            category,
            sizes: vec![],
            inventory: 10,
            active: true,
            featured,
            exclusive: false,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_sort_limited_then_featured_then_newest() {
        let mut items = vec![
            item(1, CatalogCategory::Hoodie, false, 1),
            item(2, CatalogCategory::Cap, true, 5),
            item(3, CatalogCategory::Limited, false, 10),
            item(4, CatalogCategory::Sticker, false, 0),
        ];
        sort_for_display(&mut items);
        let order: Vec<i32> = items.iter().map(|i| i.id.as_i32()).collect();
        assert_eq!(order, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_filter_excludes_inactive() {
        let mut hoodie = item(1, CatalogCategory::Hoodie, true, 0);
        let filter = CatalogFilter {
            category: Some(CatalogCategory::Hoodie),
            featured_only: true,
        };
        assert!(filter.matches(&hoodie));
        hoodie.active = false;
        assert!(!filter.matches(&hoodie));
        assert!(!filter.matches(&item(2, CatalogCategory::Cap, true, 0)));
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut hoodie = item(1, CatalogCategory::Hoodie, false, 0);
        let update = CatalogItemUpdate {
            price: Some(Decimal::new(6500, 2)),
            featured: Some(true),
            ..CatalogItemUpdate::default()
        };
        update.apply_to(&mut hoodie);
        assert_eq!(hoodie.price, Decimal::new(6500, 2));
        assert!(hoodie.featured);
        assert_eq!(hoodie.name, "item 1");
        assert_eq!(hoodie.inventory, 10);
    }
}
