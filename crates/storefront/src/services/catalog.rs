//! Catalog reads for the storefront and writes for the admin panel.

use rust_decimal::Decimal;
use tracing::{info, instrument};

use streetmerch_core::CatalogItemId;

use crate::db::{CatalogRepository, Repositories};
use crate::models::catalog::{FEATURED_LIMIT, sort_for_display};
use crate::models::{CatalogFilter, CatalogItem, CatalogItemUpdate, NewCatalogItem};

use super::CommerceError;

pub struct CatalogService<'a> {
    catalog: &'a dyn CatalogRepository,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            catalog: repos.catalog.as_ref(),
        }
    }

    /// Active items in display order.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    pub async fn list(&self, filter: CatalogFilter) -> Result<Vec<CatalogItem>, CommerceError> {
        let mut items = self.catalog.list(filter).await?;
        sort_for_display(&mut items);
        Ok(items)
    }

    /// Up to four active featured items.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    pub async fn featured(&self) -> Result<Vec<CatalogItem>, CommerceError> {
        let mut items = self
            .list(CatalogFilter {
                category: None,
                featured_only: true,
            })
            .await?;
        items.truncate(FEATURED_LIMIT);
        Ok(items)
    }

    /// An active item. Deactivated items are hidden from shoppers.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the item does not exist or is
    /// inactive.
    pub async fn get(&self, id: CatalogItemId) -> Result<CatalogItem, CommerceError> {
        self.catalog
            .get(id)
            .await?
            .filter(|item| item.active)
            .ok_or_else(|| not_found(id))
    }

    /// # Errors
    ///
    /// Returns `CommerceError::Validation` for an empty name or a negative
    /// price or inventory.
    #[instrument(skip(self, item), fields(name = %item.name))]
    pub async fn create(&self, mut item: NewCatalogItem) -> Result<CatalogItem, CommerceError> {
        item.name = validate_name(&item.name)?;
        validate_price(item.price)?;
        validate_inventory(item.inventory)?;

        let created = self.catalog.create(item).await?;
        info!(item_id = %created.id, "Catalog item created");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the item does not exist.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: CatalogItemId,
        mut update: CatalogItemUpdate,
    ) -> Result<CatalogItem, CommerceError> {
        if let Some(name) = &update.name {
            update.name = Some(validate_name(name)?);
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }
        if let Some(inventory) = update.inventory {
            validate_inventory(inventory)?;
        }

        self.catalog
            .update(id, update)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Soft-delete. Orders keep their own snapshot of the item.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the item does not exist.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: CatalogItemId) -> Result<CatalogItem, CommerceError> {
        let update = CatalogItemUpdate {
            active: Some(false),
            ..CatalogItemUpdate::default()
        };
        let item = self
            .catalog
            .update(id, update)
            .await?
            .ok_or_else(|| not_found(id))?;
        info!(item_id = %id, "Catalog item deactivated");
        Ok(item)
    }
}

fn not_found(id: CatalogItemId) -> CommerceError {
    CommerceError::NotFound(format!("Catalog item {id}"))
}

fn validate_name(name: &str) -> Result<String, CommerceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CommerceError::Validation("Item name is required".to_owned()));
    }
    Ok(name.to_owned())
}

fn validate_price(price: Decimal) -> Result<(), CommerceError> {
    if price.is_sign_negative() {
        return Err(CommerceError::Validation(
            "Price cannot be negative".to_owned(),
        ));
    }
    Ok(())
}

fn validate_inventory(inventory: i32) -> Result<(), CommerceError> {
    if inventory < 0 {
        return Err(CommerceError::Validation(
            "Inventory cannot be negative".to_owned(),
        ));
    }
    Ok(())
}
