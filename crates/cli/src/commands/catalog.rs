//! Catalog import from YAML.
//!
//! ```yaml
//! items:
//!   - name: Box Logo Hoodie
//!     price: "65.00"
//!     category: hoodie
//!     sizes: [S, M, L, XL]
//!     inventory: 40
//!     featured: true
//!   - name: Members Only Cap
//!     price: "30.00"
//!     category: cap
//!     inventory: 15
//!     exclusive: true
//! ```
//!
//! The whole file is checked before anything is written, so a bad row does
//! not leave half a drop in the catalog.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use streetmerch_storefront::db::{self, Repositories};
use streetmerch_storefront::models::NewCatalogItem;
use streetmerch_storefront::services::CatalogService;

use super::{CommandError, database_url};

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub items: Vec<NewCatalogItem>,
}

/// Problems with individual rows, one message per problem.
#[must_use]
pub fn validate(file: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (index, item) in file.items.iter().enumerate() {
        let row = index + 1;
        let name = item.name.trim();
        if name.is_empty() {
            errors.push(format!("item {row}: name is empty"));
        } else if !seen.insert(name.to_lowercase()) {
            errors.push(format!("item {row}: duplicate name '{name}'"));
        }
        if item.price.is_sign_negative() {
            errors.push(format!("item {row}: price is negative"));
        }
        if item.inventory < 0 {
            errors.push(format!("item {row}: inventory is negative"));
        }
    }
    errors
}

/// Parse and validate a catalog file.
///
/// # Errors
///
/// Returns `CommandError` if the file cannot be read or parsed, or if any
/// row is invalid.
pub fn load(content: &str) -> Result<CatalogFile, CommandError> {
    let file: CatalogFile = serde_yaml::from_str(content)?;
    let errors = validate(&file);
    if !errors.is_empty() {
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CommandError::Invalid(format!(
            "{} validation errors found",
            errors.len()
        )));
    }
    Ok(file)
}

/// Import catalog items from `file_path`.
///
/// # Errors
///
/// Returns `CommandError` if the file is invalid or a database write fails.
pub async fn import(file_path: &str, dry_run: bool) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let file = load(&content)?;
    info!(items = file.items.len(), "Catalog file validated");

    if dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let pool = db::create_pool(&database_url()?).await?;
    let repos = Repositories::postgres(pool);
    let catalog = CatalogService::new(&repos);

    for item in file.items {
        let created = catalog.create(item).await?;
        info!(item_id = %created.id, name = %created.name, "Created catalog item");
    }

    info!("Import complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use streetmerch_core::CatalogCategory;

    use super::*;

    const DROP: &str = r#"
items:
  - name: Box Logo Hoodie
    price: "65.00"
    category: hoodie
    sizes: [S, M, L]
    inventory: 40
    featured: true
  - name: Members Only Cap
    price: "30.00"
    category: cap
    inventory: 15
    exclusive: true
"#;

    #[test]
    fn test_load_drop_file() {
        let file = load(DROP).unwrap();
        assert_eq!(file.items.len(), 2);

        let hoodie = &file.items[0];
        assert_eq!(hoodie.price, Decimal::new(6500, 2));
        assert_eq!(hoodie.category, CatalogCategory::Hoodie);
        assert_eq!(hoodie.sizes, vec!["S", "M", "L"]);
        assert!(hoodie.featured);
        assert!(!hoodie.exclusive);

        assert!(file.items[1].exclusive);
        assert!(file.items[1].description.is_none());
    }

    #[test]
    fn test_validation_reports_every_row() {
        let file: CatalogFile = serde_yaml::from_str(
            r#"
items:
  - { name: "  ", price: "10", category: sticker, inventory: 1 }
  - { name: Tee, price: "-1", category: limited, inventory: -3 }
  - { name: tee, price: "5", category: sticker, inventory: 0 }
"#,
        )
        .unwrap();

        let errors = validate(&file);
        assert_eq!(
            errors,
            vec![
                "item 1: name is empty",
                "item 2: price is negative",
                "item 2: inventory is negative",
                "item 3: duplicate name 'tee'",
            ]
        );
        assert!(matches!(load("items: ["), Err(CommandError::Yaml(_))));
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let result = load("items:\n  - { name: Mug, price: \"12\", category: mug, inventory: 2 }\n");
        assert!(matches!(result, Err(CommandError::Yaml(_))));
    }
}
