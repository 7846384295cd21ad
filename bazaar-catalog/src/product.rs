use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A purchasable configuration of a product (size/colour), priced and
/// stocked independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub price: i64,
    pub attributes: serde_json::Value,
    pub enabled: bool,
    pub deleted: bool,
}

/// What an order line item copies out of the catalog at checkout time.
/// Orders never read back from the catalog after this point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantSnapshot {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub unit_price: i64,
    pub attributes: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("variant not found: {0}")]
    NotFound(Uuid),

    #[error("variant not purchasable: {0}")]
    NotPurchasable(Uuid),
}

/// Read-side of the catalog collaborator. Management CRUD lives elsewhere;
/// the orchestrator only needs purchasability checks and snapshots.
pub struct ProductCatalog {
    variants: RwLock<HashMap<Uuid, Variant>>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self {
            variants: RwLock::new(HashMap::new()),
        }
    }

    pub async fn upsert(&self, variant: Variant) {
        self.variants.write().await.insert(variant.id, variant);
    }

    /// Snapshot a variant for an order line item. Disabled or soft-deleted
    /// variants are not purchasable.
    pub async fn snapshot(&self, variant_id: Uuid) -> Result<VariantSnapshot, CatalogError> {
        let variants = self.variants.read().await;
        let variant = variants
            .get(&variant_id)
            .ok_or(CatalogError::NotFound(variant_id))?;
        if !variant.enabled || variant.deleted {
            return Err(CatalogError::NotPurchasable(variant_id));
        }
        Ok(VariantSnapshot {
            variant_id: variant.id,
            product_id: variant.product_id,
            name: variant.name.clone(),
            image: variant.image.clone(),
            unit_price: variant.price,
            attributes: variant.attributes.clone(),
        })
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(enabled: bool, deleted: bool) -> Variant {
        Variant {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "Tee / M / black".into(),
            image: "tee-m-black.jpg".into(),
            price: 100_000,
            attributes: serde_json::json!({"size": "M", "color": "black"}),
            enabled,
            deleted,
        }
    }

    #[tokio::test]
    async fn snapshot_copies_catalog_fields() {
        let catalog = ProductCatalog::new();
        let v = variant(true, false);
        catalog.upsert(v.clone()).await;

        let snap = catalog.snapshot(v.id).await.unwrap();
        assert_eq!(snap.unit_price, 100_000);
        assert_eq!(snap.name, v.name);
    }

    #[tokio::test]
    async fn disabled_and_deleted_variants_are_not_purchasable() {
        let catalog = ProductCatalog::new();
        let disabled = variant(false, false);
        let deleted = variant(true, true);
        catalog.upsert(disabled.clone()).await;
        catalog.upsert(deleted.clone()).await;

        assert!(matches!(
            catalog.snapshot(disabled.id).await,
            Err(CatalogError::NotPurchasable(_))
        ));
        assert!(matches!(
            catalog.snapshot(deleted.id).await,
            Err(CatalogError::NotPurchasable(_))
        ));
        assert!(matches!(
            catalog.snapshot(Uuid::new_v4()).await,
            Err(CatalogError::NotFound(_))
        ));
    }
}
