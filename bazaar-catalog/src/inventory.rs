use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StockUnit {
    product_id: Uuid,
    quantity: i64,
}

/// Atomic stock ledger per variant, plus the per-product sales counter it
/// moves in lockstep with. All mutation happens under one write lock, which
/// is what makes the compare-and-decrement strict under concurrent
/// checkouts: two buyers for the last unit resolve to one success and one
/// out-of-stock, never both.
pub struct InventoryLedger {
    stock: RwLock<HashMap<Uuid, StockUnit>>,
    sold: RwLock<HashMap<Uuid, i64>>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self {
            stock: RwLock::new(HashMap::new()),
            sold: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_stock(&self, variant_id: Uuid, product_id: Uuid, quantity: i64) {
        self.stock
            .write()
            .await
            .insert(variant_id, StockUnit { product_id, quantity });
    }

    pub async fn stock_of(&self, variant_id: Uuid) -> Option<i64> {
        self.stock.read().await.get(&variant_id).map(|u| u.quantity)
    }

    pub async fn sold_of(&self, product_id: Uuid) -> i64 {
        self.sold.read().await.get(&product_id).copied().unwrap_or(0)
    }

    /// Decrement stock by `quantity` only if at least that much remains.
    /// Single atomic operation, not a read-then-write.
    pub async fn try_reserve(&self, variant_id: Uuid, quantity: i64) -> Result<(), InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let mut stock = self.stock.write().await;
        let unit = stock
            .get_mut(&variant_id)
            .ok_or(InventoryError::NotFound(variant_id))?;
        if unit.quantity < quantity {
            return Err(InventoryError::OutOfStock {
                variant_id,
                requested: quantity,
                available: unit.quantity,
            });
        }
        unit.quantity -= quantity;
        let product_id = unit.product_id;
        drop(stock);

        *self.sold.write().await.entry(product_id).or_insert(0) += quantity;
        Ok(())
    }

    /// Exact inverse of `try_reserve`: put the units back and roll the sales
    /// counter down. Safe to call for quantities already released (the sales
    /// counter saturates at zero).
    pub async fn release(&self, variant_id: Uuid, quantity: i64) -> Result<(), InventoryError> {
        let mut stock = self.stock.write().await;
        let unit = stock
            .get_mut(&variant_id)
            .ok_or(InventoryError::NotFound(variant_id))?;
        unit.quantity += quantity;
        let product_id = unit.product_id;
        drop(stock);

        let mut sold = self.sold.write().await;
        let counter = sold.entry(product_id).or_insert(0);
        *counter = (*counter - quantity).max(0);
        Ok(())
    }
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("no stock record for variant {0}")]
    NotFound(Uuid),

    #[error("out of stock for variant {variant_id}: requested {requested}, available {available}")]
    OutOfStock {
        variant_id: Uuid,
        requested: i64,
        available: i64,
    },

    #[error("invalid quantity {0}")]
    InvalidQuantity(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn reserve_and_release_round_trip() {
        let ledger = InventoryLedger::new();
        let variant = Uuid::new_v4();
        let product = Uuid::new_v4();
        ledger.set_stock(variant, product, 3).await;

        ledger.try_reserve(variant, 2).await.unwrap();
        assert_eq!(ledger.stock_of(variant).await, Some(1));
        assert_eq!(ledger.sold_of(product).await, 2);

        ledger.release(variant, 2).await.unwrap();
        assert_eq!(ledger.stock_of(variant).await, Some(3));
        assert_eq!(ledger.sold_of(product).await, 0);
    }

    #[tokio::test]
    async fn reserve_rejects_when_short() {
        let ledger = InventoryLedger::new();
        let variant = Uuid::new_v4();
        ledger.set_stock(variant, Uuid::new_v4(), 3).await;

        let err = ledger.try_reserve(variant, 5).await.unwrap_err();
        assert!(matches!(err, InventoryError::OutOfStock { available: 3, .. }));
        // Failed reservation must not touch the count.
        assert_eq!(ledger.stock_of(variant).await, Some(3));
    }

    #[tokio::test]
    async fn concurrent_buyers_never_oversell() {
        let ledger = Arc::new(InventoryLedger::new());
        let variant = Uuid::new_v4();
        ledger.set_stock(variant, Uuid::new_v4(), 5).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.try_reserve(variant, 1).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 5);
        assert_eq!(ledger.stock_of(variant).await, Some(0));
    }
}
