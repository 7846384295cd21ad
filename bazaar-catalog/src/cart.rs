use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("cart not found for user {0}")]
    NotFound(Uuid),
}

/// Port to the cart collaborator. Checkout only removes the purchased
/// variants; everything else about carts is out of scope.
#[async_trait]
pub trait CartService: Send + Sync {
    async fn remove_items(&self, user_id: Uuid, variant_ids: &[Uuid]) -> Result<(), CartError>;
}

pub struct InMemoryCart {
    carts: RwLock<HashMap<Uuid, Vec<CartLine>>>,
}

impl InMemoryCart {
    pub fn new() -> Self {
        Self {
            carts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_item(&self, user_id: Uuid, line: CartLine) {
        self.carts.write().await.entry(user_id).or_default().push(line);
    }

    pub async fn items_of(&self, user_id: Uuid) -> Vec<CartLine> {
        self.carts
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryCart {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CartService for InMemoryCart {
    async fn remove_items(&self, user_id: Uuid, variant_ids: &[Uuid]) -> Result<(), CartError> {
        let mut carts = self.carts.write().await;
        if let Some(lines) = carts.get_mut(&user_id) {
            lines.retain(|line| !variant_ids.contains(&line.variant_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remove_items_keeps_unpurchased_lines() {
        let cart = InMemoryCart::new();
        let user = Uuid::new_v4();
        let bought = Uuid::new_v4();
        let kept = Uuid::new_v4();
        cart.add_item(user, CartLine { variant_id: bought, quantity: 2 }).await;
        cart.add_item(user, CartLine { variant_id: kept, quantity: 1 }).await;

        cart.remove_items(user, &[bought]).await.unwrap();
        let remaining = cart.items_of(user).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].variant_id, kept);
    }
}
