use crate::models::Order;
use async_trait::async_trait;
use bazaar_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Mutation applied atomically by [`OrderRepository::update`]. The closure
/// runs against a working copy; returning an error leaves the stored order
/// untouched, so callers never observe partial mutation.
pub type UpdateFn = Box<dyn FnOnce(&mut Order) -> CoreResult<()> + Send>;

/// Storage port for the order aggregate. Durability semantics (transactions,
/// write acknowledgement) live behind this seam; the core only requires that
/// `update` is atomic per order and conditional updates are race-safe.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: Order) -> CoreResult<()>;

    async fn find(&self, id: Uuid) -> CoreResult<Option<Order>>;

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Order>>;

    /// Atomic read-modify-write. Returns the committed order.
    async fn update(&self, id: Uuid, apply: UpdateFn) -> CoreResult<Order>;

    /// Deadlines of unresolved (Placed) orders, for scheduler reconciliation
    /// after a restart.
    async fn pending_deadlines(&self) -> CoreResult<Vec<(Uuid, DateTime<Utc>)>>;

    async fn get(&self, id: Uuid) -> CoreResult<Order> {
        self.find(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {id}")))
    }
}
