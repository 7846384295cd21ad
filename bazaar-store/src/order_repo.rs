use async_trait::async_trait;
use bazaar_core::{CoreError, CoreResult};
use bazaar_order::models::{Order, OrderStatus};
use bazaar_order::repo::{OrderRepository, UpdateFn};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Order storage backed by process memory. One mutex over the whole map
/// gives `update` its per-order atomicity: the closure runs on a working
/// copy while the lock is held, and only a successful closure commits.
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: Order) -> CoreResult<()> {
        let mut orders = self.orders.lock().await;
        if orders.contains_key(&order.id) {
            return Err(CoreError::Conflict(format!("order {} already exists", order.id)));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.orders.lock().await.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Order>> {
        let orders = self.orders.lock().await;
        let mut list: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn update(&self, id: Uuid, apply: UpdateFn) -> CoreResult<Order> {
        let mut orders = self.orders.lock().await;
        let stored = orders
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("order {id}")))?;

        let mut working = stored.clone();
        apply(&mut working)?;
        orders.insert(id, working.clone());
        Ok(working)
    }

    async fn pending_deadlines(&self) -> CoreResult<Vec<(Uuid, DateTime<Utc>)>> {
        let orders = self.orders.lock().await;
        Ok(orders
            .values()
            .filter(|o| o.status == OrderStatus::Placed)
            .filter_map(|o| o.expired_at.map(|at| (o.id, at)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::carrier::{Destination, PackageSize, ResolvedAddress};
    use bazaar_core::gateway::PaymentMethod;
    use bazaar_order::models::{DeliveryRecord, PaymentRecord};
    use chrono::Duration;

    fn order(user_id: Uuid, created_at: DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id,
            username: "linh".into(),
            items: Vec::new(),
            total_product_price: 0,
            shipping_price: 0,
            total_discount: 0,
            total_payment: 0,
            discount_code: None,
            note: None,
            status: OrderStatus::Placed,
            status_history: Vec::new(),
            expired_at: Some(created_at + Duration::minutes(30)),
            delivery: DeliveryRecord {
                recipient_name: "Linh".into(),
                recipient_phone: "0901234567".to_string().into(),
                destination: Destination {
                    province_code: "01".into(),
                    district_code: "001".into(),
                    ward_code: "00004".into(),
                    street: "17 Hang Bai".into(),
                },
                resolved_address: ResolvedAddress {
                    province: "Hanoi".into(),
                    district: "District 001".into(),
                    ward: "Ward 00004".into(),
                },
                package: PackageSize {
                    width_cm: 10,
                    height_cm: 10,
                    length_cm: 10,
                    weight_grams: 500,
                },
                service_id: "standard".into(),
                tracking_code: None,
                fee: 0,
                lead_time_secs: 0,
                cod_amount: 0,
                history: Vec::new(),
            },
            payment: PaymentRecord::new(PaymentMethod::Cash, 0),
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn failed_update_leaves_the_order_untouched() {
        let repo = InMemoryOrderRepository::new();
        let o = order(Uuid::new_v4(), Utc::now());
        let id = o.id;
        repo.insert(o).await.unwrap();

        let err = repo
            .update(
                id,
                Box::new(|order| {
                    order.note = Some("half-done".into());
                    Err(CoreError::Conflict("abort".into()))
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let stored = repo.find(id).await.unwrap().unwrap();
        assert_eq!(stored.note, None);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let repo = InMemoryOrderRepository::new();
        let o = order(Uuid::new_v4(), Utc::now());
        repo.insert(o.clone()).await.unwrap();
        assert!(matches!(repo.insert(o).await, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn listing_sorts_newest_first() {
        let repo = InMemoryOrderRepository::new();
        let user = Uuid::new_v4();
        let older = order(user, Utc::now() - Duration::hours(2));
        let newer = order(user, Utc::now());
        let other = order(Uuid::new_v4(), Utc::now());
        repo.insert(older.clone()).await.unwrap();
        repo.insert(newer.clone()).await.unwrap();
        repo.insert(other).await.unwrap();

        let list = repo.list_for_user(user).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, newer.id);
        assert_eq!(list[1].id, older.id);
    }

    #[tokio::test]
    async fn pending_deadlines_cover_only_placed_orders() {
        let repo = InMemoryOrderRepository::new();
        let placed = order(Uuid::new_v4(), Utc::now());
        let mut resolved = order(Uuid::new_v4(), Utc::now());
        resolved.status = OrderStatus::Cancelled;
        let placed_id = placed.id;
        repo.insert(placed).await.unwrap();
        repo.insert(resolved).await.unwrap();

        let deadlines = repo.pending_deadlines().await.unwrap();
        assert_eq!(deadlines.len(), 1);
        assert_eq!(deadlines[0].0, placed_id);
    }
}
