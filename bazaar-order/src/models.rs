use bazaar_core::actor::Actor;
use bazaar_core::carrier::{Destination, PackageSize, ResolvedAddress};
use bazaar_core::gateway::PaymentMethod;
use bazaar_shared::pii::Masked;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status in the lifecycle. Cancelled and Completed are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Delivering,
    Delivered,
    Cancelled,
    Completed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Completed)
    }
}

/// One immutable audit entry. The history is append-only: entries are never
/// mutated or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub description: String,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// Delivery-side states mirror the carrier, not the order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Dispatched,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatusEntry {
    pub status: DeliveryStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub recipient_name: String,
    pub recipient_phone: Masked<String>,
    pub destination: Destination,
    pub resolved_address: ResolvedAddress,
    pub package: PackageSize,
    pub service_id: String,
    /// Assigned by the carrier at dispatch, absent before that.
    pub tracking_code: Option<String>,
    pub fee: i64,
    pub lead_time_secs: i64,
    pub cod_amount: i64,
    pub history: Vec<DeliveryStatusEntry>,
}

impl DeliveryRecord {
    pub fn push_history(&mut self, status: DeliveryStatus) {
        self.history.push(DeliveryStatusEntry { status, at: Utc::now() });
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Initialized,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub method: PaymentMethod,
    /// Gateway idempotency key for the create-payment attempt.
    pub request_id: Option<String>,
    pub amount: i64,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub pay_url: Option<String>,
    pub state: PaymentState,
}

impl PaymentRecord {
    pub fn new(method: PaymentMethod, amount: i64) -> Self {
        Self {
            method,
            request_id: None,
            amount,
            paid: false,
            paid_at: None,
            transaction_id: None,
            pay_url: None,
            state: PaymentState::Initialized,
        }
    }

    pub fn settle(&mut self, transaction_id: Option<String>, at: DateTime<Utc>) {
        self.paid = true;
        self.paid_at = Some(at);
        self.transaction_id = transaction_id;
        self.state = PaymentState::Paid;
    }
}

/// Line item with catalog data snapshotted at checkout time. Never re-read
/// from the catalog: a later price change does not touch existing orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub unit_price: i64,
    pub quantity: i64,
    pub attributes: serde_json::Value,
    pub reviewable: bool,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity
    }
}

/// The order aggregate: exclusively owns its delivery and payment
/// sub-records, which are created with it and mutated only alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub items: Vec<OrderItem>,
    pub total_product_price: i64,
    pub shipping_price: i64,
    pub total_discount: i64,
    pub total_payment: i64,
    pub discount_code: Option<String>,
    pub note: Option<String>,
    pub status: OrderStatus,
    pub status_history: Vec<StatusEntry>,
    /// Deadline for unresolved orders; present only while the order is
    /// waiting in Placed, cleared once payment settles or the state moves on.
    pub expired_at: Option<DateTime<Utc>>,
    pub delivery: DeliveryRecord,
    pub payment: PaymentRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// `totalProductPrice + shippingPrice - totalDiscount`, floored at zero.
    pub fn compute_total_payment(product: i64, shipping: i64, discount: i64) -> i64 {
        (product + shipping - discount).max(0)
    }

    /// Append an audit entry without touching the current status (used for
    /// events like payment settlement that do not move the state machine).
    pub fn append_history(
        &mut self,
        status: OrderStatus,
        description: impl Into<String>,
        actor: &Actor,
    ) {
        self.status_history.push(StatusEntry {
            status,
            description: description.into(),
            actor: actor.label(),
            at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    /// Move to `next` and record the transition.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        description: impl Into<String>,
        actor: &Actor,
    ) {
        self.status = next;
        self.append_history(next, description, actor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_payment_is_clamped_at_zero() {
        assert_eq!(Order::compute_total_payment(200_000, 20_000, 0), 220_000);
        assert_eq!(Order::compute_total_payment(200_000, 20_000, 30_000), 190_000);
        // Discount exceeding subtotal + shipping clamps instead of going negative.
        assert_eq!(Order::compute_total_payment(50_000, 10_000, 100_000), 0);
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Placed.is_terminal());
    }

    #[test]
    fn line_total_uses_snapshot_price() {
        let item = OrderItem {
            variant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "Tee".into(),
            image: "tee.jpg".into(),
            unit_price: 100_000,
            quantity: 2,
            attributes: serde_json::json!({}),
            reviewable: false,
        };
        assert_eq!(item.line_total(), 200_000);
    }
}
