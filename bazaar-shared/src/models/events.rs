use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub total_payment: i64,
    pub payment_method: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPaidEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub transaction_id: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCancelledEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub refunded: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct StockReleasedEvent {
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i64,
    pub timestamp: i64,
}
