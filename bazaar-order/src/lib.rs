pub mod checkout;
pub mod compensation;
pub mod expiry;
pub mod lifecycle;
pub mod models;
pub mod repo;
pub mod state_machine;
pub mod webhook;

pub use checkout::{CheckoutConfig, CheckoutOrchestrator, CheckoutRequest, RequestedItem};
pub use compensation::{CancelTrigger, CompensationLog, CompensationRunner, PendingCompensation};
pub use expiry::ExpiryScheduler;
pub use lifecycle::OrderLifecycle;
pub use models::{
    DeliveryRecord, DeliveryStatus, Order, OrderItem, OrderStatus, PaymentRecord, PaymentState,
    StatusEntry,
};
pub use repo::OrderRepository;
pub use state_machine::{OrderEvent, TransitionPolicy};
pub use webhook::{WebhookOutcome, WebhookReconciler};
