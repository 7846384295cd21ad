use bazaar_order::repo::OrderRepository;
use bazaar_order::{CheckoutOrchestrator, ExpiryScheduler, OrderLifecycle, WebhookReconciler};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CheckoutOrchestrator>,
    pub lifecycle: Arc<OrderLifecycle>,
    pub webhooks: Arc<WebhookReconciler>,
    pub scheduler: ExpiryScheduler,
    pub orders: Arc<dyn OrderRepository>,
}
