use anyhow::Context;
use bazaar_api::{app, AppState};
use bazaar_catalog::{DiscountLedger, InMemoryCart, InventoryLedger, ProductCatalog};
use bazaar_core::carrier::{AddressDirectory, CarrierClient, SandboxCarrier, SandboxDirectory};
use bazaar_core::gateway::{PaymentGateway, SandboxGateway};
use bazaar_order::repo::OrderRepository;
use bazaar_order::{
    CheckoutConfig, CheckoutOrchestrator, CompensationLog, CompensationRunner, ExpiryScheduler,
    OrderLifecycle, TransitionPolicy, WebhookReconciler,
};
use bazaar_store::InMemoryOrderRepository;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = bazaar_store::Config::load().context("failed to load config")?;
    tracing::info!("Starting Bazaar API on port {}", config.server.port);

    let catalog = Arc::new(ProductCatalog::new());
    let inventory = Arc::new(InventoryLedger::new());
    let discounts = Arc::new(DiscountLedger::new());
    let cart = Arc::new(InMemoryCart::new());
    let repo: Arc<dyn OrderRepository> = Arc::new(InMemoryOrderRepository::new());

    let carrier: Arc<dyn CarrierClient> =
        Arc::new(SandboxCarrier::new(config.carrier.shop_id.clone()));
    let directory: Arc<dyn AddressDirectory> = Arc::new(SandboxDirectory);
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(SandboxGateway::new(config.gateway.partner_code.clone()));

    let log = Arc::new(CompensationLog::new());
    let compensation = Arc::new(CompensationRunner::new(
        repo.clone(),
        inventory.clone(),
        discounts.clone(),
        carrier.clone(),
        gateway.clone(),
        log,
    ));
    let scheduler = ExpiryScheduler::new(repo.clone(), compensation.clone());

    let orchestrator = Arc::new(CheckoutOrchestrator::new(
        catalog,
        inventory,
        discounts,
        carrier.clone(),
        directory,
        gateway,
        cart,
        repo.clone(),
        scheduler.clone(),
        CheckoutConfig {
            payment_wait_secs: config.business_rules.payment_wait_seconds,
            confirmation_wait_secs: config.business_rules.confirmation_wait_seconds,
            redirect_url: config.gateway.redirect_url.clone(),
            callback_url: config.gateway.callback_url.clone(),
        },
    ));
    let lifecycle = Arc::new(OrderLifecycle::new(
        repo.clone(),
        carrier,
        compensation.clone(),
        TransitionPolicy {
            allow_cancel_in_transit: config.business_rules.allow_cancel_in_transit,
        },
    ));
    let webhooks = Arc::new(WebhookReconciler::new(
        repo.clone(),
        compensation,
        config.gateway.partner_code.clone(),
        config.gateway.access_key.clone(),
        config.gateway.secret_key.clone(),
    ));

    // Deadlines survive in storage, timers do not.
    if let Err(err) = scheduler.reconcile_on_startup().await {
        tracing::warn!(error = %err, "expiry reconciliation failed at startup");
    }

    let app_state = AppState {
        orchestrator,
        lifecycle,
        webhooks,
        scheduler,
        orders: repo,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
