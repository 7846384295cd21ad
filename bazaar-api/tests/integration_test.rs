use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bazaar_api::{app, AppState};
use bazaar_catalog::{DiscountLedger, InMemoryCart, InventoryLedger, ProductCatalog, Variant};
use bazaar_core::carrier::{AddressDirectory, CarrierClient, SandboxCarrier, SandboxDirectory};
use bazaar_core::gateway::{PaymentGateway, SandboxGateway, WebhookPayload};
use bazaar_order::repo::OrderRepository;
use bazaar_order::{
    CheckoutConfig, CheckoutOrchestrator, CompensationLog, CompensationRunner, ExpiryScheduler,
    OrderLifecycle, TransitionPolicy, WebhookReconciler,
};
use bazaar_store::InMemoryOrderRepository;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const PARTNER: &str = "BAZAAR";
const ACCESS: &str = "ak-test";
const SECRET: &str = "webhook-secret";

struct TestCtx {
    router: Router,
    catalog: Arc<ProductCatalog>,
    inventory: Arc<InventoryLedger>,
}

fn test_app() -> TestCtx {
    let catalog = Arc::new(ProductCatalog::new());
    let inventory = Arc::new(InventoryLedger::new());
    let discounts = Arc::new(DiscountLedger::new());
    let cart = Arc::new(InMemoryCart::new());
    let repo: Arc<dyn OrderRepository> = Arc::new(InMemoryOrderRepository::new());
    let carrier: Arc<dyn CarrierClient> = Arc::new(SandboxCarrier::new("shop-1"));
    let directory: Arc<dyn AddressDirectory> = Arc::new(SandboxDirectory);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(SandboxGateway::new(PARTNER));

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
        catalog.clone(),
        inventory.clone(),
        discounts,
        carrier.clone(),
        directory,
        gateway,
        cart,
        repo.clone(),
        scheduler.clone(),
        CheckoutConfig {
            payment_wait_secs: 1_800,
            confirmation_wait_secs: 1_800,
            redirect_url: "https://shop.test/return".into(),
            callback_url: "https://shop.test/webhook".into(),
        },
    ));
    let lifecycle = Arc::new(OrderLifecycle::new(
        repo.clone(),
        carrier,
        compensation.clone(),
        TransitionPolicy::default(),
    ));
    let webhooks = Arc::new(WebhookReconciler::new(
        repo.clone(),
        compensation,
        PARTNER,
        ACCESS,
        SECRET,
    ));

    let router = app(AppState {
        orchestrator,
        lifecycle,
        webhooks,
        scheduler,
        orders: repo,
    });

    TestCtx { router, catalog, inventory }
}

async fn seed_variant(ctx: &TestCtx, price: i64, stock: i64) -> Uuid {
    let id = Uuid::new_v4();
    let product_id = Uuid::new_v4();
    ctx.catalog
        .upsert(Variant {
            id,
            product_id,
            name: "Tee / M / black".into(),
            image: "tee-m-black.jpg".into(),
            price,
            attributes: json!({"size": "M"}),
            enabled: true,
            deleted: false,
        })
        .await;
    ctx.inventory.set_stock(id, product_id, stock).await;
    id
}

fn checkout_body(variant: Uuid, quantity: i64, method: &str) -> Value {
    json!({
        "username": "linh",
        "items": [{"variant_id": variant, "quantity": quantity}],
        "recipient_name": "Linh",
        "recipient_phone": "0901234567",
        "destination": {
            "province_code": "01",
            "district_code": "001",
            "ward_code": "00004",
            "street": "17 Hang Bai"
        },
        "package": {"width_cm": 10, "height_cm": 10, "length_cm": 10, "weight_grams": 500},
        "service_id": "standard",
        "method": method
    })
}

fn customer_request(method: &str, uri: &str, user_id: Uuid, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-role", "customer")
        .header("x-actor-id", user_id.to_string())
        .header(header::CONTENT_TYPE, "application/json");
    match body {
        Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn staff_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-role", "staff")
        .header("x-actor-name", "mai")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn checkout_and_fetch_round_trip() {
    let ctx = test_app();
    let user = Uuid::new_v4();
    let variant = seed_variant(&ctx, 100_000, 5).await;

    let (status, order) = send(
        &ctx.router,
        customer_request("POST", "/v1/orders", user, Some(checkout_body(variant, 2, "CASH"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "PLACED");
    assert_eq!(order["total_payment"], 217_000);
    assert_eq!(ctx.inventory.stock_of(variant).await, Some(3));

    let id = order["id"].as_str().unwrap();
    let (status, fetched) = send(
        &ctx.router,
        customer_request("GET", &format!("/v1/orders/{id}"), user, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], order["id"]);

    // Another customer cannot see it.
    let (status, _) = send(
        &ctx.router,
        customer_request("GET", &format!("/v1/orders/{id}"), Uuid::new_v4(), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_checkout_is_a_bad_request() {
    let ctx = test_app();
    let user = Uuid::new_v4();
    let mut body = checkout_body(Uuid::new_v4(), 1, "CASH");
    body["items"] = json!([]);

    let (status, err) = send(
        &ctx.router,
        customer_request("POST", "/v1/orders", user, Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().contains("at least one item"));
}

#[tokio::test]
async fn customers_cannot_confirm_their_own_orders() {
    let ctx = test_app();
    let user = Uuid::new_v4();
    let variant = seed_variant(&ctx, 100_000, 5).await;
    let (_, order) = send(
        &ctx.router,
        customer_request("POST", "/v1/orders", user, Some(checkout_body(variant, 1, "CASH"))),
    )
    .await;
    let id = order["id"].as_str().unwrap();

    let (status, _) = send(
        &ctx.router,
        customer_request("POST", &format!("/v1/orders/{id}/confirm"), user, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cash_order_walks_the_full_lifecycle_over_http() {
    let ctx = test_app();
    let user = Uuid::new_v4();
    let variant = seed_variant(&ctx, 100_000, 5).await;
    let (_, order) = send(
        &ctx.router,
        customer_request("POST", "/v1/orders", user, Some(checkout_body(variant, 1, "CASH"))),
    )
    .await;
    let id = order["id"].as_str().unwrap().to_string();

    let (status, confirmed) =
        send(&ctx.router, staff_request("POST", &format!("/v1/orders/{id}/confirm"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "CONFIRMED");

    let (status, delivering) =
        send(&ctx.router, staff_request("POST", &format!("/v1/orders/{id}/deliver"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivering["status"], "DELIVERING");
    assert!(delivering["delivery"]["tracking_code"].is_string());

    let (status, delivered) =
        send(&ctx.router, staff_request("POST", &format!("/v1/orders/{id}/delivered"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "DELIVERED");
    assert_eq!(delivered["payment"]["paid"], true);

    let (status, completed) = send(
        &ctx.router,
        customer_request("POST", &format!("/v1/orders/{id}/complete"), user, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "COMPLETED");
}

#[tokio::test]
async fn out_of_order_transitions_conflict() {
    let ctx = test_app();
    let user = Uuid::new_v4();
    let variant = seed_variant(&ctx, 100_000, 5).await;
    let (_, order) = send(
        &ctx.router,
        customer_request("POST", "/v1/orders", user, Some(checkout_body(variant, 1, "CASH"))),
    )
    .await;
    let id = order["id"].as_str().unwrap();

    // Delivering straight from Placed skips confirmation.
    let (status, _) =
        send(&ctx.router, staff_request("POST", &format!("/v1/orders/{id}/deliver"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

fn signed_webhook(order: &Value, result_code: i64) -> Value {
    let mut payload = WebhookPayload {
        partner_code: PARTNER.into(),
        access_key: ACCESS.into(),
        order_id: order["id"].as_str().unwrap().into(),
        request_id: order["payment"]["request_id"].as_str().unwrap().into(),
        amount: order["payment"]["amount"].as_i64().unwrap(),
        trans_id: "tx-1".into(),
        result_code,
        message: "gateway result".into(),
        response_time: 1_700_000_000,
        extra_data: String::new(),
        order_info: "order".into(),
        order_type: "bazaar_wallet".into(),
        pay_type: "webApp".into(),
        signature: String::new(),
    };
    payload.signature = payload.sign(SECRET).unwrap();
    serde_json::to_value(payload).unwrap()
}

#[tokio::test]
async fn webhook_settles_then_deduplicates() {
    let ctx = test_app();
    let user = Uuid::new_v4();
    let variant = seed_variant(&ctx, 100_000, 5).await;
    let (_, order) = send(
        &ctx.router,
        customer_request("POST", "/v1/orders", user, Some(checkout_body(variant, 1, "WALLET"))),
    )
    .await;
    assert!(order["payment"]["pay_url"].is_string());

    let payload = signed_webhook(&order, 0);
    let post = |body: Value| {
        Request::builder()
            .method("POST")
            .uri("/v1/webhooks/payment")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let (status, body) = send(&ctx.router, post(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "SETTLED");

    let (status, body) = send(&ctx.router, post(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "DUPLICATE");

    let mut tampered = payload;
    tampered["amount"] = json!(1);
    let (status, _) = send(&ctx.router, post(tampered)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn failed_payment_webhook_cancels_and_restocks() {
    let ctx = test_app();
    let user = Uuid::new_v4();
    let variant = seed_variant(&ctx, 100_000, 5).await;
    let (_, order) = send(
        &ctx.router,
        customer_request("POST", "/v1/orders", user, Some(checkout_body(variant, 2, "WALLET"))),
    )
    .await;
    assert_eq!(ctx.inventory.stock_of(variant).await, Some(3));

    let payload = signed_webhook(&order, 1006);
    let req = Request::builder()
        .method("POST")
        .uri("/v1/webhooks/payment")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = send(&ctx.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "CANCELLED");
    assert_eq!(ctx.inventory.stock_of(variant).await, Some(5));

    let id = order["id"].as_str().unwrap();
    let (_, cancelled) = send(
        &ctx.router,
        customer_request("GET", &format!("/v1/orders/{id}"), user, None),
    )
    .await;
    assert_eq!(cancelled["status"], "CANCELLED");
}

#[tokio::test]
async fn customer_cancels_with_a_reason() {
    let ctx = test_app();
    let user = Uuid::new_v4();
    let variant = seed_variant(&ctx, 100_000, 5).await;
    let (_, order) = send(
        &ctx.router,
        customer_request("POST", "/v1/orders", user, Some(checkout_body(variant, 1, "CASH"))),
    )
    .await;
    let id = order["id"].as_str().unwrap();

    let (status, cancelled) = send(
        &ctx.router,
        customer_request(
            "POST",
            &format!("/v1/orders/{id}/cancel"),
            user,
            Some(json!({"reason": "ordered the wrong size"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(ctx.inventory.stock_of(variant).await, Some(5));

    let history = cancelled["status_history"].as_array().unwrap();
    assert!(history
        .iter()
        .any(|e| e["description"] == "ordered the wrong size"));
}
