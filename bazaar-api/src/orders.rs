use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bazaar_core::actor::Actor;
use bazaar_core::carrier::{Destination, PackageSize};
use bazaar_core::gateway::PaymentMethod;
use bazaar_core::CoreError;
use bazaar_order::{CheckoutRequest, Order, RequestedItem};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ItemBody {
    pub variant_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub username: String,
    pub items: Vec<ItemBody>,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub destination: Destination,
    pub package: PackageSize,
    pub service_id: String,
    pub method: PaymentMethod,
    pub discount_code: Option<String>,
    pub note: Option<String>,
    pub payer_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(place_order).get(list_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/confirm", post(confirm_order))
        .route("/v1/orders/{id}/deliver", post(start_delivery))
        .route("/v1/orders/{id}/delivered", post(mark_delivered))
        .route("/v1/orders/{id}/complete", post(complete_order))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
}

/// The caller identifies itself through headers. Customer requests must
/// carry their user id; staff and admin requests carry a display name.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let role = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("customer");
    match role {
        "customer" => {
            let raw = headers
                .get("x-actor-id")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    CoreError::Unauthorized("x-actor-id header is required for customers".into())
                })?;
            let user_id = Uuid::parse_str(raw)
                .map_err(|_| CoreError::Validation("malformed x-actor-id header".into()))?;
            Ok(Actor::Customer { user_id })
        }
        "staff" => Ok(Actor::Staff { name: actor_name(headers)? }),
        "admin" => Ok(Actor::Admin { name: actor_name(headers)? }),
        other => Err(CoreError::Validation(format!("unknown actor role {other}")).into()),
    }
}

fn actor_name(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-actor-name")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Unauthorized("x-actor-name header is required".into()).into())
}

/// POST /v1/orders
/// Place an order from the given items.
pub async fn place_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let actor = actor_from_headers(&headers)?;
    let user_id = actor
        .customer_id()
        .ok_or_else(|| CoreError::Unauthorized("only customers can place orders".into()))?;

    let order = state
        .orchestrator
        .place_order(CheckoutRequest {
            user_id,
            username: body.username,
            items: body
                .items
                .into_iter()
                .map(|i| RequestedItem { variant_id: i.variant_id, quantity: i.quantity })
                .collect(),
            recipient_name: body.recipient_name,
            recipient_phone: body.recipient_phone,
            destination: body.destination,
            package: body.package,
            service_id: body.service_id,
            method: body.method,
            discount_code: body.discount_code,
            note: body.note,
            payer_email: body.payer_email,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/orders/:id
/// Retrieve one order. Visible to its owner and to staff.
pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let order = state.orders.get(order_id).await?;
    if !actor.is_staff() && actor.customer_id() != Some(order.user_id) {
        return Err(CoreError::Unauthorized("not allowed to view this order".into()).into());
    }
    Ok(Json(order))
}

/// GET /v1/orders
/// List the calling customer's orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Order>>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let user_id = actor
        .customer_id()
        .ok_or_else(|| CoreError::Unauthorized("only customers can list their orders".into()))?;
    let orders = state.orders.list_for_user(user_id).await?;
    Ok(Json(orders))
}

/// POST /v1/orders/:id/confirm
pub async fn confirm_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let actor = actor_from_headers(&headers)?;
    Ok(Json(state.lifecycle.confirm(order_id, actor).await?))
}

/// POST /v1/orders/:id/deliver
pub async fn start_delivery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let actor = actor_from_headers(&headers)?;
    Ok(Json(state.lifecycle.start_delivery(order_id, actor).await?))
}

/// POST /v1/orders/:id/delivered
pub async fn mark_delivered(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let actor = actor_from_headers(&headers)?;
    Ok(Json(state.lifecycle.mark_delivered(order_id, actor).await?))
}

/// POST /v1/orders/:id/complete
pub async fn complete_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let actor = actor_from_headers(&headers)?;
    Ok(Json(state.lifecycle.complete(order_id, actor).await?))
}

/// POST /v1/orders/:id/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
    body: Option<Json<CancelBody>>,
) -> Result<Json<Order>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "cancelled on request".to_string());
    Ok(Json(state.lifecycle.cancel(order_id, actor, &reason).await?))
}
