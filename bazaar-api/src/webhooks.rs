use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use bazaar_core::gateway::WebhookPayload;
use bazaar_order::WebhookOutcome;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payment", post(payment_webhook))
}

/// POST /v1/webhooks/payment
/// Gateway payment-result callback. The gateway retries on non-2xx, so a
/// processed delivery always answers 200 even when it was a duplicate.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.webhooks.process(&payload).await?;
    let outcome = match outcome {
        WebhookOutcome::Settled(_) => "SETTLED",
        WebhookOutcome::Cancelled(_) => "CANCELLED",
        WebhookOutcome::Duplicate => "DUPLICATE",
    };
    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
