use crate::compensation::{CancelTrigger, CompensationRunner};
use crate::models::Order;
use crate::repo::OrderRepository;
use bazaar_core::actor::Actor;
use bazaar_core::gateway::{result_code_message, WebhookPayload};
use bazaar_core::{CoreError, CoreResult};
use bazaar_shared::models::events::OrderPaidEvent;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// What a webhook delivery did to the order.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Payment settled and recorded.
    Settled(Order),
    /// Gateway reported failure; the order was cancelled and compensated.
    Cancelled(Order),
    /// A redelivery, or the order was already resolved. Nothing changed.
    Duplicate,
}

/// Applies gateway payment callbacks to orders. Validation is strict and in
/// a fixed order: credentials, signature, order lookup, then cross-checks
/// against the stored payment record. A payload that fails any step changes
/// nothing.
pub struct WebhookReconciler {
    repo: Arc<dyn OrderRepository>,
    compensation: Arc<CompensationRunner>,
    partner_code: String,
    access_key: String,
    secret_key: String,
}

impl WebhookReconciler {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        compensation: Arc<CompensationRunner>,
        partner_code: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            compensation,
            partner_code: partner_code.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub async fn process(&self, payload: &WebhookPayload) -> CoreResult<WebhookOutcome> {
        if payload.partner_code != self.partner_code || payload.access_key != self.access_key {
            return Err(CoreError::Unauthorized("webhook credentials do not match".into()));
        }
        payload
            .verify_signature(&self.secret_key)
            .map_err(|_| CoreError::Unauthorized("webhook signature mismatch".into()))?;

        let order_id = Uuid::parse_str(&payload.order_id)
            .map_err(|_| CoreError::Validation(format!("malformed order id {}", payload.order_id)))?;
        let order = self.repo.get(order_id).await?;

        if order.payment.request_id.as_deref() != Some(payload.request_id.as_str()) {
            return Err(CoreError::Validation(
                "webhook request id does not match the payment attempt".into(),
            ));
        }
        if payload.amount != order.payment.amount {
            return Err(CoreError::Validation(format!(
                "webhook amount {} does not match the order amount {}",
                payload.amount, order.payment.amount
            )));
        }

        if payload.is_success() {
            self.settle(order_id, payload).await
        } else {
            self.fail(order_id, payload).await
        }
    }

    async fn settle(&self, order_id: Uuid, payload: &WebhookPayload) -> CoreResult<WebhookOutcome> {
        let trans_id = payload.trans_id.clone();
        let description = result_code_message(payload.result_code);
        let result = self
            .repo
            .update(
                order_id,
                Box::new(move |order| {
                    if order.payment.paid {
                        return Err(CoreError::Conflict("payment already settled".into()));
                    }
                    if order.status.is_terminal() {
                        return Err(CoreError::Conflict("order already resolved".into()));
                    }
                    order.payment.settle(Some(trans_id), Utc::now());
                    order.expired_at = None;
                    order.append_history(order.status, description, &Actor::System);
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(order) => {
                let event = OrderPaidEvent {
                    order_id,
                    user_id: order.user_id,
                    amount: order.payment.amount,
                    transaction_id: order.payment.transaction_id.clone(),
                    timestamp: Utc::now().timestamp(),
                };
                tracing::info!(
                    %order_id,
                    trans_id = %payload.trans_id,
                    event = %serde_json::to_string(&event).unwrap_or_default(),
                    "payment settled via webhook"
                );
                Ok(WebhookOutcome::Settled(order))
            }
            Err(CoreError::Conflict(reason)) => {
                // Redelivery, or the order lost the race to a cancellation.
                tracing::warn!(%order_id, reason, "success webhook ignored");
                Ok(WebhookOutcome::Duplicate)
            }
            Err(err) => Err(err),
        }
    }

    async fn fail(&self, order_id: Uuid, payload: &WebhookPayload) -> CoreResult<WebhookOutcome> {
        let reason = result_code_message(payload.result_code);
        // A failure report only cancels orders still unpaid and waiting in
        // Placed; settled or shop-confirmed orders survive it.
        match self
            .compensation
            .run(order_id, &reason, &Actor::System, CancelTrigger::PaymentFailure)
            .await?
        {
            Some(order) => {
                tracing::info!(%order_id, result_code = payload.result_code, "order cancelled on gateway failure");
                Ok(WebhookOutcome::Cancelled(order))
            }
            None => Ok(WebhookOutcome::Duplicate),
        }
    }
}
