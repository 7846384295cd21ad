use crate::models::{DeliveryStatus, Order, OrderStatus, PaymentState};
use crate::repo::OrderRepository;
use bazaar_catalog::{DiscountLedger, InventoryLedger};
use bazaar_core::actor::Actor;
use bazaar_core::carrier::CarrierClient;
use bazaar_core::gateway::{PaymentGateway, RefundRequest};
use bazaar_core::{CoreError, CoreResult};
use bazaar_shared::models::events::{OrderCancelledEvent, StockReleasedEvent};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// External undo calls that failed and await an operational retry. Recorded
/// instead of blocking the cancellation: an unconfirmed carrier cancel is
/// cheaper than stock or money left inconsistent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "task", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingCompensation {
    CarrierCancel { order_id: Uuid, tracking_code: String },
    Refund { order_id: Uuid, amount: i64, transaction_id: String },
}

/// What is asking for the cancellation. The trigger decides which states
/// the order may be taken from: an explicit request may cancel anywhere up
/// to delivery, while the payment-driven triggers (gateway failure report,
/// deadline expiry) only ever touch unpaid orders still waiting in Placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelTrigger {
    Request,
    PaymentFailure,
    Expiry,
}

impl CancelTrigger {
    fn allows(&self, status: OrderStatus) -> bool {
        match self {
            CancelTrigger::Request => matches!(
                status,
                OrderStatus::Placed | OrderStatus::Confirmed | OrderStatus::Delivering
            ),
            CancelTrigger::PaymentFailure | CancelTrigger::Expiry => {
                status == OrderStatus::Placed
            }
        }
    }

    fn requires_unpaid(&self) -> bool {
        matches!(self, CancelTrigger::PaymentFailure | CancelTrigger::Expiry)
    }
}

#[derive(Default)]
pub struct CompensationLog {
    entries: Mutex<Vec<PendingCompensation>>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, entry: PendingCompensation) {
        tracing::warn!(pending = ?entry, "compensation step failed, queued for retry");
        self.entries.lock().await.push(entry);
    }

    pub async fn pending(&self) -> Vec<PendingCompensation> {
        self.entries.lock().await.clone()
    }
}

/// The shared rollback routine behind manual cancellation, webhook-reported
/// payment failure, and expiry. Idempotent: the conditional transition to
/// Cancelled is the mutual exclusion, so of up to three racing triggers only
/// the first performs the inverse side effects; later callers observe the
/// terminal state and no-op.
pub struct CompensationRunner {
    repo: Arc<dyn OrderRepository>,
    inventory: Arc<InventoryLedger>,
    discounts: Arc<DiscountLedger>,
    carrier: Arc<dyn CarrierClient>,
    gateway: Arc<dyn PaymentGateway>,
    log: Arc<CompensationLog>,
}

impl CompensationRunner {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        inventory: Arc<InventoryLedger>,
        discounts: Arc<DiscountLedger>,
        carrier: Arc<dyn CarrierClient>,
        gateway: Arc<dyn PaymentGateway>,
        log: Arc<CompensationLog>,
    ) -> Self {
        Self { repo, inventory, discounts, carrier, gateway, log }
    }

    pub fn log(&self) -> &CompensationLog {
        &self.log
    }

    /// Cancel the order and undo its checkout side effects. Returns the
    /// cancelled order, or `None` when the order is no longer in a state
    /// this trigger may cancel from (another trigger resolved it first, the
    /// shop moved it on, or payment settled).
    pub async fn run(
        &self,
        order_id: Uuid,
        reason: &str,
        actor: &Actor,
        trigger: CancelTrigger,
    ) -> CoreResult<Option<Order>> {
        let reason_owned = reason.to_string();
        let actor_owned = actor.clone();
        let result = self
            .repo
            .update(
                order_id,
                Box::new(move |order| {
                    if !trigger.allows(order.status) {
                        return Err(CoreError::Conflict("order already resolved".into()));
                    }
                    if trigger.requires_unpaid() && order.payment.paid {
                        return Err(CoreError::Conflict("payment already settled".into()));
                    }
                    order.expired_at = None;
                    order.transition_to(OrderStatus::Cancelled, reason_owned, &actor_owned);
                    order.delivery.push_history(DeliveryStatus::Cancelled);
                    Ok(())
                }),
            )
            .await;

        let order = match result {
            Ok(order) => order,
            Err(CoreError::Conflict(_)) => {
                tracing::info!(%order_id, "compensation skipped, another trigger won the race");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        // From here on we are the single winner; undo from the captured
        // snapshot.
        for item in &order.items {
            match self.inventory.release(item.variant_id, item.quantity).await {
                Ok(()) => {
                    let event = StockReleasedEvent {
                        order_id,
                        variant_id: item.variant_id,
                        quantity: item.quantity,
                        timestamp: Utc::now().timestamp(),
                    };
                    tracing::debug!(event = %serde_json::to_string(&event).unwrap_or_default(), "stock released");
                }
                Err(err) => {
                    tracing::error!(%order_id, variant = %item.variant_id, error = %err, "stock release failed");
                }
            }
        }

        if let Some(code) = &order.discount_code {
            self.discounts.release(code, order.user_id).await;
        }

        if let Some(tracking) = &order.delivery.tracking_code {
            if let Err(err) = self.carrier.cancel_shipment(tracking).await {
                tracing::warn!(%order_id, error = %err, "carrier cancellation failed");
                self.log
                    .record(PendingCompensation::CarrierCancel {
                        order_id,
                        tracking_code: tracking.clone(),
                    })
                    .await;
            }
        }

        let mut refunded_order = order;
        if refunded_order.payment.method.is_gateway() && refunded_order.payment.paid {
            let transaction_id = refunded_order
                .payment
                .transaction_id
                .clone()
                .unwrap_or_default();
            let refund = RefundRequest {
                request_id: format!("refund-{}", Uuid::new_v4()),
                amount: refunded_order.payment.amount,
                description: format!("order {order_id} cancelled: {reason}"),
                transaction_id: transaction_id.clone(),
            };
            match self.gateway.refund(&refund).await {
                Ok(()) => {
                    refunded_order = self
                        .repo
                        .update(
                            order_id,
                            Box::new(|order| {
                                order.payment.state = PaymentState::Refunded;
                                Ok(())
                            }),
                        )
                        .await?;
                }
                Err(err) => {
                    tracing::warn!(%order_id, error = %err, "refund failed");
                    self.log
                        .record(PendingCompensation::Refund {
                            order_id,
                            amount: refunded_order.payment.amount,
                            transaction_id,
                        })
                        .await;
                }
            }
        }

        let event = OrderCancelledEvent {
            order_id,
            user_id: refunded_order.user_id,
            reason: reason.to_string(),
            refunded: refunded_order.payment.state == PaymentState::Refunded,
            timestamp: Utc::now().timestamp(),
        };
        tracing::info!(
            %order_id,
            reason,
            event = %serde_json::to_string(&event).unwrap_or_default(),
            "order cancelled and compensated"
        );
        Ok(Some(refunded_order))
    }
}
