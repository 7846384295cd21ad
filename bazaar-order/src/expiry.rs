use crate::compensation::{CancelTrigger, CompensationRunner};
use crate::models::Order;
use crate::repo::OrderRepository;
use bazaar_core::actor::Actor;
use bazaar_core::CoreResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Fires the expiry deadline of unresolved orders. Each registration spawns
/// one sleeper task; the firing itself is just a compensation run that
/// requires the order to still sit unpaid in Placed, so a deadline racing a
/// payment settlement, a shop confirmation, or a manual cancellation
/// resolves safely to a no-op.
///
/// Timers live in process memory only. After a restart,
/// [`reconcile_on_startup`](ExpiryScheduler::reconcile_on_startup) re-arms
/// them from the deadlines the repository still holds.
#[derive(Clone)]
pub struct ExpiryScheduler {
    inner: Arc<ExpiryInner>,
}

struct ExpiryInner {
    repo: Arc<dyn OrderRepository>,
    compensation: Arc<CompensationRunner>,
}

impl ExpiryScheduler {
    pub fn new(repo: Arc<dyn OrderRepository>, compensation: Arc<CompensationRunner>) -> Self {
        Self {
            inner: Arc::new(ExpiryInner { repo, compensation }),
        }
    }

    /// Arm a timer for the order. Past deadlines fire immediately.
    pub async fn register(&self, order_id: Uuid, deadline: DateTime<Utc>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let wait = (deadline - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            if let Err(err) = inner.fire(order_id).await {
                tracing::error!(%order_id, error = %err, "expiry handling failed");
            }
        });
    }

    /// Re-arm timers for every unresolved order still carrying a deadline.
    /// Returns how many were re-armed.
    pub async fn reconcile_on_startup(&self) -> CoreResult<usize> {
        let deadlines = self.inner.repo.pending_deadlines().await?;
        let count = deadlines.len();
        for (order_id, deadline) in deadlines {
            self.register(order_id, deadline).await;
        }
        if count > 0 {
            tracing::info!(count, "re-armed expiry timers after restart");
        }
        Ok(count)
    }

    /// Run the expiry handling synchronously, bypassing the timer.
    pub async fn fire_now(&self, order_id: Uuid) -> CoreResult<Option<Order>> {
        self.inner.fire(order_id).await
    }
}

impl ExpiryInner {
    async fn fire(&self, order_id: Uuid) -> CoreResult<Option<Order>> {
        let order = self.repo.get(order_id).await?;
        let reason = if order.payment.method.is_gateway() {
            "payment window expired"
        } else {
            "shop did not confirm in time"
        };
        let cancelled = self
            .compensation
            .run(order_id, reason, &Actor::System, CancelTrigger::Expiry)
            .await?;
        if cancelled.is_none() {
            tracing::debug!(%order_id, "expiry timer fired on an already resolved order");
        }
        Ok(cancelled)
    }
}
