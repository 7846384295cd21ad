use crate::compensation::{CancelTrigger, CompensationRunner};
use crate::models::{DeliveryStatus, Order, OrderStatus};
use crate::repo::OrderRepository;
use crate::state_machine::{guard, next_status, OrderEvent, TransitionPolicy};
use bazaar_core::actor::Actor;
use bazaar_core::carrier::{CarrierClient, ShipmentRequest};
use bazaar_core::gateway::PaymentMethod;
use bazaar_core::{CoreError, CoreResult};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Applies state-machine events to orders, with their side effects. The
/// pure transition table and guards live in `state_machine`; this service
/// runs them inside the repository's atomic update so a guard miss never
/// leaves a partial mutation.
pub struct OrderLifecycle {
    repo: Arc<dyn OrderRepository>,
    carrier: Arc<dyn CarrierClient>,
    compensation: Arc<CompensationRunner>,
    policy: TransitionPolicy,
}

impl OrderLifecycle {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        carrier: Arc<dyn CarrierClient>,
        compensation: Arc<CompensationRunner>,
        policy: TransitionPolicy,
    ) -> Self {
        Self { repo, carrier, compensation, policy }
    }

    /// Staff acknowledges the order.
    pub async fn confirm(&self, order_id: Uuid, actor: Actor) -> CoreResult<Order> {
        self.apply(order_id, OrderEvent::Confirm, actor, "order confirmed by the shop")
            .await
    }

    /// Hand the parcel to the carrier. Creates the shipment first, then
    /// commits the transition; if the commit loses a race the shipment is
    /// cancelled again.
    pub async fn start_delivery(&self, order_id: Uuid, actor: Actor) -> CoreResult<Order> {
        let order = self.repo.get(order_id).await?;
        guard(OrderEvent::StartDelivery, &actor, &order, &self.policy)?;
        if next_status(order.status, OrderEvent::StartDelivery).is_none() {
            return Err(illegal(order.status, OrderEvent::StartDelivery));
        }

        let shipment = self
            .carrier
            .create_shipment(&ShipmentRequest {
                order_id,
                destination: order.delivery.destination.clone(),
                package: order.delivery.package.clone(),
                service_id: order.delivery.service_id.clone(),
                cod_amount: order.delivery.cod_amount,
            })
            .await?;

        let policy = self.policy.clone();
        let actor_owned = actor.clone();
        let shipment_rec = shipment.clone();
        let committed = self
            .repo
            .update(
                order_id,
                Box::new(move |order| {
                    guard(OrderEvent::StartDelivery, &actor_owned, order, &policy)?;
                    let next = next_status(order.status, OrderEvent::StartDelivery)
                        .ok_or_else(|| illegal(order.status, OrderEvent::StartDelivery))?;
                    order.delivery.tracking_code = Some(shipment_rec.tracking_code.clone());
                    order.delivery.fee = shipment_rec.fee;
                    order.delivery.lead_time_secs = shipment_rec.lead_time_secs;
                    order.delivery.push_history(DeliveryStatus::Dispatched);
                    order.transition_to(next, "parcel handed to carrier", &actor_owned);
                    Ok(())
                }),
            )
            .await;

        match committed {
            Ok(order) => Ok(order),
            Err(err) => {
                // The shipment exists but the order did not move; undo it.
                if let Err(cancel_err) = self.carrier.cancel_shipment(&shipment.tracking_code).await
                {
                    tracing::warn!(%order_id, error = %cancel_err, "orphaned shipment could not be cancelled");
                }
                Err(err)
            }
        }
    }

    /// Carrier reports the parcel delivered. Settles cash payments.
    pub async fn mark_delivered(&self, order_id: Uuid, actor: Actor) -> CoreResult<Order> {
        let policy = self.policy.clone();
        self.repo
            .update(
                order_id,
                Box::new(move |order| {
                    guard(OrderEvent::MarkDelivered, &actor, order, &policy)?;
                    let next = next_status(order.status, OrderEvent::MarkDelivered)
                        .ok_or_else(|| illegal(order.status, OrderEvent::MarkDelivered))?;
                    if order.payment.method == PaymentMethod::Cash && !order.payment.paid {
                        order.payment.settle(None, Utc::now());
                    }
                    order.delivery.push_history(DeliveryStatus::Delivered);
                    order.transition_to(next, "parcel delivered", &actor);
                    Ok(())
                }),
            )
            .await
    }

    /// Owner confirms receipt; line items open for review.
    pub async fn complete(&self, order_id: Uuid, actor: Actor) -> CoreResult<Order> {
        let policy = self.policy.clone();
        self.repo
            .update(
                order_id,
                Box::new(move |order| {
                    guard(OrderEvent::Complete, &actor, order, &policy)?;
                    let next = next_status(order.status, OrderEvent::Complete)
                        .ok_or_else(|| illegal(order.status, OrderEvent::Complete))?;
                    for item in &mut order.items {
                        item.reviewable = true;
                    }
                    order.transition_to(next, "receipt confirmed by customer", &actor);
                    Ok(())
                }),
            )
            .await
    }

    /// Cancellation by the owner or staff. Role and policy are checked here;
    /// the compensation runner owns the race-safe status transition and the
    /// inverse side effects.
    pub async fn cancel(&self, order_id: Uuid, actor: Actor, reason: &str) -> CoreResult<Order> {
        let order = self.repo.get(order_id).await?;
        guard(OrderEvent::Cancel, &actor, &order, &self.policy)?;
        if next_status(order.status, OrderEvent::Cancel).is_none() {
            return Err(illegal(order.status, OrderEvent::Cancel));
        }

        match self
            .compensation
            .run(order_id, reason, &actor, CancelTrigger::Request)
            .await?
        {
            Some(order) => Ok(order),
            None => Err(CoreError::Conflict("order already resolved".into())),
        }
    }

    async fn apply(
        &self,
        order_id: Uuid,
        event: OrderEvent,
        actor: Actor,
        description: &'static str,
    ) -> CoreResult<Order> {
        let policy = self.policy.clone();
        self.repo
            .update(
                order_id,
                Box::new(move |order| {
                    guard(event, &actor, order, &policy)?;
                    let next = next_status(order.status, event)
                        .ok_or_else(|| illegal(order.status, event))?;
                    // The deadline only applies while the order waits in Placed.
                    order.expired_at = None;
                    order.transition_to(next, description, &actor);
                    Ok(())
                }),
            )
            .await
    }
}

fn illegal(current: OrderStatus, event: OrderEvent) -> CoreError {
    CoreError::Conflict(format!("{event:?} is not legal from {current:?}"))
}
