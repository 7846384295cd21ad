use crate::models::{Order, OrderStatus};
use bazaar_core::actor::Actor;
use bazaar_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Events that drive the order lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    Confirm,
    StartDelivery,
    MarkDelivered,
    Complete,
    Cancel,
}

/// Closed transition table. Anything not listed here is illegal, no matter
/// who asks.
const TRANSITIONS: &[(OrderStatus, OrderEvent, OrderStatus)] = &[
    (OrderStatus::Placed, OrderEvent::Confirm, OrderStatus::Confirmed),
    (OrderStatus::Placed, OrderEvent::Cancel, OrderStatus::Cancelled),
    (OrderStatus::Confirmed, OrderEvent::StartDelivery, OrderStatus::Delivering),
    (OrderStatus::Confirmed, OrderEvent::Cancel, OrderStatus::Cancelled),
    (OrderStatus::Delivering, OrderEvent::MarkDelivered, OrderStatus::Delivered),
    (OrderStatus::Delivering, OrderEvent::Cancel, OrderStatus::Cancelled),
    (OrderStatus::Delivered, OrderEvent::Complete, OrderStatus::Completed),
];

pub fn next_status(current: OrderStatus, event: OrderEvent) -> Option<OrderStatus> {
    TRANSITIONS
        .iter()
        .find(|(from, ev, _)| *from == current && *ev == event)
        .map(|(_, _, to)| *to)
}

/// Deployment policy knobs for the state machine.
#[derive(Debug, Clone)]
pub struct TransitionPolicy {
    /// Whether staff/admin may still cancel after the carrier has the parcel
    /// (a tracking code exists). Owners never can.
    pub allow_cancel_in_transit: bool,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self { allow_cancel_in_transit: false }
    }
}

/// Role and precondition guard, checked before any mutation. A guard miss
/// rejects the whole transition; nothing is partially applied.
pub fn guard(
    event: OrderEvent,
    actor: &Actor,
    order: &Order,
    policy: &TransitionPolicy,
) -> CoreResult<()> {
    match event {
        OrderEvent::Confirm => require_staff(actor, "confirm"),
        OrderEvent::StartDelivery => {
            require_staff(actor, "start delivery")?;
            // Gateway payments must be settled before dispatch; cash settles
            // on delivery.
            if !order.payment.paid && order.payment.method.is_gateway() {
                return Err(CoreError::Conflict(
                    "gateway payment must settle before delivery starts".into(),
                ));
            }
            Ok(())
        }
        OrderEvent::MarkDelivered => require_staff(actor, "mark delivered"),
        OrderEvent::Complete => {
            if actor.customer_id() == Some(order.user_id) {
                Ok(())
            } else {
                Err(CoreError::Unauthorized(
                    "only the owning customer may confirm receipt".into(),
                ))
            }
        }
        OrderEvent::Cancel => {
            let owns = actor.customer_id() == Some(order.user_id);
            if !owns && !actor.is_staff() {
                return Err(CoreError::Unauthorized("not allowed to cancel this order".into()));
            }
            if owns && !actor.is_staff() {
                if !matches!(order.status, OrderStatus::Placed | OrderStatus::Confirmed) {
                    return Err(CoreError::Conflict(
                        "customers may only cancel before delivery starts".into(),
                    ));
                }
            }
            if order.delivery.tracking_code.is_some() && !policy.allow_cancel_in_transit {
                return Err(CoreError::Conflict(
                    "shipment already in transit, cancellation disabled by policy".into(),
                ));
            }
            Ok(())
        }
    }
}

fn require_staff(actor: &Actor, action: &str) -> CoreResult<()> {
    if actor.is_staff() || *actor == Actor::System {
        Ok(())
    } else {
        Err(CoreError::Unauthorized(format!("{action} requires a staff role")))
    }
}
