use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is asking for an order transition. Identity is established by the
/// transport layer; the core only cares about the role and, for customers,
/// ownership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    Customer { user_id: Uuid },
    Staff { name: String },
    Admin { name: String },
    System,
}

impl Actor {
    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::Staff { .. } | Actor::Admin { .. })
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }

    /// The customer id when this actor is a customer.
    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            Actor::Customer { user_id } => Some(*user_id),
            _ => None,
        }
    }

    /// Label recorded in status-history entries.
    pub fn label(&self) -> String {
        match self {
            Actor::Customer { user_id } => format!("customer:{user_id}"),
            Actor::Staff { name } => format!("staff:{name}"),
            Actor::Admin { name } => format!("admin:{name}"),
            Actor::System => "system".to_string(),
        }
    }
}
