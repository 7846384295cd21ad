use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    FixedAmount { amount: i64 },
    Percentage { percent: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCode {
    pub code: String,
    pub kind: DiscountKind,
    /// Upper bound on the discounted amount, in minor units.
    pub cap: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub usage_cap: i64,
    pub per_user_cap: i64,
    pub used: i64,
    pub used_by: Vec<Uuid>,
    /// When present, only these variants count toward the eligible subtotal.
    pub restricted_to: Option<HashSet<Uuid>>,
    pub disabled: bool,
}

/// One order line's contribution to the discountable subtotal.
#[derive(Debug, Clone, Copy)]
pub struct LineAmount {
    pub variant_id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct DiscountApplication {
    pub code: String,
    pub amount: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum DiscountError {
    #[error("discount code not found: {0}")]
    NotFound(String),

    #[error("discount code {0} is disabled")]
    Disabled(String),

    #[error("discount code {0} is outside its validity window")]
    WindowClosed(String),

    #[error("discount code {0} usage allowance exhausted")]
    Exhausted(String),

    #[error("discount code {0} already used the maximum number of times by this user")]
    PerUserExhausted(String),

    #[error("discount code {0} does not apply to any item in this order")]
    NotApplicable(String),
}

/// Validates and atomically consumes discount usage. Consumption and release
/// form the pair the checkout rollback relies on: a failed order never keeps
/// a consumed use.
pub struct DiscountLedger {
    codes: RwLock<HashMap<String, DiscountCode>>,
}

impl DiscountLedger {
    pub fn new() -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
        }
    }

    pub async fn upsert(&self, code: DiscountCode) {
        self.codes.write().await.insert(code.code.clone(), code);
    }

    pub async fn get(&self, code: &str) -> Option<DiscountCode> {
        self.codes.read().await.get(code).cloned()
    }

    /// Validate every precondition and, in the same critical section, charge
    /// one use against the code for this user.
    pub async fn validate_and_consume(
        &self,
        code: &str,
        user_id: Uuid,
        lines: &[LineAmount],
        now: DateTime<Utc>,
    ) -> Result<DiscountApplication, DiscountError> {
        let mut codes = self.codes.write().await;
        let entry = codes
            .get_mut(code)
            .ok_or_else(|| DiscountError::NotFound(code.to_string()))?;

        if entry.disabled {
            return Err(DiscountError::Disabled(code.to_string()));
        }
        if now < entry.start_date || now > entry.end_date {
            return Err(DiscountError::WindowClosed(code.to_string()));
        }
        if entry.used >= entry.usage_cap {
            return Err(DiscountError::Exhausted(code.to_string()));
        }
        let user_uses = entry.used_by.iter().filter(|u| **u == user_id).count() as i64;
        if user_uses >= entry.per_user_cap {
            return Err(DiscountError::PerUserExhausted(code.to_string()));
        }

        let eligible: i64 = match &entry.restricted_to {
            Some(variants) => lines
                .iter()
                .filter(|l| variants.contains(&l.variant_id))
                .map(|l| l.amount)
                .sum(),
            None => lines.iter().map(|l| l.amount).sum(),
        };
        if eligible == 0 {
            return Err(DiscountError::NotApplicable(code.to_string()));
        }

        let amount = discounted_amount(&entry.kind, entry.cap, eligible);

        entry.used += 1;
        entry.used_by.push(user_id);

        Ok(DiscountApplication {
            code: code.to_string(),
            amount,
        })
    }

    /// Return one consumed use for this user. Idempotent when the user holds
    /// no uses.
    pub async fn release(&self, code: &str, user_id: Uuid) {
        let mut codes = self.codes.write().await;
        if let Some(entry) = codes.get_mut(code) {
            if let Some(pos) = entry.used_by.iter().position(|u| *u == user_id) {
                entry.used_by.remove(pos);
                entry.used = (entry.used - 1).max(0);
            }
        }
    }
}

impl Default for DiscountLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Discount math, pinned to integer minor units. Percentage amounts round
/// half-up at the minor-unit boundary.
fn discounted_amount(kind: &DiscountKind, cap: Option<i64>, eligible_subtotal: i64) -> i64 {
    let raw = match kind {
        DiscountKind::FixedAmount { amount } => (*amount).min(eligible_subtotal),
        DiscountKind::Percentage { percent } => (eligible_subtotal * percent + 50) / 100,
    };
    match cap {
        Some(cap) => raw.min(cap),
        None => raw,
    }
}
