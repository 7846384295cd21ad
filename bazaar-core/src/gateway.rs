use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// How the buyer pays. Cash settles on delivery; the other three settle
/// through the external gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Wallet,
    Card,
    Bank,
}

impl PaymentMethod {
    pub fn is_gateway(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }

    /// Gateway pay-type string for gateway-settled methods.
    pub fn pay_type(&self) -> Option<&'static str> {
        match self {
            PaymentMethod::Cash => None,
            PaymentMethod::Wallet => Some("webApp"),
            PaymentMethod::Card => Some("credit"),
            PaymentMethod::Bank => Some("napas"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    /// Idempotency key for this attempt. Never reused after an abort.
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub redirect_url: String,
    pub callback_url: String,
    pub payer_email: Option<String>,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreation {
    pub pay_url: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub request_id: String,
    pub amount: i64,
    pub description: String,
    pub transaction_id: String,
}

/// Outbound port to the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, req: &CreatePaymentRequest) -> CoreResult<PaymentCreation>;

    async fn refund(&self, req: &RefundRequest) -> CoreResult<()>;
}

/// Asynchronous payment-result callback as the gateway delivers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub partner_code: String,
    pub access_key: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    #[serde(rename = "transId")]
    pub trans_id: String,
    pub result_code: i64,
    pub message: String,
    pub response_time: i64,
    pub extra_data: String,
    pub order_info: String,
    pub order_type: String,
    pub pay_type: String,
    pub signature: String,
}

impl WebhookPayload {
    /// Canonical signing string. Field ordering is fixed by the gateway
    /// contract; changing it invalidates every signature.
    pub fn signature_base(&self) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
            self.access_key,
            self.amount,
            self.extra_data,
            self.message,
            self.order_id,
            self.order_info,
            self.order_type,
            self.partner_code,
            self.pay_type,
            self.request_id,
            self.response_time,
            self.result_code,
            self.trans_id,
        )
    }

    /// HMAC-SHA256 over the canonical string, hex encoded.
    pub fn sign(&self, secret: &str) -> CoreResult<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| CoreError::Internal(format!("webhook hmac key: {e}")))?;
        mac.update(self.signature_base().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-shape verification: recompute and compare against the
    /// payload's own signature field.
    pub fn verify_signature(&self, secret: &str) -> CoreResult<()> {
        let expected = self.sign(secret)?;
        if expected == self.signature.to_lowercase() {
            Ok(())
        } else {
            Err(CoreError::Validation("webhook signature mismatch".into()))
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// Human-readable text for the gateway's result-code table.
pub fn result_code_message(code: i64) -> String {
    match code {
        0 => "payment settled".to_string(),
        9000 => "transaction authorized, capture pending".to_string(),
        1001 => "payer balance insufficient".to_string(),
        1003 => "transaction cancelled by the gateway".to_string(),
        1004 => "amount exceeds the payer's transaction limit".to_string(),
        1005 => "payment url expired".to_string(),
        1006 => "payer declined the payment".to_string(),
        1007 => "payer account inactive or locked".to_string(),
        7000 | 7002 => "transaction still processing at the provider".to_string(),
        other => format!("payment rejected by gateway (code {other})"),
    }
}

/// In-process gateway used for wiring and tests. Produces pay URLs
/// deterministically and can be flipped into failure modes.
pub struct SandboxGateway {
    pub partner_code: String,
    pub fail_create: bool,
    pub fail_refund: bool,
}

impl SandboxGateway {
    pub fn new(partner_code: impl Into<String>) -> Self {
        Self {
            partner_code: partner_code.into(),
            fail_create: false,
            fail_refund: false,
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_payment(&self, req: &CreatePaymentRequest) -> CoreResult<PaymentCreation> {
        if self.fail_create {
            return Err(CoreError::upstream("gateway", "payment creation refused"));
        }
        if req.amount <= 0 {
            return Err(CoreError::Validation("payment amount must be positive".into()));
        }
        tracing::info!(order_id = %req.order_id, request_id = %req.request_id, "payment request created");
        Ok(PaymentCreation {
            pay_url: format!(
                "https://sandbox.gateway.test/{}/pay/{}",
                self.partner_code, req.request_id
            ),
            request_id: req.request_id.clone(),
        })
    }

    async fn refund(&self, req: &RefundRequest) -> CoreResult<()> {
        if self.fail_refund {
            return Err(CoreError::upstream("gateway", "refund endpoint unavailable"));
        }
        tracing::info!(transaction_id = %req.transaction_id, amount = req.amount, "refund requested");
        Ok(())
    }
}
