use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parcel dimensions sent to the carrier for fee calculation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageSize {
    pub width_cm: i64,
    pub height_cm: i64,
    pub length_cm: i64,
    pub weight_grams: i64,
}

/// Destination as the storefront stores it: administrative codes plus the
/// free-form street line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Destination {
    pub province_code: String,
    pub district_code: String,
    pub ward_code: String,
    pub street: String,
}

/// Human-readable names for a destination's administrative codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub province: String,
    pub district: String,
    pub ward: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub destination: Destination,
    pub package: PackageSize,
    pub service_id: String,
    pub insured_value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub order_id: Uuid,
    pub destination: Destination,
    pub package: PackageSize,
    pub service_id: String,
    pub cod_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub tracking_code: String,
    pub fee: i64,
    pub lead_time_secs: i64,
}

/// Outbound port to the third-party carrier API, keyed by a shop identifier.
/// Errors carry the carrier's own message as an upstream failure.
#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Shipping fee for a destination and package, in minor currency units.
    async fn quote_fee(&self, req: &QuoteRequest) -> CoreResult<i64>;

    /// Estimated delivery lead time in seconds.
    async fn quote_lead_time(&self, destination: &Destination, service_id: &str)
        -> CoreResult<i64>;

    /// Register a shipment with the carrier once the order starts delivering.
    async fn create_shipment(&self, req: &ShipmentRequest) -> CoreResult<Shipment>;

    /// Ask the carrier to abandon a shipment that has not completed delivery.
    async fn cancel_shipment(&self, tracking_code: &str) -> CoreResult<()>;
}

/// Resolves administrative codes into display names. A separate port because
/// the directory is a different upstream than the carrier in most deployments.
#[async_trait]
pub trait AddressDirectory: Send + Sync {
    async fn resolve(&self, destination: &Destination) -> CoreResult<ResolvedAddress>;
}

/// Deterministic in-process carrier used for wiring and tests. Fee scales
/// with weight, lead time with the province code.
pub struct SandboxCarrier {
    pub shop_id: String,
    pub fail_quotes: bool,
    pub fail_cancel: bool,
}

impl SandboxCarrier {
    pub fn new(shop_id: impl Into<String>) -> Self {
        Self {
            shop_id: shop_id.into(),
            fail_quotes: false,
            fail_cancel: false,
        }
    }
}

#[async_trait]
impl CarrierClient for SandboxCarrier {
    async fn quote_fee(&self, req: &QuoteRequest) -> CoreResult<i64> {
        if self.fail_quotes {
            return Err(CoreError::upstream("carrier", "quote service unavailable"));
        }
        Ok(15_000 + req.package.weight_grams / 200 * 1_000)
    }

    async fn quote_lead_time(
        &self,
        destination: &Destination,
        _service_id: &str,
    ) -> CoreResult<i64> {
        if self.fail_quotes {
            return Err(CoreError::upstream("carrier", "quote service unavailable"));
        }
        // Two days baseline, one extra day outside the home province.
        let days = if destination.province_code == "01" { 2 } else { 3 };
        Ok(days * 86_400)
    }

    async fn create_shipment(&self, req: &ShipmentRequest) -> CoreResult<Shipment> {
        let fee = self
            .quote_fee(&QuoteRequest {
                destination: req.destination.clone(),
                package: req.package.clone(),
                service_id: req.service_id.clone(),
                insured_value: req.cod_amount,
            })
            .await?;
        let lead_time_secs = self.quote_lead_time(&req.destination, &req.service_id).await?;
        Ok(Shipment {
            tracking_code: format!("{}-{}", self.shop_id, req.order_id.simple()),
            fee,
            lead_time_secs,
        })
    }

    async fn cancel_shipment(&self, tracking_code: &str) -> CoreResult<()> {
        if self.fail_cancel {
            return Err(CoreError::upstream(
                "carrier",
                format!("cancellation rejected for {tracking_code}"),
            ));
        }
        tracing::info!(tracking_code, "carrier shipment cancelled");
        Ok(())
    }
}

/// Static directory for the sandbox environment.
pub struct SandboxDirectory;

#[async_trait]
impl AddressDirectory for SandboxDirectory {
    async fn resolve(&self, destination: &Destination) -> CoreResult<ResolvedAddress> {
        let province = match destination.province_code.as_str() {
            "01" => "Hanoi",
            "79" => "Ho Chi Minh City",
            "48" => "Da Nang",
            other => {
                return Err(CoreError::Validation(format!(
                    "unknown province code {other}"
                )))
            }
        };
        Ok(ResolvedAddress {
            province: province.to_string(),
            district: format!("District {}", destination.district_code),
            ward: format!("Ward {}", destination.ward_code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination() -> Destination {
        Destination {
            province_code: "01".into(),
            district_code: "001".into(),
            ward_code: "00004".into(),
            street: "17 Hang Bai".into(),
        }
    }

    #[tokio::test]
    async fn sandbox_quotes_scale_with_weight() {
        let carrier = SandboxCarrier::new("shop-1");
        let light = QuoteRequest {
            destination: destination(),
            package: PackageSize { width_cm: 10, height_cm: 10, length_cm: 10, weight_grams: 200 },
            service_id: "standard".into(),
            insured_value: 0,
        };
        let mut heavy = light.clone();
        heavy.package.weight_grams = 2_000;

        let light_fee = carrier.quote_fee(&light).await.unwrap();
        let heavy_fee = carrier.quote_fee(&heavy).await.unwrap();
        assert!(heavy_fee > light_fee);
    }

    #[tokio::test]
    async fn sandbox_directory_rejects_unknown_codes() {
        let mut dest = destination();
        dest.province_code = "99".into();
        assert!(SandboxDirectory.resolve(&dest).await.is_err());

        let resolved = SandboxDirectory.resolve(&destination()).await.unwrap();
        assert_eq!(resolved.province, "Hanoi");
    }
}
