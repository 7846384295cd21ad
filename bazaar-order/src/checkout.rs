use crate::expiry::ExpiryScheduler;
use crate::models::{
    DeliveryRecord, DeliveryStatus, Order, OrderItem, OrderStatus, PaymentRecord,
};
use crate::repo::OrderRepository;
use bazaar_catalog::{
    CartService, CatalogError, DiscountError, DiscountLedger, InventoryError, InventoryLedger,
    LineAmount, ProductCatalog,
};
use bazaar_core::actor::Actor;
use bazaar_core::carrier::{
    AddressDirectory, CarrierClient, Destination, PackageSize, QuoteRequest,
};
use bazaar_core::gateway::{CreatePaymentRequest, PaymentGateway, PaymentMethod};
use bazaar_core::{CoreError, CoreResult};
use bazaar_shared::models::events::OrderPlacedEvent;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// How long a gateway-paid order may sit unpaid before it expires.
    pub payment_wait_secs: i64,
    /// How long a cash order may sit unconfirmed before it expires.
    pub confirmation_wait_secs: i64,
    pub redirect_url: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct RequestedItem {
    pub variant_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub username: String,
    pub items: Vec<RequestedItem>,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub destination: Destination,
    pub package: PackageSize,
    pub service_id: String,
    pub method: PaymentMethod,
    pub discount_code: Option<String>,
    pub note: Option<String>,
    pub payer_email: Option<String>,
}

/// Side effects already performed for a checkout attempt, in the order they
/// happened. On failure each one is undone; an empty guard means nothing to
/// undo.
#[derive(Default)]
struct Rollback {
    reserved: Vec<(Uuid, i64)>,
    discount: Option<(String, Uuid)>,
}

/// Drives a checkout attempt from requested items to a stored order.
/// Reservation and discount consumption happen before the order exists, so
/// any later failure unwinds them; once the order is inserted, only the
/// compensation path releases them again.
pub struct CheckoutOrchestrator {
    catalog: Arc<ProductCatalog>,
    inventory: Arc<InventoryLedger>,
    discounts: Arc<DiscountLedger>,
    carrier: Arc<dyn CarrierClient>,
    directory: Arc<dyn AddressDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    cart: Arc<dyn CartService>,
    repo: Arc<dyn OrderRepository>,
    scheduler: ExpiryScheduler,
    config: CheckoutConfig,
}

impl CheckoutOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<ProductCatalog>,
        inventory: Arc<InventoryLedger>,
        discounts: Arc<DiscountLedger>,
        carrier: Arc<dyn CarrierClient>,
        directory: Arc<dyn AddressDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        cart: Arc<dyn CartService>,
        repo: Arc<dyn OrderRepository>,
        scheduler: ExpiryScheduler,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            catalog,
            inventory,
            discounts,
            carrier,
            directory,
            gateway,
            cart,
            repo,
            scheduler,
            config,
        }
    }

    pub async fn place_order(&self, req: CheckoutRequest) -> CoreResult<Order> {
        validate_request(&req)?;

        let mut rollback = Rollback::default();
        match self.place_inner(&req, &mut rollback).await {
            Ok(order) => Ok(order),
            Err(err) => {
                self.unwind(rollback).await;
                Err(err)
            }
        }
    }

    async fn place_inner(&self, req: &CheckoutRequest, rollback: &mut Rollback) -> CoreResult<Order> {
        // Snapshot and reserve line by line; the rollback guard remembers
        // exactly what was taken.
        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let snap = self
                .catalog
                .snapshot(line.variant_id)
                .await
                .map_err(catalog_error)?;
            self.inventory
                .try_reserve(line.variant_id, line.quantity)
                .await
                .map_err(inventory_error)?;
            rollback.reserved.push((line.variant_id, line.quantity));
            items.push(OrderItem {
                variant_id: snap.variant_id,
                product_id: snap.product_id,
                name: snap.name,
                image: snap.image,
                unit_price: snap.unit_price,
                quantity: line.quantity,
                attributes: snap.attributes,
                reviewable: false,
            });
        }
        let total_product_price: i64 = items.iter().map(OrderItem::line_total).sum();

        let quote = QuoteRequest {
            destination: req.destination.clone(),
            package: req.package.clone(),
            service_id: req.service_id.clone(),
            insured_value: total_product_price,
        };
        let (shipping_price, lead_time_secs, resolved_address) = tokio::try_join!(
            self.carrier.quote_fee(&quote),
            self.carrier.quote_lead_time(&req.destination, &req.service_id),
            self.directory.resolve(&req.destination),
        )?;

        let mut total_discount = 0;
        if let Some(code) = &req.discount_code {
            let lines: Vec<LineAmount> = items
                .iter()
                .map(|i| LineAmount { variant_id: i.variant_id, amount: i.line_total() })
                .collect();
            let applied = self
                .discounts
                .validate_and_consume(code, req.user_id, &lines, Utc::now())
                .await
                .map_err(discount_error)?;
            rollback.discount = Some((code.clone(), req.user_id));
            total_discount = applied.amount;
        }

        let total_payment =
            Order::compute_total_payment(total_product_price, shipping_price, total_discount);
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let mut payment = PaymentRecord::new(req.method, total_payment);
        if req.method.is_gateway() {
            let request_id = Uuid::new_v4().to_string();
            let creation = self
                .gateway
                .create_payment(&CreatePaymentRequest {
                    order_id,
                    request_id,
                    amount: total_payment,
                    order_info: format!("order {order_id} for {}", req.username),
                    redirect_url: self.config.redirect_url.clone(),
                    callback_url: self.config.callback_url.clone(),
                    payer_email: req.payer_email.clone(),
                    method: req.method,
                })
                .await?;
            payment.request_id = Some(creation.request_id);
            payment.pay_url = Some(creation.pay_url);
        }

        let wait_secs = if req.method.is_gateway() {
            self.config.payment_wait_secs
        } else {
            self.config.confirmation_wait_secs
        };
        let expired_at = now + Duration::seconds(wait_secs);

        let mut delivery = DeliveryRecord {
            recipient_name: req.recipient_name.clone(),
            recipient_phone: req.recipient_phone.clone().into(),
            destination: req.destination.clone(),
            resolved_address,
            package: req.package.clone(),
            service_id: req.service_id.clone(),
            tracking_code: None,
            fee: shipping_price,
            lead_time_secs,
            cod_amount: if req.method == PaymentMethod::Cash { total_payment } else { 0 },
            history: Vec::new(),
        };
        delivery.push_history(DeliveryStatus::Pending);

        let mut order = Order {
            id: order_id,
            user_id: req.user_id,
            username: req.username.clone(),
            items,
            total_product_price,
            shipping_price,
            total_discount,
            total_payment,
            discount_code: req.discount_code.clone(),
            note: req.note.clone(),
            status: OrderStatus::Placed,
            status_history: Vec::new(),
            expired_at: Some(expired_at),
            delivery,
            payment,
            created_at: now,
            updated_at: now,
        };
        order.append_history(
            OrderStatus::Placed,
            "order placed",
            &Actor::Customer { user_id: req.user_id },
        );

        self.repo.insert(order.clone()).await?;

        // Post-commit housekeeping. The order stands even if these fail.
        let variant_ids: Vec<Uuid> = order.items.iter().map(|i| i.variant_id).collect();
        if let Err(err) = self.cart.remove_items(req.user_id, &variant_ids).await {
            tracing::warn!(order_id = %order.id, error = %err, "cart cleanup failed after checkout");
        }
        self.scheduler.register(order.id, expired_at).await;

        let event = OrderPlacedEvent {
            order_id: order.id,
            user_id: order.user_id,
            total_payment: order.total_payment,
            payment_method: format!("{:?}", order.payment.method),
            timestamp: now.timestamp(),
        };
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            event = %serde_json::to_string(&event).unwrap_or_default(),
            "order placed"
        );
        Ok(order)
    }

    async fn unwind(&self, rollback: Rollback) {
        for (variant_id, quantity) in rollback.reserved {
            if let Err(err) = self.inventory.release(variant_id, quantity).await {
                tracing::error!(%variant_id, error = %err, "reservation rollback failed");
            }
        }
        if let Some((code, user_id)) = rollback.discount {
            self.discounts.release(&code, user_id).await;
        }
    }
}

fn validate_request(req: &CheckoutRequest) -> CoreResult<()> {
    if req.items.is_empty() {
        return Err(CoreError::Validation("order must contain at least one item".into()));
    }
    let mut seen = HashSet::new();
    for line in &req.items {
        if line.quantity <= 0 {
            return Err(CoreError::Validation(format!(
                "invalid quantity {} for variant {}",
                line.quantity, line.variant_id
            )));
        }
        if !seen.insert(line.variant_id) {
            return Err(CoreError::Validation(format!(
                "variant {} appears more than once",
                line.variant_id
            )));
        }
    }
    if req.recipient_name.trim().is_empty() {
        return Err(CoreError::Validation("recipient name is required".into()));
    }
    if req.recipient_phone.trim().is_empty() {
        return Err(CoreError::Validation("recipient phone is required".into()));
    }
    Ok(())
}

fn catalog_error(err: CatalogError) -> CoreError {
    match err {
        CatalogError::NotFound(_) => CoreError::NotFound(err.to_string()),
        CatalogError::NotPurchasable(_) => CoreError::Validation(err.to_string()),
    }
}

fn inventory_error(err: InventoryError) -> CoreError {
    match err {
        InventoryError::OutOfStock { .. } => CoreError::Conflict(err.to_string()),
        InventoryError::NotFound(_) => CoreError::NotFound(err.to_string()),
        InventoryError::InvalidQuantity(_) => CoreError::Validation(err.to_string()),
    }
}

fn discount_error(err: DiscountError) -> CoreError {
    match err {
        DiscountError::NotFound(_) => CoreError::NotFound(err.to_string()),
        _ => CoreError::Validation(err.to_string()),
    }
}
