use crate::error::PortalError;
use crate::payments::provider::{Expandable, NewSubscription};
use crate::payments::{require_positive, to_cents, PaymentService};
use crate::store::models::{Sale, SaleStatus, Transaction, SALES, TRANSACTIONS};
use crate::store::put_record;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub location_id: String,
    pub parent_id: Option<String>,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub membership_name: String,
    /// Weekly membership price before fees.
    pub base_price: f64,
    #[serde(default)]
    pub fee_amount: f64,
    #[serde(default)]
    pub joining_fee: f64,
    pub checkout_session_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOutcome {
    pub sale_id: String,
    pub transaction_id: String,
    pub subscription_id: String,
    pub status: SaleStatus,
    pub stripe_status: String,
}

impl PaymentService {
    /// Starts a weekly membership against the resolved payment method and
    /// records the sale. The sale and its transaction are written whether or
    /// not the subscription became active.
    pub async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionOutcome, PortalError> {
        require_positive("basePrice", request.base_price)?;
        if request.fee_amount < 0.0 || request.joining_fee < 0.0 {
            return Err(PortalError::invalid_argument(
                "Fees cannot be negative",
            ));
        }
        if request.membership_name.trim().is_empty() {
            return Err(PortalError::invalid_argument("A membership name is required"));
        }

        let (_, account) = self.connected_location(&request.location_id).await?;
        let resolved = self
            .resolve_payment_method(
                &account,
                request.checkout_session_id.as_deref(),
                Some(&request.customer_email),
            )
            .await?;
        let customer = resolved.customer_id.as_str();
        let payment_method = resolved.payment_method.id.as_str();

        let weekly_amount = request.base_price + request.fee_amount;
        let first_payment_total = weekly_amount + request.joining_fee;

        let product = self
            .provider
            .create_product(&account, &request.membership_name)
            .await?;
        let price = self
            .provider
            .create_weekly_price(&account, &product.id, to_cents(weekly_amount), self.currency())
            .await?;
        if request.joining_fee > 0.0 {
            self.provider
                .create_invoice_item(
                    &account,
                    customer,
                    to_cents(request.joining_fee),
                    self.currency(),
                    &format!("{} joining fee", request.membership_name),
                )
                .await?;
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("locationId".to_string(), request.location_id.clone());
        if let Some(parent_id) = &request.parent_id {
            metadata.insert("parentId".to_string(), parent_id.clone());
        }
        let mut subscription = self
            .provider
            .create_subscription(
                &account,
                &NewSubscription {
                    customer: customer.to_string(),
                    price: price.id.clone(),
                    default_payment_method: Some(payment_method.to_string()),
                    metadata,
                },
            )
            .await?;

        let open_invoice = subscription
            .latest_invoice
            .as_ref()
            .and_then(Expandable::as_object)
            .filter(|invoice| invoice.status.as_deref() == Some("open"))
            .map(|invoice| invoice.id.clone());
        if let Some(invoice) = open_invoice {
            match self
                .provider
                .pay_invoice(&account, &invoice, Some(payment_method))
                .await
            {
                Ok(_) => info!("Paid open invoice {invoice}"),
                Err(err) => warn!("Could not pay open invoice {invoice}: {err}"),
            }
            match self
                .provider
                .retrieve_subscription(&account, &subscription.id)
                .await
            {
                Ok(refreshed) => subscription = refreshed,
                Err(err) => warn!("Could not re-read subscription {}: {err}", subscription.id),
            }
        }

        let status = if subscription.status == "active" {
            SaleStatus::Active
        } else {
            SaleStatus::Pending
        };
        let now = chrono::Utc::now().to_rfc3339();
        let sale_id = Uuid::now_v7().to_string();
        let transaction_id = Uuid::now_v7().to_string();

        let sale = Sale {
            location_id: request.location_id.clone(),
            parent_id: request.parent_id.clone(),
            customer_name: request.customer_name.clone(),
            customer_email: request.customer_email.clone(),
            membership_name: request.membership_name.clone(),
            base_price: request.base_price,
            weekly_amount,
            fee_amount: request.fee_amount,
            joining_fee: request.joining_fee,
            first_payment_total,
            status,
            stripe_status: subscription.status.clone(),
            stripe_subscription_id: subscription.id.clone(),
            stripe_customer_id: customer.to_string(),
            stripe_price_id: price.id.clone(),
            stripe_product_id: product.id.clone(),
            stripe_payment_method_id: Some(payment_method.to_string()),
            refunds: vec![],
            created_at: now.clone(),
        };
        let transaction = Transaction {
            sale_id: sale_id.clone(),
            location_id: request.location_id.clone(),
            customer_email: request.customer_email.clone(),
            amount: first_payment_total,
            kind: "subscription_start".to_string(),
            status: subscription.status.clone(),
            stripe_subscription_id: subscription.id.clone(),
            created_at: now,
        };

        // Two independent writes; the second is attempted even if the first
        // fails.
        let sale_written = put_record(self.db(), SALES, &sale_id, &sale).await;
        let transaction_written =
            put_record(self.db(), TRANSACTIONS, &transaction_id, &transaction).await;
        for (what, result) in [("sale", &sale_written), ("transaction", &transaction_written)] {
            if let Err(err) = result {
                error!("Could not record {what} for subscription {}: {err}", subscription.id);
            }
        }
        sale_written?;
        transaction_written?;

        info!(
            "Subscription {} for {} is {}",
            subscription.id, request.customer_email, subscription.status
        );
        Ok(SubscriptionOutcome {
            sale_id,
            transaction_id,
            subscription_id: subscription.id,
            status,
            stripe_status: subscription.status,
        })
    }
}
