use crate::error::PortalError;
use crate::payments::{require_positive, to_cents, PaymentService};
use crate::store::models::{Location, RefundRecord, RefundStatus, Sale, LOCATIONS, SALES};
use crate::store::{get_record, require_record};
use log::{error, info, warn};

/// Charges inspected when looking for the one to refund.
pub const REFUND_CHARGE_LOOKUP: u32 = 10;

impl PaymentService {
    /// Refunds `amount` against the customer's most recent charge. Every
    /// request after the sale is found ends in an appended refund record;
    /// provider problems produce a `recorded` entry instead of an error.
    pub async fn process_refund(
        &self,
        sale_id: &str,
        amount: f64,
        reason: &str,
    ) -> Result<RefundRecord, PortalError> {
        require_positive("amount", amount)?;
        let sale: Sale = require_record(self.db(), SALES, sale_id).await?;

        let (stripe_refund_id, note) = match self.attempt_refund(&sale, amount).await {
            Ok(Some(refund_id)) => (Some(refund_id), None),
            Ok(None) => {
                warn!("No charge found to refund for sale {sale_id}");
                let note = "No charge found for this customer; refund recorded for manual processing";
                (None, Some(note.to_string()))
            }
            Err(err) => {
                error!("Refund for sale {sale_id} failed: {err}");
                (None, Some(err.message().to_string()))
            }
        };

        let record = RefundRecord {
            amount,
            reason: reason.to_string(),
            processed_at: chrono::Utc::now().to_rfc3339(),
            status: if stripe_refund_id.is_some() {
                RefundStatus::Processed
            } else {
                RefundStatus::Recorded
            },
            stripe_refund_id,
            note,
        };
        self.append_refund(sale_id, &record).await?;
        info!("Refund for sale {sale_id} {:?}", record.status);
        Ok(record)
    }

    /// `Ok(None)` when the customer has no charges.
    async fn attempt_refund(&self, sale: &Sale, amount: f64) -> Result<Option<String>, PortalError> {
        let location: Option<Location> = get_record(self.db(), LOCATIONS, &sale.location_id).await?;
        let account = location
            .and_then(|l| l.stripe_account_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PortalError::FailedPrecondition {
                message: format!("Location {} has no connected payment account", sale.location_id),
            })?;

        let charges = self
            .provider
            .list_charges(&account, &sale.stripe_customer_id, REFUND_CHARGE_LOOKUP)
            .await?;
        let Some(charge) = charges.iter().max_by_key(|charge| charge.created) else {
            return Ok(None);
        };

        let refund = self
            .provider
            .create_refund(&account, &charge.id, to_cents(amount))
            .await?;
        Ok(Some(refund.id))
    }

    async fn append_refund(&self, sale_id: &str, record: &RefundRecord) -> Result<(), PortalError> {
        self.db()
            .append_to_array(SALES, sale_id, "refunds", &serde_json::to_value(record)?)
            .await
    }
}
