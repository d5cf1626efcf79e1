use crate::error::PortalError;
use crate::payments::gateway::{PaymentGateway, ProviderAccess};
use crate::payments::provider::PaymentProvider;
use crate::server::config::PortalConfigStripe;
use crate::store::db_interfaces::PortalDb;
use crate::store::models::{Location, LOCATIONS};
use crate::store::require_record;
use std::sync::Arc;

pub mod connect;
pub mod gateway;
pub mod provider;
pub mod refunds;
pub mod resolution;
pub mod setup;
pub mod stripe;
pub mod subscriptions;

/// Payment operations for one request, bound to a configured provider.
pub struct PaymentService {
    db: Box<dyn PortalDb>,
    provider: Arc<dyn PaymentProvider>,
    config: PortalConfigStripe,
}

impl PaymentService {
    pub fn new(
        db: Box<dyn PortalDb>,
        provider: Arc<dyn PaymentProvider>,
        config: PortalConfigStripe,
    ) -> Self {
        Self {
            db,
            provider,
            config,
        }
    }

    /// Fails with `FailedPrecondition` when no payment credential is
    /// configured.
    pub fn from_gateway(
        gateway: &PaymentGateway,
        db: Box<dyn PortalDb>,
    ) -> Result<PaymentService, PortalError> {
        match (gateway.access(), gateway.config()) {
            (ProviderAccess::Configured(provider), Some(config)) => {
                Ok(PaymentService::new(db, provider, config.clone()))
            }
            _ => Err(PortalError::FailedPrecondition {
                message: "Payments are not configured on this server".to_string(),
            }),
        }
    }

    fn db(&self) -> &dyn PortalDb {
        self.db.as_ref()
    }

    fn currency(&self) -> &str {
        &self.config.currency
    }

    /// The location and its connected account id.
    async fn connected_location(&self, location_id: &str) -> Result<(Location, String), PortalError> {
        let location: Location = require_record(self.db(), LOCATIONS, location_id).await?;
        match location.stripe_account_id.clone().filter(|id| !id.is_empty()) {
            Some(account) => Ok((location, account)),
            None => Err(PortalError::FailedPrecondition {
                message: format!("Location {location_id} has no connected payment account"),
            }),
        }
    }
}

/// Whole dollars and cents to the provider's minor units.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub(crate) fn require_positive(name: &str, amount: f64) -> Result<(), PortalError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(PortalError::invalid_argument(format!(
            "{name} must be a positive amount"
        )))
    }
}
