use crate::error::PortalError;
use crate::payments::provider::{PaymentMethod, PaymentProvider};
use crate::payments::PaymentService;
use crate::store::models::PaymentMethodType;
use log::{debug, warn};
use serde::Serialize;

/// Recent completed setup sessions scanned as the last resort.
pub const RECENT_SETUP_SESSIONS: u32 = 5;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    CheckoutSession,
    CustomerEmail,
    RecentSetupSession,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPaymentMethod {
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    pub source: ResolutionSource,
}

/// The first payment method of the most preferred type the customer has.
pub async fn preferred_payment_method(
    provider: &dyn PaymentProvider,
    account: &str,
    customer: &str,
) -> Result<Option<PaymentMethod>, PortalError> {
    for method_type in PaymentMethodType::PREFERENCE {
        let methods = provider
            .list_payment_methods(account, customer, method_type)
            .await?;
        if let Some(method) = methods.into_iter().next() {
            return Ok(Some(method));
        }
    }
    Ok(None)
}

impl PaymentService {
    /// Finds the customer and payment method for a connected account,
    /// trying the checkout session, then the customer's email, then the
    /// most recent completed setup sessions.
    pub async fn resolve_payment_method(
        &self,
        account: &str,
        checkout_session_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<ResolvedPaymentMethod, PortalError> {
        let provider = self.provider.as_ref();

        if let Some(session_id) = checkout_session_id.map(str::trim).filter(|s| !s.is_empty()) {
            match self.from_checkout_session(account, session_id).await {
                Ok(Some(resolved)) => return Ok(resolved),
                Ok(None) => warn!("Checkout session {session_id} did not resolve a payment method"),
                // Expired or foreign sessions fall through to the other lookups.
                Err(err) => warn!("Could not read checkout session {session_id}: {err}"),
            }
        }

        if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
            let customers = provider.list_customers_by_email(account, email).await?;
            if let Some(customer) = customers.into_iter().next() {
                if let Some(payment_method) =
                    preferred_payment_method(provider, account, &customer.id).await?
                {
                    return Ok(ResolvedPaymentMethod {
                        customer_id: customer.id,
                        payment_method,
                        source: ResolutionSource::CustomerEmail,
                    });
                }
                debug!("Customer {} has no saved payment method", customer.id);
            }
        }

        let sessions = provider
            .list_completed_setup_sessions(account, RECENT_SETUP_SESSIONS)
            .await?;
        for session in sessions.iter().take(RECENT_SETUP_SESSIONS as usize) {
            let Some(customer) = session.customer_id() else {
                continue;
            };
            let method = match session.payment_method_id() {
                Some(id) => Some(provider.retrieve_payment_method(account, id).await?),
                None => preferred_payment_method(provider, account, customer).await?,
            };
            if let Some(payment_method) = method {
                return Ok(ResolvedPaymentMethod {
                    customer_id: customer.to_string(),
                    payment_method,
                    source: ResolutionSource::RecentSetupSession,
                });
            }
        }

        Err(PortalError::not_found(
            "No customer with a saved payment method was found for this account",
        ))
    }

    async fn from_checkout_session(
        &self,
        account: &str,
        session_id: &str,
    ) -> Result<Option<ResolvedPaymentMethod>, PortalError> {
        let provider = self.provider.as_ref();
        let session = provider.retrieve_checkout_session(account, session_id).await?;
        let Some(customer) = session.customer_id() else {
            return Ok(None);
        };
        let method = match session.payment_method_id() {
            Some(id) => Some(provider.retrieve_payment_method(account, id).await?),
            None => preferred_payment_method(provider, account, customer).await?,
        };
        Ok(method.map(|payment_method| ResolvedPaymentMethod {
            customer_id: customer.to_string(),
            payment_method,
            source: ResolutionSource::CheckoutSession,
        }))
    }
}
