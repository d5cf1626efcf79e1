use crate::error::PortalError;
use crate::payments::provider::{Customer, NewSetupCheckout};
use crate::payments::resolution::ResolutionSource;
use crate::payments::PaymentService;
use crate::store::models::{Parent, PaymentMethodInfo, PaymentMethodType, PARENTS};
use crate::store::require_record;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetupCheckout {
    pub session_id: String,
    pub url: Option<String>,
    pub customer_id: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetupIntentHandle {
    pub setup_intent_id: String,
    pub client_secret: Option<String>,
    pub customer_id: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedPaymentMethod {
    pub customer_id: String,
    pub payment_method: PaymentMethodInfo,
    pub source: ResolutionSource,
}

impl PaymentService {
    async fn find_or_create_customer(
        &self,
        account: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<Customer, PortalError> {
        let existing = self.provider.list_customers_by_email(account, email).await?;
        match existing.into_iter().next() {
            Some(customer) => Ok(customer),
            None => {
                let customer = self.provider.create_customer(account, email, name).await?;
                info!("Created customer {} on {account}", customer.id);
                Ok(customer)
            }
        }
    }

    /// A setup-mode checkout for saving a card or BECS account without
    /// charging it.
    pub async fn create_setup_checkout(
        &self,
        location_id: &str,
        email: &str,
        name: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<SetupCheckout, PortalError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PortalError::invalid_argument("A customer email is required"));
        }
        let (_, account) = self.connected_location(location_id).await?;
        let customer = self.find_or_create_customer(&account, email, name).await?;

        let mut metadata = BTreeMap::new();
        metadata.insert("locationId".to_string(), location_id.to_string());
        if let Some(parent_id) = parent_id {
            metadata.insert("parentId".to_string(), parent_id.to_string());
        }
        // The provider substitutes the session id into the success URL.
        let success_url = format!(
            "{}?session_id={{CHECKOUT_SESSION_ID}}",
            self.config.checkout_success_url.as_str().trim_end_matches('?')
        );
        let session = self
            .provider
            .create_setup_checkout_session(
                &account,
                &NewSetupCheckout {
                    customer: customer.id.clone(),
                    success_url,
                    cancel_url: self.config.checkout_cancel_url.to_string(),
                    payment_method_types: PaymentMethodType::PREFERENCE.to_vec(),
                    metadata,
                },
            )
            .await?;

        Ok(SetupCheckout {
            session_id: session.id,
            url: session.url,
            customer_id: customer.id,
        })
    }

    pub async fn create_setup_intent(
        &self,
        location_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<SetupIntentHandle, PortalError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PortalError::invalid_argument("A customer email is required"));
        }
        let (_, account) = self.connected_location(location_id).await?;
        let customer = self.find_or_create_customer(&account, email, name).await?;
        let intent = self
            .provider
            .create_setup_intent(&account, &customer.id, &PaymentMethodType::PREFERENCE)
            .await?;
        Ok(SetupIntentHandle {
            setup_intent_id: intent.id,
            client_secret: intent.client_secret,
            customer_id: customer.id,
        })
    }

    /// Reports which saved payment method would be used, without changing
    /// anything.
    pub async fn confirm_payment_method(
        &self,
        location_id: &str,
        checkout_session_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<ConfirmedPaymentMethod, PortalError> {
        let (_, account) = self.connected_location(location_id).await?;
        let resolved = self
            .resolve_payment_method(&account, checkout_session_id, email)
            .await?;
        let info = resolved.payment_method.info().ok_or_else(|| {
            PortalError::not_found(format!(
                "Payment method {} is not a card or BECS account",
                resolved.payment_method.id
            ))
        })?;
        Ok(ConfirmedPaymentMethod {
            customer_id: resolved.customer_id,
            payment_method: info,
            source: resolved.source,
        })
    }

    /// Attaches the resolved payment method, makes it the customer's
    /// default, and records it on the parent.
    pub async fn save_from_checkout(
        &self,
        location_id: &str,
        parent_id: &str,
        checkout_session_id: Option<&str>,
    ) -> Result<ConfirmedPaymentMethod, PortalError> {
        let parent: Parent = require_record(self.db(), PARENTS, parent_id).await?;
        let (_, account) = self.connected_location(location_id).await?;
        let resolved = self
            .resolve_payment_method(&account, checkout_session_id, parent.email.as_deref())
            .await?;
        let method = &resolved.payment_method;
        let info = method.info().ok_or_else(|| {
            PortalError::not_found(format!(
                "Payment method {} is not a card or BECS account",
                method.id
            ))
        })?;

        if method.customer.as_deref() == Some(resolved.customer_id.as_str()) {
            info!("Payment method {} already attached to {}", method.id, resolved.customer_id);
        } else if let Err(err) = self
            .provider
            .attach_payment_method(&account, &method.id, &resolved.customer_id)
            .await
        {
            if err.message().contains("already") {
                warn!("Payment method {} already attached: {err}", method.id);
            } else {
                return Err(err);
            }
        }
        self.provider
            .set_default_payment_method(&account, &resolved.customer_id, &method.id)
            .await?;

        self.db()
            .update_document(
                PARENTS,
                parent_id,
                &json!({
                    "stripeCustomerId": resolved.customer_id,
                    "paymentMethod": info,
                }),
            )
            .await?;
        info!("Saved payment method {} for parent {parent_id}", method.id);

        Ok(ConfirmedPaymentMethod {
            customer_id: resolved.customer_id,
            payment_method: info,
            source: resolved.source,
        })
    }

    pub async fn remove_payment_method(
        &self,
        location_id: &str,
        parent_id: &str,
    ) -> Result<PaymentMethodInfo, PortalError> {
        let parent: Parent = require_record(self.db(), PARENTS, parent_id).await?;
        let Some(info) = parent.payment_method else {
            return Err(PortalError::FailedPrecondition {
                message: format!("Parent {parent_id} has no saved payment method"),
            });
        };
        let (_, account) = self.connected_location(location_id).await?;
        self.provider.detach_payment_method(&account, &info.id).await?;
        self.db()
            .update_document(PARENTS, parent_id, &json!({ "paymentMethod": null }))
            .await?;
        info!("Removed payment method {} from parent {parent_id}", info.id);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::db_interfaces::PortalDb;
    use crate::store::models::{LOCATIONS, PARENTS};
    use crate::testing::{card, payment_service, FakeProvider};
    use serde_json::json;
    use std::sync::Arc;

    async fn seed(db: &dyn PortalDb) {
        db.set_document(LOCATIONS, "loc1", &json!({"name": "Bondi", "stripeAccountId": "acct_1"}))
            .await
            .unwrap();
        db.set_document(PARENTS, "par1", &json!({"name": "Pat", "email": "pat@x.com"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn setup_checkout_creates_missing_customer() {
        let provider = Arc::new(FakeProvider::default());
        let (service, db) = payment_service(provider.clone());
        seed(&db).await;

        let checkout = service
            .create_setup_checkout("loc1", "pat@x.com", Some("Pat"), Some("par1"))
            .await
            .unwrap();

        assert!(checkout.url.is_some());
        assert_eq!(provider.call_count("create_customer"), 1);
        assert!(provider
            .calls()
            .iter()
            .any(|call| call == "create_setup_checkout_session acct_1"));
    }

    #[tokio::test]
    async fn setup_requires_connected_account() {
        let provider = Arc::new(FakeProvider::default());
        let (service, db) = payment_service(provider);
        db.set_document(LOCATIONS, "loc2", &json!({"name": "New"}))
            .await
            .unwrap();

        let err = service
            .create_setup_intent("loc2", "pat@x.com", None)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "failed-precondition");
    }

    #[tokio::test]
    async fn save_tolerates_already_attached_method() {
        let provider = Arc::new(FakeProvider::default());
        provider.add_customer("acct_1", "cus_1", "pat@x.com");
        let mut method = card("pm_1", "cus_1");
        method.customer = None;
        provider.add_payment_method_for("acct_1", "cus_1", method);
        provider.fail_attach("This PaymentMethod was already attached to a customer");
        let (service, db) = payment_service(provider.clone());
        seed(&db).await;

        let saved = service.save_from_checkout("loc1", "par1", None).await.unwrap();

        assert_eq!(saved.payment_method.id, "pm_1");
        assert_eq!(provider.call_count("attach_payment_method"), 1);
        assert_eq!(provider.call_count("set_default_payment_method"), 1);
        let parent = db.get_document(PARENTS, "par1").await.unwrap().unwrap();
        assert_eq!(parent["stripeCustomerId"], json!("cus_1"));
        assert_eq!(parent["paymentMethod"]["type"], json!("card"));
        assert_eq!(parent["paymentMethod"]["last4"], json!("4242"));
    }

    #[tokio::test]
    async fn remove_detaches_and_clears() {
        let provider = Arc::new(FakeProvider::default());
        let (service, db) = payment_service(provider.clone());
        seed(&db).await;
        db.update_document(
            PARENTS,
            "par1",
            &json!({"paymentMethod": {"id": "pm_1", "type": "card", "brand": "visa", "last4": "4242"}}),
        )
        .await
        .unwrap();

        let removed = service.remove_payment_method("loc1", "par1").await.unwrap();

        assert_eq!(removed.id, "pm_1");
        assert_eq!(provider.call_count("detach_payment_method"), 1);
        let parent = db.get_document(PARENTS, "par1").await.unwrap().unwrap();
        assert!(parent["paymentMethod"].is_null());

        let err = service.remove_payment_method("loc1", "par1").await.unwrap_err();
        assert_eq!(err.category(), "failed-precondition");
    }
}
