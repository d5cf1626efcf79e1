use crate::error::PortalError;
use crate::store::models::{PaymentMethodInfo, PaymentMethodType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A field the provider returns either as an id or, when requested through
/// `expand[]`, as the full object.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Object(object) => Some(object),
            Expandable::Id(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountLink {
    pub url: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
    pub exp_month: Option<u32>,
    pub exp_year: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BecsDetails {
    pub last4: String,
    pub bsb_number: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub customer: Option<String>,
    pub card: Option<CardDetails>,
    pub au_becs_debit: Option<BecsDetails>,
}

impl PaymentMethod {
    /// Summary stored on the parent record, or `None` for kinds the portal
    /// does not accept.
    pub fn info(&self) -> Option<PaymentMethodInfo> {
        match (self.method_type.as_str(), &self.card, &self.au_becs_debit) {
            ("card", Some(card), _) => Some(PaymentMethodInfo {
                id: self.id.clone(),
                method_type: PaymentMethodType::Card,
                brand: card.brand.clone(),
                last4: card.last4.clone(),
                exp_month: card.exp_month,
                exp_year: card.exp_year,
            }),
            ("au_becs_debit", _, Some(becs)) => Some(PaymentMethodInfo {
                id: self.id.clone(),
                method_type: PaymentMethodType::AuBecsDebit,
                brand: "au_becs_debit".to_string(),
                last4: becs.last4.clone(),
                exp_month: None,
                exp_year: None,
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SetupIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub customer: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub status: Option<String>,
    pub setup_intent: Option<Expandable<SetupIntent>>,
}

impl CheckoutSession {
    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_deref().or_else(|| {
            self.setup_intent
                .as_ref()
                .and_then(Expandable::as_object)
                .and_then(|intent| intent.customer.as_deref())
        })
    }

    pub fn payment_method_id(&self) -> Option<&str> {
        self.setup_intent
            .as_ref()
            .and_then(Expandable::as_object)
            .and_then(|intent| intent.payment_method.as_deref())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Price {
    pub id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct InvoiceItem {
    pub id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: String,
    pub status: String,
    pub latest_invoice: Option<Expandable<Invoice>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Charge {
    pub id: String,
    pub amount: i64,
    pub created: i64,
    #[serde(default)]
    pub refunded: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewSetupCheckout {
    pub customer: String,
    pub success_url: String,
    pub cancel_url: String,
    pub payment_method_types: Vec<PaymentMethodType>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewSubscription {
    pub customer: String,
    pub price: String,
    pub default_payment_method: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Payment provider operations. Every call that touches a location's funds
/// takes that location's connected account id.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_account(
        &self,
        email: Option<&str>,
        country: Option<&str>,
    ) -> Result<Account, PortalError>;

    async fn retrieve_account(&self, account: &str) -> Result<Account, PortalError>;

    async fn create_account_link(
        &self,
        account: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLink, PortalError>;

    async fn list_customers_by_email(
        &self,
        account: &str,
        email: &str,
    ) -> Result<Vec<Customer>, PortalError>;

    async fn create_customer(
        &self,
        account: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<Customer, PortalError>;

    async fn list_payment_methods(
        &self,
        account: &str,
        customer: &str,
        method_type: PaymentMethodType,
    ) -> Result<Vec<PaymentMethod>, PortalError>;

    async fn retrieve_payment_method(
        &self,
        account: &str,
        payment_method: &str,
    ) -> Result<PaymentMethod, PortalError>;

    async fn attach_payment_method(
        &self,
        account: &str,
        payment_method: &str,
        customer: &str,
    ) -> Result<PaymentMethod, PortalError>;

    async fn detach_payment_method(
        &self,
        account: &str,
        payment_method: &str,
    ) -> Result<PaymentMethod, PortalError>;

    async fn set_default_payment_method(
        &self,
        account: &str,
        customer: &str,
        payment_method: &str,
    ) -> Result<Customer, PortalError>;

    async fn create_setup_intent(
        &self,
        account: &str,
        customer: &str,
        method_types: &[PaymentMethodType],
    ) -> Result<SetupIntent, PortalError>;

    async fn create_setup_checkout_session(
        &self,
        account: &str,
        session: &NewSetupCheckout,
    ) -> Result<CheckoutSession, PortalError>;

    /// Returned with `setup_intent` expanded.
    async fn retrieve_checkout_session(
        &self,
        account: &str,
        session: &str,
    ) -> Result<CheckoutSession, PortalError>;

    /// Most recent completed setup-mode sessions, newest first, with
    /// `setup_intent` expanded.
    async fn list_completed_setup_sessions(
        &self,
        account: &str,
        limit: u32,
    ) -> Result<Vec<CheckoutSession>, PortalError>;

    async fn create_product(&self, account: &str, name: &str) -> Result<Product, PortalError>;

    async fn create_weekly_price(
        &self,
        account: &str,
        product: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<Price, PortalError>;

    async fn create_invoice_item(
        &self,
        account: &str,
        customer: &str,
        amount: i64,
        currency: &str,
        description: &str,
    ) -> Result<InvoiceItem, PortalError>;

    /// Created with `payment_behavior=allow_incomplete` and `latest_invoice`
    /// expanded.
    async fn create_subscription(
        &self,
        account: &str,
        subscription: &NewSubscription,
    ) -> Result<Subscription, PortalError>;

    async fn retrieve_subscription(
        &self,
        account: &str,
        subscription: &str,
    ) -> Result<Subscription, PortalError>;

    async fn pay_invoice(
        &self,
        account: &str,
        invoice: &str,
        payment_method: Option<&str>,
    ) -> Result<Invoice, PortalError>;

    /// Newest first.
    async fn list_charges(
        &self,
        account: &str,
        customer: &str,
        limit: u32,
    ) -> Result<Vec<Charge>, PortalError>;

    async fn create_refund(
        &self,
        account: &str,
        charge: &str,
        amount: i64,
    ) -> Result<Refund, PortalError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checkout_session_reads_expanded_setup_intent() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": "cs_1",
            "customer": null,
            "setup_intent": {"id": "seti_1", "customer": "cus_1", "payment_method": "pm_1"}
        }))
        .unwrap();
        assert_eq!(session.customer_id(), Some("cus_1"));
        assert_eq!(session.payment_method_id(), Some("pm_1"));

        let session: CheckoutSession =
            serde_json::from_value(json!({"id": "cs_2", "setup_intent": "seti_2"})).unwrap();
        assert_eq!(session.payment_method_id(), None);
    }

    #[test]
    fn summarizes_accepted_payment_methods() {
        let card: PaymentMethod = serde_json::from_value(json!({
            "id": "pm_card",
            "type": "card",
            "card": {"brand": "visa", "last4": "4242", "exp_month": 12, "exp_year": 2030}
        }))
        .unwrap();
        let info = card.info().unwrap();
        assert_eq!(info.method_type, PaymentMethodType::Card);
        assert_eq!(info.exp_year, Some(2030));

        let other: PaymentMethod =
            serde_json::from_value(json!({"id": "pm_x", "type": "link"})).unwrap();
        assert!(other.info().is_none());
    }
}
