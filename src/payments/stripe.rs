use crate::error::PortalError;
use crate::payments::provider::{
    Account, AccountLink, Charge, CheckoutSession, Customer, Invoice, InvoiceItem,
    NewSetupCheckout, NewSubscription, PaymentMethod, PaymentProvider, Price, Product, Refund,
    SetupIntent, Subscription,
};
use crate::store::models::PaymentMethodType;
use async_trait::async_trait;
use log::debug;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

type Params = Vec<(String, String)>;

fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[derive(Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

/// Form-encoded Stripe REST client. Connected-account calls carry the
/// `Stripe-Account` header.
pub struct StripeClient {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeClient {
    pub fn new(secret_key: String, api_base: Option<&str>) -> Self {
        Self {
            secret_key,
            api_base: api_base
                .unwrap_or(STRIPE_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn make_url(&self, endpoint: &str) -> String {
        format!("{}/v1/{}", self.api_base, endpoint)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        account: Option<&str>,
        params: &Params,
    ) -> Result<T, PortalError> {
        let mut request = self
            .client
            .request(method.clone(), self.make_url(endpoint))
            .bearer_auth(&self.secret_key);
        if let Some(account) = account {
            request = request.header("Stripe-Account", account);
        }
        request = if method == Method::GET {
            request.query(params)
        } else {
            request.form(params)
        };

        debug!("Stripe {method} {endpoint} (account {account:?})");
        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, PortalError> {
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|err| PortalError::ProviderError {
                message: format!("Unable to parse Stripe response: {err}"),
            })
        } else {
            let message = match response.json::<StripeErrorBody>().await {
                Ok(StripeErrorBody { error }) => match (error.code, error.message) {
                    (Some(code), Some(message)) => format!("{message} ({code})"),
                    (None, Some(message)) => message,
                    (Some(code), None) => code,
                    (None, None) => format!("Stripe responded {status}"),
                },
                Err(_) => format!("Stripe responded {status}"),
            };
            Err(PortalError::ProviderError { message })
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        account: &str,
        params: Params,
    ) -> Result<T, PortalError> {
        self.call(Method::GET, endpoint, Some(account), &params).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        account: &str,
        params: Params,
    ) -> Result<T, PortalError> {
        self.call(Method::POST, endpoint, Some(account), &params)
            .await
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_account(
        &self,
        email: Option<&str>,
        country: Option<&str>,
    ) -> Result<Account, PortalError> {
        let mut params = vec![
            param("type", "express"),
            param("capabilities[card_payments][requested]", true),
            param("capabilities[transfers][requested]", true),
        ];
        if let Some(email) = email {
            params.push(param("email", email));
        }
        if let Some(country) = country {
            params.push(param("country", country.to_uppercase()));
        }
        self.call(Method::POST, "accounts", None, &params).await
    }

    async fn retrieve_account(&self, account: &str) -> Result<Account, PortalError> {
        self.call(Method::GET, &format!("accounts/{account}"), None, &vec![])
            .await
    }

    async fn create_account_link(
        &self,
        account: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLink, PortalError> {
        let params = vec![
            param("account", account),
            param("refresh_url", refresh_url),
            param("return_url", return_url),
            param("type", "account_onboarding"),
        ];
        self.call(Method::POST, "account_links", None, &params)
            .await
    }

    async fn list_customers_by_email(
        &self,
        account: &str,
        email: &str,
    ) -> Result<Vec<Customer>, PortalError> {
        let list: List<Customer> = self
            .get("customers", account, vec![param("email", email), param("limit", 1)])
            .await?;
        Ok(list.data)
    }

    async fn create_customer(
        &self,
        account: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<Customer, PortalError> {
        let mut params = vec![param("email", email)];
        if let Some(name) = name {
            params.push(param("name", name));
        }
        self.post("customers", account, params).await
    }

    async fn list_payment_methods(
        &self,
        account: &str,
        customer: &str,
        method_type: PaymentMethodType,
    ) -> Result<Vec<PaymentMethod>, PortalError> {
        let list: List<PaymentMethod> = self
            .get(
                &format!("customers/{customer}/payment_methods"),
                account,
                vec![param("type", method_type.to_str())],
            )
            .await?;
        Ok(list.data)
    }

    async fn retrieve_payment_method(
        &self,
        account: &str,
        payment_method: &str,
    ) -> Result<PaymentMethod, PortalError> {
        self.get(&format!("payment_methods/{payment_method}"), account, vec![])
            .await
    }

    async fn attach_payment_method(
        &self,
        account: &str,
        payment_method: &str,
        customer: &str,
    ) -> Result<PaymentMethod, PortalError> {
        self.post(
            &format!("payment_methods/{payment_method}/attach"),
            account,
            vec![param("customer", customer)],
        )
        .await
    }

    async fn detach_payment_method(
        &self,
        account: &str,
        payment_method: &str,
    ) -> Result<PaymentMethod, PortalError> {
        self.post(&format!("payment_methods/{payment_method}/detach"), account, vec![])
            .await
    }

    async fn set_default_payment_method(
        &self,
        account: &str,
        customer: &str,
        payment_method: &str,
    ) -> Result<Customer, PortalError> {
        self.post(
            &format!("customers/{customer}"),
            account,
            vec![param("invoice_settings[default_payment_method]", payment_method)],
        )
        .await
    }

    async fn create_setup_intent(
        &self,
        account: &str,
        customer: &str,
        method_types: &[PaymentMethodType],
    ) -> Result<SetupIntent, PortalError> {
        let mut params = vec![param("customer", customer), param("usage", "off_session")];
        for method_type in method_types {
            params.push(param("payment_method_types[]", method_type.to_str()));
        }
        self.post("setup_intents", account, params).await
    }

    async fn create_setup_checkout_session(
        &self,
        account: &str,
        session: &NewSetupCheckout,
    ) -> Result<CheckoutSession, PortalError> {
        let mut params = vec![
            param("mode", "setup"),
            param("customer", &session.customer),
            param("success_url", &session.success_url),
            param("cancel_url", &session.cancel_url),
        ];
        for method_type in &session.payment_method_types {
            params.push(param("payment_method_types[]", method_type.to_str()));
        }
        for (key, value) in &session.metadata {
            params.push(param(&format!("metadata[{key}]"), value));
        }
        self.post("checkout/sessions", account, params).await
    }

    async fn retrieve_checkout_session(
        &self,
        account: &str,
        session: &str,
    ) -> Result<CheckoutSession, PortalError> {
        self.get(
            &format!("checkout/sessions/{session}"),
            account,
            vec![param("expand[]", "setup_intent")],
        )
        .await
    }

    async fn list_completed_setup_sessions(
        &self,
        account: &str,
        limit: u32,
    ) -> Result<Vec<CheckoutSession>, PortalError> {
        // Listing cannot filter on mode, so sessions without a setup intent
        // are dropped here.
        let list: List<CheckoutSession> = self
            .get(
                "checkout/sessions",
                account,
                vec![
                    param("status", "complete"),
                    param("limit", limit),
                    param("expand[]", "data.setup_intent"),
                ],
            )
            .await?;
        Ok(list
            .data
            .into_iter()
            .filter(|session| session.setup_intent.is_some())
            .collect())
    }

    async fn create_product(&self, account: &str, name: &str) -> Result<Product, PortalError> {
        self.post("products", account, vec![param("name", name)])
            .await
    }

    async fn create_weekly_price(
        &self,
        account: &str,
        product: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<Price, PortalError> {
        self.post(
            "prices",
            account,
            vec![
                param("product", product),
                param("unit_amount", unit_amount),
                param("currency", currency),
                param("recurring[interval]", "week"),
            ],
        )
        .await
    }

    async fn create_invoice_item(
        &self,
        account: &str,
        customer: &str,
        amount: i64,
        currency: &str,
        description: &str,
    ) -> Result<InvoiceItem, PortalError> {
        self.post(
            "invoiceitems",
            account,
            vec![
                param("customer", customer),
                param("amount", amount),
                param("currency", currency),
                param("description", description),
            ],
        )
        .await
    }

    async fn create_subscription(
        &self,
        account: &str,
        subscription: &NewSubscription,
    ) -> Result<Subscription, PortalError> {
        let mut params = vec![
            param("customer", &subscription.customer),
            param("items[0][price]", &subscription.price),
            param("payment_behavior", "allow_incomplete"),
            param("expand[]", "latest_invoice"),
        ];
        if let Some(payment_method) = &subscription.default_payment_method {
            params.push(param("default_payment_method", payment_method));
        }
        for (key, value) in &subscription.metadata {
            params.push(param(&format!("metadata[{key}]"), value));
        }
        self.post("subscriptions", account, params).await
    }

    async fn retrieve_subscription(
        &self,
        account: &str,
        subscription: &str,
    ) -> Result<Subscription, PortalError> {
        self.get(&format!("subscriptions/{subscription}"), account, vec![])
            .await
    }

    async fn pay_invoice(
        &self,
        account: &str,
        invoice: &str,
        payment_method: Option<&str>,
    ) -> Result<Invoice, PortalError> {
        let mut params = vec![];
        if let Some(payment_method) = payment_method {
            params.push(param("payment_method", payment_method));
        }
        self.post(&format!("invoices/{invoice}/pay"), account, params)
            .await
    }

    async fn list_charges(
        &self,
        account: &str,
        customer: &str,
        limit: u32,
    ) -> Result<Vec<Charge>, PortalError> {
        let list: List<Charge> = self
            .get(
                "charges",
                account,
                vec![param("customer", customer), param("limit", limit)],
            )
            .await?;
        Ok(list.data)
    }

    async fn create_refund(
        &self,
        account: &str,
        charge: &str,
        amount: i64,
    ) -> Result<Refund, PortalError> {
        self.post(
            "refunds",
            account,
            vec![param("charge", charge), param("amount", amount)],
        )
        .await
    }
}
