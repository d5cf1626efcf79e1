use crate::email::backend::{EmailBackend, OutboundEmail};
use crate::email::EmailDispatcher;
use crate::error::PortalError;
use crate::notifications::Notifier;
use crate::payments::provider::{
    Account, AccountLink, BecsDetails, CardDetails, Charge, CheckoutSession, Customer, Expandable,
    Invoice, InvoiceItem, NewSetupCheckout, NewSubscription, PaymentMethod, PaymentProvider, Price,
    Product, Refund, SetupIntent, Subscription,
};
use crate::payments::PaymentService;
use crate::push::{PushMessage, PushTransport, TokenResult};
use crate::server::config::{PortalConfigEmail, PortalConfigStripe};
use crate::store::memory::MemoryDb;
use crate::store::models::PaymentMethodType;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

pub fn email_config() -> PortalConfigEmail {
    PortalConfigEmail {
        from_email: "noreply@portal.test".to_string(),
        from_name: "Portal".to_string(),
        reply_to: None,
        brand_gradient: None,
        sendgrid: None,
        smtp: None,
        file: None,
    }
}

pub fn stripe_config() -> PortalConfigStripe {
    PortalConfigStripe {
        secret_key: None,
        api_base: None,
        currency: "aud".to_string(),
        onboarding_refresh_url: Url::parse("http://portal.test/payments/refresh").unwrap(),
        onboarding_return_url: Url::parse("http://portal.test/payments/complete").unwrap(),
        checkout_success_url: Url::parse("http://portal.test/checkout/success").unwrap(),
        checkout_cancel_url: Url::parse("http://portal.test/checkout/cancel").unwrap(),
    }
}

#[derive(Default)]
struct RecordingState {
    sent: Vec<OutboundEmail>,
    attempts: usize,
}

/// Mail transport that keeps what it was asked to send.
#[derive(Clone)]
pub struct RecordingBackend {
    configured: bool,
    fail_all: bool,
    fail_for: Vec<String>,
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            configured: true,
            fail_all: false,
            fail_for: vec![],
            state: Arc::default(),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }

    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            fail_for: recipients.iter().map(|r| r.to_string()).collect(),
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

#[async_trait]
impl EmailBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send_email(&self, email: &OutboundEmail) -> Result<(), PortalError> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if self.fail_all || self.fail_for.contains(&email.to) {
            return Err(PortalError::TransportError {
                message: format!("rejected {}", email.to),
            });
        }
        state.sent.push(email.clone());
        Ok(())
    }
}

pub fn notifier(db: &MemoryDb, backend: &RecordingBackend) -> Notifier {
    let dispatcher = EmailDispatcher::new(
        Box::new(db.clone()),
        Arc::new(backend.clone()),
        &email_config(),
    );
    Notifier::new(dispatcher, "http://portal.test/")
}

pub fn card(id: &str, customer: &str) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        method_type: "card".to_string(),
        customer: Some(customer.to_string()),
        card: Some(CardDetails {
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: Some(12),
            exp_year: Some(2030),
        }),
        au_becs_debit: None,
    }
}

pub fn becs(id: &str, customer: &str) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        method_type: "au_becs_debit".to_string(),
        customer: Some(customer.to_string()),
        card: None,
        au_becs_debit: Some(BecsDetails {
            last4: "3456".to_string(),
            bsb_number: Some("000000".to_string()),
        }),
    }
}

pub fn payment_service(provider: Arc<FakeProvider>) -> (PaymentService, MemoryDb) {
    let db = MemoryDb::new();
    let service = PaymentService::new(Box::new(db.clone()), provider, stripe_config());
    (service, db)
}

struct StoredMethod {
    account: String,
    owner: Option<String>,
    method: PaymentMethod,
}

struct SubscriptionFlow {
    created_status: String,
    invoice_status: Option<String>,
    status_after_pay: String,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    next_id: usize,
    accounts: HashMap<String, Account>,
    customers: Vec<(String, Customer)>,
    methods: Vec<StoredMethod>,
    /// Newest first.
    setup_sessions: Vec<(String, CheckoutSession)>,
    charges: Vec<(String, Charge)>,
    refunds: Vec<(String, i64)>,
    attach_error: Option<String>,
    refund_error: Option<String>,
    flow: Option<SubscriptionFlow>,
}

impl FakeState {
    fn record(&mut self, method: &str, account: Option<&str>) {
        match account {
            Some(account) => self.calls.push(format!("{method} {account}")),
            None => self.calls.push(method.to_string()),
        }
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }
}

/// Scriptable payment provider. Every call is recorded as
/// `"{method} {account}"`.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
}

impl FakeProvider {
    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_customer(&self, account: &str, id: &str, email: &str) {
        self.state().customers.push((
            account.to_string(),
            Customer {
                id: id.to_string(),
                email: Some(email.to_string()),
            },
        ));
    }

    /// Owned by the method's own `customer`.
    pub fn add_payment_method(&self, account: &str, method: PaymentMethod) {
        let owner = method.customer.clone();
        self.state().methods.push(StoredMethod {
            account: account.to_string(),
            owner,
            method,
        });
    }

    pub fn add_payment_method_for(&self, account: &str, owner: &str, method: PaymentMethod) {
        self.state().methods.push(StoredMethod {
            account: account.to_string(),
            owner: Some(owner.to_string()),
            method,
        });
    }

    /// Each session added is newer than the ones before it.
    pub fn add_setup_session(
        &self,
        account: &str,
        id: &str,
        customer: Option<&str>,
        payment_method: Option<&str>,
    ) {
        let session = CheckoutSession {
            id: id.to_string(),
            url: None,
            customer: customer.map(String::from),
            customer_email: None,
            status: Some("complete".to_string()),
            setup_intent: Some(Expandable::Object(Box::new(SetupIntent {
                id: format!("seti_{id}"),
                client_secret: None,
                customer: customer.map(String::from),
                payment_method: payment_method.map(String::from),
                status: Some("succeeded".to_string()),
            }))),
        };
        self.state()
            .setup_sessions
            .insert(0, (account.to_string(), session));
    }

    pub fn set_account(&self, account: Account) {
        self.state().accounts.insert(account.id.clone(), account);
    }

    pub fn fail_attach(&self, message: &str) {
        self.state().attach_error = Some(message.to_string());
    }

    pub fn fail_refunds(&self, message: &str) {
        self.state().refund_error = Some(message.to_string());
    }

    pub fn subscription_flow(
        &self,
        created_status: &str,
        invoice_status: Option<&str>,
        status_after_pay: &str,
    ) {
        self.state().flow = Some(SubscriptionFlow {
            created_status: created_status.to_string(),
            invoice_status: invoice_status.map(String::from),
            status_after_pay: status_after_pay.to_string(),
        });
    }

    pub fn add_charge(&self, customer: &str, id: &str, amount: i64, created: i64) {
        self.state().charges.push((
            customer.to_string(),
            Charge {
                id: id.to_string(),
                amount,
                created,
                refunded: false,
            },
        ));
    }

    /// `(charge, amount)` for each refund issued.
    pub fn refunds(&self) -> Vec<(String, i64)> {
        self.state().refunds.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(method))
            .count()
    }

    fn find_method(state: &FakeState, account: &str, id: &str) -> Result<PaymentMethod, PortalError> {
        state
            .methods
            .iter()
            .find(|stored| stored.account == account && stored.method.id == id)
            .map(|stored| stored.method.clone())
            .ok_or_else(|| PortalError::ProviderError {
                message: format!("No such payment method: {id}"),
            })
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_account(
        &self,
        _email: Option<&str>,
        _country: Option<&str>,
    ) -> Result<Account, PortalError> {
        let mut state = self.state();
        state.record("create_account", None);
        let account = Account {
            id: state.id("acct"),
            ..Default::default()
        };
        state.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn retrieve_account(&self, account: &str) -> Result<Account, PortalError> {
        let mut state = self.state();
        state.record("retrieve_account", Some(account));
        Ok(state.accounts.get(account).cloned().unwrap_or(Account {
            id: account.to_string(),
            ..Default::default()
        }))
    }

    async fn create_account_link(
        &self,
        account: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<AccountLink, PortalError> {
        self.state().record("create_account_link", Some(account));
        Ok(AccountLink {
            url: format!("https://connect.test/setup/{account}"),
        })
    }

    async fn list_customers_by_email(
        &self,
        account: &str,
        email: &str,
    ) -> Result<Vec<Customer>, PortalError> {
        let mut state = self.state();
        state.record("list_customers_by_email", Some(account));
        Ok(state
            .customers
            .iter()
            .filter(|(acct, customer)| acct == account && customer.email.as_deref() == Some(email))
            .map(|(_, customer)| customer.clone())
            .collect())
    }

    async fn create_customer(
        &self,
        account: &str,
        email: &str,
        _name: Option<&str>,
    ) -> Result<Customer, PortalError> {
        let mut state = self.state();
        state.record("create_customer", Some(account));
        let customer = Customer {
            id: state.id("cus"),
            email: Some(email.to_string()),
        };
        state.customers.push((account.to_string(), customer.clone()));
        Ok(customer)
    }

    async fn list_payment_methods(
        &self,
        account: &str,
        customer: &str,
        method_type: PaymentMethodType,
    ) -> Result<Vec<PaymentMethod>, PortalError> {
        let mut state = self.state();
        state.record("list_payment_methods", Some(account));
        Ok(state
            .methods
            .iter()
            .filter(|stored| {
                stored.account == account
                    && stored.owner.as_deref() == Some(customer)
                    && stored.method.method_type == method_type.to_str()
            })
            .map(|stored| stored.method.clone())
            .collect())
    }

    async fn retrieve_payment_method(
        &self,
        account: &str,
        payment_method: &str,
    ) -> Result<PaymentMethod, PortalError> {
        let mut state = self.state();
        state.record("retrieve_payment_method", Some(account));
        Self::find_method(&state, account, payment_method)
    }

    async fn attach_payment_method(
        &self,
        account: &str,
        payment_method: &str,
        customer: &str,
    ) -> Result<PaymentMethod, PortalError> {
        let mut state = self.state();
        state.record("attach_payment_method", Some(account));
        if let Some(message) = state.attach_error.clone() {
            return Err(PortalError::ProviderError { message });
        }
        let stored = state
            .methods
            .iter_mut()
            .find(|stored| stored.account == account && stored.method.id == payment_method)
            .ok_or_else(|| PortalError::ProviderError {
                message: format!("No such payment method: {payment_method}"),
            })?;
        stored.owner = Some(customer.to_string());
        stored.method.customer = Some(customer.to_string());
        Ok(stored.method.clone())
    }

    async fn detach_payment_method(
        &self,
        account: &str,
        payment_method: &str,
    ) -> Result<PaymentMethod, PortalError> {
        let mut state = self.state();
        state.record("detach_payment_method", Some(account));
        let mut method = Self::find_method(&state, account, payment_method).unwrap_or(PaymentMethod {
            id: payment_method.to_string(),
            method_type: "card".to_string(),
            customer: None,
            card: None,
            au_becs_debit: None,
        });
        state
            .methods
            .retain(|stored| !(stored.account == account && stored.method.id == payment_method));
        method.customer = None;
        Ok(method)
    }

    async fn set_default_payment_method(
        &self,
        account: &str,
        customer: &str,
        _payment_method: &str,
    ) -> Result<Customer, PortalError> {
        self.state().record("set_default_payment_method", Some(account));
        Ok(Customer {
            id: customer.to_string(),
            email: None,
        })
    }

    async fn create_setup_intent(
        &self,
        account: &str,
        customer: &str,
        _method_types: &[PaymentMethodType],
    ) -> Result<SetupIntent, PortalError> {
        let mut state = self.state();
        state.record("create_setup_intent", Some(account));
        let id = state.id("seti");
        Ok(SetupIntent {
            client_secret: Some(format!("{id}_secret")),
            id,
            customer: Some(customer.to_string()),
            payment_method: None,
            status: Some("requires_payment_method".to_string()),
        })
    }

    async fn create_setup_checkout_session(
        &self,
        account: &str,
        session: &NewSetupCheckout,
    ) -> Result<CheckoutSession, PortalError> {
        let mut state = self.state();
        state.record("create_setup_checkout_session", Some(account));
        let id = state.id("cs");
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.test/{id}")),
            id,
            customer: Some(session.customer.clone()),
            customer_email: None,
            status: Some("open".to_string()),
            setup_intent: None,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        account: &str,
        session: &str,
    ) -> Result<CheckoutSession, PortalError> {
        let mut state = self.state();
        state.record("retrieve_checkout_session", Some(account));
        state
            .setup_sessions
            .iter()
            .find(|(acct, found)| acct == account && found.id == session)
            .map(|(_, found)| found.clone())
            .ok_or_else(|| PortalError::ProviderError {
                message: format!("No such checkout session: {session}"),
            })
    }

    async fn list_completed_setup_sessions(
        &self,
        account: &str,
        limit: u32,
    ) -> Result<Vec<CheckoutSession>, PortalError> {
        let mut state = self.state();
        state.record("list_completed_setup_sessions", Some(account));
        Ok(state
            .setup_sessions
            .iter()
            .filter(|(acct, _)| acct == account)
            .take(limit as usize)
            .map(|(_, session)| session.clone())
            .collect())
    }

    async fn create_product(&self, account: &str, _name: &str) -> Result<Product, PortalError> {
        let mut state = self.state();
        state.record("create_product", Some(account));
        Ok(Product { id: state.id("prod") })
    }

    async fn create_weekly_price(
        &self,
        account: &str,
        _product: &str,
        _unit_amount: i64,
        _currency: &str,
    ) -> Result<Price, PortalError> {
        let mut state = self.state();
        state.record("create_weekly_price", Some(account));
        Ok(Price { id: state.id("price") })
    }

    async fn create_invoice_item(
        &self,
        account: &str,
        _customer: &str,
        _amount: i64,
        _currency: &str,
        _description: &str,
    ) -> Result<InvoiceItem, PortalError> {
        let mut state = self.state();
        state.record("create_invoice_item", Some(account));
        Ok(InvoiceItem { id: state.id("ii") })
    }

    async fn create_subscription(
        &self,
        account: &str,
        _subscription: &NewSubscription,
    ) -> Result<Subscription, PortalError> {
        let mut state = self.state();
        state.record("create_subscription", Some(account));
        let (status, invoice_status) = match &state.flow {
            Some(flow) => (flow.created_status.clone(), flow.invoice_status.clone()),
            None => ("active".to_string(), Some("paid".to_string())),
        };
        Ok(Subscription {
            id: "sub_1".to_string(),
            status,
            latest_invoice: Some(Expandable::Object(Box::new(Invoice {
                id: "in_1".to_string(),
                status: invoice_status,
            }))),
        })
    }

    async fn retrieve_subscription(
        &self,
        account: &str,
        subscription: &str,
    ) -> Result<Subscription, PortalError> {
        let mut state = self.state();
        state.record("retrieve_subscription", Some(account));
        let status = match &state.flow {
            Some(flow) => flow.status_after_pay.clone(),
            None => "active".to_string(),
        };
        Ok(Subscription {
            id: subscription.to_string(),
            status,
            latest_invoice: Some(Expandable::Id("in_1".to_string())),
        })
    }

    async fn pay_invoice(
        &self,
        account: &str,
        invoice: &str,
        _payment_method: Option<&str>,
    ) -> Result<Invoice, PortalError> {
        self.state().record("pay_invoice", Some(account));
        Ok(Invoice {
            id: invoice.to_string(),
            status: Some("paid".to_string()),
        })
    }

    async fn list_charges(
        &self,
        account: &str,
        customer: &str,
        limit: u32,
    ) -> Result<Vec<Charge>, PortalError> {
        let mut state = self.state();
        state.record("list_charges", Some(account));
        let mut charges: Vec<Charge> = state
            .charges
            .iter()
            .filter(|(owner, _)| owner == customer)
            .map(|(_, charge)| charge.clone())
            .collect();
        charges.sort_by(|a, b| b.created.cmp(&a.created));
        charges.truncate(limit as usize);
        Ok(charges)
    }

    async fn create_refund(
        &self,
        account: &str,
        charge: &str,
        amount: i64,
    ) -> Result<Refund, PortalError> {
        let mut state = self.state();
        state.record("create_refund", Some(account));
        if let Some(message) = state.refund_error.clone() {
            return Err(PortalError::ProviderError { message });
        }
        state.refunds.push((charge.to_string(), amount));
        Ok(Refund {
            id: state.id("re"),
            amount,
            status: Some("succeeded".to_string()),
        })
    }
}

#[derive(Default)]
struct PushState {
    batches: Vec<usize>,
}

/// Push transport that reports the given tokens as unregistered.
#[derive(Clone, Default)]
pub struct FakePush {
    unconfigured: bool,
    invalid: Vec<String>,
    state: Arc<Mutex<PushState>>,
}

impl FakePush {
    pub fn with_invalid(tokens: &[&str]) -> Self {
        Self {
            invalid: tokens.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            unconfigured: true,
            ..Self::default()
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batches.clone()
    }
}

#[async_trait]
impl PushTransport for FakePush {
    fn is_configured(&self) -> bool {
        !self.unconfigured
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        _message: &PushMessage,
    ) -> Result<Vec<TokenResult>, PortalError> {
        self.state.lock().unwrap().batches.push(tokens.len());
        Ok(tokens
            .iter()
            .map(|token| {
                if self.invalid.contains(token) {
                    TokenResult::InvalidToken
                } else {
                    TokenResult::Sent
                }
            })
            .collect())
    }
}
