use crate::payments::provider::PaymentProvider;
use crate::payments::stripe::StripeClient;
use crate::server::config::{resolve_secret, PortalConfigStripe, STRIPE_SECRET_KEY_ENV};
use log::{error, info};
use std::sync::{Arc, OnceLock};

pub enum ProviderAccess {
    Configured(Arc<dyn PaymentProvider>),
    NotConfigured,
}

/// Owns the payment provider for the life of the server. The client is
/// built the first time a payment call finds a secret key, then reused.
/// Until a key is available every call reports `NotConfigured`.
pub struct PaymentGateway {
    config: Option<PortalConfigStripe>,
    provider: OnceLock<Arc<dyn PaymentProvider>>,
}

impl PaymentGateway {
    pub fn new(config: Option<PortalConfigStripe>) -> Self {
        Self {
            config,
            provider: OnceLock::new(),
        }
    }

    /// A gateway whose provider is already chosen.
    pub fn with_provider(config: PortalConfigStripe, provider: Arc<dyn PaymentProvider>) -> Self {
        let gateway = Self::new(Some(config));
        let _ = gateway.provider.set(provider);
        gateway
    }

    pub fn config(&self) -> Option<&PortalConfigStripe> {
        self.config.as_ref()
    }

    pub fn access(&self) -> ProviderAccess {
        if let Some(provider) = self.provider.get() {
            return ProviderAccess::Configured(provider.clone());
        }
        let Some(config) = &self.config else {
            error!("No [stripe] section in the server configuration");
            return ProviderAccess::NotConfigured;
        };
        let Some(secret_key) = resolve_secret(&config.secret_key, STRIPE_SECRET_KEY_ENV) else {
            error!("No Stripe secret key configured (set {STRIPE_SECRET_KEY_ENV})");
            return ProviderAccess::NotConfigured;
        };
        let provider = self.provider.get_or_init(|| {
            info!("Initializing Stripe client");
            Arc::new(StripeClient::new(secret_key, config.api_base.as_deref()))
        });
        ProviderAccess::Configured(provider.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stripe_config, FakeProvider};

    #[test]
    fn missing_section_is_not_configured() {
        let gateway = PaymentGateway::new(None);
        assert!(matches!(gateway.access(), ProviderAccess::NotConfigured));
    }

    #[test]
    fn injected_provider_is_reused() {
        let provider: Arc<dyn PaymentProvider> = Arc::new(FakeProvider::default());
        let gateway = PaymentGateway::with_provider(stripe_config(), provider.clone());
        match gateway.access() {
            ProviderAccess::Configured(found) => assert!(Arc::ptr_eq(&found, &provider)),
            ProviderAccess::NotConfigured => panic!("expected a provider"),
        }
    }

    #[test]
    fn configured_key_builds_a_client_once() {
        let mut config = stripe_config();
        config.secret_key = Some("sk_test_123".to_string());
        let gateway = PaymentGateway::new(Some(config));
        let (ProviderAccess::Configured(first), ProviderAccess::Configured(second)) =
            (gateway.access(), gateway.access())
        else {
            panic!("expected a provider");
        };
        assert!(Arc::ptr_eq(&first, &second));
    }
}
