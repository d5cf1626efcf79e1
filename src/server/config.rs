use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

use crate::error::PortalError;

pub const SENDGRID_API_KEY_ENV: &str = "SENDGRID_API_KEY";
pub const STRIPE_SECRET_KEY_ENV: &str = "STRIPE_SECRET_KEY";
pub const FCM_ACCESS_TOKEN_ENV: &str = "FCM_ACCESS_TOKEN";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PortalConfigCors {
    pub origin: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PortalConfigSendGrid {
    // Falls back to SENDGRID_API_KEY, read when a message is sent.
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PortalConfigEmailSmtp {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PortalConfigEmailFile {
    pub path: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PortalConfigEmail {
    pub from_email: String,
    pub from_name: String,
    pub reply_to: Option<String>,
    /// CSS background used when a template has no header background.
    pub brand_gradient: Option<String>,
    pub sendgrid: Option<PortalConfigSendGrid>,
    pub smtp: Option<PortalConfigEmailSmtp>,
    pub file: Option<PortalConfigEmailFile>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PortalConfigStripe {
    // Falls back to STRIPE_SECRET_KEY, read on first payment call.
    pub secret_key: Option<String>,
    pub api_base: Option<String>,
    pub currency: String,
    pub onboarding_refresh_url: Url,
    pub onboarding_return_url: Url,
    pub checkout_success_url: Url,
    pub checkout_cancel_url: Url,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PortalConfigPush {
    pub project_id: String,
    // Falls back to FCM_ACCESS_TOKEN, read on each broadcast.
    pub access_token: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PortalConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub portal_url: Option<Url>,
    pub cors: PortalConfigCors,
    pub email: PortalConfigEmail,
    pub stripe: Option<PortalConfigStripe>,
    pub push: Option<PortalConfigPush>,
}

impl PortalConfig {
    pub fn portal_url(&self) -> String {
        self.portal_url
            .as_ref()
            .map(|url| url.as_str().trim_end_matches('/').to_string())
            .unwrap_or_default()
    }
}

/// Reads a secret from the config value, or from the environment when the
/// config leaves it out. Blank values count as absent.
pub fn resolve_secret(configured: &Option<String>, env_var: &str) -> Option<String> {
    configured
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .map(|secret| secret.trim().to_string())
        .filter(|secret| !secret.is_empty())
}

pub fn config_to_toml(portal_config: PortalConfig) -> Result<String, PortalError> {
    Ok(toml::to_string(&portal_config)?)
}

pub fn default_server_config() -> Result<PortalConfig, PortalError> {
    let url = |s: &str| {
        Url::parse(s).map_err(|err| PortalError::ConfigurationError {
            message: err.to_string(),
        })
    };
    Ok(PortalConfig {
        host: "0.0.0.0".to_string(),
        port: 8080,
        database_url: "sqlite://portal_data/portal.sqlite".to_string(),
        portal_url: Some(url("http://localhost:3000")?),
        cors: PortalConfigCors {
            origin: "*".to_string(),
        },
        email: PortalConfigEmail {
            from_email: "noreply@example.org".to_string(),
            from_name: "Franchise Portal".to_string(),
            reply_to: None,
            brand_gradient: None,
            sendgrid: Some(PortalConfigSendGrid {
                api_key: None,
                api_base: None,
            }),
            smtp: None,
            file: None,
        },
        stripe: Some(PortalConfigStripe {
            secret_key: None,
            api_base: None,
            currency: "aud".to_string(),
            onboarding_refresh_url: url("http://localhost:3000/payments/refresh")?,
            onboarding_return_url: url("http://localhost:3000/payments/complete")?,
            checkout_success_url: url("http://localhost:3000/checkout/success")?,
            checkout_cancel_url: url("http://localhost:3000/checkout/cancel")?,
        }),
        push: None,
    })
}

pub fn read_config(config_path: &Path) -> Result<PortalConfig, PortalError> {
    let contents =
        fs::read_to_string(config_path).map_err(|err| PortalError::ConfigurationError {
            message: format!("{}: {err}", config_path.display()),
        })?;
    Ok(toml::from_str(&contents)?)
}
