use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::error::PortalError;
use crate::server::config::{
    resolve_secret, PortalConfigEmail, PortalConfigEmailFile, PortalConfigEmailSmtp,
    PortalConfigSendGrid, SENDGRID_API_KEY_ENV,
};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmailAddress {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub from: EmailAddress,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub reply_to: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct EmailEntry {
    pub from: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub date: String,
}

/// The mail transport. Credentials are checked at call time because they
/// may only be provisioned once the process is already running.
#[async_trait]
pub trait EmailBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool;
    async fn send_email(&self, email: &OutboundEmail) -> Result<(), PortalError>;
}

pub struct SendGridBackend {
    config: PortalConfigSendGrid,
    client: reqwest::Client,
}

impl SendGridBackend {
    pub fn new(config: PortalConfigSendGrid) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> Option<String> {
        resolve_secret(&self.config.api_key, SENDGRID_API_KEY_ENV)
    }

    fn payload(email: &OutboundEmail) -> serde_json::Value {
        let mut from = serde_json::json!({ "email": email.from.email });
        if let Some(name) = &email.from.name {
            from["name"] = serde_json::Value::String(name.clone());
        }
        let mut payload = serde_json::json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": from,
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html },
            ],
        });
        if let Some(reply_to) = &email.reply_to {
            payload["reply_to"] = serde_json::json!({ "email": reply_to });
        }
        payload
    }
}

#[async_trait]
impl EmailBackend for SendGridBackend {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    async fn send_email(&self, email: &OutboundEmail) -> Result<(), PortalError> {
        let api_key = self.api_key().ok_or_else(|| PortalError::ConfigurationError {
            message: format!("No SendGrid API key configured (set {SENDGRID_API_KEY_ENV})"),
        })?;
        let base = self
            .config
            .api_base
            .as_deref()
            .unwrap_or(SENDGRID_API_BASE)
            .trim_end_matches('/');

        let response = self
            .client
            .post(format!("{base}/v3/mail/send"))
            .bearer_auth(api_key)
            .json(&Self::payload(email))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("SendGrid accepted message to {} ({})", email.to, status);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(PortalError::TransportError {
                message: format!("SendGrid responded {status}: {body}"),
            })
        }
    }
}

pub struct SmtpBackend {
    config: PortalConfigEmailSmtp,
}

impl SmtpBackend {
    pub fn new(config: PortalConfigEmailSmtp) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmailBackend for SmtpBackend {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn is_configured(&self) -> bool {
        !self.config.smtp_host.is_empty()
    }

    async fn send_email(&self, email: &OutboundEmail) -> Result<(), PortalError> {
        let from = Mailbox::new(email.from.name.clone(), email.from.email.parse()?);
        let mut builder = Message::builder()
            .from(from)
            .to(email.to.parse()?)
            .subject(email.subject.as_str());
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(reply_to.parse()?);
        }
        let message = builder.multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))?;

        let creds = Credentials::new(
            self.config.smtp_username.to_owned(),
            self.config.smtp_password.to_owned(),
        );

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
                .map_err(|e| PortalError::ConfigurationError {
                    message: format!("Invalid SMTP relay {}: {e:?}", self.config.smtp_host),
                })?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build();

        if let Err(e) = mailer.send(message).await {
            return Err(PortalError::TransportError {
                message: format!("Could not send email: {e:?}"),
            });
        }

        Ok(())
    }
}

pub struct FileBackend {
    config: PortalConfigEmailFile,
}

impl FileBackend {
    pub fn new(config: PortalConfigEmailFile) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmailBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn is_configured(&self) -> bool {
        !self.config.path.is_empty()
    }

    async fn send_email(&self, email: &OutboundEmail) -> Result<(), PortalError> {
        let from = match &email.from.name {
            Some(name) => format!("{name} <{}>", email.from.email),
            None => email.from.email.clone(),
        };
        let email_entry = EmailEntry {
            from,
            to: email.to.clone(),
            reply_to: email.reply_to.clone(),
            subject: email.subject.clone(),
            text: email.text.clone(),
            html: email.html.clone(),
            date: chrono::Utc::now().to_rfc2822(),
        };

        let json_line = serde_json::to_string(&email_entry)? + "\n";

        if let Some(parent) = std::path::Path::new(&self.config.path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)
            .await?;

        file.write_all(json_line.as_bytes()).await?;
        // tokio hands writes to a blocking task; flush before the handle drops.
        file.flush().await?;

        Ok(())
    }
}

pub struct MultiBackend {
    backends: Vec<Box<dyn EmailBackend>>,
}

impl MultiBackend {
    pub fn new(backends: Vec<Box<dyn EmailBackend>>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl EmailBackend for MultiBackend {
    fn name(&self) -> &'static str {
        "multi"
    }

    fn is_configured(&self) -> bool {
        self.backends.iter().any(|b| b.is_configured())
    }

    async fn send_email(&self, email: &OutboundEmail) -> Result<(), PortalError> {
        let mut errors = Vec::new();
        let mut attempted = 0;

        for backend in self.backends.iter().filter(|b| b.is_configured()) {
            attempted += 1;
            if let Err(e) = backend.send_email(email).await {
                warn!("Email backend {} failed: {}", backend.name(), e);
                errors.push(e.to_string());
            }
        }

        // Return error only if ALL backends fail
        if attempted == 0 {
            return Err(PortalError::ConfigurationError {
                message: "No email backend is configured".to_string(),
            });
        }
        if errors.len() == attempted {
            return Err(PortalError::TransportError {
                message: format!("All email backends failed: {errors:?}"),
            });
        }

        Ok(())
    }
}

pub fn create_email_backend(config: &PortalConfigEmail) -> Arc<dyn EmailBackend> {
    let mut backends: Vec<Box<dyn EmailBackend>> = Vec::new();

    if let Some(sendgrid_config) = &config.sendgrid {
        backends.push(Box::new(SendGridBackend::new(sendgrid_config.clone())));
    }

    if let Some(smtp_config) = &config.smtp {
        backends.push(Box::new(SmtpBackend::new(smtp_config.clone())));
    }

    if let Some(file_config) = &config.file {
        backends.push(Box::new(FileBackend::new(file_config.clone())));
    }

    Arc::new(MultiBackend::new(backends))
}
