use crate::email::backend::{EmailAddress, EmailBackend, OutboundEmail};
use crate::email::resolver::TemplateResolver;
use crate::email::templating::{DynamicLayout, LegacyFixedLayout};
use crate::server::config::PortalConfigEmail;
use crate::store::db_interfaces::PortalDb;
use crate::templating::{render, MergeData};
use log::{error, info, warn};
use std::sync::Arc;

pub mod backend;
pub mod defaults;
pub mod resolver;
pub mod templating;

#[derive(Clone, Debug)]
pub struct EmailRequest {
    pub to: String,
    pub template_key: String,
    pub merge_data: MergeData,
    pub country: Option<String>,
    pub reply_to: Option<String>,
    pub from_name: Option<String>,
}

impl EmailRequest {
    pub fn new(to: &str, template_key: &str, merge_data: MergeData) -> Self {
        Self {
            to: to.to_string(),
            template_key: template_key.to_string(),
            merge_data,
            country: None,
            reply_to: None,
            from_name: None,
        }
    }

    pub fn country(mut self, country: Option<&str>) -> Self {
        self.country = country.map(String::from);
        self
    }

    pub fn reply_to(mut self, reply_to: Option<&str>) -> Self {
        self.reply_to = reply_to.map(String::from);
        self
    }

    pub fn from_name(mut self, from_name: Option<&str>) -> Self {
        self.from_name = from_name.map(String::from);
        self
    }
}

/// Resolves, renders, wraps, and sends one templated email. Every failure
/// is logged and reported as `false`; nothing is raised to the caller.
#[derive(Clone)]
pub struct EmailDispatcher {
    db: Box<dyn PortalDb>,
    backend: Arc<dyn EmailBackend>,
    sender: EmailAddress,
    default_reply_to: Option<String>,
    layout: DynamicLayout,
}

impl EmailDispatcher {
    pub fn new(
        db: Box<dyn PortalDb>,
        backend: Arc<dyn EmailBackend>,
        config: &PortalConfigEmail,
    ) -> Self {
        Self {
            db,
            backend,
            sender: EmailAddress {
                email: config.from_email.clone(),
                name: Some(config.from_name.clone()),
            },
            default_reply_to: config.reply_to.clone(),
            layout: DynamicLayout::from_config(config),
        }
    }

    pub fn db(&self) -> &dyn PortalDb {
        self.db.as_ref()
    }

    fn from_address(&self, from_name: Option<&str>) -> EmailAddress {
        EmailAddress {
            email: self.sender.email.clone(),
            name: from_name.map(String::from).or_else(|| self.sender.name.clone()),
        }
    }

    pub async fn send(&self, request: EmailRequest) -> bool {
        let resolver = TemplateResolver::new(self.db.as_ref());
        let Some(template) = resolver
            .resolve(&request.template_key, request.country.as_deref())
            .await
        else {
            warn!(
                "No email template {} (country {:?}); not sending to {}",
                request.template_key, request.country, request.to
            );
            return false;
        };

        let subject = template.subject.render(&request.merge_data);
        let body = template.body.render(&request.merge_data);
        let html = self.layout.wrap(
            &body,
            &render(&template.header_title, &request.merge_data),
            &render(&template.header_subtitle, &request.merge_data),
            &template.header_bg,
        );

        let email = OutboundEmail {
            to: request.to.clone(),
            from: self.from_address(request.from_name.as_deref()),
            text: subject.clone(),
            subject,
            html,
            reply_to: request.reply_to.clone().or_else(|| self.default_reply_to.clone()),
        };

        self.deliver(&email, &request.template_key).await
    }

    /// Sends one of the code-embedded templates straight through the
    /// transport, bypassing the template store.
    pub async fn send_legacy(
        &self,
        to: &str,
        layout: LegacyFixedLayout,
        merge_data: &MergeData,
        reply_to: Option<&str>,
    ) -> bool {
        let subject = layout.subject(merge_data);
        let email = OutboundEmail {
            to: to.to_string(),
            from: self.from_address(None),
            text: subject.clone(),
            subject,
            html: layout.html(merge_data),
            reply_to: reply_to.map(String::from).or_else(|| self.default_reply_to.clone()),
        };
        self.deliver(&email, &format!("legacy {layout:?}")).await
    }

    async fn deliver(&self, email: &OutboundEmail, label: &str) -> bool {
        if !self.backend.is_configured() {
            error!(
                "No mail transport credential configured; dropping {label} email to {}",
                email.to
            );
            return false;
        }

        match self.backend.send_email(email).await {
            Ok(()) => {
                info!("Sent {label} email to {}", email.to);
                true
            }
            Err(err) => {
                error!("Failed to send {label} email to {}: {err}", email.to);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryDb;
    use crate::store::models::EMAIL_TEMPLATES;
    use crate::testing::{email_config, RecordingBackend};
    use serde_json::json;

    async fn dispatcher_with(backend: RecordingBackend) -> (EmailDispatcher, MemoryDb) {
        let db = MemoryDb::new();
        db.set_document(
            EMAIL_TEMPLATES,
            "customer_assessment_booked",
            &json!({
                "subject": "Booked: {{bookingReference}}",
                "body": "<p>Hi {{customerName}}, {{unknownTag}}</p>",
                "headerTitle": "See you {{bookingDate}}",
                "headerSubtitle": "",
                "headerBg": ""
            }),
        )
        .await
        .unwrap();
        let dispatcher = EmailDispatcher::new(Box::new(db.clone()), Arc::new(backend), &email_config());
        (dispatcher, db)
    }

    #[tokio::test]
    async fn renders_and_sends() {
        let backend = RecordingBackend::new();
        let (dispatcher, _) = dispatcher_with(backend.clone()).await;
        let data = MergeData::new()
            .with("bookingReference", "ABCDEFGH")
            .with("customerName", "Alice")
            .with("bookingDate", "Friday");

        let sent = dispatcher
            .send(
                EmailRequest::new("alice@example.com", "customer_assessment_booked", data)
                    .reply_to(Some("bondi@example.org"))
                    .from_name(Some("Bondi")),
            )
            .await;

        assert!(sent);
        let emails = backend.sent();
        assert_eq!(emails.len(), 1);
        let email = &emails[0];
        assert_eq!(email.subject, "Booked: ABCDEFGH");
        assert_eq!(email.text, email.subject);
        assert!(email.html.contains("<p>Hi Alice, {{unknownTag}}</p>"));
        assert!(email.html.contains("<h1>See you Friday</h1>"));
        assert_eq!(email.from.name.as_deref(), Some("Bondi"));
        assert_eq!(email.reply_to.as_deref(), Some("bondi@example.org"));
    }

    #[tokio::test]
    async fn missing_template_returns_false_without_sending() {
        let backend = RecordingBackend::new();
        let (dispatcher, _) = dispatcher_with(backend.clone()).await;
        let sent = dispatcher
            .send(EmailRequest::new("a@b.com", "no_such_template", MergeData::new()))
            .await;
        assert!(!sent);
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_returns_false_without_sending() {
        let backend = RecordingBackend::unconfigured();
        let (dispatcher, _) = dispatcher_with(backend.clone()).await;
        let sent = dispatcher
            .send(EmailRequest::new("a@b.com", "customer_assessment_booked", MergeData::new()))
            .await;
        assert!(!sent);
        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn transport_failure_returns_false() {
        let backend = RecordingBackend::failing();
        let (dispatcher, _) = dispatcher_with(backend.clone()).await;
        let sent = dispatcher
            .send(EmailRequest::new("a@b.com", "customer_assessment_booked", MergeData::new()))
            .await;
        assert!(!sent);
        assert_eq!(backend.attempts(), 1);
    }

    #[tokio::test]
    async fn legacy_send_bypasses_store() {
        let backend = RecordingBackend::new();
        let dispatcher =
            EmailDispatcher::new(Box::new(MemoryDb::new()), Arc::new(backend.clone()), &email_config());
        let data = MergeData::new().with("locationName", "X");
        assert!(
            dispatcher
                .send_legacy("a@b.com", LegacyFixedLayout::LocationWelcome, &data, None)
                .await
        );
        assert!(backend.sent()[0].subject.contains('X'));
    }
}
