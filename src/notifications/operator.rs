use crate::email::defaults::sample_merge_data;
use crate::email::resolver::TemplateResolver;
use crate::email::EmailRequest;
use crate::error::PortalError;
use crate::notifications::booking::booking_merge_data;
use crate::notifications::{present, Notifier, TriggerOutcome};
use crate::store::models::{Booking, Invite, BOOKINGS, INVITES};
use crate::store::require_record;
use log::info;

fn not_sent(what: &str) -> PortalError {
    PortalError::FailedPrecondition {
        message: format!("The {what} could not be sent; check the mail transport configuration"),
    }
}

/// Operator-invoked sends. Unlike the event triggers these report problems
/// to the caller.
impl Notifier {
    pub async fn resend_invite(&self, invite_id: &str) -> Result<TriggerOutcome, PortalError> {
        let invite: Invite = require_record(self.db(), INVITES, invite_id).await?;
        let request = self
            .invite_email(invite_id, &invite)
            .await
            .ok_or_else(|| {
                PortalError::invalid_argument(format!("Invite {invite_id} has no email address"))
            })?;

        let mut outcome = TriggerOutcome::default();
        outcome.record(self.dispatcher.send(request).await);
        if !outcome.success {
            return Err(not_sent("invite email"));
        }
        self.mark_sent(INVITES, invite_id, "inviteEmailSentAt").await;
        info!("Resent invite {invite_id}");
        Ok(outcome)
    }

    /// Customer-facing confirmation only; the partner is not notified again.
    pub async fn resend_booking_confirmation(
        &self,
        booking_id: &str,
    ) -> Result<TriggerOutcome, PortalError> {
        let booking: Booking = require_record(self.db(), BOOKINGS, booking_id).await?;
        let location = self.load_location(booking.location_id.as_deref()).await;
        let data = booking_merge_data(booking_id, &booking, location.as_ref());

        let mut outcome = TriggerOutcome::default();
        self.send_booking_confirmations(&booking, location.as_ref(), &data, &mut outcome)
            .await;
        if outcome.attempted == 0 {
            return Err(PortalError::invalid_argument(format!(
                "Booking {booking_id} has no customer or parent email address"
            )));
        }
        if !outcome.success {
            return Err(not_sent("booking confirmation"));
        }
        self.mark_sent(BOOKINGS, booking_id, "confirmationEmailSentAt")
            .await;
        info!("Resent booking confirmation {booking_id}");
        Ok(outcome)
    }

    /// Renders `template_key` with sample merge data, overlaid with
    /// `overrides`, and sends it to `to`.
    pub async fn send_test_email(
        &self,
        template_key: &str,
        to: &str,
        country: Option<&str>,
        overrides: &serde_json::Value,
    ) -> Result<(), PortalError> {
        let template_key = template_key.trim();
        if template_key.is_empty() {
            return Err(PortalError::invalid_argument("A template key is required"));
        }
        let to = present(Some(to))
            .filter(|to| to.contains('@'))
            .ok_or_else(|| PortalError::invalid_argument("A valid recipient email is required"))?;

        if TemplateResolver::new(self.db())
            .resolve(template_key, country)
            .await
            .is_none()
        {
            return Err(PortalError::not_found(format!(
                "No email template {template_key}"
            )));
        }

        let request = EmailRequest::new(to, template_key, sample_merge_data(overrides)).country(country);
        if self.dispatcher.send(request).await {
            Ok(())
        } else {
            Err(not_sent("test email"))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::email::defaults::{seed_default_templates, LOCATION_WELCOME};
    use crate::store::db_interfaces::PortalDb;
    use crate::store::memory::MemoryDb;
    use crate::store::models::{BOOKINGS, INVITES};
    use crate::testing::{notifier, RecordingBackend};
    use serde_json::json;

    #[tokio::test]
    async fn resend_invite_reports_missing_and_undeliverable() {
        let db = MemoryDb::new();
        let backend = RecordingBackend::new();
        let err = notifier(&db, &backend).resend_invite("nope").await.unwrap_err();
        assert_eq!(err.category(), "not-found");

        db.set_document(INVITES, "inv1", &json!({"name": "Jo"}))
            .await
            .unwrap();
        let err = notifier(&db, &backend).resend_invite("inv1").await.unwrap_err();
        assert_eq!(err.category(), "invalid-argument");

        db.set_document(INVITES, "inv2", &json!({"email": "jo@x.com"}))
            .await
            .unwrap();
        // No templates seeded, so the dispatcher reports false.
        let err = notifier(&db, &backend).resend_invite("inv2").await.unwrap_err();
        assert_eq!(err.category(), "failed-precondition");
    }

    #[tokio::test]
    async fn resend_booking_confirmation_skips_partner() {
        let db = MemoryDb::new();
        seed_default_templates(&db, false).await.unwrap();
        db.set_document(
            BOOKINGS,
            "b1",
            &json!({"customerEmail": "c@x.com", "customerName": "Cat"}),
        )
        .await
        .unwrap();
        let backend = RecordingBackend::new();

        let outcome = notifier(&db, &backend)
            .resend_booking_confirmation("b1")
            .await
            .unwrap();

        assert_eq!(outcome.sent_count, 1);
        assert_eq!(backend.sent()[0].to, "c@x.com");
        let stored = db.get_document(BOOKINGS, "b1").await.unwrap().unwrap();
        assert!(stored["confirmationEmailSentAt"].is_string());
    }

    #[tokio::test]
    async fn test_send_uses_sample_data_and_year_override() {
        let db = MemoryDb::new();
        db.set_document(
            crate::store::models::EMAIL_TEMPLATES,
            LOCATION_WELCOME,
            &json!({"subject": "Hi {{name}} {{year}}", "body": "<p>{{locationName}}</p>"}),
        )
        .await
        .unwrap();
        let backend = RecordingBackend::new();

        notifier(&db, &backend)
            .send_test_email(LOCATION_WELCOME, "op@x.com", None, &json!({"year": "2030"}))
            .await
            .unwrap();

        let sent = backend.sent();
        assert_eq!(sent[0].subject, "Hi Sam Sample 2030");
        assert!(sent[0].html.contains("<p>Sample Location</p>"));
    }

    #[tokio::test]
    async fn test_send_validates_input() {
        let db = MemoryDb::new();
        let backend = RecordingBackend::new();
        let notifier = notifier(&db, &backend);

        let err = notifier
            .send_test_email(LOCATION_WELCOME, "not-an-email", None, &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "invalid-argument");

        let err = notifier
            .send_test_email(LOCATION_WELCOME, "op@x.com", None, &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "not-found");
    }
}
