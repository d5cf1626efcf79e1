use crate::email::defaults::LOCATION_WELCOME;
use crate::email::templating::LegacyFixedLayout;
use crate::email::EmailRequest;
use crate::notifications::{location_merge_data, present, Notifier, TriggerOutcome};
use crate::store::models::{Location, LOCATIONS};
use log::{info, warn};

impl Notifier {
    /// Welcomes a newly created location. Falls back to the fixed welcome
    /// layout when the stored template cannot be sent.
    pub async fn on_location_created(&self, id: &str, location: &Location) -> TriggerOutcome {
        let Some(email) = present(location.email.as_deref()) else {
            warn!("Location {id} has no email address; skipping welcome email");
            return TriggerOutcome::skipped("location has no email address");
        };

        let data = location_merge_data(location)
            .with(
                "name",
                location
                    .contact_name
                    .as_deref()
                    .unwrap_or(location.name.as_str()),
            )
            .with("email", email)
            .with("portalUrl", self.portal_url());

        let mut outcome = TriggerOutcome::default();
        let sent = self
            .dispatcher
            .send(
                EmailRequest::new(email, LOCATION_WELCOME, data.clone())
                    .country(location.country.as_deref()),
            )
            .await;
        outcome.record(sent);

        if !sent {
            info!("Sending legacy welcome email for location {id}");
            let sent = self
                .dispatcher
                .send_legacy(email, LegacyFixedLayout::LocationWelcome, &data, None)
                .await;
            outcome.record_fallback(sent);
        }

        self.mark_sent(LOCATIONS, id, "confirmationEmailSentAt").await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use crate::email::defaults::seed_default_templates;
    use crate::store::db_interfaces::PortalDb;
    use crate::store::memory::MemoryDb;
    use crate::store::models::{Location, LOCATIONS};
    use crate::testing::{notifier, RecordingBackend};
    use serde_json::json;

    fn location() -> Location {
        serde_json::from_value(json!({"name": "X", "email": "a@b.com"})).unwrap()
    }

    #[tokio::test]
    async fn empty_store_falls_back_to_legacy_welcome() {
        let db = MemoryDb::new();
        db.set_document(LOCATIONS, "loc1", &json!({"name": "X", "email": "a@b.com"}))
            .await
            .unwrap();
        let backend = RecordingBackend::new();

        let outcome = notifier(&db, &backend)
            .on_location_created("loc1", &location())
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.fallback_count, 1);
        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert!(sent[0].subject.contains('X'));
        let stored = db.get_document(LOCATIONS, "loc1").await.unwrap().unwrap();
        assert!(stored["confirmationEmailSentAt"].is_string());
    }

    #[tokio::test]
    async fn seeded_template_is_used() {
        let db = MemoryDb::new();
        seed_default_templates(&db, false).await.unwrap();
        db.set_document(LOCATIONS, "loc1", &json!({})).await.unwrap();
        let backend = RecordingBackend::new();

        let outcome = notifier(&db, &backend)
            .on_location_created("loc1", &location())
            .await;

        assert_eq!(outcome.sent_count, 1);
        assert_eq!(outcome.fallback_count, 0);
        assert_eq!(backend.sent().len(), 1);
    }

    #[tokio::test]
    async fn missing_email_is_skipped() {
        let db = MemoryDb::new();
        let backend = RecordingBackend::new();
        let location: Location = serde_json::from_value(json!({"name": "X"})).unwrap();

        let outcome = notifier(&db, &backend)
            .on_location_created("loc1", &location)
            .await;

        assert!(outcome.skipped.is_some());
        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn missing_document_does_not_fail_the_trigger() {
        let db = MemoryDb::new();
        let backend = RecordingBackend::new();

        let outcome = notifier(&db, &backend)
            .on_location_created("gone", &location())
            .await;

        assert!(outcome.success);
    }
}
