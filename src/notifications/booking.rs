use crate::email::defaults::{
    CUSTOMER_ASSESSMENT_BOOKED, PARTNER_BOOKING_CONFIRMATION, PARTNER_NEW_LEAD,
};
use crate::email::templating::LegacyFixedLayout;
use crate::email::EmailRequest;
use crate::formatting::{booking_reference, format_long_date, format_time_12h, unique_recipients};
use crate::notifications::{json_text, location_merge_data, present, Notifier, TriggerOutcome};
use crate::store::models::{Booking, Location, BOOKINGS};
use crate::templating::MergeData;
use log::{info, warn};

pub(crate) fn booking_merge_data(id: &str, booking: &Booking, location: Option<&Location>) -> MergeData {
    let mut data = location.map(location_merge_data).unwrap_or_default();
    let customer_name = booking
        .customer_name
        .as_deref()
        .or(booking.parent_name.as_deref())
        .unwrap_or_default();
    data.insert("name", customer_name);
    data.insert("customerName", customer_name);
    data.insert_opt("customerEmail", booking.customer_email.as_deref());
    data.insert_opt("customerPhone", booking.customer_phone.as_deref());
    data.insert_opt("parentName", booking.parent_name.as_deref());
    data.insert_opt("parentEmail", booking.parent_email.as_deref());
    data.insert_opt("childName", booking.child_name.as_deref());
    data.insert("childAge", json_text(&booking.child_age));
    data.insert("bookingReference", booking_reference(id));
    data.insert(
        "bookingDate",
        format_long_date(booking.date.as_deref().unwrap_or_default()),
    );
    data.insert(
        "bookingTime",
        format_time_12h(booking.time.as_deref().unwrap_or_default()),
    );
    data.insert_opt("bookingType", booking.booking_type.as_deref());
    data.insert_opt("notes", booking.notes.as_deref());
    data
}

impl Notifier {
    /// One dynamic attempt per unique customer address, each followed by a
    /// legacy attempt if it failed.
    pub(crate) async fn send_booking_confirmations(
        &self,
        booking: &Booking,
        location: Option<&Location>,
        data: &MergeData,
        outcome: &mut TriggerOutcome,
    ) {
        let recipients = unique_recipients([
            booking.customer_email.as_deref(),
            booking.parent_email.as_deref(),
        ]);
        let reply_to = location.and_then(|l| present(l.email.as_deref()));
        let from_name = location.map(|l| l.name.as_str()).filter(|n| !n.is_empty());
        let country = location.and_then(|l| l.country.as_deref());

        for recipient in &recipients {
            let sent = self
                .dispatcher
                .send(
                    EmailRequest::new(recipient, CUSTOMER_ASSESSMENT_BOOKED, data.clone())
                        .country(country)
                        .reply_to(reply_to)
                        .from_name(from_name),
                )
                .await;
            outcome.record(sent);
            if !sent {
                info!("Sending legacy booking confirmation to {recipient}");
                let sent = self
                    .dispatcher
                    .send_legacy(
                        recipient,
                        LegacyFixedLayout::BookingConfirmation,
                        data,
                        reply_to,
                    )
                    .await;
                outcome.record_fallback(sent);
            }
        }
    }

    pub async fn on_booking_created(&self, id: &str, booking: &Booking) -> TriggerOutcome {
        let location = self.load_location(booking.location_id.as_deref()).await;
        let data = booking_merge_data(id, booking, location.as_ref());
        let mut outcome = TriggerOutcome::default();

        self.send_booking_confirmations(booking, location.as_ref(), &data, &mut outcome)
            .await;
        if outcome.attempted > 0 {
            self.mark_sent(BOOKINGS, id, "confirmationEmailSentAt").await;
        } else {
            warn!("Booking {id} has no customer or parent email address");
        }

        let partner_email = location.as_ref().and_then(|l| present(l.email.as_deref()));
        match partner_email {
            Some(partner_email) => {
                let country = location.as_ref().and_then(|l| l.country.as_deref());
                let reply_to = data.get("customerEmail");
                let reply_to = present(Some(reply_to));
                // Each partner email is attempted whatever happened to the other.
                for template_key in [PARTNER_BOOKING_CONFIRMATION, PARTNER_NEW_LEAD] {
                    let sent = self
                        .dispatcher
                        .send(
                            EmailRequest::new(partner_email, template_key, data.clone())
                                .country(country)
                                .reply_to(reply_to),
                        )
                        .await;
                    outcome.record(sent);
                }
                self.mark_sent(BOOKINGS, id, "partnerEmailSentAt").await;
            }
            None => warn!("Booking {id} has no location email; partner not notified"),
        }

        if outcome.attempted == 0 {
            outcome.skipped = Some("booking has no recipients".to_string());
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::defaults::seed_default_templates;
    use crate::store::db_interfaces::PortalDb;
    use crate::store::memory::MemoryDb;
    use crate::store::models::LOCATIONS;
    use crate::testing::{notifier, RecordingBackend};
    use serde_json::json;

    async fn seeded_db() -> MemoryDb {
        let db = MemoryDb::new();
        seed_default_templates(&db, false).await.unwrap();
        db.set_document(
            LOCATIONS,
            "loc1",
            &json!({"name": "Bondi", "email": "bondi@example.org", "phone": "02 9000 0000"}),
        )
        .await
        .unwrap();
        db
    }

    fn booking(doc: serde_json::Value) -> Booking {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn merge_data_formats_the_slot() {
        let booking = booking(json!({
            "customerName": "Alice",
            "childAge": 7,
            "date": "2026-10-14",
            "time": "14:45"
        }));
        let data = booking_merge_data("abcdefgh-extra-chars", &booking, None);
        assert_eq!(data.get("bookingReference"), "ABCDEFGH");
        assert_eq!(data.get("bookingDate"), "Wednesday, 14 October 2026");
        assert_eq!(data.get("bookingTime"), "2:45 PM");
        assert_eq!(data.get("childAge"), "7");
        assert_eq!(data.get("name"), "Alice");
    }

    #[tokio::test]
    async fn matching_customer_and_parent_get_one_email() {
        let db = seeded_db().await;
        let doc = json!({
            "locationId": "loc1",
            "customerName": "Alice",
            "customerEmail": "A@x.com",
            "parentEmail": " a@x.com ",
            "date": "2026-10-14",
            "time": "09:05"
        });
        db.set_document(BOOKINGS, "abcdefgh-1", &doc).await.unwrap();
        let backend = RecordingBackend::new();

        let outcome = notifier(&db, &backend)
            .on_booking_created("abcdefgh-1", &booking(doc))
            .await;

        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.sent_count, 3);
        assert!(outcome.success);
        let sent = backend.sent();
        let customer: Vec<_> = sent.iter().filter(|e| e.to == "a@x.com").collect();
        assert_eq!(customer.len(), 1);
        assert_eq!(customer[0].reply_to.as_deref(), Some("bondi@example.org"));
        assert_eq!(
            sent.iter().filter(|e| e.to == "bondi@example.org").count(),
            2
        );
        let stored = db.get_document(BOOKINGS, "abcdefgh-1").await.unwrap().unwrap();
        assert!(stored["confirmationEmailSentAt"].is_string());
        assert!(stored["partnerEmailSentAt"].is_string());
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_block_the_rest() {
        let db = seeded_db().await;
        let doc = json!({
            "locationId": "loc1",
            "customerEmail": "customer@x.com",
            "parentEmail": "parent@x.com"
        });
        let backend = RecordingBackend::failing_for(&["customer@x.com"]);

        let outcome = notifier(&db, &backend)
            .on_booking_created("b1", &booking(doc))
            .await;

        // Dynamic and legacy both fail for the customer.
        assert_eq!(outcome.attempted, 4);
        assert_eq!(outcome.sent_count, 3);
        assert!(outcome.success);
        assert_eq!(backend.attempts(), 5);
    }

    #[tokio::test]
    async fn empty_template_store_uses_legacy_for_customers_only() {
        let db = MemoryDb::new();
        db.set_document(LOCATIONS, "loc1", &json!({"name": "Bondi", "email": "bondi@example.org"}))
            .await
            .unwrap();
        let doc = json!({"locationId": "loc1", "customerEmail": "c@x.com"});
        let backend = RecordingBackend::new();

        let outcome = notifier(&db, &backend)
            .on_booking_created("zyxwvuts", &booking(doc))
            .await;

        assert_eq!(outcome.fallback_count, 1);
        assert_eq!(outcome.sent_count, 1);
        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("ZYXWVUTS"));
    }

    #[tokio::test]
    async fn no_recipients_is_skipped() {
        let db = MemoryDb::new();
        let backend = RecordingBackend::new();
        let outcome = notifier(&db, &backend)
            .on_booking_created("b1", &Booking::default())
            .await;
        assert!(!outcome.success);
        assert!(outcome.skipped.is_some());
    }
}
