use crate::email::defaults::{SESSION_CANCELLED, SESSION_RESCHEDULED};
use crate::email::EmailRequest;
use crate::formatting::{format_long_date, format_time_12h, normalize_email};
use crate::notifications::{location_merge_data, present, NotificationEvent, Notifier, TriggerOutcome};
use crate::store::models::{Session, SessionStatus, SESSIONS};
use crate::templating::MergeData;
use log::warn;
use std::collections::BTreeSet;

pub(crate) fn classify_change(
    id: &str,
    previous: Session,
    session: Session,
) -> Option<NotificationEvent> {
    let id = id.to_string();
    match (previous.status, session.status) {
        (SessionStatus::Scheduled, SessionStatus::Cancelled) => {
            Some(NotificationEvent::SessionCancelled { id, session })
        }
        (_, SessionStatus::Scheduled)
            if previous.date != session.date || previous.time != session.time =>
        {
            Some(NotificationEvent::SessionRescheduled {
                id,
                previous,
                session,
            })
        }
        _ => None,
    }
}

fn slot(session: &Session) -> (String, String) {
    (
        format_long_date(session.date.as_deref().unwrap_or_default()),
        format_time_12h(session.time.as_deref().unwrap_or_default()),
    )
}

impl Notifier {
    /// Sends `template_key` once to each attendee address, first name wins
    /// when an address is listed twice.
    async fn notify_attendees(
        &self,
        id: &str,
        session: &Session,
        template_key: &str,
        data: MergeData,
        sent_at_field: &str,
    ) -> TriggerOutcome {
        let location = self.load_location(session.location_id.as_deref()).await;
        let mut base = location.as_ref().map(location_merge_data).unwrap_or_default();
        base.extend(&data);
        base.insert_opt("className", session.class_name.as_deref());

        let reply_to = location.as_ref().and_then(|l| present(l.email.as_deref()));
        let from_name = location
            .as_ref()
            .map(|l| l.name.as_str())
            .filter(|n| !n.is_empty());
        let country = location.as_ref().and_then(|l| l.country.as_deref());

        let mut seen = BTreeSet::new();
        let mut outcome = TriggerOutcome::default();
        for attendee in &session.attendees {
            let Some(email) = present(attendee.email.as_deref()).map(normalize_email) else {
                continue;
            };
            if !seen.insert(email.clone()) {
                continue;
            }
            let mut data = base.clone();
            data.insert_opt("name", attendee.name.as_deref());
            data.insert("email", email.as_str());
            let sent = self
                .dispatcher
                .send(
                    EmailRequest::new(&email, template_key, data)
                        .country(country)
                        .reply_to(reply_to)
                        .from_name(from_name),
                )
                .await;
            outcome.record(sent);
        }

        if outcome.attempted == 0 {
            warn!("Session {id} has no attendee email addresses");
            return TriggerOutcome::skipped("session has no attendees with email addresses");
        }
        self.mark_sent(SESSIONS, id, sent_at_field).await;
        outcome
    }

    pub async fn on_session_rescheduled(
        &self,
        id: &str,
        previous: &Session,
        session: &Session,
    ) -> TriggerOutcome {
        let (date, time) = slot(session);
        let (previous_date, previous_time) = slot(previous);
        let data = MergeData::new()
            .with("sessionDate", date)
            .with("sessionTime", time)
            .with("previousDate", previous_date)
            .with("previousTime", previous_time);
        self.notify_attendees(id, session, SESSION_RESCHEDULED, data, "rescheduledEmailSentAt")
            .await
    }

    pub async fn on_session_cancelled(&self, id: &str, session: &Session) -> TriggerOutcome {
        let (date, time) = slot(session);
        let data = MergeData::new()
            .with("sessionDate", date)
            .with("sessionTime", time);
        self.notify_attendees(id, session, SESSION_CANCELLED, data, "cancelledEmailSentAt")
            .await
    }
}
