use crate::email::EmailDispatcher;
use crate::error::PortalError;
use crate::store::db_interfaces::PortalDb;
use crate::store::get_record;
use crate::store::models::{
    Booking, Enquiry, Invite, Location, Session, BOOKINGS, ENQUIRIES, INVITES, LOCATIONS, SESSIONS,
};
use crate::templating::MergeData;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub mod booking;
pub mod enquiry;
pub mod invite;
pub mod location;
pub mod operator;
pub mod session;

/// A document change that may produce notification emails.
#[derive(Clone, Debug)]
pub enum NotificationEvent {
    LocationCreated {
        id: String,
        location: Location,
    },
    InviteCreated {
        id: String,
        invite: Invite,
    },
    BookingCreated {
        id: String,
        booking: Booking,
    },
    EnquiryCreated {
        id: String,
        enquiry: Enquiry,
    },
    SessionRescheduled {
        id: String,
        previous: Session,
        session: Session,
    },
    SessionCancelled {
        id: String,
        session: Session,
    },
}

impl NotificationEvent {
    pub fn created(
        collection: &str,
        id: &str,
        document: serde_json::Value,
    ) -> Result<NotificationEvent, PortalError> {
        let id = id.to_string();
        Ok(match collection {
            LOCATIONS => NotificationEvent::LocationCreated {
                id,
                location: serde_json::from_value(document)?,
            },
            INVITES => NotificationEvent::InviteCreated {
                id,
                invite: serde_json::from_value(document)?,
            },
            BOOKINGS => NotificationEvent::BookingCreated {
                id,
                booking: serde_json::from_value(document)?,
            },
            ENQUIRIES => NotificationEvent::EnquiryCreated {
                id,
                enquiry: serde_json::from_value(document)?,
            },
            _ => {
                return Err(PortalError::invalid_argument(format!(
                    "No notifications are sent when a {collection} document is created"
                )))
            }
        })
    }

    /// Only session updates notify anyone, and only when the session moved
    /// or was cancelled.
    pub fn updated(
        collection: &str,
        id: &str,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Result<Option<NotificationEvent>, PortalError> {
        if collection != SESSIONS {
            return Err(PortalError::invalid_argument(format!(
                "No notifications are sent when a {collection} document is updated"
            )));
        }
        let previous: Session = serde_json::from_value(before)?;
        let session: Session = serde_json::from_value(after)?;
        Ok(session::classify_change(id, previous, session))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::LocationCreated { .. } => "location_created",
            NotificationEvent::InviteCreated { .. } => "invite_created",
            NotificationEvent::BookingCreated { .. } => "booking_created",
            NotificationEvent::EnquiryCreated { .. } => "enquiry_created",
            NotificationEvent::SessionRescheduled { .. } => "session_rescheduled",
            NotificationEvent::SessionCancelled { .. } => "session_cancelled",
        }
    }
}

/// What a trigger did. Triggers report through this and never fail.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOutcome {
    pub attempted: usize,
    pub sent_count: usize,
    /// Deliveries that went out through a legacy fixed layout. Included in
    /// `sent_count`.
    pub fallback_count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl TriggerOutcome {
    pub fn skipped(reason: impl Into<String>) -> TriggerOutcome {
        TriggerOutcome {
            skipped: Some(reason.into()),
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, sent: bool) {
        self.attempted += 1;
        if sent {
            self.sent_count += 1;
        }
        self.success = self.sent_count > 0;
    }

    /// A legacy attempt made after the dynamic attempt for the same
    /// recipient failed.
    pub(crate) fn record_fallback(&mut self, sent: bool) {
        if sent {
            self.sent_count += 1;
            self.fallback_count += 1;
        }
        self.success = self.sent_count > 0;
    }
}

#[derive(Clone)]
pub struct Notifier {
    dispatcher: EmailDispatcher,
    portal_url: String,
}

impl Notifier {
    pub fn new(dispatcher: EmailDispatcher, portal_url: &str) -> Self {
        Self {
            dispatcher,
            portal_url: portal_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dispatcher(&self) -> &EmailDispatcher {
        &self.dispatcher
    }

    pub fn portal_url(&self) -> &str {
        &self.portal_url
    }

    fn db(&self) -> &dyn PortalDb {
        self.dispatcher.db()
    }

    pub async fn handle(&self, event: NotificationEvent) -> TriggerOutcome {
        let kind = event.kind();
        let outcome = match event {
            NotificationEvent::LocationCreated { id, location } => {
                self.on_location_created(&id, &location).await
            }
            NotificationEvent::InviteCreated { id, invite } => {
                self.on_invite_created(&id, &invite).await
            }
            NotificationEvent::BookingCreated { id, booking } => {
                self.on_booking_created(&id, &booking).await
            }
            NotificationEvent::EnquiryCreated { id, enquiry } => {
                self.on_enquiry_created(&id, &enquiry).await
            }
            NotificationEvent::SessionRescheduled {
                id,
                previous,
                session,
            } => self.on_session_rescheduled(&id, &previous, &session).await,
            NotificationEvent::SessionCancelled { id, session } => {
                self.on_session_cancelled(&id, &session).await
            }
        };
        debug!(
            "{kind}: {} of {} sent",
            outcome.sent_count, outcome.attempted
        );
        outcome
    }

    /// Stamps `field` on the triggering document. Failure is logged only.
    async fn mark_sent(&self, collection: &str, id: &str, field: &str) {
        let mut fields = serde_json::Map::new();
        fields.insert(
            field.to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );
        if let Err(err) = self
            .db()
            .update_document(collection, id, &serde_json::Value::Object(fields))
            .await
        {
            warn!("Could not set {field} on {collection}/{id}: {err}");
        }
    }

    async fn load_location(&self, location_id: Option<&str>) -> Option<Location> {
        let location_id = location_id.map(str::trim).filter(|id| !id.is_empty())?;
        match get_record::<Location>(self.db(), LOCATIONS, location_id).await {
            Ok(Some(location)) => Some(location),
            Ok(None) => {
                warn!("Location {location_id} does not exist");
                None
            }
            Err(err) => {
                warn!("Could not read location {location_id}: {err}");
                None
            }
        }
    }
}

pub(crate) fn location_merge_data(location: &Location) -> MergeData {
    let mut data = MergeData::new().with("locationName", location.name.as_str());
    data.insert_opt("locationEmail", location.email.as_deref());
    data.insert_opt("locationPhone", location.phone.as_deref());
    data.insert_opt("locationAddress", location.address.as_deref());
    data.insert_opt("locationSuburb", location.suburb.as_deref());
    data.insert_opt("locationState", location.state.as_deref());
    data.insert_opt("locationCountry", location.country.as_deref());
    data
}

/// Free-form record fields such as a child's age may be stored as text
/// or as a number.
pub(crate) fn json_text(value: &Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Trimmed, non-empty email address, if any.
pub(crate) fn present(email: Option<&str>) -> Option<&str> {
    email.map(str::trim).filter(|e| !e.is_empty())
}
