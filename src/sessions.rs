use crate::error::PortalError;
use crate::store::db_interfaces::PortalDb;
use crate::store::models::{Attendee, Session, SessionStatus, SESSIONS};
use crate::store::put_record;
use chrono::{Duration, NaiveDate, NaiveTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The longest span generated in one call.
pub const MAX_WEEKS: i64 = 53;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionTemplate {
    pub class_name: String,
    /// `HH:MM`, 24-hour
    pub time: String,
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

pub fn session_id(location_id: &str, date: NaiveDate, time: NaiveTime) -> String {
    format!("{location_id}_{}_{}", date.format("%Y-%m-%d"), time.format("%H%M"))
}

/// Creates one session per week on the weekday of `from`, through `until`
/// inclusive. Dates that already have a session at this time are left
/// alone. Returns the ids created.
pub async fn generate_weekly_sessions(
    db: &dyn PortalDb,
    location_id: &str,
    template: &SessionTemplate,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<String>, PortalError> {
    if location_id.trim().is_empty() {
        return Err(PortalError::invalid_argument("A location is required"));
    }
    if template.class_name.trim().is_empty() {
        return Err(PortalError::invalid_argument("A class name is required"));
    }
    let time = NaiveTime::parse_from_str(template.time.trim(), "%H:%M").map_err(|_| {
        PortalError::invalid_argument(format!("Session time {} is not HH:MM", template.time))
    })?;
    if until < from {
        return Err(PortalError::invalid_argument(
            "The end date is before the start date",
        ));
    }
    if until - from > Duration::weeks(MAX_WEEKS) {
        return Err(PortalError::invalid_argument(format!(
            "Sessions can be generated at most {MAX_WEEKS} weeks ahead"
        )));
    }

    let recurrence_id = Uuid::now_v7().to_string();
    let mut created = vec![];
    let mut date = from;
    while date <= until {
        let id = session_id(location_id, date, time);
        if db.get_document(SESSIONS, &id).await?.is_some() {
            debug!("Session {id} already exists");
        } else {
            let session = Session {
                location_id: Some(location_id.to_string()),
                class_name: Some(template.class_name.clone()),
                date: Some(date.format("%Y-%m-%d").to_string()),
                time: Some(time.format("%H:%M").to_string()),
                duration_minutes: template.duration_minutes,
                status: SessionStatus::Scheduled,
                attendees: template.attendees.clone(),
                recurrence_id: Some(recurrence_id.clone()),
                ..Default::default()
            };
            put_record(db, SESSIONS, &id, &session).await?;
            created.push(id);
        }
        date += Duration::weeks(1);
    }
    info!(
        "Generated {} {} sessions for {location_id}",
        created.len(),
        template.class_name
    );
    Ok(created)
}
