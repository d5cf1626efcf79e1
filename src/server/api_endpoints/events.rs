use crate::error::PortalError;
use crate::notifications::{NotificationEvent, Notifier, TriggerOutcome};
use crate::server::permissions::{CallerIdentity, EVENT_SOURCES};
use crate::server::structs::{DocumentEvent, EventResponse};
use crate::server::utils::authorize;
use actix_web::{post, web};
use log::warn;

/// Document writes are reported here by whatever watches the store. The
/// response is always 200; what happened is in the outcome.
#[post("/events/{collection}/{id}")]
pub async fn document_event(
    path: web::Path<(String, String)>,
    event: web::Json<DocumentEvent>,
    notifier: web::Data<Notifier>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<EventResponse>, PortalError> {
    authorize(&caller, EVENT_SOURCES)?;
    let (collection, id) = path.into_inner();
    let DocumentEvent { before, after } = event.into_inner();

    let parsed = match before {
        None => NotificationEvent::created(&collection, &id, after).map(Some),
        Some(before) => NotificationEvent::updated(&collection, &id, before, after),
    };
    let response = match parsed {
        Ok(Some(event)) => EventResponse {
            event: Some(event.kind().to_string()),
            outcome: notifier.handle(event).await,
        },
        Ok(None) => EventResponse {
            event: None,
            outcome: TriggerOutcome::skipped("This change does not notify anyone"),
        },
        Err(err) => {
            warn!("Ignoring event for {collection}/{id}: {err}");
            EventResponse {
                event: None,
                outcome: TriggerOutcome::skipped(err.message()),
            }
        }
    };
    Ok(web::Json(response))
}
