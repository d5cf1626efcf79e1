use crate::error::PortalError;
use crate::notifications::{Notifier, TriggerOutcome};
use crate::server::permissions::{CallerIdentity, OPERATORS};
use crate::server::utils::authorize;
use actix_web::{post, web};

#[post("/invites/{invite_id}/resend")]
pub async fn resend_invite(
    path: web::Path<String>,
    notifier: web::Data<Notifier>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<TriggerOutcome>, PortalError> {
    authorize(&caller, OPERATORS)?;
    Ok(web::Json(notifier.resend_invite(&path).await?))
}

#[post("/bookings/{booking_id}/resend_confirmation")]
pub async fn resend_booking_confirmation(
    path: web::Path<String>,
    notifier: web::Data<Notifier>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<TriggerOutcome>, PortalError> {
    authorize(&caller, OPERATORS)?;
    Ok(web::Json(notifier.resend_booking_confirmation(&path).await?))
}
