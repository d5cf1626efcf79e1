use crate::error::PortalError;
use crate::push::broadcast::{broadcast, BroadcastReport};
use crate::push::PushTransport;
use crate::server::permissions::{CallerIdentity, OPERATORS};
use crate::server::structs::BroadcastRequest;
use crate::server::utils::authorize;
use crate::store::db_interfaces::PortalDb;
use actix_web::{post, web};
use std::sync::Arc;

#[post("/push/broadcast")]
pub async fn push_broadcast(
    request: web::Json<BroadcastRequest>,
    db: web::Data<Box<dyn PortalDb>>,
    push: web::Data<Option<Arc<dyn PushTransport>>>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<BroadcastReport>, PortalError> {
    authorize(&caller, OPERATORS)?;
    let Some(transport) = push.get_ref() else {
        return Err(PortalError::ConfigurationError {
            message: "Push notifications are not configured on this server".to_string(),
        });
    };
    let report = broadcast(&***db, transport.as_ref(), &request.target, &request.message).await?;
    Ok(web::Json(report))
}
