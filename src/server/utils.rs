use crate::error::PortalError;
use crate::payments::gateway::PaymentGateway;
use crate::payments::PaymentService;
use crate::server::permissions::{require_role, CallerIdentity};
use crate::store::db_interfaces::PortalDb;
use crate::store::models::Role;
use actix_web::web;
use dyn_clone::clone_box;

pub fn unwrap_caller(caller: &Option<web::ReqData<CallerIdentity>>) -> Result<CallerIdentity, PortalError> {
    match caller {
        Some(caller) => Ok(caller.clone().into_inner()),
        None => Err(PortalError::Unauthenticated {
            message: "Endpoint requires a caller, but one was not provided".to_string(),
        }),
    }
}

/// Unwraps the caller and checks its role in one step.
pub fn authorize(
    caller: &Option<web::ReqData<CallerIdentity>>,
    allowed: &[Role],
) -> Result<CallerIdentity, PortalError> {
    let caller = unwrap_caller(caller)?;
    require_role(&caller, allowed)?;
    Ok(caller)
}

pub fn payment_service(
    gateway: &PaymentGateway,
    db: &web::Data<Box<dyn PortalDb>>,
) -> Result<PaymentService, PortalError> {
    PaymentService::from_gateway(gateway, clone_box(&****db))
}
