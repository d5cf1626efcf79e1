use crate::email::defaults::{seed_default_templates, SeedReport};
use crate::error::PortalError;
use crate::notifications::Notifier;
use crate::server::permissions::{CallerIdentity, OPERATORS};
use crate::server::structs::{EmptyResponse, SeedRequest, TestEmailRequest};
use crate::server::utils::authorize;
use crate::store::db_interfaces::PortalDb;
use actix_web::{post, web};

#[post("/templates/{template_key}/test")]
pub async fn send_test_email(
    path: web::Path<String>,
    request: web::Json<TestEmailRequest>,
    notifier: web::Data<Notifier>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<EmptyResponse>, PortalError> {
    authorize(&caller, OPERATORS)?;
    notifier
        .send_test_email(
            &path,
            &request.to,
            request.country.as_deref(),
            &request.merge_data,
        )
        .await?;
    Ok(web::Json(EmptyResponse {}))
}

#[post("/templates/seed")]
pub async fn seed_templates(
    request: Option<web::Json<SeedRequest>>,
    db: web::Data<Box<dyn PortalDb>>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<SeedReport>, PortalError> {
    authorize(&caller, OPERATORS)?;
    let overwrite = request.map(|r| r.overwrite).unwrap_or(false);
    Ok(web::Json(seed_default_templates(&***db, overwrite).await?))
}
