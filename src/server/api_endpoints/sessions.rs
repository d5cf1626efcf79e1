use crate::error::PortalError;
use crate::server::permissions::{CallerIdentity, LOCATION_STAFF};
use crate::server::structs::{GenerateSessionsRequest, GeneratedSessions};
use crate::server::utils::authorize;
use crate::sessions::generate_weekly_sessions;
use crate::store::db_interfaces::PortalDb;
use actix_web::{post, web};

#[post("/locations/{location_id}/sessions/generate")]
pub async fn generate_sessions(
    path: web::Path<String>,
    request: web::Json<GenerateSessionsRequest>,
    db: web::Data<Box<dyn PortalDb>>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<GeneratedSessions>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let created =
        generate_weekly_sessions(&***db, &path, &request.template, request.from, request.until)
            .await?;
    Ok(web::Json(GeneratedSessions { created }))
}
