use crate::error::PortalError;
use crate::server::structs::HealthResponse;
use actix_web::{get, HttpResponse};

#[get("/health")]
pub async fn health() -> Result<HttpResponse, PortalError> {
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    }))
}
