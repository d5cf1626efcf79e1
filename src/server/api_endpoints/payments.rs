use crate::error::PortalError;
use crate::payments::connect::{AccountStatus, OnboardingLink};
use crate::payments::gateway::PaymentGateway;
use crate::payments::setup::{ConfirmedPaymentMethod, SetupCheckout, SetupIntentHandle};
use crate::payments::subscriptions::{SubscriptionOutcome, SubscriptionRequest};
use crate::server::permissions::{CallerIdentity, LOCATION_STAFF, OPERATORS};
use crate::server::structs::{
    PaymentMethodLookup, RefundRequest, SetupCheckoutRequest, SetupIntentRequest,
};
use crate::server::utils::{authorize, payment_service};
use crate::store::db_interfaces::PortalDb;
use crate::store::models::{PaymentMethodInfo, RefundRecord};
use actix_web::{delete, get, post, web};

#[post("/locations/{location_id}/connected_account")]
pub async fn create_connected_account(
    path: web::Path<String>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<OnboardingLink>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let service = payment_service(&gateway, &db)?;
    Ok(web::Json(service.create_or_link_account(&path).await?))
}

#[get("/locations/{location_id}/connected_account")]
pub async fn connected_account_status(
    path: web::Path<String>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<AccountStatus>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let service = payment_service(&gateway, &db)?;
    Ok(web::Json(service.refresh_account_status(&path).await?))
}

#[post("/locations/{location_id}/setup_checkout")]
pub async fn create_setup_checkout(
    path: web::Path<String>,
    request: web::Json<SetupCheckoutRequest>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<SetupCheckout>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let service = payment_service(&gateway, &db)?;
    let checkout = service
        .create_setup_checkout(
            &path,
            &request.email,
            request.name.as_deref(),
            request.parent_id.as_deref(),
        )
        .await?;
    Ok(web::Json(checkout))
}

#[post("/locations/{location_id}/setup_intent")]
pub async fn create_setup_intent(
    path: web::Path<String>,
    request: web::Json<SetupIntentRequest>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<SetupIntentHandle>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let service = payment_service(&gateway, &db)?;
    let intent = service
        .create_setup_intent(&path, &request.email, request.name.as_deref())
        .await?;
    Ok(web::Json(intent))
}

#[post("/locations/{location_id}/payment_method/confirm")]
pub async fn confirm_payment_method(
    path: web::Path<String>,
    request: web::Json<PaymentMethodLookup>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<ConfirmedPaymentMethod>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let service = payment_service(&gateway, &db)?;
    let confirmed = service
        .confirm_payment_method(
            &path,
            request.checkout_session_id.as_deref(),
            request.email.as_deref(),
        )
        .await?;
    Ok(web::Json(confirmed))
}

#[post("/locations/{location_id}/parents/{parent_id}/payment_method")]
pub async fn save_payment_method(
    path: web::Path<(String, String)>,
    request: Option<web::Json<PaymentMethodLookup>>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<ConfirmedPaymentMethod>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let (location_id, parent_id) = path.into_inner();
    let lookup = request.map(web::Json::into_inner).unwrap_or_default();
    let service = payment_service(&gateway, &db)?;
    let saved = service
        .save_from_checkout(&location_id, &parent_id, lookup.checkout_session_id.as_deref())
        .await?;
    Ok(web::Json(saved))
}

#[delete("/locations/{location_id}/parents/{parent_id}/payment_method")]
pub async fn remove_payment_method(
    path: web::Path<(String, String)>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<PaymentMethodInfo>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let (location_id, parent_id) = path.into_inner();
    let service = payment_service(&gateway, &db)?;
    Ok(web::Json(
        service.remove_payment_method(&location_id, &parent_id).await?,
    ))
}

#[post("/subscriptions")]
pub async fn create_subscription(
    request: web::Json<SubscriptionRequest>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<SubscriptionOutcome>, PortalError> {
    authorize(&caller, LOCATION_STAFF)?;
    let service = payment_service(&gateway, &db)?;
    Ok(web::Json(service.create_subscription(&request).await?))
}

#[post("/sales/{sale_id}/refunds")]
pub async fn process_refund(
    path: web::Path<String>,
    request: web::Json<RefundRequest>,
    db: web::Data<Box<dyn PortalDb>>,
    gateway: web::Data<PaymentGateway>,
    caller: Option<web::ReqData<CallerIdentity>>,
) -> Result<web::Json<RefundRecord>, PortalError> {
    authorize(&caller, OPERATORS)?;
    let service = payment_service(&gateway, &db)?;
    let record = service
        .process_refund(&path, request.amount, &request.reason)
        .await?;
    Ok(web::Json(record))
}
