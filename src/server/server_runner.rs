use crate::email::backend::create_email_backend;
use crate::email::EmailDispatcher;
use crate::error::PortalError;
use crate::notifications::Notifier;
use crate::payments::gateway::PaymentGateway;
use crate::push::{create_push_transport, PushTransport};
use crate::server::api_endpoints;
use crate::server::config::{read_config, PortalConfig, PortalConfigCors};
use crate::server::tokens::retrieve_caller;
use crate::store::db_interfaces::{connect_to_portal_db, PortalDb};
use actix_cors::Cors;
use actix_web::dev::ServiceRequest;
use actix_web::{middleware, web, App, Error, HttpMessage, HttpServer};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use actix_web_httpauth::middleware::HttpAuthentication;
use dyn_clone::clone_box;
use log::info;
use std::io;
use std::path::Path;
use std::sync::Arc;

pub fn config(cfg: &mut web::ServiceConfig) {
    // Unauthenticated API endpoints
    cfg.service(api_endpoints::health_endpoint);

    // Authenticated API endpoints
    cfg.service(
        web::scope("/v1")
            .wrap(HttpAuthentication::bearer(caller_validator))
            .service(api_endpoints::document_event_endpoint)
            .service(api_endpoints::seed_templates_endpoint)
            .service(api_endpoints::send_test_email_endpoint)
            .service(api_endpoints::resend_invite_endpoint)
            .service(api_endpoints::resend_booking_confirmation_endpoint)
            .service(api_endpoints::push_broadcast_endpoint)
            .service(api_endpoints::create_connected_account_endpoint)
            .service(api_endpoints::connected_account_status_endpoint)
            .service(api_endpoints::create_setup_checkout_endpoint)
            .service(api_endpoints::create_setup_intent_endpoint)
            .service(api_endpoints::confirm_payment_method_endpoint)
            .service(api_endpoints::save_payment_method_endpoint)
            .service(api_endpoints::remove_payment_method_endpoint)
            .service(api_endpoints::create_subscription_endpoint)
            .service(api_endpoints::process_refund_endpoint)
            .service(api_endpoints::generate_sessions_endpoint),
    );
}

async fn caller_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match req.app_data::<web::Data<Box<dyn PortalDb>>>() {
        Some(db) => match retrieve_caller(credentials.token(), &****db).await {
            Ok(caller) => {
                req.extensions_mut().insert(caller);
                Ok(req)
            }
            Err(e) => Err((e.into(), req)),
        },
        None => Err((
            PortalError::Other {
                message: "Misconfigured server: no database".to_string(),
            }
            .into(),
            req,
        )),
    }
}

pub fn build_cors(portal_cors: PortalConfigCors) -> Cors {
    let mut cors = Cors::default().allow_any_header().allow_any_method();

    if portal_cors.origin.trim() == "*" {
        cors = cors.allow_any_origin()
    } else {
        cors = cors.allowed_origin(portal_cors.origin.trim());
    }

    cors
}

/// Shared application state, built once so every worker sees the same
/// payment provider cache.
#[derive(Clone)]
pub struct PortalState {
    pub db: Box<dyn PortalDb>,
    pub config: PortalConfig,
    pub notifier: Notifier,
    pub gateway: web::Data<PaymentGateway>,
    pub push: Option<Arc<dyn PushTransport>>,
}

impl PortalState {
    pub fn new(db: Box<dyn PortalDb>, config: PortalConfig) -> PortalState {
        let dispatcher = EmailDispatcher::new(
            clone_box(&*db),
            create_email_backend(&config.email),
            &config.email,
        );
        PortalState {
            notifier: Notifier::new(dispatcher, &config.portal_url()),
            gateway: web::Data::new(PaymentGateway::new(config.stripe.clone())),
            push: create_push_transport(config.push.as_ref()),
            db,
            config,
        }
    }

    pub fn install(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(clone_box(&*self.db)))
            .app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.notifier.clone()))
            .app_data(self.gateway.clone())
            .app_data(web::Data::new(self.push.clone()));
    }
}

pub async fn run_server(config_path: &Path) -> io::Result<()> {
    env_logger::init();

    let portal_conf = read_config(config_path).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("unable to read configuration: {e}"))
    })?;
    let portal_db = connect_to_portal_db(&portal_conf.database_url)
        .await
        .map_err(|e| io::Error::other(format!("unable to connect to portal database: {e}")))?;
    let state = PortalState::new(portal_db, portal_conf.clone());

    info!("Starting server {}:{}...", portal_conf.host, portal_conf.port);
    if portal_conf.stripe.is_none() {
        info!("No [stripe] section; payment endpoints will report failed-precondition");
    }
    if portal_conf.push.is_none() {
        info!("No [push] section; push broadcasts are disabled");
    }

    HttpServer::new(move || {
        let cors = build_cors(state.config.cors.clone());
        let state = state.clone();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .configure(|cfg| state.install(cfg))
            .configure(config)
    })
    .bind((portal_conf.host, portal_conf.port))?
    .run()
    .await
}
