mod events;
mod health;
mod payments;
mod push;
mod resend;
mod sessions;
mod templates;

pub use events::document_event as document_event_endpoint;
pub use health::health as health_endpoint;
pub use payments::confirm_payment_method as confirm_payment_method_endpoint;
pub use payments::connected_account_status as connected_account_status_endpoint;
pub use payments::create_connected_account as create_connected_account_endpoint;
pub use payments::create_setup_checkout as create_setup_checkout_endpoint;
pub use payments::create_setup_intent as create_setup_intent_endpoint;
pub use payments::create_subscription as create_subscription_endpoint;
pub use payments::process_refund as process_refund_endpoint;
pub use payments::remove_payment_method as remove_payment_method_endpoint;
pub use payments::save_payment_method as save_payment_method_endpoint;
pub use push::push_broadcast as push_broadcast_endpoint;
pub use resend::resend_booking_confirmation as resend_booking_confirmation_endpoint;
pub use resend::resend_invite as resend_invite_endpoint;
pub use sessions::generate_sessions as generate_sessions_endpoint;
pub use templates::seed_templates as seed_templates_endpoint;
pub use templates::send_test_email as send_test_email_endpoint;
