//! # portal-notify
//!
//! Templated transactional email, push broadcasts, and connected-account
//! payments for a multi-location franchise portal.

pub mod email;
pub mod error;
pub mod formatting;
pub mod notifications;
pub mod payments;
pub mod push;
pub mod server;
pub mod sessions;
pub mod store;
pub mod templating;

#[cfg(test)]
mod testing;
