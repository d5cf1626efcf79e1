use crate::error::PortalError;
use crate::push::fcm::FcmBackend;
use crate::server::config::PortalConfigPush;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod broadcast;
pub mod fcm;

/// Tokens per transport call.
pub const MULTICAST_LIMIT: usize = 500;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: std::collections::BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenResult {
    Sent,
    /// The device token is no longer registered and should be forgotten.
    InvalidToken,
    Failed(String),
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Sends to at most `MULTICAST_LIMIT` tokens, one result per token in
    /// the same order.
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<TokenResult>, PortalError>;
}

/// `None` when the server has no `[push]` section.
pub fn create_push_transport(config: Option<&PortalConfigPush>) -> Option<Arc<dyn PushTransport>> {
    config.map(|config| Arc::new(FcmBackend::new(config.clone())) as Arc<dyn PushTransport>)
}
