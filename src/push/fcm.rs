use crate::error::PortalError;
use crate::push::{PushMessage, PushTransport, TokenResult, MULTICAST_LIMIT};
use crate::server::config::{resolve_secret, PortalConfigPush, FCM_ACCESS_TOKEN_ENV};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;

const FCM_API_BASE: &str = "https://fcm.googleapis.com";

#[derive(Deserialize)]
struct FcmErrorBody {
    error: FcmErrorDetail,
}

#[derive(Deserialize)]
struct FcmErrorDetail {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

impl FcmErrorDetail {
    fn is_unregistered(&self) -> bool {
        self.status == "NOT_FOUND"
            || self
                .details
                .iter()
                .any(|d| d.get("errorCode").and_then(|c| c.as_str()) == Some("UNREGISTERED"))
    }
}

/// FCM HTTP v1. The v1 API sends one message per request, so a multicast
/// is a series of requests.
pub struct FcmBackend {
    config: PortalConfigPush,
    client: reqwest::Client,
}

impl FcmBackend {
    pub fn new(config: PortalConfigPush) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn access_token(&self) -> Option<String> {
        resolve_secret(&self.config.access_token, FCM_ACCESS_TOKEN_ENV)
    }

    fn make_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.config
                .api_base
                .as_deref()
                .unwrap_or(FCM_API_BASE)
                .trim_end_matches('/'),
            self.config.project_id
        )
    }

    fn payload(token: &str, message: &PushMessage) -> serde_json::Value {
        json!({
            "message": {
                "token": token,
                "notification": { "title": message.title, "body": message.body },
                "data": message.data,
            }
        })
    }

    async fn send_one(&self, access_token: &str, token: &str, message: &PushMessage) -> TokenResult {
        let response = match self
            .client
            .post(self.make_url())
            .bearer_auth(access_token)
            .json(&Self::payload(token, message))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return TokenResult::Failed(err.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return TokenResult::Sent;
        }
        match response.json::<FcmErrorBody>().await {
            Ok(FcmErrorBody { error }) if error.is_unregistered() => TokenResult::InvalidToken,
            Ok(FcmErrorBody { error }) if error.status == "INVALID_ARGUMENT" => {
                debug!("FCM rejected token: {}", error.message);
                TokenResult::InvalidToken
            }
            Ok(FcmErrorBody { error }) => {
                TokenResult::Failed(format!("{}: {}", error.status, error.message))
            }
            Err(_) => TokenResult::Failed(format!("FCM responded {status}")),
        }
    }
}

#[async_trait]
impl PushTransport for FcmBackend {
    fn is_configured(&self) -> bool {
        self.access_token().is_some()
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<Vec<TokenResult>, PortalError> {
        if tokens.len() > MULTICAST_LIMIT {
            return Err(PortalError::invalid_argument(format!(
                "At most {MULTICAST_LIMIT} tokens per multicast"
            )));
        }
        let access_token = self.access_token().ok_or_else(|| PortalError::ConfigurationError {
            message: format!("No FCM access token configured (set {FCM_ACCESS_TOKEN_ENV})"),
        })?;

        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            results.push(self.send_one(&access_token, token, message).await);
        }
        Ok(results)
    }
}
