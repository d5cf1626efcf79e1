use crate::notifications::TriggerOutcome;
use crate::push::broadcast::PushTarget;
use crate::push::PushMessage;
use crate::sessions::SessionTemplate;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub status: String,
}

/// A document write reported by the store. `before` is absent for a
/// newly created document.
#[derive(Serialize, Deserialize, Debug)]
pub struct DocumentEvent {
    pub before: Option<Value>,
    pub after: Value,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct EventResponse {
    pub event: Option<String>,
    pub outcome: TriggerOutcome,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailRequest {
    pub to: String,
    pub country: Option<String>,
    #[serde(default)]
    pub merge_data: Value,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SeedRequest {
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct EmptyResponse {}

#[derive(Serialize, Deserialize, Debug)]
pub struct BroadcastRequest {
    #[serde(default)]
    pub target: PushTarget,
    pub message: PushMessage,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetupCheckoutRequest {
    pub email: String,
    pub name: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SetupIntentRequest {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodLookup {
    pub checkout_session_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RefundRequest {
    pub amount: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GenerateSessionsRequest {
    pub template: SessionTemplate,
    pub from: NaiveDate,
    pub until: NaiveDate,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GeneratedSessions {
    pub created: Vec<String>,
}
