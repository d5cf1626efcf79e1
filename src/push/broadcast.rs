use crate::error::PortalError;
use crate::push::{PushMessage, PushTransport, TokenResult, MULTICAST_LIMIT};
use crate::store::db_interfaces::{DocumentUpdate, PortalDb};
use crate::store::list_records;
use crate::store::models::{Parent, PARENTS};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Empty fields match every parent.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PushTarget {
    pub country: Option<String>,
    pub state: Option<String>,
}

impl PushTarget {
    fn matches(&self, parent: &Parent) -> bool {
        field_matches(self.country.as_deref(), parent.country.as_deref())
            && field_matches(self.state.as_deref(), parent.state.as_deref())
    }
}

fn field_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted.map(str::trim).filter(|w| !w.is_empty()) {
        None => true,
        Some(wanted) => actual.is_some_and(|actual| actual.trim().eq_ignore_ascii_case(wanted)),
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub recipients: usize,
    pub tokens: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub removed_tokens: usize,
}

pub async fn broadcast(
    db: &dyn PortalDb,
    transport: &dyn PushTransport,
    target: &PushTarget,
    message: &PushMessage,
) -> Result<BroadcastReport, PortalError> {
    if !transport.is_configured() {
        return Err(PortalError::ConfigurationError {
            message: "Push notifications are not configured".to_string(),
        });
    }
    if message.title.trim().is_empty() || message.body.trim().is_empty() {
        return Err(PortalError::invalid_argument(
            "A push notification needs a title and a body",
        ));
    }

    let parents: Vec<(String, Parent)> = list_records::<Parent>(db, PARENTS)
        .await?
        .into_iter()
        .filter(|(_, parent)| target.matches(parent))
        .collect();

    // A token shared by two parents is sent once and owned by the first.
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    let mut tokens: Vec<String> = vec![];
    let mut recipients = 0;
    for (parent_id, parent) in &parents {
        let mut has_token = false;
        for token in parent.fcm_tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            has_token = true;
            if !owners.contains_key(token) {
                owners.insert(token.to_string(), parent_id.clone());
                tokens.push(token.to_string());
            }
        }
        if has_token {
            recipients += 1;
        }
    }

    let mut report = BroadcastReport {
        recipients,
        tokens: tokens.len(),
        ..Default::default()
    };
    if tokens.is_empty() {
        info!("Push broadcast matched no device tokens");
        return Ok(report);
    }

    let mut invalid: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for chunk in tokens.chunks(MULTICAST_LIMIT) {
        let results = match transport.send_multicast(chunk, message).await {
            Ok(results) => results,
            Err(err) => {
                error!("Push multicast of {} tokens failed: {err}", chunk.len());
                report.failure_count += chunk.len();
                continue;
            }
        };
        for (token, result) in chunk.iter().zip(results.iter()) {
            match result {
                TokenResult::Sent => report.success_count += 1,
                TokenResult::InvalidToken => {
                    report.failure_count += 1;
                    if let Some(owner) = owners.get(token) {
                        invalid.entry(owner.clone()).or_default().insert(token.clone());
                    }
                }
                TokenResult::Failed(reason) => {
                    report.failure_count += 1;
                    warn!("Push to token failed: {reason}");
                }
            }
        }
        // A transport that answers for fewer tokens than it was given.
        report.failure_count += chunk.len().saturating_sub(results.len());
    }

    if !invalid.is_empty() {
        report.removed_tokens = remove_invalid_tokens(db, &parents, &invalid).await;
    }
    info!(
        "Push broadcast to {} tokens: {} sent, {} failed, {} removed",
        report.tokens, report.success_count, report.failure_count, report.removed_tokens
    );
    Ok(report)
}

/// Best-effort; returns the number of tokens removed.
async fn remove_invalid_tokens(
    db: &dyn PortalDb,
    parents: &[(String, Parent)],
    invalid: &BTreeMap<String, BTreeSet<String>>,
) -> usize {
    let updates: Vec<DocumentUpdate> = parents
        .iter()
        .filter_map(|(parent_id, parent)| {
            let stale = invalid.get(parent_id)?;
            let kept: Vec<&String> = parent
                .fcm_tokens
                .iter()
                .filter(|token| !stale.contains(token.trim()))
                .collect();
            Some(DocumentUpdate {
                collection: PARENTS.to_string(),
                id: parent_id.clone(),
                fields: json!({ "fcmTokens": kept }),
            })
        })
        .collect();
    let removed = invalid.values().map(BTreeSet::len).sum();
    match db.batch_update(&updates).await {
        Ok(()) => removed,
        Err(err) => {
            warn!("Could not remove {removed} invalid push tokens: {err}");
            0
        }
    }
}
