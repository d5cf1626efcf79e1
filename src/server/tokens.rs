use crate::error::PortalError;
use crate::server::permissions::CallerIdentity;
use crate::store::db_interfaces::PortalDb;
use crate::store::models::{ApiToken, Role, API_TOKENS};
use crate::store::{get_record, put_record};
use uuid::Uuid;

const API_TOKEN_PREFIX: &str = "pn";

/// Tokens are stored only by their hash.
pub fn hash_token(token: &str) -> String {
    blake3::hash(token.trim().as_bytes()).to_hex().to_string()
}

pub async fn retrieve_caller(token: &str, db: &dyn PortalDb) -> Result<CallerIdentity, PortalError> {
    if token.trim().is_empty() {
        return Err(PortalError::Unauthenticated {
            message: "Missing API token".to_string(),
        });
    }
    let stored: Option<ApiToken> = get_record(db, API_TOKENS, &hash_token(token)).await?;
    match stored {
        Some(api_token) => Ok(CallerIdentity {
            uid: api_token.uid,
            role: api_token.role,
            display_name: api_token.display_name,
        }),
        None => Err(PortalError::Unauthenticated {
            message: "Invalid API token".to_string(),
        }),
    }
}

/// Returns the plaintext token; only its hash is persisted.
pub async fn issue_api_token(
    db: &dyn PortalDb,
    uid: &str,
    role: Role,
    display_name: Option<&str>,
) -> Result<String, PortalError> {
    if uid.trim().is_empty() {
        return Err(PortalError::invalid_argument("A token needs a uid"));
    }
    let token = format!("{API_TOKEN_PREFIX}_{}", Uuid::new_v4().simple());
    put_record(
        db,
        API_TOKENS,
        &hash_token(&token),
        &ApiToken {
            uid: uid.to_string(),
            role,
            display_name: display_name.map(String::from),
        },
    )
    .await?;
    Ok(token)
}
