use crate::error::PortalError;
use crate::store::models::Role;
use serde::Serialize;

/// Who is calling, as established by the bearer token.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub uid: String,
    pub role: Role,
    pub display_name: Option<String>,
}

pub const OPERATORS: &[Role] = &[Role::MasterAdmin, Role::Admin];
pub const LOCATION_STAFF: &[Role] = &[Role::MasterAdmin, Role::Admin, Role::FranchisePartner];
pub const EVENT_SOURCES: &[Role] = &[Role::MasterAdmin, Role::Admin, Role::Service];

pub fn require_role(caller: &CallerIdentity, allowed: &[Role]) -> Result<(), PortalError> {
    if allowed.contains(&caller.role) {
        Ok(())
    } else {
        Err(PortalError::PermissionDenied {
            message: format!("{} may not perform this operation", caller.uid),
        })
    }
}
