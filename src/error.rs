use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Display, Error, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum PortalError {
    #[display("Unauthenticated: {message}")]
    Unauthenticated { message: String },
    #[display("Invalid argument: {message}")]
    InvalidArgument { message: String },
    #[display("Not found: {message}")]
    NotFound { message: String },
    #[display("Permission denied: {message}")]
    PermissionDenied { message: String },
    #[display("Failed precondition: {message}")]
    FailedPrecondition { message: String },
    #[display("Configuration error: {message}")]
    ConfigurationError { message: String },
    #[display("Store error: {message}")]
    StoreError { message: String },
    #[display("Payment provider error: {message}")]
    ProviderError { message: String },
    #[display("Transport error: {message}")]
    TransportError { message: String },
    #[display("{message}")]
    Other { message: String },
}

impl PortalError {
    pub fn category(&self) -> &'static str {
        match self {
            PortalError::Unauthenticated { .. } => "unauthenticated",
            PortalError::InvalidArgument { .. } => "invalid-argument",
            PortalError::NotFound { .. } => "not-found",
            PortalError::PermissionDenied { .. } => "permission-denied",
            PortalError::FailedPrecondition { .. } => "failed-precondition",
            PortalError::ConfigurationError { .. }
            | PortalError::StoreError { .. }
            | PortalError::ProviderError { .. }
            | PortalError::TransportError { .. }
            | PortalError::Other { .. } => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PortalError::Unauthenticated { message }
            | PortalError::InvalidArgument { message }
            | PortalError::NotFound { message }
            | PortalError::PermissionDenied { message }
            | PortalError::FailedPrecondition { message }
            | PortalError::ConfigurationError { message }
            | PortalError::StoreError { message }
            | PortalError::ProviderError { message }
            | PortalError::TransportError { message }
            | PortalError::Other { message } => message,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        PortalError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        PortalError::NotFound {
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    category: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorBody<'a>,
}

impl actix_web::error::ResponseError for PortalError {
    fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            PortalError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            PortalError::NotFound { .. } => StatusCode::NOT_FOUND,
            PortalError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            PortalError::FailedPrecondition { .. } => StatusCode::PRECONDITION_FAILED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: ErrorBody {
                category: self.category(),
                message: self.message(),
            },
        })
    }
}

impl From<std::io::Error> for PortalError {
    fn from(cause: std::io::Error) -> Self {
        PortalError::Other {
            message: format!("IO error: {cause:?}"),
        }
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(cause: serde_json::Error) -> Self {
        PortalError::Other {
            message: format!("JSON error: {cause}"),
        }
    }
}

impl From<sqlx::Error> for PortalError {
    fn from(cause: sqlx::Error) -> Self {
        PortalError::StoreError {
            message: format!("{cause:?}"),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for PortalError {
    fn from(cause: sqlx::migrate::MigrateError) -> Self {
        PortalError::StoreError {
            message: format!("{cause:?}"),
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(cause: reqwest::Error) -> Self {
        PortalError::TransportError {
            message: format!("{cause:?}"),
        }
    }
}

impl From<toml::ser::Error> for PortalError {
    fn from(cause: toml::ser::Error) -> Self {
        PortalError::ConfigurationError {
            message: cause.to_string(),
        }
    }
}

impl From<toml::de::Error> for PortalError {
    fn from(cause: toml::de::Error) -> Self {
        PortalError::ConfigurationError {
            message: cause.to_string(),
        }
    }
}

impl From<lettre::address::AddressError> for PortalError {
    fn from(cause: lettre::address::AddressError) -> Self {
        PortalError::InvalidArgument {
            message: format!("Invalid email address: {cause}"),
        }
    }
}

impl From<lettre::error::Error> for PortalError {
    fn from(cause: lettre::error::Error) -> Self {
        PortalError::TransportError {
            message: format!("Could not build email: {cause:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::error::ResponseError;

    #[test]
    fn caller_errors_keep_their_category() {
        let err = PortalError::PermissionDenied {
            message: "admin role required".to_string(),
        };
        assert_eq!(err.category(), "permission-denied");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Permission denied: admin role required");
    }

    #[test]
    fn internal_errors_collapse_to_internal() {
        let err = PortalError::ProviderError {
            message: "card_declined".to_string(),
        };
        assert_eq!(err.category(), "internal");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
