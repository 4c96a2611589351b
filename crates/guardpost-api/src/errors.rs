//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use guardpost_core::{AuthorizationError, ValidationError};
use tracing::{error, warn};

use crate::conversation::ConversationError;

/// Build the JSON error body shared by every handler error.
fn error_response(status: StatusCode, message: String) -> Response {
    let body = serde_json::json!({
        "error": message,
        "status": status.as_u16(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status, Json(body)).into_response()
}

/// Webhook handler errors with HTTP status code mapping
///
/// - `403 Forbidden`: the signature is missing or does not verify. The body
///   never says which.
/// - `400 Bad Request`: the body is not a usable message form
/// - `500 Internal Server Error`: the conversation handler failed
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Signature absent or invalid
    ///
    /// Maps to: `403 Forbidden`
    #[error("Webhook signature could not be verified")]
    InvalidSignature,

    /// The request URL could not be reconstructed
    ///
    /// Maps to: `400 Bad Request`
    #[error("Webhook URL could not be determined: {message}")]
    UnresolvableUrl { message: String },

    /// Verified form is missing required fields or has malformed ones
    ///
    /// Maps to: `400 Bad Request`
    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] ValidationError),

    /// The conversation handler failed
    ///
    /// Maps to: `500 Internal Server Error`. Details are logged, a generic
    /// message is returned.
    #[error("Conversation handling failed: {0}")]
    Conversation(#[from] ConversationError),
}

impl WebhookHandlerError {
    /// Short outcome label used for metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::UnresolvableUrl { .. } | Self::InvalidMessage(_) => "invalid_request",
            Self::Conversation(_) => "handler_error",
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidSignature => (StatusCode::FORBIDDEN, self.to_string()),
            Self::UnresolvableUrl { .. } | Self::InvalidMessage(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Conversation(e) => {
                error!(error = %e, "Conversation handler failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error occurred. Please try again later.".to_string(),
                )
            }
        };

        error_response(status, message)
    }
}

/// Signed-URL handler errors with HTTP status code mapping
///
/// - `401 Unauthorized`: no caller identity
/// - `403 Forbidden`: path outside the caller's scope
/// - `400 Bad Request`: malformed body, validation failure or storage failure
#[derive(Debug, thiserror::Error)]
pub enum SignedUrlHandlerError {
    /// The body is not valid JSON for a signed-URL request
    #[error("Invalid request body: {message}")]
    MalformedBody { message: String },

    /// The authorizer rejected the request
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

impl SignedUrlHandlerError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            Self::Authorization(AuthorizationError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            Self::Authorization(AuthorizationError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            Self::Authorization(AuthorizationError::InvalidRequest(_))
            | Self::Authorization(AuthorizationError::Storage(_)) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short outcome label used for metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MalformedBody { .. } => "invalid_request",
            Self::Authorization(AuthorizationError::InvalidRequest(_)) => "invalid_request",
            Self::Authorization(AuthorizationError::Unauthenticated) => "unauthenticated",
            Self::Authorization(AuthorizationError::Forbidden { .. }) => "forbidden",
            Self::Authorization(AuthorizationError::Storage(_)) => "storage_error",
        }
    }
}

impl IntoResponse for SignedUrlHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            warn!(status = %status, error = %self, "Signed URL request rejected");
        }

        error_response(status, self.to_string())
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration loading failed: {message}")]
    Load { message: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
