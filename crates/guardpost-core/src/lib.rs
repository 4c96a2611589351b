//! # Guardpost Core
//!
//! Core security-boundary logic for the Guardpost booking platform.
//!
//! This crate contains the pieces of the platform that decide whether a
//! request is trusted: verifying inbound messaging webhooks, ranking the
//! candidate guards handed to the conversational flow, and authorizing
//! time-boxed media access URLs.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions
//!   ([`GuardRegistry`], [`IdentityResolver`], [`ObjectStorageSigner`])
//! - The hosted backend implementations live in [`adapters`] and are
//!   injected at startup
//! - Nothing here reads the process environment; configuration is passed in
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use guardpost_core::webhook::{compute_signature, verify};
//!
//! let mut params = BTreeMap::new();
//! params.insert("Body".to_string(), "hi".to_string());
//! params.insert("From".to_string(), "+1".to_string());
//!
//! let url = "https://x.test/webhooks/whatsapp";
//! let signature = compute_signature("s3cr3t", url, &params);
//! assert!(verify("s3cr3t", url, &params, Some(&signature)));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier of an authenticated caller as issued by the identity provider.
///
/// The identifier is opaque (the hosted provider issues UUIDs) but it is also
/// used as the leading segment of scoped storage paths, so it must be a
/// single non-empty path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityId(String);

impl IdentityId {
    /// Create new identity ID with validation
    ///
    /// # Validation Rules
    /// - Must not be empty
    /// - Must not contain `/` or whitespace
    /// - Must be at most 128 characters
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "identity_id".to_string(),
            });
        }

        if value.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "identity_id".to_string(),
                max_length: 128,
            });
        }

        if value.chars().any(|c| c == '/' || c.is_whitespace()) {
            return Err(ValidationError::InvalidCharacters {
                field: "identity_id".to_string(),
                invalid_chars: "slash or whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path prefix that every object owned by this identity must carry.
    pub fn scope_prefix(&self) -> String {
        format!("{}/", self.0)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdentityId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// UTC timestamp used in API responses and guard activity tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse an RFC 3339 timestamp
    pub fn from_rfc3339(s: &str) -> Result<Self, ValidationError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                message: e.to_string(),
            })
    }

    /// Format as RFC 3339
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Access the underlying datetime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },

    #[error("Field '{field}' is out of range: {message}")]
    OutOfRange { field: String, message: String },
}

/// Failure of a call into the hosted backend (registry, storage, identity).
///
/// These are request-scoped reads: callers fail fast and let the HTTP client
/// retry. [`UpstreamError::is_transient`] only classifies the failure for
/// logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// The request never produced a response (connect, TLS, timeout)
    #[error("{service} request failed: {message}")]
    Request { service: String, message: String },

    /// The backend answered with a non-success status
    #[error("{service} returned status {status}: {message}")]
    Status {
        service: String,
        status: u16,
        message: String,
    },

    /// The backend answered with a body that could not be decoded
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: String, message: String },

    /// No backend is configured for this service
    #[error("{service} is not configured")]
    NotConfigured { service: String },
}

impl UpstreamError {
    /// Check if the failure is likely to clear up on its own
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode { .. } => false,
            Self::NotConfigured { .. } => false,
        }
    }

    /// Name of the upstream service that failed
    pub fn service(&self) -> &str {
        match self {
            Self::Request { service, .. }
            | Self::Status { service, .. }
            | Self::Decode { service, .. }
            | Self::NotConfigured { service } => service,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Redacting, zeroizing secret container
pub mod secret;

/// Inbound messaging webhook verification
pub mod webhook;

/// Candidate guard ranking
pub mod candidates;

/// Signed-URL authorization for scoped media access
pub mod media_access;

/// Hosted backend implementations of the core traits
pub mod adapters;

// Re-export key types for convenience
pub use adapters::{BackendClient, BackendConfig, UnconfiguredBackend};
pub use candidates::{
    CandidateFetcher, CandidateQuery, GuardCandidate, GuardRecord, GuardRegistry, MAX_CANDIDATES,
};
pub use media_access::{
    AuthorizationError, IdentityResolver, MediaAccessAuthorizer, ObjectStorageSigner, SignedUrl,
    SignedUrlGrant, SignedUrlRequest, DEFAULT_EXPIRES_IN_SECONDS,
};
pub use secret::SecretString;
pub use webhook::{InboundMessage, SignatureVerifier, TwilioSignatureVerifier, WebhookRequest};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
