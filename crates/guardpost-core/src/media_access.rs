//! # Media Access Authorization
//!
//! Decides whether a caller may receive a time-boxed signed URL for an object
//! in hosted storage.
//!
//! The only access rule is path scoping: every object a user may read lives
//! under `<identity>/`. The caller's identity comes from their bearer token
//! via [`IdentityResolver`]; the URL itself is minted by
//! [`ObjectStorageSigner`]. Grants are never persisted.

use crate::{IdentityId, UpstreamError, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Signed URL lifetime when the caller does not ask for one.
pub const DEFAULT_EXPIRES_IN_SECONDS: u64 = 3600;

/// Longest lifetime accepted unless configured otherwise (7 days).
pub const DEFAULT_MAX_EXPIRES_IN_SECONDS: u64 = 7 * 24 * 3600;

// ============================================================================
// Types
// ============================================================================

/// Body of a signed-URL request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlRequest {
    pub bucket: String,
    pub path: String,
    /// Whole seconds; `3600` and `3600.0` are both accepted
    #[serde(
        default,
        deserialize_with = "deserialize_whole_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_in: Option<i64>,
}

fn deserialize_whole_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Some(seconds) = number.as_i64() {
        return Ok(Some(seconds));
    }

    // Out-of-range values saturate and are rejected by the expiry bounds.
    match number.as_f64() {
        Some(seconds) if seconds.is_finite() && seconds.fract() == 0.0 => Ok(Some(seconds as i64)),
        _ => Err(serde::de::Error::custom(format!(
            "expiresIn must be a whole number of seconds, got {}",
            number
        ))),
    }
}

/// A validated, authorized grant. Exists only for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlGrant {
    pub bucket: String,
    pub path: String,
    pub identity: IdentityId,
    pub expires_in: u64,
}

/// The capability handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUrl {
    pub url: String,
}

/// Why a signed URL was not issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// Request body failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// No token, or the token does not resolve to an identity
    #[error("Caller identity could not be resolved")]
    Unauthenticated,

    /// Authenticated, but the path is outside the caller's scope
    #[error("Path '{path}' is outside the caller's storage scope")]
    Forbidden { path: String },

    /// The storage layer refused or failed to sign
    #[error("Signing failed: {0}")]
    Storage(UpstreamError),
}

// ============================================================================
// Backend interfaces
// ============================================================================

/// Resolves a caller's bearer token to an identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns `Ok(None)` when the provider does not recognise the token.
    async fn resolve(&self, access_token: &str) -> Result<Option<IdentityId>, UpstreamError>;
}

/// Mints time-boxed signed URLs for stored objects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorageSigner: Send + Sync {
    /// Create an absolute URL granting read access to `bucket/path`.
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: u64,
    ) -> Result<String, UpstreamError>;
}

// ============================================================================
// Authorizer
// ============================================================================

/// Issues signed URLs for paths inside the caller's own scope.
#[derive(Clone)]
pub struct MediaAccessAuthorizer {
    identity: Arc<dyn IdentityResolver>,
    signer: Arc<dyn ObjectStorageSigner>,
    default_expires_in: u64,
    max_expires_in: u64,
}

impl MediaAccessAuthorizer {
    /// Create an authorizer with the default expiry limits
    pub fn new(identity: Arc<dyn IdentityResolver>, signer: Arc<dyn ObjectStorageSigner>) -> Self {
        Self {
            identity,
            signer,
            default_expires_in: DEFAULT_EXPIRES_IN_SECONDS,
            max_expires_in: DEFAULT_MAX_EXPIRES_IN_SECONDS,
        }
    }

    /// Override the default and maximum lifetimes (seconds)
    pub fn with_expiry_limits(mut self, default_expires_in: u64, max_expires_in: u64) -> Self {
        self.default_expires_in = default_expires_in;
        self.max_expires_in = max_expires_in;
        self
    }

    /// Authorize a request and mint the signed URL.
    ///
    /// Order of checks: caller identity (401), request shape (400), path
    /// scope (403), then signing.
    #[instrument(skip(self, request, bearer_token), fields(bucket = %request.bucket))]
    pub async fn authorize(
        &self,
        request: &SignedUrlRequest,
        bearer_token: Option<&str>,
    ) -> Result<SignedUrl, AuthorizationError> {
        let token = bearer_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthorizationError::Unauthenticated)?;

        let identity = match self.identity.resolve(token).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                warn!("Bearer token did not resolve to an identity");
                return Err(AuthorizationError::Unauthenticated);
            }
            Err(e) => {
                warn!(error = %e, "Identity resolution failed");
                return Err(AuthorizationError::Unauthenticated);
            }
        };

        let grant = self.grant_for(identity, request)?;

        let url = self
            .signer
            .create_signed_url(&grant.bucket, &grant.path, grant.expires_in)
            .await
            .map_err(|e| {
                warn!(error = %e, transient = e.is_transient(), "Storage signing failed");
                AuthorizationError::Storage(e)
            })?;

        info!(
            identity = %grant.identity,
            expires_in = grant.expires_in,
            "Issued signed URL"
        );
        Ok(SignedUrl { url })
    }

    /// Validate the request and check it against the caller's scope.
    pub fn grant_for(
        &self,
        identity: IdentityId,
        request: &SignedUrlRequest,
    ) -> Result<SignedUrlGrant, AuthorizationError> {
        if request.bucket.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "bucket".to_string(),
            }
            .into());
        }

        if request.path.is_empty() {
            return Err(ValidationError::Required {
                field: "path".to_string(),
            }
            .into());
        }

        if request
            .path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(ValidationError::InvalidCharacters {
                field: "path".to_string(),
                invalid_chars: "empty, '.' or '..' segment".to_string(),
            }
            .into());
        }

        let expires_in = self.resolve_expiry(request.expires_in)?;

        if !request.path.starts_with(&identity.scope_prefix()) {
            warn!(identity = %identity, "Signed URL requested outside caller scope");
            return Err(AuthorizationError::Forbidden {
                path: request.path.clone(),
            });
        }

        Ok(SignedUrlGrant {
            bucket: request.bucket.clone(),
            path: request.path.clone(),
            identity,
            expires_in,
        })
    }

    fn resolve_expiry(&self, requested: Option<i64>) -> Result<u64, ValidationError> {
        let Some(requested) = requested else {
            return Ok(self.default_expires_in);
        };

        match u64::try_from(requested) {
            Ok(seconds) if seconds > 0 && seconds <= self.max_expires_in => Ok(seconds),
            _ => Err(ValidationError::OutOfRange {
                field: "expiresIn".to_string(),
                message: format!("must be between 1 and {} seconds", self.max_expires_in),
            }),
        }
    }
}

#[cfg(test)]
#[path = "media_access_tests.rs"]
mod tests;
