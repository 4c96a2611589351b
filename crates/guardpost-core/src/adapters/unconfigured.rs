//! # Unconfigured Backend
//!
//! Stand-in used when the service starts without backend credentials. Every
//! call fails with [`UpstreamError::NotConfigured`], so signed-URL requests
//! are rejected as unauthenticated and candidate fetches fail fast.

use crate::candidates::{CandidateQuery, GuardRecord, GuardRegistry};
use crate::media_access::{IdentityResolver, ObjectStorageSigner};
use crate::{IdentityId, UpstreamError};
use async_trait::async_trait;

/// Backend that refuses every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredBackend;

impl UnconfiguredBackend {
    fn error(service: &str) -> UpstreamError {
        UpstreamError::NotConfigured {
            service: service.to_string(),
        }
    }
}

#[async_trait]
impl GuardRegistry for UnconfiguredBackend {
    async fn list_guards(
        &self,
        _query: &CandidateQuery,
    ) -> Result<Vec<GuardRecord>, UpstreamError> {
        Err(Self::error("guard registry"))
    }
}

#[async_trait]
impl IdentityResolver for UnconfiguredBackend {
    async fn resolve(&self, _access_token: &str) -> Result<Option<IdentityId>, UpstreamError> {
        Err(Self::error("identity provider"))
    }
}

#[async_trait]
impl ObjectStorageSigner for UnconfiguredBackend {
    async fn create_signed_url(
        &self,
        _bucket: &str,
        _path: &str,
        _expires_in: u64,
    ) -> Result<String, UpstreamError> {
        Err(Self::error("object storage"))
    }
}
