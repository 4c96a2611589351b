//! # Hosted Backend Client
//!
//! REST client for the hosted backend-as-a-service platform. One client
//! implements all three core interfaces:
//!
//! | Interface | Endpoint |
//! |-----------|----------|
//! | [`GuardRegistry`] | `GET /rest/v1/{guards_table}` (generated table API) |
//! | [`IdentityResolver`] | `GET /auth/v1/user` with the caller's token |
//! | [`ObjectStorageSigner`] | `POST /storage/v1/object/sign/{bucket}/{path}` |
//!
//! Server-side calls authenticate with the service-role key. No call is
//! retried; the configured request timeout bounds every call.

use crate::candidates::{CandidateQuery, GuardRecord, GuardRegistry};
use crate::media_access::{IdentityResolver, ObjectStorageSigner};
use crate::{IdentityId, SecretString, UpstreamError, ValidationError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const REGISTRY_SERVICE: &str = "guard registry";
const IDENTITY_SERVICE: &str = "identity provider";
const STORAGE_SERVICE: &str = "object storage";

/// Longest upstream error body echoed into an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abcd.supabase.co`
    pub url: String,

    /// Service-role key used for server-side calls
    pub service_role_key: SecretString,

    /// Upper bound on each upstream call
    pub request_timeout: Duration,

    /// Table holding the guard registry
    pub guards_table: String,
}

impl BackendConfig {
    /// Create a config with the default timeout and table name
    pub fn new(url: impl Into<String>, service_role_key: SecretString) -> Self {
        Self {
            url: url.into(),
            service_role_key,
            request_timeout: Duration::from_secs(10),
            guards_table: "guards".to_string(),
        }
    }
}

/// REST client for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    service_role_key: SecretString,
    guards_table: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl BackendClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidFormat`] when the base URL is not an
    /// absolute http(s) URL or the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, ValidationError> {
        let base_url = Url::parse(config.url.trim_end_matches('/')).map_err(|e| {
            ValidationError::InvalidFormat {
                field: "backend.url".to_string(),
                message: e.to_string(),
            }
        })?;

        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidFormat {
                field: "backend.url".to_string(),
                message: "must be an absolute http(s) URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ValidationError::InvalidFormat {
                field: "backend.http_client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            base_url,
            service_role_key: config.service_role_key,
            guards_table: config.guards_table,
            http,
        })
    }

    /// Build an endpoint URL below the base URL, percent-encoding each segment.
    fn endpoint<'a>(
        &self,
        service: &str,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| UpstreamError::Request {
                service: service.to_string(),
                message: "backend URL cannot carry a path".to_string(),
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Attach service-role credentials.
    fn with_service_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.service_role_key.expose_secret();
        request.header("apikey", key).bearer_auth(key)
    }

    async fn send(
        service: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, UpstreamError> {
        request.send().await.map_err(|e| UpstreamError::Request {
            service: service.to_string(),
            message: e.without_url().to_string(),
        })
    }

    async fn status_error(service: &str, response: reqwest::Response) -> UpstreamError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        UpstreamError::Status {
            service: service.to_string(),
            status,
            message: error_message(&body),
        }
    }

    fn decode_error(service: &str, error: impl std::fmt::Display) -> UpstreamError {
        UpstreamError::Decode {
            service: service.to_string(),
            message: error.to_string(),
        }
    }

    /// Resolve a storage-relative signed URL against the backend base URL.
    fn absolute_storage_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            return signed.to_string();
        }

        let base = self.base_url.as_str().trim_end_matches('/');
        if signed.starts_with('/') {
            format!("{}/storage/v1{}", base, signed)
        } else {
            format!("{}/storage/v1/{}", base, signed)
        }
    }
}

/// Pull a human readable message out of an upstream error body.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["message", "error_description", "msg", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
    });

    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        return message;
    }

    let mut cut = MAX_ERROR_MESSAGE_LEN;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &message[..cut])
}

#[async_trait]
impl GuardRegistry for BackendClient {
    #[instrument(skip(self))]
    async fn list_guards(&self, query: &CandidateQuery) -> Result<Vec<GuardRecord>, UpstreamError> {
        let url = self.endpoint(REGISTRY_SERVICE, ["rest", "v1", self.guards_table.as_str()])?;

        let limit = query.limit.to_string();
        let mut params = vec![
            ("select", "*"),
            ("order", "rating.desc.nullslast"),
            ("limit", limit.as_str()),
        ];
        if query.active_only {
            params.push(("is_active", "eq.true"));
        }

        let request = self.with_service_key(self.http.get(url).query(&params));
        let response = Self::send(REGISTRY_SERVICE, request).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(REGISTRY_SERVICE, response).await);
        }

        let records: Vec<GuardRecord> = response
            .json()
            .await
            .map_err(|e| Self::decode_error(REGISTRY_SERVICE, e))?;

        debug!(rows = records.len(), "Guard registry query returned");
        Ok(records)
    }
}

#[async_trait]
impl IdentityResolver for BackendClient {
    #[instrument(skip_all)]
    async fn resolve(&self, access_token: &str) -> Result<Option<IdentityId>, UpstreamError> {
        let url = self.endpoint(IDENTITY_SERVICE, ["auth", "v1", "user"])?;

        let request = self
            .http
            .get(url)
            .header("apikey", self.service_role_key.expose_secret())
            .bearer_auth(access_token);
        let response = Self::send(IDENTITY_SERVICE, request).await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("Identity provider rejected token");
                return Ok(None);
            }
            _ => return Err(Self::status_error(IDENTITY_SERVICE, response).await),
        }

        let user: AuthUser = response
            .json()
            .await
            .map_err(|e| Self::decode_error(IDENTITY_SERVICE, e))?;

        match user.id {
            Some(id) if !id.is_empty() => IdentityId::new(id)
                .map(Some)
                .map_err(|e| Self::decode_error(IDENTITY_SERVICE, e)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl ObjectStorageSigner for BackendClient {
    #[instrument(skip(self))]
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: u64,
    ) -> Result<String, UpstreamError> {
        let segments = ["storage", "v1", "object", "sign", bucket]
            .into_iter()
            .chain(path.split('/'));
        let url = self.endpoint(STORAGE_SERVICE, segments)?;

        let request = self.with_service_key(
            self.http
                .post(url)
                .json(&json!({ "expiresIn": expires_in })),
        );
        let response = Self::send(STORAGE_SERVICE, request).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(STORAGE_SERVICE, response).await);
        }

        let signed: SignResponse = response
            .json()
            .await
            .map_err(|e| Self::decode_error(STORAGE_SERVICE, e))?;

        Ok(self.absolute_storage_url(&signed.signed_url))
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
