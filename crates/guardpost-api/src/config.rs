//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use guardpost_core::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Platform variable holding the messaging provider auth token
pub const TWILIO_AUTH_TOKEN_VAR: &str = "TWILIO_AUTH_TOKEN";

/// Platform variable holding the hosted backend base URL
pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";

/// Platform variable holding the hosted backend service-role key
pub const SUPABASE_SERVICE_ROLE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Platform variable holding the public webhook URL
pub const PUBLIC_WEBHOOK_URL_VAR: &str = "PUBLIC_WEBHOOK_URL";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Inbound messaging webhook settings
    pub webhook: WebhookConfig,

    /// Hosted backend connection
    pub backend: BackendSettings,

    /// Signed-URL lifetimes
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Inbound messaging webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,

    /// Public URL the provider is configured to call.
    ///
    /// When unset the URL is rebuilt from the forwarded headers of each request.
    pub public_url: Option<String>,

    /// Provider auth token keying the request signature
    pub auth_token: SecretString,

    /// Require signature validation (disable only in development)
    pub require_signature: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/webhooks/whatsapp".to_string(),
            public_url: None,
            auth_token: SecretString::default(),
            require_signature: true,
        }
    }
}

/// Hosted backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Project base URL
    pub url: Option<String>,

    /// Service-role key for server-side calls
    pub service_role_key: SecretString,

    /// Upper bound on each backend call
    pub request_timeout_seconds: u64,

    /// Table holding the guard registry
    pub guards_table: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: None,
            service_role_key: SecretString::default(),
            request_timeout_seconds: 10,
            guards_table: "guards".to_string(),
        }
    }
}

impl BackendSettings {
    /// Whether both the URL and the service key are present
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
            && !self.service_role_key.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Signed-URL lifetime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Lifetime used when the caller does not request one (seconds)
    pub default_expires_in: u64,

    /// Longest lifetime a caller may request (seconds)
    pub max_expires_in: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_expires_in: guardpost_core::DEFAULT_EXPIRES_IN_SECONDS,
            max_expires_in: 7 * 24 * 3600,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Presence of one required secret, as reported by the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredSecret {
    pub name: &'static str,
    pub present: bool,
}

impl ServiceConfig {
    /// Fill unset fields from the platform's conventional variables.
    ///
    /// Values already set through the config file or `GP__` variables win.
    pub fn apply_platform_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.webhook.auth_token.is_empty() {
            if let Some(token) = read(TWILIO_AUTH_TOKEN_VAR) {
                self.webhook.auth_token = SecretString::new(token);
            }
        }

        if self.webhook.public_url.is_none() {
            self.webhook.public_url = read(PUBLIC_WEBHOOK_URL_VAR);
        }

        if self.backend.url.is_none() {
            self.backend.url = read(SUPABASE_URL_VAR);
        }

        if self.backend.service_role_key.is_empty() {
            if let Some(key) = read(SUPABASE_SERVICE_ROLE_KEY_VAR) {
                self.backend.service_role_key = SecretString::new(key);
            }
        }
    }

    /// Secrets the service needs to do its job, and whether each is set
    pub fn required_secrets(&self) -> Vec<RequiredSecret> {
        vec![
            RequiredSecret {
                name: TWILIO_AUTH_TOKEN_VAR,
                present: !self.webhook.auth_token.is_empty(),
            },
            RequiredSecret {
                name: SUPABASE_URL_VAR,
                present: self
                    .backend
                    .url
                    .as_deref()
                    .is_some_and(|u| !u.trim().is_empty()),
            },
            RequiredSecret {
                name: SUPABASE_SERVICE_ROLE_KEY_VAR,
                present: !self.backend.service_role_key.is_empty(),
            },
        ]
    }

    /// Reject malformed values.
    ///
    /// Missing secrets are not an error here; they are reported by `/health`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        if !self.webhook.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhook.endpoint_path must start with '/', got '{}'",
                    self.webhook.endpoint_path
                ),
            });
        }

        if let Some(public_url) = &self.webhook.public_url {
            match url::Url::parse(public_url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ConfigError::Invalid {
                        message: format!(
                            "webhook.public_url must be an absolute http(s) URL, got '{}'",
                            public_url
                        ),
                    })
                }
            }
        }

        if self.storage.max_expires_in == 0 {
            return Err(ConfigError::Invalid {
                message: "storage.max_expires_in must be non-zero".to_string(),
            });
        }

        if self.storage.default_expires_in == 0
            || self.storage.default_expires_in > self.storage.max_expires_in
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "storage.default_expires_in must be between 1 and {}",
                    self.storage.max_expires_in
                ),
            });
        }

        if self.backend.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "backend.request_timeout_seconds must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
