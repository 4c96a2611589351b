//! Common test utilities for guardpost-api integration tests
//!
//! This module provides:
//! - A recording conversation handler
//! - Builders for signed webhook and signed-URL requests
//! - App construction over the real hosted backend client pointed at a mock server

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use guardpost_api::{
    create_router, AppState, Backends, ConversationContext, ConversationError,
    ConversationHandler, ConversationReply, ServiceConfig,
};
use guardpost_core::{
    webhook::compute_signature, BackendClient, BackendConfig, InboundMessage, SecretString,
    UnconfiguredBackend,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const AUTH_TOKEN: &str = "integration-auth-token";
pub const SERVICE_KEY: &str = "integration-service-key";
pub const PUBLIC_HOST: &str = "hooks.guardpost.test";

// ============================================================================
// Conversation handler
// ============================================================================

/// Handler that records every message it receives and replies with fixed text
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingHandler {
    received: Arc<Mutex<Vec<InboundMessage>>>,
    reply: Option<String>,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn replying(text: &str) -> Self {
        Self {
            received: Arc::default(),
            reply: Some(text.to_string()),
        }
    }

    pub fn received(&self) -> Vec<InboundMessage> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationHandler for RecordingHandler {
    async fn handle(
        &self,
        message: InboundMessage,
        _context: &ConversationContext,
    ) -> Result<ConversationReply, ConversationError> {
        self.received.lock().unwrap().push(message);
        Ok(match &self.reply {
            Some(text) => ConversationReply::text(text.clone()),
            None => ConversationReply::empty(),
        })
    }
}

// ============================================================================
// App construction
// ============================================================================

/// Configuration with every secret present and the backend at `backend_url`
#[allow(dead_code)]
pub fn test_config(backend_url: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.webhook.auth_token = SecretString::new(AUTH_TOKEN);
    config.backend.url = Some(backend_url.to_string());
    config.backend.service_role_key = SecretString::new(SERVICE_KEY);
    config
}

/// Backends served by the real REST client
#[allow(dead_code)]
pub fn hosted_backends(backend_url: &str) -> Backends {
    let client = BackendClient::new(BackendConfig::new(
        backend_url,
        SecretString::new(SERVICE_KEY),
    ))
    .expect("Failed to create backend client");
    Backends::shared(client)
}

#[allow(dead_code)]
pub fn unconfigured_backends() -> Backends {
    Backends::shared(UnconfiguredBackend)
}

#[allow(dead_code)]
pub fn create_app(
    config: ServiceConfig,
    backends: Backends,
    handler: RecordingHandler,
) -> (Router, AppState) {
    let state =
        AppState::new(config, backends, Arc::new(handler)).expect("Failed to create app state");
    (create_router(state.clone()), state)
}

// ============================================================================
// Request builders
// ============================================================================

/// A typical inbound WhatsApp form
#[allow(dead_code)]
pub fn whatsapp_form() -> BTreeMap<String, String> {
    [
        ("AccountSid", "AC0000000000"),
        ("Body", "Hi, I need two guards for Saturday"),
        ("From", "whatsapp:+27821234567"),
        ("MessageSid", "SM0000000001"),
        ("NumMedia", "0"),
        ("ProfileName", "Thandi"),
        ("To", "whatsapp:+14155238886"),
        ("WaId", "27821234567"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Webhook request as delivered through a TLS-terminating proxy
#[allow(dead_code)]
pub fn proxied_webhook_request(
    params: &BTreeMap<String, String>,
    signature: Option<&str>,
) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();

    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/whatsapp")
        .header("host", "10.0.0.12:8080")
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", PUBLIC_HOST)
        .header("content-type", "application/x-www-form-urlencoded");

    if let Some(signature) = signature {
        builder = builder.header("x-twilio-signature", signature);
    }

    builder.body(Body::from(body)).unwrap()
}

/// Signature the provider would attach for the public webhook URL
#[allow(dead_code)]
pub fn provider_signature(secret: &str, params: &BTreeMap<String, String>) -> String {
    let url = format!("https://{}/webhooks/whatsapp", PUBLIC_HOST);
    compute_signature(secret, &url, params)
}

#[allow(dead_code)]
pub fn signed_url_request(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/storage/signed-url")
        .header("content-type", "application/json");

    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8")
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).expect("Body should be JSON")
}
