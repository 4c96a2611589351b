//! # Guardpost HTTP Service
//!
//! HTTP server for the booking platform's security boundary.
//!
//! This service provides:
//! - WhatsApp webhook endpoint with provider signature validation
//! - Signed-URL endpoint for identity-scoped media access
//! - Configuration health endpoint
//! - Prometheus metrics endpoint

pub mod config;
pub mod conversation;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod public_url;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use guardpost_core::{
    webhook::SIGNATURE_HEADER, CandidateFetcher, GuardRegistry, IdentityResolver, InboundMessage,
    MediaAccessAuthorizer, ObjectStorageSigner, SignatureVerifier, SignedUrl, SignedUrlRequest,
    TwilioSignatureVerifier, WebhookRequest,
};
use std::{future::IntoFuture, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

pub use config::ServiceConfig;
pub use conversation::{
    AcknowledgingHandler, ConversationContext, ConversationError, ConversationHandler,
    ConversationReply,
};
pub use errors::{ConfigError, ServiceError, SignedUrlHandlerError, WebhookHandlerError};
pub use health::{ConfigHealthChecker, HealthChecker, HealthReport};
pub use metrics::ServiceMetrics;

/// Header carrying the request correlation ID
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Path of the signed-URL endpoint
pub const SIGNED_URL_PATH: &str = "/storage/signed-url";

// ============================================================================
// Application State
// ============================================================================

/// Backend collaborators behind the core traits
#[derive(Clone)]
pub struct Backends {
    pub registry: Arc<dyn GuardRegistry>,
    pub identity: Arc<dyn IdentityResolver>,
    pub signer: Arc<dyn ObjectStorageSigner>,
}

impl Backends {
    /// Use one backend for all three roles
    pub fn shared<B>(backend: B) -> Self
    where
        B: GuardRegistry + IdentityResolver + ObjectStorageSigner + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            registry: backend.clone(),
            identity: backend.clone(),
            signer: backend,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Webhook signature verifier
    pub verifier: Arc<dyn SignatureVerifier>,

    /// Business logic for verified inbound messages
    pub conversation: Arc<dyn ConversationHandler>,

    /// Collaborators handed to the conversation handler
    pub conversation_context: ConversationContext,

    /// Signed-URL authorization
    pub authorizer: MediaAccessAuthorizer,

    /// Health checker for system monitoring
    pub health_checker: Arc<dyn HealthChecker>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Wire the service from its configuration and backends.
    pub fn new(
        config: ServiceConfig,
        backends: Backends,
        conversation: Arc<dyn ConversationHandler>,
    ) -> Result<Self, ServiceError> {
        let metrics = ServiceMetrics::new().map_err(|e| {
            ServiceError::Configuration(ConfigError::Invalid {
                message: format!("Failed to initialize metrics: {}", e),
            })
        })?;

        let verifier = TwilioSignatureVerifier::new(config.webhook.auth_token.clone());
        if !config.webhook.require_signature {
            warn!("Webhook signature validation is DISABLED; use only in development");
        } else if !verifier.has_secret() {
            warn!("No webhook auth token configured; every webhook will be rejected");
        }

        let authorizer = MediaAccessAuthorizer::new(backends.identity, backends.signer)
            .with_expiry_limits(
                config.storage.default_expires_in,
                config.storage.max_expires_in,
            );

        let health_checker = Arc::new(ConfigHealthChecker::new(&config));

        Ok(Self {
            conversation_context: ConversationContext {
                candidates: CandidateFetcher::new(backends.registry),
            },
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            conversation,
            authorizer,
            health_checker,
            metrics,
        })
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes =
        Router::new().route(&state.config.webhook.endpoint_path, post(handle_webhook));

    let storage_routes = Router::new().route(SIGNED_URL_PATH, post(handle_signed_url));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .merge(webhook_routes)
        .merge(storage_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    request_logging_middleware,
                ))
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let shutdown_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);
    let app = create_router(state);

    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", address);

    // Graceful shutdown stops accepting connections at once, then lets
    // in-flight requests finish for at most `shutdown_timeout`.
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let trigger = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(shutdown_timeout).await;
            trigger.notify_one();
        })
        .into_future();

    let deadline = async move {
        shutdown.notified().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; abandoning in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(timeout_seconds = timeout.as_secs(), "Received SIGINT, shutting down");
        },
        _ = terminate => {
            info!(timeout_seconds = timeout.as_secs(), "Received SIGTERM, shutting down");
        },
    }
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Handle inbound WhatsApp webhooks
///
/// 1. Rebuild the public URL the provider signed
/// 2. Verify the signature; reject with 403 before any business logic runs
/// 3. Parse the verified form into an [`InboundMessage`]
/// 4. Hand it to the conversation handler and answer with its TwiML reply
#[instrument(skip(state, headers, body), fields(path = %uri.path()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookHandlerError> {
    let result = process_webhook(&state, &uri, &headers, &body).await;

    let outcome = match &result {
        Ok(_) => "accepted",
        Err(e) => e.outcome(),
    };
    state.metrics.record_webhook(outcome);

    result
}

async fn process_webhook(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, WebhookHandlerError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let params = if state.config.webhook.require_signature {
        let url = public_url::canonical_webhook_url(
            state.config.webhook.public_url.as_deref(),
            headers,
            uri,
        )
        .map_err(|e| WebhookHandlerError::UnresolvableUrl {
            message: e.to_string(),
        })?;

        let request = WebhookRequest::from_form_body(url, body, signature);
        if !state.verifier.verify(&request) {
            warn!(
                url = %request.url,
                signature_present = request.signature().is_some(),
                "Rejected webhook with invalid signature"
            );
            return Err(WebhookHandlerError::InvalidSignature);
        }
        request.params
    } else {
        WebhookRequest::from_form_body(uri.to_string(), body, signature).params
    };

    let message = InboundMessage::from_params(&params)?;
    info!(
        message_sid = message.message_sid.as_deref().unwrap_or(""),
        num_media = message.num_media,
        "Verified inbound message"
    );

    let reply = state
        .conversation
        .handle(message, &state.conversation_context)
        .await?;
    let twiml = reply.to_twiml()?;

    Ok((
        [(header::CONTENT_TYPE, conversation::TWIML_CONTENT_TYPE)],
        twiml,
    )
        .into_response())
}

// ============================================================================
// Signed URL Handler
// ============================================================================

/// Issue a signed URL for an object in the caller's own storage scope
#[instrument(skip(state, headers, body))]
pub async fn handle_signed_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SignedUrl>, SignedUrlHandlerError> {
    let result = issue_signed_url(&state, &headers, &body).await;

    let outcome = match &result {
        Ok(_) => "issued",
        Err(e) => e.outcome(),
    };
    state.metrics.record_signed_url(outcome);

    result.map(Json)
}

async fn issue_signed_url(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<SignedUrl, SignedUrlHandlerError> {
    let token = bearer_token(headers);

    // Missing credentials are reported before the body is parsed.
    if token.is_none() {
        return Err(guardpost_core::AuthorizationError::Unauthenticated.into());
    }

    let request: SignedUrlRequest =
        serde_json::from_slice(body).map_err(|e| SignedUrlHandlerError::MalformedBody {
            message: e.to_string(),
        })?;

    Ok(state.authorizer.authorize(&request, token).await?)
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Some(token.trim()).filter(|t| !t.is_empty())
}

// ============================================================================
// Health and Observability Handlers
// ============================================================================

/// Configuration health check. Always 200; `ok` carries the verdict.
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health_checker.check().await)
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// This middleware:
/// - Extracts or generates correlation IDs for request tracking
/// - Logs request start and completion with structured fields
/// - Propagates correlation ID through response headers
/// - Records request count and duration
#[instrument(skip(state, request, next), fields(
    method = %request.method(),
    path = %request.uri().path(),
    correlation_id
))]
async fn request_logging_middleware(
    State(state): State<AppState>,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    request.extensions_mut().insert(correlation_id.clone());

    info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        "Request started"
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();
    state.metrics.record_http_request(duration);

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();

    // Log at appropriate level based on status code
    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
