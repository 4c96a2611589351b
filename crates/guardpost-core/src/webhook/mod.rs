//! # Webhook Verification Module
//!
//! Verifies inbound WhatsApp webhooks delivered by the messaging provider and
//! projects the verified form into an [`InboundMessage`].
//!
//! The provider signs every request with HMAC-SHA1 over the public URL it
//! targeted followed by the sorted form parameters (see [`signature`]). The
//! receiver must reconstruct that exact URL; a request rebuilt from an
//! internal, reverse-proxied address will never verify.

use crate::{SecretString, ValidationError};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, instrument};

pub mod signature;

pub use signature::{canonical_string, compute_signature, verify};

/// Header carrying the provider's request signature.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// Address prefix the provider puts in front of WhatsApp phone numbers.
const WHATSAPP_ADDRESS_PREFIX: &str = "whatsapp:";

// ============================================================================
// Core Types
// ============================================================================

/// A webhook request as seen by the verifier.
///
/// Built once per inbound HTTP call and discarded after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    /// The exact public URL the provider targeted, including any query string
    pub url: String,

    /// Flat form parameters, sorted by key
    pub params: BTreeMap<String, String>,

    /// Signature attached by the sender, absent on spoofed requests
    pub signature: Option<String>,
}

impl WebhookRequest {
    /// Create a webhook request from already decoded parameters
    pub fn new(
        url: impl Into<String>,
        params: BTreeMap<String, String>,
        signature: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            params,
            signature,
        }
    }

    /// Create a webhook request from a raw `application/x-www-form-urlencoded` body.
    ///
    /// Keys are unique in the provider's format; should a body repeat a key,
    /// the last value wins.
    pub fn from_form_body(url: impl Into<String>, body: &[u8], signature: Option<String>) -> Self {
        let params = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self::new(url, params, signature)
    }

    /// Get the attached signature if present and non-empty
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref().filter(|s| !s.is_empty())
    }

    /// Get a single form parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// A verified inbound WhatsApp message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender address, e.g. `whatsapp:+15551234567`
    pub from: String,
    /// Receiving address (our number)
    pub to: Option<String>,
    /// Message text; empty for media-only messages
    pub body: String,
    /// Display name the sender configured in WhatsApp
    pub profile_name: Option<String>,
    /// WhatsApp account ID of the sender
    pub wa_id: Option<String>,
    /// Provider message identifier
    pub message_sid: Option<String>,
    /// Number of attached media items
    pub num_media: u32,
}

impl InboundMessage {
    /// Build a message from verified form parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] when `From` is missing or empty
    /// and [`ValidationError::InvalidFormat`] when `NumMedia` is not a number.
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, ValidationError> {
        let non_empty = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();

        let from = non_empty("From").ok_or_else(|| ValidationError::Required {
            field: "From".to_string(),
        })?;

        let num_media = match params.get("NumMedia").map(|v| v.trim()) {
            None | Some("") => 0,
            Some(raw) => raw.parse().map_err(|_| ValidationError::InvalidFormat {
                field: "NumMedia".to_string(),
                message: format!("expected a non-negative integer, got '{}'", raw),
            })?,
        };

        Ok(Self {
            from,
            to: non_empty("To"),
            body: params.get("Body").cloned().unwrap_or_default(),
            profile_name: non_empty("ProfileName"),
            wa_id: non_empty("WaId"),
            message_sid: non_empty("MessageSid"),
            num_media,
        })
    }

    /// Sender phone number without the `whatsapp:` address prefix
    pub fn sender_number(&self) -> &str {
        self.from
            .strip_prefix(WHATSAPP_ADDRESS_PREFIX)
            .unwrap_or(&self.from)
    }
}

// ============================================================================
// Verifier
// ============================================================================

/// Interface for deciding whether a webhook request is authentic.
pub trait SignatureVerifier: Send + Sync {
    /// Return `true` only when the request carries a valid signature.
    ///
    /// Implementations must fail closed and must never log the secret.
    fn verify(&self, request: &WebhookRequest) -> bool;
}

/// [`SignatureVerifier`] for the messaging provider's HMAC-SHA1 scheme.
///
/// A verifier constructed with an empty secret rejects every request.
///
/// # Examples
///
/// ```rust
/// use guardpost_core::webhook::{
///     compute_signature, SignatureVerifier, TwilioSignatureVerifier, WebhookRequest,
/// };
/// use std::collections::BTreeMap;
///
/// let verifier = TwilioSignatureVerifier::new("s3cr3t".into());
/// let url = "https://x.test/webhooks/whatsapp";
/// let signature = compute_signature("s3cr3t", url, &BTreeMap::new());
/// let request = WebhookRequest::new(url, BTreeMap::new(), Some(signature));
/// assert!(verifier.verify(&request));
/// ```
#[derive(Clone)]
pub struct TwilioSignatureVerifier {
    secret: SecretString,
}

impl TwilioSignatureVerifier {
    /// Create a verifier keyed with the provider auth token
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Whether a non-empty secret is available
    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }
}

impl fmt::Debug for TwilioSignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioSignatureVerifier")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl SignatureVerifier for TwilioSignatureVerifier {
    #[instrument(skip_all, fields(param_count = request.params.len()))]
    fn verify(&self, request: &WebhookRequest) -> bool {
        let accepted = signature::verify(
            self.secret.expose_secret(),
            &request.url,
            &request.params,
            request.signature(),
        );
        debug!(accepted, "Webhook signature checked");
        accepted
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
