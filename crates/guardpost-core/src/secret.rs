//! Secret string container.
//!
//! Shared webhook secrets and backend service keys flow through
//! configuration into the verifier and the backend client. [`SecretString`]
//! keeps them out of logs: `Debug` and `Serialize` both emit a redaction
//! marker, and the buffer is zeroed when the value is dropped.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "<REDACTED>";

/// A string that must never be logged or echoed back to a caller.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Get the secret for immediate use.
    ///
    /// Do not store the returned slice or pass it to a formatter.
    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }

    /// Check whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in bytes, without exposing content
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretString")
            .field("length", &self.len())
            .field("value", &REDACTED)
            .finish()
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
