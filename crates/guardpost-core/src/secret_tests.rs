//! Tests for [`SecretString`].

use super::*;

#[test]
fn test_debug_redacts_value() {
    let secret = SecretString::new("twilio-auth-token");
    let debug_str = format!("{:?}", secret);

    assert!(
        !debug_str.contains("twilio-auth-token"),
        "secret must not appear in debug output; got: {}",
        debug_str
    );
    assert!(debug_str.contains("<REDACTED>"));
    assert!(debug_str.contains("17"), "length should be reported");
}

#[test]
fn test_serialize_redacts_value() {
    let secret = SecretString::new("service-role-key");
    let json = serde_json::to_string(&secret).unwrap();
    assert_eq!(json, "\"<REDACTED>\"");
}

#[test]
fn test_deserialize_reads_plain_string() {
    let secret: SecretString = serde_json::from_str("\"abc123\"").unwrap();
    assert_eq!(secret.expose_secret(), "abc123");
    assert_eq!(secret.len(), 6);
}

#[test]
fn test_default_is_empty() {
    let secret = SecretString::default();
    assert!(secret.is_empty());
    assert_eq!(secret.expose_secret(), "");
}
