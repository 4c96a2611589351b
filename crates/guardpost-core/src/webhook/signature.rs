//! Provider request-signature algorithm.
//!
//! canonical = url ++ k1 ++ v1 ++ k2 ++ v2 ... (keys byte-wise ascending)
//! signature = base64(HMAC-SHA1(secret, canonical))

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Build the canonical string both sides sign.
///
/// `BTreeMap<String, _>` iterates in byte-wise key order, which is the
/// ordering the provider uses.
pub fn canonical_string(url: &str, params: &BTreeMap<String, String>) -> String {
    let capacity = url.len()
        + params
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>();

    let mut canonical = String::with_capacity(capacity);
    canonical.push_str(url);
    for (key, value) in params {
        canonical.push_str(key);
        canonical.push_str(value);
    }
    canonical
}

/// Compute the base64 HMAC-SHA1 signature for a request.
pub fn compute_signature(secret: &str, url: &str, params: &BTreeMap<String, String>) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(canonical_string(url, params).as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Check a provided signature against the expected one.
///
/// Returns `false` without hashing when the signature is absent or empty,
/// and `false` when the secret is empty. The comparison runs in constant
/// time; signatures of the wrong length are rejected, never panicked on.
pub fn verify(
    secret: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    provided: Option<&str>,
) -> bool {
    let provided = match provided {
        Some(sig) if !sig.is_empty() => sig,
        _ => return false,
    };

    if secret.is_empty() {
        return false;
    }

    let expected = compute_signature(secret, url, params);
    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    expected.len() == provided.len() && bool::from(expected.ct_eq(provided))
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
