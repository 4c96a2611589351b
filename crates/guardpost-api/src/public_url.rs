//! Reconstruction of the public URL a webhook was sent to.
//!
//! The provider signs the URL it called, which behind a load balancer or
//! tunnel is not the URL this process sees. Either the configured public URL
//! is used, or the URL is rebuilt from the forwarding headers.

use axum::http::{header, HeaderMap, Uri};

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";

/// Why the public URL could not be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublicUrlError {
    #[error("request carries neither X-Forwarded-Host nor Host")]
    MissingHost,

    #[error("header '{name}' is not valid visible ASCII")]
    InvalidHeader { name: &'static str },
}

/// Determine the exact URL the provider signed.
///
/// With a configured `public_url` the request's query string (if any) is
/// appended to it. Otherwise the URL is `proto://host/path?query`, where the
/// scheme comes from `X-Forwarded-Proto` (default `https`) and the host from
/// `X-Forwarded-Host` or `Host`. Only the first value of a comma-separated
/// forwarding header is used.
pub fn canonical_webhook_url(
    public_url: Option<&str>,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<String, PublicUrlError> {
    let query = uri.query().filter(|q| !q.is_empty());

    if let Some(base) = public_url {
        return Ok(match query {
            Some(q) if base.contains('?') => format!("{}&{}", base, q),
            Some(q) => format!("{}?{}", base, q),
            None => base.to_string(),
        });
    }

    let proto = first_forwarded_value(headers, FORWARDED_PROTO)?.unwrap_or("https");

    let host = match first_forwarded_value(headers, FORWARDED_HOST)? {
        Some(host) => host,
        None => headers
            .get(header::HOST)
            .map(|v| {
                v.to_str()
                    .map_err(|_| PublicUrlError::InvalidHeader { name: "host" })
            })
            .transpose()?
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(PublicUrlError::MissingHost)?,
    };

    let mut url = format!("{}://{}{}", proto.to_ascii_lowercase(), host, uri.path());
    if let Some(q) = query {
        url.push('?');
        url.push_str(q);
    }
    Ok(url)
}

fn first_forwarded_value<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<Option<&'a str>, PublicUrlError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| PublicUrlError::InvalidHeader { name })?;

    Ok(value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty()))
}

#[cfg(test)]
#[path = "public_url_tests.rs"]
mod tests;
