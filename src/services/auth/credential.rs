//! Credential extraction: pull `Authorization: <scheme> <token>` out of the
//! inbound headers without touching anything else.

use axum::http::{HeaderMap, header};

use crate::error::GatewayError;

/// A bearer credential as presented by the caller.
///
/// Keeps both forms the pipeline needs:
/// - the full header value, re-forwarded to the identity service and
///   re-attached on enrichment
/// - the bare token, fed to local validation
#[derive(Debug, Clone)]
pub struct BearerCredential {
    raw: String,
    token: String,
}

impl BearerCredential {
    /// Full `<scheme> <token>` header value.
    pub fn header_value(&self) -> &str {
        &self.raw
    }

    /// Token part only (post-scheme).
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Read the bearer credential from the request headers.
///
/// Absent header, non-UTF-8 value, missing scheme/token pair, or a scheme
/// other than `Bearer` (case-insensitive) all reject the request; none of
/// these conditions may crash the pipeline.
pub fn extract(headers: &HeaderMap) -> Result<BearerCredential, GatewayError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .ok_or(GatewayError::Credential("missing Authorization header"))?
        .to_str()
        .map_err(|_| GatewayError::Credential("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = raw
        .split_once(' ')
        .ok_or(GatewayError::Credential("expected '<scheme> <token>'"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(GatewayError::Credential("unsupported credential scheme"));
    }
    if token.trim().is_empty() {
        return Err(GatewayError::Credential("empty token"));
    }

    Ok(BearerCredential {
        raw: raw.to_string(),
        token: token.to_string(),
    })
}
