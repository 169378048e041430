//! Identity delegation: exchange a locally valid credential for authority
//! metadata via the remote identity service.
//!
//! The trait seam exists so the pipeline can be driven by a mock in tests;
//! the production implementation is [`HttpIdentityClient`].

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderValue, header};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Authorization metadata returned by the identity service: a role label
/// plus a (possibly re-issued) token. Owned by one in-flight request and
/// never cached across requests.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityInfo {
    pub authority: String,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid identity endpoint: {0}")]
    Endpoint(String),

    #[error("identity service call failed: {0}")]
    Transport(String),

    #[error("identity service call timed out after {0:?}")]
    TimedOut(Duration),

    #[error("identity service returned status {0}")]
    Status(u16),

    #[error("identity service returned an unparsable body: {0}")]
    MalformedBody(String),

    #[error("identity service returned a '{0}' value unusable as a header")]
    InvalidMetadata(&'static str),
}

/// Outbound call to the identity service. The future is dropped if the
/// inbound connection goes away, cancelling the call with it.
#[async_trait]
pub trait IdentityDelegate: Send + Sync {
    /// Exchange the full credential header value for authority metadata.
    async fn validate_token(&self, credential: &str) -> Result<AuthorityInfo, IdentityError>;
}

pub struct HttpIdentityClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpIdentityClient {
    pub const VALIDATE_PATH: &'static str = "/api/auth/validateToken";

    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, IdentityError> {
        let endpoint = format!(
            "{}{}",
            base_url.as_str().trim_end_matches('/'),
            Self::VALIDATE_PATH
        )
        .parse::<Url>()
        .map_err(|e| IdentityError::Endpoint(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }
}

#[async_trait]
impl IdentityDelegate for HttpIdentityClient {
    async fn validate_token(&self, credential: &str) -> Result<AuthorityInfo, IdentityError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .header(header::AUTHORIZATION, credential)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IdentityError::TimedOut(self.timeout)
                } else {
                    IdentityError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Status(status.as_u16()));
        }

        let info: AuthorityInfo = response
            .json()
            .await
            .map_err(|e| IdentityError::MalformedBody(e.to_string()))?;

        // Guarantee downstream enrichment cannot fail on this metadata.
        if HeaderValue::from_str(&info.authority).is_err() {
            return Err(IdentityError::InvalidMetadata("authority"));
        }
        if HeaderValue::from_str(&info.token).is_err() {
            return Err(IdentityError::InvalidMetadata("token"));
        }

        Ok(info)
    }
}
