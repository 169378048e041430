/*
 * Responsibility
 * - GatewayError: one tagged type for every pipeline failure
 * - Uniform JSON error body ({statusCode, timeStamp, message}, HTTP 502)
 * - The responder itself must always reach a terminal response
 */
use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::identity::IdentityError;
use crate::services::auth::token::TokenError;

/// The single response body shape returned for every rejected request.
/// Only `message` varies between failure kinds.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing or malformed credential: {0}")]
    Credential(&'static str),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Delegate(#[from] IdentityError),

    /// Raised after a successful forward, by the downstream stage itself.
    #[error("downstream error: {0}")]
    Downstream(String),
}

impl GatewayError {
    pub fn classification(&self) -> &'static str {
        match self {
            Self::Credential(_) => "credential_missing_or_malformed",
            Self::Token(TokenError::Malformed(_)) => "token_malformed",
            Self::Token(TokenError::Expired(_)) => "token_expired",
            Self::Token(TokenError::Unsupported(_)) => "token_unsupported",
            Self::Token(TokenError::EmptyClaims(_)) => "token_claims_empty",
            Self::Delegate(_) => "delegate_call_failed",
            Self::Downstream(_) => "downstream_chain_error",
        }
    }
}

/// Convert a pipeline failure into the terminal gateway response.
///
/// This function never fails: if the body cannot be serialized, the
/// response degrades to an empty 502 and the serialization error is logged.
pub fn respond(err: &GatewayError) -> Response {
    tracing::error!(
        classification = err.classification(),
        error = %err,
        "request rejected"
    );

    let body = ErrorBody {
        status_code: StatusCode::BAD_GATEWAY.as_u16(),
        time_stamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        message: err.to_string(),
    };

    match serde_json::to_vec(&body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize error body");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            response
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        respond(&self)
    }
}
