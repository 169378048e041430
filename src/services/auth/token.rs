//! Local token validation: a purely synchronous HS256 check against the
//! pre-shared gateway secret. Rejects bad tokens before any network cost
//! is paid.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde_json::{Map, Value};
use thiserror::Error;

/// Classified local-validation failures. Each carries the verifier's
/// diagnostic so the error response can say what was wrong.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Malformed(String),

    #[error("token is expired: {0}")]
    Expired(String),

    #[error("token is unsupported: {0}")]
    Unsupported(String),

    #[error("token claims are empty: {0}")]
    EmptyClaims(String),
}

/// HS256 verifier over the pre-shared secret.
#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("TokenValidator")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let decoding_key = DecodingKey::from_secret(secret);
        // Defaults already require and check `exp`. The gateway has no
        // audience of its own; `aud` belongs to the identity service.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        Self {
            decoding_key,
            validation,
        }
    }

    /// Check signature, expiry, algorithm support, and that the claims
    /// payload is a non-empty JSON object. No I/O.
    ///
    /// A valid signature over a payload that is not a recognizable claims
    /// object still fails; nothing is passed through on signature alone.
    pub fn validate(&self, token: &str) -> Result<(), TokenError> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(classify)?;

        if data.claims.is_empty() {
            return Err(TokenError::EmptyClaims(
                "claims object has no entries".to_string(),
            ));
        }

        Ok(())
    }
}

fn classify(e: jsonwebtoken::errors::Error) -> TokenError {
    let diagnostic = e.to_string();
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired(diagnostic),
        ErrorKind::InvalidAlgorithm => TokenError::Unsupported(diagnostic),
        ErrorKind::MissingRequiredClaim(_) => TokenError::EmptyClaims(diagnostic),
        _ => TokenError::Malformed(diagnostic),
    }
}
