//! Request enrichment: rebuild the accepted request with the credential
//! re-attached and the delegate's authority label added.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, header};

use crate::error::GatewayError;
use crate::services::auth::credential::BearerCredential;
use crate::services::auth::identity::{AuthorityInfo, IdentityError};

/// Header carrying the authority label to the backend.
pub const AUTHORITY_HEADER: HeaderName = HeaderName::from_static("authority");

/// Produce the outbound request: identical to the inbound one except the
/// `Authorization` and `authority` headers are set (overwriting any caller
/// supplied `authority`). Consumes the request by value; nothing the caller
/// still holds an alias to is mutated.
///
/// Cannot fail for metadata accepted by the delegate, which has already
/// checked header-value safety; the guards here keep that invariant local.
pub fn enrich(
    req: Request<Body>,
    credential: &BearerCredential,
    info: &AuthorityInfo,
) -> Result<Request<Body>, GatewayError> {
    let (mut parts, body) = req.into_parts();

    let credential_value = HeaderValue::from_str(credential.header_value())
        .map_err(|_| GatewayError::Credential("credential is not a valid header value"))?;
    let authority_value = HeaderValue::from_str(&info.authority)
        .map_err(|_| GatewayError::Delegate(IdentityError::InvalidMetadata("authority")))?;

    parts.headers.insert(header::AUTHORIZATION, credential_value);
    parts.headers.insert(AUTHORITY_HEADER, authority_value);

    Ok(Request::from_parts(parts, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::credential;
    use axum::http::HeaderMap;

    fn sample_credential() -> BearerCredential {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer a.b.c"),
        );
        credential::extract(&headers).unwrap()
    }

    #[test]
    fn adds_authorization_and_authority_headers() {
        let req = Request::builder()
            .uri("/user/42")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();

        let info = AuthorityInfo {
            authority: "ADMIN".to_string(),
            token: "Bearer a.b.c".to_string(),
        };

        let enriched = enrich(req, &sample_credential(), &info).unwrap();
        assert_eq!(
            enriched.headers().get(header::AUTHORIZATION).unwrap(),
            "Bearer a.b.c"
        );
        assert_eq!(enriched.headers().get(&AUTHORITY_HEADER).unwrap(), "ADMIN");
        // Unrelated headers survive untouched.
        assert_eq!(enriched.headers().get("x-request-id").unwrap(), "abc-123");
    }

    #[test]
    fn caller_supplied_authority_header_is_overwritten() {
        let req = Request::builder()
            .uri("/user/42")
            .header("authority", "SPOOFED")
            .body(Body::empty())
            .unwrap();

        let info = AuthorityInfo {
            authority: "USER".to_string(),
            token: "Bearer a.b.c".to_string(),
        };

        let enriched = enrich(req, &sample_credential(), &info).unwrap();
        let values: Vec<_> = enriched.headers().get_all(&AUTHORITY_HEADER).iter().collect();
        assert_eq!(values, vec!["USER"]);
    }

    #[test]
    fn original_header_snapshot_is_not_aliased() {
        let req = Request::builder().uri("/order/7").body(Body::empty()).unwrap();
        let snapshot = req.headers().clone();

        let info = AuthorityInfo {
            authority: "USER".to_string(),
            token: "Bearer a.b.c".to_string(),
        };
        let enriched = enrich(req, &sample_credential(), &info).unwrap();

        assert!(snapshot.get(&AUTHORITY_HEADER).is_none());
        assert!(enriched.headers().get(&AUTHORITY_HEADER).is_some());
    }
}
