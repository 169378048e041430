//! Authentication interceptor: extract -> validate locally -> delegate ->
//! enrich -> forward, short-circuiting to the error responder at the first
//! failure.
//!
//! The forward stage is a generic closure so the pipeline can be exercised
//! without a router; the axum adapter passes `next.run(..)`. Failures
//! raised by the forward stage itself resolve through the same recovery
//! path as authentication failures.

use std::future::Future;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::{self, GatewayError};
use crate::services::auth::{credential, enrich};
use crate::state::AppState;

/// Apply the authentication interceptor to every route in the router.
///
/// axum 0.8's `from_fn` cannot take a State extractor on its own, so the
/// state is passed explicitly via `from_fn_with_state`.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, authenticate))
}

async fn authenticate(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    intercept(&state, req, |enriched| async move {
        Ok(next.run(enriched).await)
    })
    .await
}

/// Run the full interception pipeline. Always terminates: a request either
/// comes back from `forward`, or every failure (including one returned by
/// `forward`) becomes the uniform gateway error response.
pub async fn intercept<F, Fut>(state: &AppState, req: Request<Body>, forward: F) -> Response
where
    F: FnOnce(Request<Body>) -> Fut,
    Fut: Future<Output = Result<Response, GatewayError>>,
{
    match run(state, req, forward).await {
        Ok(response) => response,
        Err(err) => error::respond(&err),
    }
}

async fn run<F, Fut>(
    state: &AppState,
    req: Request<Body>,
    forward: F,
) -> Result<Response, GatewayError>
where
    F: FnOnce(Request<Body>) -> Fut,
    Fut: Future<Output = Result<Response, GatewayError>>,
{
    let credential = credential::extract(req.headers())?;

    // Local check first: reject bad tokens before paying for a round trip.
    state.validator.validate(credential.token())?;

    let info = state
        .identity
        .validate_token(credential.header_value())
        .await?;
    tracing::debug!(authority = %info.authority, "identity delegate accepted credential");

    let enriched = enrich::enrich(req, &credential, &info)?;
    forward(enriched).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::http::{StatusCode, header};
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    use crate::services::auth::enrich::AUTHORITY_HEADER;
    use crate::services::auth::identity::{AuthorityInfo, IdentityDelegate, IdentityError};
    use crate::services::auth::token::TokenValidator;
    use crate::services::proxy::{Forwarder, RouteTable};

    const SECRET: &[u8] = b"pipeline-test-secret";

    struct MockDelegate {
        calls: AtomicUsize,
        outcome: Box<dyn Fn() -> Result<AuthorityInfo, IdentityError> + Send + Sync>,
    }

    impl MockDelegate {
        fn returning(
            outcome: impl Fn() -> Result<AuthorityInfo, IdentityError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Box::new(outcome),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityDelegate for MockDelegate {
        async fn validate_token(&self, _credential: &str) -> Result<AuthorityInfo, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn state_with(delegate: Arc<MockDelegate>) -> AppState {
        AppState::new(
            Arc::new(TokenValidator::new(SECRET)),
            delegate,
            Arc::new(RouteTable::default()),
            Arc::new(Forwarder::new().unwrap()),
        )
    }

    fn valid_token() -> String {
        let exp = (chrono::Utc::now().timestamp() + 3600) as u64;
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({"sub": "user-1", "exp": exp}),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn admin_info() -> AuthorityInfo {
        AuthorityInfo {
            authority: "ADMIN".to_string(),
            token: format!("Bearer {}", valid_token()),
        }
    }

    /// Forward stage that captures the request it receives.
    fn capturing_forward() -> (
        Arc<Mutex<Option<Request<Body>>>>,
        impl FnOnce(Request<Body>) -> std::future::Ready<Result<Response, GatewayError>>,
    ) {
        let slot: Arc<Mutex<Option<Request<Body>>>> = Arc::new(Mutex::new(None));
        let captured = slot.clone();
        let forward = move |req: Request<Body>| {
            *captured.lock().unwrap() = Some(req);
            std::future::ready(Ok(Response::new(Body::empty())))
        };
        (slot, forward)
    }

    async fn error_body(response: Response) -> serde_json::Value {
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_header_short_circuits_before_delegation() {
        let delegate = MockDelegate::returning(|| unreachable!("delegate must not be called"));
        let state = state_with(delegate.clone());
        let (slot, forward) = capturing_forward();

        let req = Request::builder().uri("/user/1").body(Body::empty()).unwrap();
        let response = intercept(&state, req, forward).await;

        let body = error_body(response).await;
        assert_eq!(body["statusCode"], 502);
        assert_eq!(delegate.calls(), 0);
        assert!(slot.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_without_network_cost() {
        let delegate = MockDelegate::returning(|| Ok(admin_info()));
        let state = state_with(delegate.clone());
        let (slot, forward) = capturing_forward();

        let req = Request::builder()
            .uri("/user/1")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let response = intercept(&state, req, forward).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(delegate.calls(), 0);
        assert!(slot.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn delegate_failure_prevents_forwarding() {
        let delegate = MockDelegate::returning(|| Err(IdentityError::Status(503)));
        let state = state_with(delegate.clone());
        let (slot, forward) = capturing_forward();

        let req = Request::builder()
            .uri("/user/1")
            .header(header::AUTHORIZATION, format!("Bearer {}", valid_token()))
            .body(Body::empty())
            .unwrap();
        let response = intercept(&state, req, forward).await;

        let body = error_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("503"));
        assert!(body["timeStamp"].is_string());
        assert_eq!(delegate.calls(), 1);
        assert!(slot.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_pipeline_forwards_enriched_request() {
        let delegate = MockDelegate::returning(|| Ok(admin_info()));
        let state = state_with(delegate.clone());
        let (slot, forward) = capturing_forward();

        let token = valid_token();
        let req = Request::builder()
            .uri("/user/1")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = intercept(&state, req, forward).await;

        assert_eq!(response.status(), StatusCode::OK);
        let forwarded = slot.lock().unwrap().take().unwrap();
        assert_eq!(
            forwarded.headers().get(header::AUTHORIZATION).unwrap(),
            format!("Bearer {token}").as_str()
        );
        assert_eq!(forwarded.headers().get(&AUTHORITY_HEADER).unwrap(), "ADMIN");
    }

    #[tokio::test]
    async fn replayed_requests_are_independent() {
        let delegate = MockDelegate::returning(|| Ok(admin_info()));
        let state = state_with(delegate.clone());

        for _ in 0..2 {
            let (slot, forward) = capturing_forward();
            let req = Request::builder()
                .uri("/user/1")
                .header(header::AUTHORIZATION, format!("Bearer {}", valid_token()))
                .body(Body::empty())
                .unwrap();
            let response = intercept(&state, req, forward).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(slot.lock().unwrap().is_some());
        }

        // One delegation per request: nothing was cached across requests.
        assert_eq!(delegate.calls(), 2);
    }

    #[tokio::test]
    async fn post_forward_failure_reaches_the_error_responder() {
        let delegate = MockDelegate::returning(|| Ok(admin_info()));
        let state = state_with(delegate);

        let req = Request::builder()
            .uri("/user/1")
            .header(header::AUTHORIZATION, format!("Bearer {}", valid_token()))
            .body(Body::empty())
            .unwrap();
        let response = intercept(&state, req, |_req| {
            std::future::ready(Err(GatewayError::Downstream("chain link broke".to_string())))
        })
        .await;

        let body = error_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("chain link broke"));
    }
}
