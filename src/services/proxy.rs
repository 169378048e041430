//! Routing glue and forwarding.
//!
//! The route table is declarative configuration (path prefix -> backend
//! base URL); the forwarder replays an enriched request to the matched
//! backend and relays the backend's response. All of its failures surface
//! as downstream errors through the standard gateway response.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::response::Response;
use url::Url;

use crate::error::{self, GatewayError};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: String,
    pub backend: Url,
}

/// Ordered prefix routing table. First match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(entries: Vec<(String, Url)>) -> Self {
        let routes = entries
            .into_iter()
            .map(|(prefix, backend)| Route { prefix, backend })
            .collect();
        Self { routes }
    }

    /// Match a request path against the table. `/user` matches `/user` and
    /// `/user/...` but not `/username`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| {
            path.strip_prefix(&route.prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

/// Replays requests to backends over a shared HTTP client.
pub struct Forwarder {
    http: reqwest::Client,
}

impl Forwarder {
    pub fn new() -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Downstream(e.to_string()))?;
        Ok(Self { http })
    }

    /// Send the request to `backend`, preserving method, path, query,
    /// headers, and body, and convert the backend response back into an
    /// axum response.
    pub async fn forward(
        &self,
        backend: &Url,
        req: Request<Body>,
    ) -> Result<Response, GatewayError> {
        let (parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = backend
            .join(path_and_query)
            .map_err(|e| GatewayError::Downstream(format!("cannot build backend url: {e}")))?;

        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| GatewayError::Downstream(format!("failed to read request body: {e}")))?;

        let mut headers = parts.headers;
        // The client sets Host/Content-Length itself for the new connection.
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let backend_response = self
            .http
            .request(parts.method, target)
            .headers(headers)
            .body(bytes)
            .send()
            .await
            .map_err(|e| GatewayError::Downstream(format!("backend call failed: {e}")))?;

        let status = backend_response.status();
        let response_headers = backend_response.headers().clone();
        let response_bytes = backend_response
            .bytes()
            .await
            .map_err(|e| GatewayError::Downstream(format!("failed to read backend body: {e}")))?;

        let mut response = Response::new(Body::from(response_bytes));
        *response.status_mut() = status;
        for (name, value) in response_headers.iter() {
            // Hop-by-hop headers do not survive re-framing.
            if name == header::TRANSFER_ENCODING || name == header::CONNECTION {
                continue;
            }
            response.headers_mut().append(name, value.clone());
        }

        Ok(response)
    }
}

/// Fallback handler behind the authentication interceptor: route the
/// enriched request and forward it. An unroutable path is a downstream
/// failure and gets the standard error response.
pub async fn handle(State(state): State<AppState>, req: Request<Body>) -> Response {
    let Some(route) = state.routes.match_path(req.uri().path()) else {
        return error::respond(&GatewayError::Downstream(format!(
            "no route for path {}",
            req.uri().path()
        )));
    };

    match state.forwarder.forward(&route.backend, req).await {
        Ok(response) => response,
        Err(err) => error::respond(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            ("/user".to_string(), "http://users:8081".parse().unwrap()),
            ("/order".to_string(), "http://orders:8082".parse().unwrap()),
        ])
    }

    #[test]
    fn matches_exact_prefix_and_subpaths() {
        let table = table();
        assert_eq!(table.match_path("/user").unwrap().prefix, "/user");
        assert_eq!(table.match_path("/user/42").unwrap().prefix, "/user");
        assert_eq!(table.match_path("/order/7/items").unwrap().prefix, "/order");
    }

    #[test]
    fn does_not_match_prefix_inside_a_segment() {
        assert!(table().match_path("/username/42").is_none());
    }

    #[test]
    fn unknown_path_has_no_route() {
        assert!(table().match_path("/film/1").is_none());
    }
}
