/*
 * Responsibility
 * - Load gateway settings from environment variables
 * - Validate them at startup (missing/invalid settings fail fast)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Immutable gateway configuration, resolved once at startup.
#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,

    /// Pre-shared HS256 secret for local token validation.
    pub jwt_secret: Vec<u8>,

    /// Base URL of the identity service the gateway delegates to.
    pub identity_base_url: Url,

    /// Upper bound on a single identity-delegate round trip.
    pub delegate_timeout: Duration,

    /// Path prefix -> backend base URL, in declaration order.
    pub routes: Vec<(String, Url)>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the shared secret
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("identity_base_url", &self.identity_base_url.as_str())
            .field("delegate_timeout", &self.delegate_timeout)
            .field("routes", &self.routes)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET"));
        }

        let identity_base_url = std::env::var("IDENTITY_SERVICE_URL")
            .map_err(|_| ConfigError::Missing("IDENTITY_SERVICE_URL"))?
            .parse::<Url>()
            .map_err(|_| ConfigError::Invalid("IDENTITY_SERVICE_URL"))?;

        let delegate_timeout = Duration::from_secs(
            std::env::var("DELEGATE_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        );

        let routes = parse_routes(&std::env::var("ROUTES").unwrap_or_default())?;

        Ok(Self {
            addr,
            jwt_secret: jwt_secret.into_bytes(),
            identity_base_url,
            delegate_timeout,
            routes,
        })
    }
}

/// Parse `ROUTES` of the form `/user=http://users:8081,/order=http://orders:8082`.
fn parse_routes(raw: &str) -> Result<Vec<(String, Url)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (prefix, backend) = entry.split_once('=').ok_or(ConfigError::Invalid("ROUTES"))?;
            let prefix = prefix.trim();
            if !prefix.starts_with('/') || prefix.len() < 2 {
                return Err(ConfigError::Invalid("ROUTES"));
            }
            let backend = backend
                .trim()
                .parse::<Url>()
                .map_err(|_| ConfigError::Invalid("ROUTES"))?;
            Ok((prefix.to_string(), backend))
        })
        .collect()
}
