use std::env;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr};

use crate::did::{HickoryDnsTxtResolver, IdentityResolver};
use crate::session::{PgSessionRepository, SessionStore};
use crate::xrpc::XrpcClient;

pub const DEFAULT_PLC_DIRECTORY_URL: &str = "https://plc.directory";
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

pub fn get_plc_directory_url() -> String {
    // Make sure the URL doesn't have a trailing slash for consistency
    let url =
        env::var("PLC_DIRECTORY_URL").unwrap_or_else(|_| DEFAULT_PLC_DIRECTORY_URL.to_string());
    url.trim_end_matches('/').to_string()
}

/// Where identity discovery looks things up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    pub plc_directory_url: String,
    /// `https` in production; fixtures serve plain `http`.
    pub discovery_scheme: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            plc_directory_url: DEFAULT_PLC_DIRECTORY_URL.to_string(),
            discovery_scheme: "https".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        Self {
            plc_directory_url: get_plc_directory_url(),
            discovery_scheme: env::var("DISCOVERY_SCHEME").unwrap_or_else(|_| "https".to_string()),
        }
    }
}

pub fn http_timeout_from_env() -> color_eyre::Result<Duration> {
    let millis = match env::var("HTTP_TIMEOUT_MS") {
        Ok(value) => value
            .parse::<u64>()
            .wrap_err_with(|| format!("HTTP_TIMEOUT_MS is not a number: {value}"))?,
        Err(_) => DEFAULT_HTTP_TIMEOUT_MS,
    };
    Ok(Duration::from_millis(millis))
}

pub fn build_http_client(timeout: Duration) -> color_eyre::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .timeout(timeout)
        .use_rustls_tls()
        .build()
        .wrap_err("Failed to build HTTP client")
}

/// Everything a front end needs, wired from the environment.
#[derive(Clone)]
pub struct AppState {
    pub resolver: IdentityResolver,
    pub sessions: Option<SessionStore>,
}

impl AppState {
    pub async fn from_env() -> color_eyre::Result<Self> {
        let config = ResolverConfig::from_env();
        tracing::info!("PLC_DIRECTORY_URL: {}", config.plc_directory_url);

        let http = build_http_client(http_timeout_from_env()?)?;
        let dns = HickoryDnsTxtResolver::from_system_conf()
            .map_err(|e| eyre!("Failed to read system DNS configuration: {}", e))?;
        let resolver = IdentityResolver::new(http.clone(), Arc::new(dns), config);

        let sessions = match env::var("DATABASE_URL") {
            Ok(database_url) => {
                let repository = PgSessionRepository::connect(&database_url)
                    .await
                    .wrap_err("Failed to connect to the session database")?;
                Some(SessionStore::new(
                    resolver.clone(),
                    XrpcClient::new(http),
                    Arc::new(repository),
                ))
            }
            Err(_) => {
                tracing::info!("DATABASE_URL not set; session commands are unavailable");
                None
            }
        };

        Ok(Self { resolver, sessions })
    }

    pub fn sessions(&self) -> color_eyre::Result<&SessionStore> {
        self.sessions
            .as_ref()
            .ok_or_else(|| eyre!("DATABASE_URL must be set to store sessions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plc_directory_url_drops_trailing_slash() {
        env::set_var("PLC_DIRECTORY_URL", "http://localhost:3002/");
        assert_eq!(get_plc_directory_url(), "http://localhost:3002");

        env::remove_var("PLC_DIRECTORY_URL");
        assert_eq!(get_plc_directory_url(), DEFAULT_PLC_DIRECTORY_URL);
    }

    #[test]
    fn default_config_uses_https_and_public_plc() {
        let config = ResolverConfig::default();
        assert_eq!(config.discovery_scheme, "https");
        assert_eq!(config.plc_directory_url, "https://plc.directory");
    }
}
