//! Client for the two PDS session endpoints the bridge needs.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::ErrorKind;

pub const CREATE_SESSION: &str = "com.atproto.server.createSession";
pub const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";

#[derive(Debug, Serialize)]
struct CreateSessionInput<'a> {
    identifier: &'a str,
    password: &'a str,
}

/// Access/refresh pair returned by both session endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub did: String,
    pub handle: String,
}

#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum XrpcError {
    #[error("{method} rejected with HTTP {status}")]
    Rejected {
        method: &'static str,
        status: StatusCode,
        /// Machine-readable XRPC error name, e.g. `ExpiredToken`.
        error: Option<String>,
    },
    #[error("network error calling the PDS: {0}")]
    Network(#[from] reqwest::Error),
}

impl XrpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            XrpcError::Rejected { .. } => ErrorKind::Authentication,
            XrpcError::Network(_) => ErrorKind::TransientNetwork,
        }
    }

    pub fn error_name(&self) -> Option<&str> {
        match self {
            XrpcError::Rejected { error, .. } => error.as_deref(),
            XrpcError::Network(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct XrpcClient {
    http: reqwest::Client,
}

impl XrpcClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn create_session(
        &self,
        pds: &str,
        identifier: &str,
        password: &str,
    ) -> Result<SessionTokens, XrpcError> {
        let response = self
            .http
            .post(procedure_url(pds, CREATE_SESSION))
            .json(&CreateSessionInput {
                identifier,
                password,
            })
            .send()
            .await?;

        let tokens = read_tokens(CREATE_SESSION, response).await?;
        info!("Created session for {}", tokens.did);
        Ok(tokens)
    }

    #[tracing::instrument(skip(self, refresh_jwt))]
    pub async fn refresh_session(
        &self,
        pds: &str,
        refresh_jwt: &str,
    ) -> Result<SessionTokens, XrpcError> {
        let response = self
            .http
            .post(procedure_url(pds, REFRESH_SESSION))
            .bearer_auth(refresh_jwt)
            .send()
            .await?;

        let tokens = read_tokens(REFRESH_SESSION, response).await?;
        info!("Refreshed session for {}", tokens.did);
        Ok(tokens)
    }
}

fn procedure_url(pds: &str, method: &str) -> String {
    format!("{}/xrpc/{}", pds.trim_end_matches('/'), method)
}

async fn read_tokens(
    method: &'static str,
    response: reqwest::Response,
) -> Result<SessionTokens, XrpcError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<SessionTokens>().await?);
    }

    // The body is for operators only; it never travels back to the caller.
    let body = response.text().await.unwrap_or_default();
    error!("{} failed. Status: {}, Body: {}", method, status, body);

    let error = serde_json::from_str::<XrpcErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.error);
    Err(XrpcError::Rejected {
        method,
        status,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_urls_ignore_trailing_slash() {
        assert_eq!(
            procedure_url("https://pds.example/", CREATE_SESSION),
            "https://pds.example/xrpc/com.atproto.server.createSession"
        );
        assert_eq!(
            procedure_url("http://127.0.0.1:3001", REFRESH_SESSION),
            "http://127.0.0.1:3001/xrpc/com.atproto.server.refreshSession"
        );
    }

    #[test]
    fn session_tokens_use_camel_case() {
        let tokens: SessionTokens = serde_json::from_value(serde_json::json!({
            "accessJwt": "a.b.c",
            "refreshJwt": "d.e.f",
            "handle": "alice.example",
            "did": "did:plc:abcdefg",
            "active": true
        }))
        .unwrap();
        assert_eq!(tokens.access_jwt, "a.b.c");
        assert_eq!(tokens.refresh_jwt, "d.e.f");
    }

    #[test]
    fn rejected_calls_classify_as_authentication() {
        let err = XrpcError::Rejected {
            method: REFRESH_SESSION,
            status: StatusCode::BAD_REQUEST,
            error: Some("ExpiredToken".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.error_name(), Some("ExpiredToken"));
    }
}
