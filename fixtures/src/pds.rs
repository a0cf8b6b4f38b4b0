//! A PDS that only knows the two session procedures.
//!
//! Token lifetimes are adjustable at runtime so tests can hand out
//! credentials that are already lapsed, and both procedures count their
//! calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::jwt::{self, ACCESS_SCOPE, REFRESH_SCOPE};

#[derive(Debug, Clone)]
pub struct Account {
    pub handle: String,
    pub did: String,
    pub password: String,
}

/// Seconds from issue until expiry. Negative values mint lapsed tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access_secs: i64,
    pub refresh_secs: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_secs: 2 * 60 * 60,
            refresh_secs: 90 * 24 * 60 * 60,
        }
    }
}

/// The credential pair most recently handed out by either procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_jwt: String,
    pub refresh_jwt: String,
}

#[derive(Clone, Default)]
pub struct PdsFixture {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    accounts: Mutex<HashMap<String, Account>>,
    lifetimes: Mutex<TokenLifetimes>,
    refresh_delay: Mutex<Duration>,
    create_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    next_jti: AtomicU64,
    last_issued: Mutex<Option<IssuedTokens>>,
}

impl PdsFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, handle: &str, did: &str, password: &str) -> Self {
        if let Ok(mut accounts) = self.inner.accounts.lock() {
            accounts.insert(
                handle.to_string(),
                Account {
                    handle: handle.to_string(),
                    did: did.to_string(),
                    password: password.to_string(),
                },
            );
        }
        self
    }

    pub fn set_lifetimes(&self, lifetimes: TokenLifetimes) {
        if let Ok(mut current) = self.inner.lifetimes.lock() {
            *current = lifetimes;
        }
    }

    /// Holds every refresh response back, so concurrent callers overlap.
    pub fn set_refresh_delay(&self, delay: Duration) {
        if let Ok(mut current) = self.inner.refresh_delay.lock() {
            *current = delay;
        }
    }

    pub fn create_calls(&self) -> usize {
        self.inner.create_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_issued(&self) -> Option<IssuedTokens> {
        self.inner.last_issued.lock().ok()?.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/xrpc/com.atproto.server.createSession",
                post(create_session),
            )
            .route(
                "/xrpc/com.atproto.server.refreshSession",
                post(refresh_session),
            )
            .with_state(self.clone())
    }

    fn find_account(&self, identifier: &str) -> Option<Account> {
        let accounts = self.inner.accounts.lock().ok()?;
        accounts
            .values()
            .find(|account| account.handle == identifier || account.did == identifier)
            .cloned()
    }

    fn lifetimes(&self) -> TokenLifetimes {
        self.inner
            .lifetimes
            .lock()
            .map(|lifetimes| *lifetimes)
            .unwrap_or_default()
    }

    fn refresh_delay(&self) -> Duration {
        self.inner
            .refresh_delay
            .lock()
            .map(|delay| *delay)
            .unwrap_or_default()
    }

    fn issue(&self, account: &Account) -> serde_json::Value {
        let lifetimes = self.lifetimes();
        let now = jwt::now();
        let jti = self.inner.next_jti.fetch_add(1, Ordering::SeqCst);

        let issued = IssuedTokens {
            access_jwt: jwt::mint_session_token(ACCESS_SCOPE, &account.did, now + lifetimes.access_secs, jti),
            refresh_jwt: jwt::mint_session_token(REFRESH_SCOPE, &account.did, now + lifetimes.refresh_secs, jti),
        };
        if let Ok(mut last) = self.inner.last_issued.lock() {
            *last = Some(issued.clone());
        }

        json!({
            "accessJwt": issued.access_jwt,
            "refreshJwt": issued.refresh_jwt,
            "handle": account.handle,
            "did": account.did,
            "active": true,
        })
    }
}

fn xrpc_error(status: StatusCode, error: &str, message: &str) -> Response {
    (status, Json(json!({ "error": error, "message": message }))).into_response()
}

#[derive(Debug, Deserialize)]
struct CreateSessionInput {
    identifier: String,
    password: String,
}

async fn create_session(
    State(pds): State<PdsFixture>,
    Json(input): Json<CreateSessionInput>,
) -> Response {
    pds.inner.create_calls.fetch_add(1, Ordering::SeqCst);

    match pds.find_account(&input.identifier) {
        Some(account) if account.password == input.password => {
            info!("createSession for {}", account.handle);
            Json(pds.issue(&account)).into_response()
        }
        _ => xrpc_error(
            StatusCode::UNAUTHORIZED,
            "AuthenticationRequired",
            "Invalid identifier or password",
        ),
    }
}

async fn refresh_session(State(pds): State<PdsFixture>, headers: HeaderMap) -> Response {
    pds.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = pds.refresh_delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let Some(claims) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(jwt::claims)
    else {
        return xrpc_error(
            StatusCode::UNAUTHORIZED,
            "AuthenticationRequired",
            "Missing bearer token",
        );
    };

    if claims["scope"] != REFRESH_SCOPE {
        return xrpc_error(StatusCode::BAD_REQUEST, "InvalidToken", "Not a refresh token");
    }
    if claims["exp"].as_i64().unwrap_or_default() <= jwt::now() {
        return xrpc_error(StatusCode::BAD_REQUEST, "ExpiredToken", "Token has expired");
    }

    let Some(account) = claims["sub"].as_str().and_then(|did| pds.find_account(did)) else {
        return xrpc_error(StatusCode::BAD_REQUEST, "InvalidToken", "Unknown subject");
    };

    info!("refreshSession for {}", account.handle);
    Json(pds.issue(&account)).into_response()
}
