//! Encrypted session records and their lifecycle.
//!
//! A record moves Absent → Active on [`SessionStore::authenticate`], and is
//! refreshed back to Active by [`SessionStore::resolve_session`] once its
//! access JWT lapses. When the refresh JWT has lapsed too the record is
//! terminally expired and the user has to log in again. The server cannot
//! revoke a record; it becomes unreadable only when the client forgets its
//! token.

pub mod db;
pub mod token;

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::did::{IdentityResolver, ResolveError};
use crate::encryption::{decrypt_from_string, encrypt_to_string, SessionKey, VaultError};
use crate::errors::ErrorKind;
use crate::jwt::{extract_expiry, JwtError};
use crate::xrpc::{SessionTokens, XrpcClient, XrpcError};

pub use db::{MemorySessionRepository, PgSessionRepository, SessionRecord, SessionRepository, StoreError};
pub use token::OpaqueToken;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("authentication failed with HTTP {status}")]
    AuthenticationFailed { status: StatusCode },
    #[error("PDS issued a credential without a usable expiry: {0}")]
    MalformedCredential(#[from] JwtError),
    #[error("session token not found")]
    TokenNotFound,
    #[error("session token cannot decrypt its record")]
    InvalidToken,
    #[error("refresh credential has expired; log in again")]
    RefreshExpired,
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Upstream(XrpcError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Resolve(e) => e.kind(),
            SessionError::AuthenticationFailed { .. } => ErrorKind::Authentication,
            SessionError::MalformedCredential(e) => e.kind(),
            SessionError::TokenNotFound => ErrorKind::Validation,
            SessionError::InvalidToken => ErrorKind::Integrity,
            SessionError::RefreshExpired => ErrorKind::RefreshExpired,
            SessionError::Vault(e) => e.kind(),
            SessionError::Upstream(e) => e.kind(),
            SessionError::Store(e) => e.kind(),
        }
    }

    fn from_create(err: XrpcError) -> Self {
        match err {
            XrpcError::Rejected { status, .. } => SessionError::AuthenticationFailed { status },
            other => SessionError::Upstream(other),
        }
    }

    /// The PDS names a lapsed or revoked refresh JWT explicitly; those are
    /// terminal. Everything else is surfaced as-is and never retried.
    fn from_refresh(err: XrpcError) -> Self {
        match err.error_name() {
            Some("ExpiredToken" | "InvalidToken") => SessionError::RefreshExpired,
            _ => SessionError::Upstream(err),
        }
    }
}

/// A usable access credential for one call.
#[derive(Clone, PartialEq)]
pub struct LiveSession {
    pub did: String,
    pub access_jwt: String,
    /// Unix seconds.
    pub access_expires_at: f64,
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("did", &self.did)
            .field("access_expires_at", &self.access_expires_at)
            .finish_non_exhaustive()
    }
}

fn now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn seal_record(
    did: &str,
    token_uuid: Uuid,
    tokens: &SessionTokens,
    key: &SessionKey,
) -> Result<SessionRecord, SessionError> {
    Ok(SessionRecord {
        did: did.to_string(),
        token_uuid,
        encrypted_access_jwt: encrypt_to_string(&tokens.access_jwt, key)?,
        encrypted_refresh_jwt: encrypt_to_string(&tokens.refresh_jwt, key)?,
        access_expires_at: extract_expiry(&tokens.access_jwt)?,
        refresh_expires_at: extract_expiry(&tokens.refresh_jwt)?,
    })
}

fn reseal_refreshed(
    did: &str,
    token_uuid: Uuid,
    tokens: &SessionTokens,
    key: &SessionKey,
) -> Result<SessionRecord, SessionError> {
    seal_record(did, token_uuid, tokens, key).map_err(|e| {
        error!(
            "Refreshed credentials for session {} of {} are unusable, user must log in again: {}",
            token_uuid, did, e
        );
        SessionError::RefreshExpired
    })
}

/// Owns session persistence, per-user serialization and refresh.
///
/// Clones share the same lock table, so one store can be handed to every
/// request handler.
#[derive(Clone)]
pub struct SessionStore {
    resolver: IdentityResolver,
    xrpc: XrpcClient,
    repository: Arc<dyn SessionRepository>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    pub fn new(
        resolver: IdentityResolver,
        xrpc: XrpcClient,
        repository: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            resolver,
            xrpc,
            repository,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Per-DID lock, created on first use and kept for the store's lifetime.
    ///
    /// Only called for DIDs with a stored record, so the table is bounded by
    /// the number of users who have logged in.
    fn lock_for(&self, did: &str) -> Arc<Mutex<()>> {
        self.locks.entry(did.to_string()).or_default().clone()
    }

    /// Number of users with a lock entry.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Logs in with a handle and password and returns the opaque client token.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, handle: &str, password: &str) -> Result<String, SessionError> {
        let identity = self.resolver.resolve_handle(handle).await?;

        let tokens = self
            .xrpc
            .create_session(&identity.pds, &identity.handle, password)
            .await
            .map_err(SessionError::from_create)?;
        if tokens.did != identity.did {
            warn!(
                "PDS reported DID {} for {}, expected {}",
                tokens.did, identity.handle, identity.did
            );
        }

        let key = SessionKey::generate()?;
        let token_uuid = Uuid::new_v4();
        let record = seal_record(&identity.did, token_uuid, &tokens, &key)?;

        {
            let lock = self.lock_for(&identity.did);
            let _guard = lock.lock().await;
            self.repository.upsert(&record).await?;
        }
        info!("Stored new session {} for {}", token_uuid, identity.did);

        Ok(OpaqueToken {
            did: identity.did,
            token_uuid,
            key,
        }
        .encode())
    }

    /// Turns an opaque client token into a live access credential, refreshing
    /// it first if it has lapsed.
    #[tracing::instrument(skip_all)]
    pub async fn resolve_session(&self, token: &str) -> Result<LiveSession, SessionError> {
        let OpaqueToken {
            did,
            token_uuid,
            key,
        } = OpaqueToken::parse(token)?;

        // Unknown tokens are turned away before they can create a lock entry.
        if self.repository.find(&did, token_uuid).await?.is_none() {
            return Err(SessionError::TokenNotFound);
        }

        // Held across the re-read, refresh and write-back so concurrent
        // callers see either the old record or the refreshed one, never a mix.
        let lock = self.lock_for(&did);
        let _guard = lock.lock().await;

        let record = self
            .repository
            .find(&did, token_uuid)
            .await?
            .ok_or(SessionError::TokenNotFound)?;

        let access_jwt = decrypt_from_string(&record.encrypted_access_jwt, &key)
            .map_err(|_| SessionError::InvalidToken)?;
        let refresh_jwt = decrypt_from_string(&record.encrypted_refresh_jwt, &key)
            .map_err(|_| SessionError::InvalidToken)?;

        let current = now();
        if record.access_expires_at > current {
            return Ok(LiveSession {
                did,
                access_jwt,
                access_expires_at: record.access_expires_at,
            });
        }

        if record.refresh_expires_at <= current {
            info!("Session {} for {} can no longer be refreshed", token_uuid, did);
            return Err(SessionError::RefreshExpired);
        }

        info!("Refreshing session {} for {}", token_uuid, did);
        let pds = self.resolver.resolve_did(&did).await?;
        let tokens = self
            .xrpc
            .refresh_session(&pds, &refresh_jwt)
            .await
            .map_err(SessionError::from_refresh)?;

        // The PDS has rotated the refresh JWT by now, so the stored one is
        // dead. Failing to store the new pair loses the session for good.
        let refreshed = reseal_refreshed(&did, token_uuid, &tokens, &key)?;
        if let Err(e) = self.repository.upsert(&refreshed).await {
            error!(
                "Failed to store refreshed session {} for {}; it cannot be refreshed again: {}",
                token_uuid, did, e
            );
            return Err(e.into());
        }

        Ok(LiveSession {
            did,
            access_jwt: tokens.access_jwt,
            access_expires_at: refreshed.access_expires_at,
        })
    }

    /// Re-derives the PDS endpoint for a session's DID. Not cached.
    pub async fn service_endpoint(&self, did: &str) -> Result<String, SessionError> {
        Ok(self.resolver.resolve_did(did).await?)
    }
}
