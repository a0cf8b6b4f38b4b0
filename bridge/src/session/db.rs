use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::errors::ErrorKind;

/// One persisted session, keyed by `(did, token_uuid)`.
///
/// Both ciphertexts are sealed under the same client-held key and are only
/// ever written together.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SessionRecord {
    pub did: String,
    pub token_uuid: Uuid,
    pub encrypted_access_jwt: String,
    pub encrypted_refresh_jwt: String,
    /// Unix seconds.
    pub access_expires_at: f64,
    /// Unix seconds.
    pub refresh_expires_at: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Storage
    }
}

/// Keyed whole-record upsert and point lookup; nothing else.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn upsert(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn find(&self, did: &str, token_uuid: Uuid)
        -> Result<Option<SessionRecord>, StoreError>;
}

#[derive(Default)]
pub struct MemorySessionRepository {
    records: DashMap<(String, Uuid), SessionRecord>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn upsert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.records
            .insert((record.did.clone(), record.token_uuid), record.clone());
        Ok(())
    }

    async fn find(
        &self,
        did: &str,
        token_uuid: Uuid,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .records
            .get(&(did.to_string(), token_uuid))
            .map(|entry| entry.value().clone()))
    }
}

#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and brings the schema up to date under an advisory lock so
    /// concurrent instances do not race the migrations.
    #[tracing::instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        const MIGRATION_LOCK_ID: i64 = 0x5B_5B_5B_5B_5B_5B_5B;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&pool)
            .await?;

        let migrated = sqlx::migrate!("../migrations").run(&pool).await;

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&pool)
            .await?;
        migrated?;
        info!("Session store migrations applied");

        Ok(Self { pool })
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn upsert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bridge_sessions (
                did, token_uuid, encrypted_access_jwt, encrypted_refresh_jwt,
                access_expires_at, refresh_expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (did, token_uuid) DO UPDATE SET
                encrypted_access_jwt = EXCLUDED.encrypted_access_jwt,
                encrypted_refresh_jwt = EXCLUDED.encrypted_refresh_jwt,
                access_expires_at = EXCLUDED.access_expires_at,
                refresh_expires_at = EXCLUDED.refresh_expires_at,
                updated_at_utc = NOW()
            "#,
        )
        .bind(&record.did)
        .bind(record.token_uuid)
        .bind(&record.encrypted_access_jwt)
        .bind(&record.encrypted_refresh_jwt)
        .bind(record.access_expires_at)
        .bind(record.refresh_expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(
        &self,
        did: &str,
        token_uuid: Uuid,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT did, token_uuid, encrypted_access_jwt, encrypted_refresh_jwt,
                   access_expires_at, refresh_expires_at
            FROM bridge_sessions
            WHERE did = $1 AND token_uuid = $2
            "#,
        )
        .bind(did)
        .bind(token_uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
