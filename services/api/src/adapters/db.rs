//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SessionRepository` port from the `core` crate. The whole session
//! collection lives as one JSONB document in a key-value table in PostgreSQL.

use async_trait::async_trait;
use research_assistant_core::domain::Session;
use research_assistant_core::ports::{PortError, PortResult, SessionRepository};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

/// Key under which the session collection is stored.
const SESSIONS_KEY: &str = "perplexica_lite_sessions";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SessionRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SnapshotRecord {
    payload: Json<Vec<Session>>,
}
impl SnapshotRecord {
    fn to_domain(self) -> Vec<Session> {
        self.payload.0
    }
}

//=========================================================================================
// `SessionRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionRepository for DbAdapter {
    async fn load(&self) -> PortResult<Vec<Session>> {
        let record = sqlx::query_as::<_, SnapshotRecord>(
            "SELECT payload FROM session_snapshots WHERE key = $1",
        )
        .bind(SESSIONS_KEY)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(SnapshotRecord::to_domain).unwrap_or_default())
    }

    async fn save(&self, sessions: &[Session]) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO session_snapshots (key, payload, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (key) DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at",
        )
        .bind(SESSIONS_KEY)
        .bind(Json(sessions))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
