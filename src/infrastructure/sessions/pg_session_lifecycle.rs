use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;

use crate::application::ports::{SessionLifecycle, SessionLifecycleError};
use crate::domain::SessionId;

pub struct PgSessionLifecycle {
    pool: PgPool,
}

impl PgSessionLifecycle {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionLifecycle for PgSessionLifecycle {
    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn mark_completed(&self, session_id: SessionId) -> Result<(), SessionLifecycleError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'completed', completed_at = COALESCE(completed_at, $2), updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionLifecycleError::UpdateFailed(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(SessionLifecycleError::NotFound(session_id.to_string()));
        }
        Ok(())
    }
}

/// Session bookkeeping lives elsewhere; completion is only logged.
pub struct DetachedSessionLifecycle;

#[async_trait]
impl SessionLifecycle for DetachedSessionLifecycle {
    async fn mark_completed(&self, session_id: SessionId) -> Result<(), SessionLifecycleError> {
        tracing::debug!(session_id = %session_id, "Session completion not tracked locally");
        Ok(())
    }
}
