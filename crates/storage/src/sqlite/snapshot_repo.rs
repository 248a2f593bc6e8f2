use chrono::Utc;
use exam_core::model::{ExamSession, SessionId, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_snapshot_row, to_json};
use crate::repository::{SessionSnapshotRepository, StorageError};

#[async_trait::async_trait]
impl SessionSnapshotRepository for SqliteRepository {
    async fn save_snapshot(&self, session: &ExamSession) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO session_snapshots (session_id, owner_id, started_at, saved_at, payload)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(session_id) DO UPDATE SET
                    saved_at = excluded.saved_at,
                    payload = excluded.payload
            ",
        )
        .bind(session.id().to_string())
        .bind(id_i64("owner_id", session.owner().value())?)
        .bind(session.started_at())
        .bind(Utc::now())
        .bind(to_json(session)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn load_snapshot(&self, id: SessionId) -> Result<Option<ExamSession>, StorageError> {
        let row = sqlx::query("SELECT payload FROM session_snapshots WHERE session_id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_snapshot_row).transpose()
    }

    async fn list_snapshots(&self, owner: UserId) -> Result<Vec<ExamSession>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT payload
                FROM session_snapshots
                WHERE owner_id = ?1
                ORDER BY started_at ASC
            ",
        )
        .bind(id_i64("owner_id", owner.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(map_snapshot_row(&row)?);
        }
        Ok(sessions)
    }

    async fn delete_snapshot(&self, id: SessionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_snapshots WHERE session_id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
