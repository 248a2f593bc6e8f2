use exam_core::model::{ExamResult, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_result_row, to_json};
use crate::repository::{ResultRepository, StorageError};

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn store_result(&self, result: &ExamResult) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO exam_results (
                    session_id, user_id, kind, started_at, ended_at,
                    total_questions, correct_answers, total_time_secs, payload
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(result.session_id.to_string())
        .bind(id_i64("user_id", result.user_id.value())?)
        .bind(result.kind.as_str())
        .bind(result.started_at)
        .bind(result.ended_at)
        .bind(i64::from(result.total_questions))
        .bind(i64::from(result.correct_answers))
        .bind(result.total_time_spent_secs)
        .bind(to_json(result)?)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::Conflict)
            }
            Err(e) => Err(StorageError::Connection(e.to_string())),
        }
    }

    async fn query_by_user(&self, user_id: UserId) -> Result<Vec<ExamResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT payload
                FROM exam_results
                WHERE user_id = ?1
                ORDER BY started_at ASC, session_id ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(map_result_row(&row)?);
        }
        Ok(results)
    }
}
