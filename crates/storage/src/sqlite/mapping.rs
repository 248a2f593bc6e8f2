use exam_core::model::{ExamResult, ExamSession, Question, QuestionDraft, QuestionId};
use serde::de::DeserializeOwned;
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

fn from_json<T: DeserializeOwned>(field: &'static str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(format!("{field}: {e}")))
}

/// Rebuild a question through draft validation so stored rows obey the same rules
/// as new input.
pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = QuestionId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?);
    let correct_answer = usize::try_from(row.try_get::<i64, _>("correct_answer").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("invalid correct_answer".into()))?;

    let draft = QuestionDraft {
        topic: row.try_get("topic").map_err(ser)?,
        subtopic: row.try_get("subtopic").map_err(ser)?,
        difficulty: row.try_get("difficulty").map_err(ser)?,
        prompt: row.try_get("prompt").map_err(ser)?,
        code_sample: row.try_get("code_sample").map_err(ser)?,
        options: from_json("options", &row.try_get::<String, _>("options").map_err(ser)?)?,
        correct_answer,
        explanation: row.try_get("explanation").map_err(ser)?,
        references: from_json(
            "reference_links",
            &row.try_get::<String, _>("reference_links").map_err(ser)?,
        )?,
        tags: from_json("tags", &row.try_get::<String, _>("tags").map_err(ser)?)?,
    };
    draft.validate(id).map_err(ser)
}

pub(crate) fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<ExamResult, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    from_json("exam_results.payload", &payload)
}

pub(crate) fn map_snapshot_row(row: &sqlx::sqlite::SqliteRow) -> Result<ExamSession, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    from_json("session_snapshots.payload", &payload)
}
