use exam_core::model::{Question, QuestionId, Topic};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{id_i64, map_question_row, ser, to_json};
use crate::repository::{QuestionFilter, QuestionStore, StorageError};

const QUESTION_COLUMNS: &str = r"
    id, topic, subtopic, difficulty, prompt, code_sample, options,
    correct_answer, explanation, reference_links, tags
";

/// Append `WHERE` clauses for the filter, numbering placeholders from 1.
fn filter_clause(filter: &QuestionFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    if let Some(topic) = filter.topic {
        binds.push(topic.as_str().to_owned());
        clauses.push(format!("topic = ?{}", binds.len()));
    }
    if let Some(difficulty) = filter.difficulty {
        binds.push(difficulty.as_str().to_owned());
        clauses.push(format!("difficulty = ?{}", binds.len()));
    }
    if let Some(subtopic) = &filter.subtopic {
        binds.push(subtopic.clone());
        clauses.push(format!("subtopic = ?{}", binds.len()));
    }
    if let Some(tag) = &filter.tag {
        binds.push(tag.clone());
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(questions.tags) WHERE json_each.value = ?{})",
            binds.len()
        ));
    }
    if clauses.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), binds)
    }
}

#[async_trait::async_trait]
impl QuestionStore for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (
                id, topic, subtopic, difficulty, prompt, code_sample, options,
                correct_answer, explanation, reference_links, tags
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                topic = excluded.topic,
                subtopic = excluded.subtopic,
                difficulty = excluded.difficulty,
                prompt = excluded.prompt,
                code_sample = excluded.code_sample,
                options = excluded.options,
                correct_answer = excluded.correct_answer,
                explanation = excluded.explanation,
                reference_links = excluded.reference_links,
                tags = excluded.tags
            ",
        )
        .bind(id_i64("question_id", question.id().value())?)
        .bind(question.topic().as_str())
        .bind(question.subtopic().to_owned())
        .bind(question.difficulty().as_str())
        .bind(question.prompt().to_owned())
        .bind(question.code_sample().map(str::to_owned))
        .bind(to_json(&question.options())?)
        .bind(
            i64::try_from(question.correct_answer())
                .map_err(|_| StorageError::Serialization("correct_answer overflow".into()))?,
        )
        .bind(question.explanation().to_owned())
        .bind(to_json(&question.references())?)
        .bind(to_json(&question.tags())?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("question_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;

        map_question_row(&row)
    }

    async fn find_by_topic(&self, topic: Topic, limit: u32) -> Result<Vec<Question>, StorageError> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE topic = ?1 ORDER BY id ASC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(topic.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            questions.push(map_question_row(&row)?);
        }
        Ok(questions)
    }

    async fn find_all(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StorageError> {
        let (clause, binds) = filter_clause(filter);
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions {clause} ORDER BY id ASC");
        let mut q = sqlx::query(&sql);
        for value in binds {
            q = q.bind(value);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            questions.push(map_question_row(&row)?);
        }
        Ok(questions)
    }

    async fn count(&self, filter: &QuestionFilter) -> Result<u64, StorageError> {
        let (clause, binds) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) AS n FROM questions {clause}");
        let mut q = sqlx::query(&sql);
        for value in binds {
            q = q.bind(value);
        }
        let row = q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let n: i64 = row.try_get("n").map_err(ser)?;
        u64::try_from(n).map_err(|_| StorageError::Serialization(format!("invalid count: {n}")))
    }
}
