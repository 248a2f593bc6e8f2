use async_trait::async_trait;
use exam_core::model::{
    Difficulty, ExamResult, ExamSession, Question, QuestionId, SessionId, Topic, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── FILTERS ───────────────────────────────────────────────────────────────────
//

/// Optional constraints for question bank queries. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub topic: Option<Topic>,
    pub difficulty: Option<Difficulty>,
    pub subtopic: Option<String>,
    pub tag: Option<String>,
}

impl QuestionFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_topic(topic: Topic) -> Self {
        Self {
            topic: Some(topic),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    #[must_use]
    pub fn with_subtopic(mut self, subtopic: impl Into<String>) -> Self {
        self.subtopic = Some(subtopic.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn matches(&self, question: &Question) -> bool {
        self.topic.is_none_or(|t| question.topic() == t)
            && self.difficulty.is_none_or(|d| question.difficulty() == d)
            && self
                .subtopic
                .as_deref()
                .is_none_or(|s| question.subtopic() == s)
            && self.tag.as_deref().is_none_or(|t| question.has_tag(t))
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Read/write access to the question bank.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Insert a question or replace the stored one with the same ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError>;

    /// Up to `limit` questions for `topic`, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_topic(&self, topic: Topic, limit: u32) -> Result<Vec<Question>, StorageError>;

    /// Every question matching `filter`, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_all(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StorageError>;

    /// Number of questions matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count(&self, filter: &QuestionFilter) -> Result<u64, StorageError>;
}

/// Append-only log of finished exam results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Append a result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a result for the same session already exists.
    async fn store_result(&self, result: &ExamResult) -> Result<(), StorageError>;

    /// All results for a learner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn query_by_user(&self, user_id: UserId) -> Result<Vec<ExamResult>, StorageError>;
}

/// Crash-recovery snapshots of in-flight sessions.
#[async_trait]
pub trait SessionSnapshotRepository: Send + Sync {
    /// Write the latest state of a session, replacing any earlier snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be written.
    async fn save_snapshot(&self, session: &ExamSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing snapshot is `Ok(None)`.
    async fn load_snapshot(&self, id: SessionId) -> Result<Option<ExamSession>, StorageError>;

    /// Snapshots for sessions owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_snapshots(&self, owner: UserId) -> Result<Vec<ExamSession>, StorageError>;

    /// Remove a snapshot. Deleting a missing snapshot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_snapshot(&self, id: SessionId) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    results: Arc<Mutex<HashMap<UserId, Vec<ExamResult>>>>,
    snapshots: Arc<Mutex<HashMap<SessionId, ExamSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<Question> = guard
            .values()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        found.sort_by_key(Question::id);
        Ok(found)
    }
}

#[async_trait]
impl QuestionStore for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_by_topic(&self, topic: Topic, limit: u32) -> Result<Vec<Question>, StorageError> {
        let mut found = self.matching(&QuestionFilter::for_topic(topic))?;
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn find_all(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StorageError> {
        self.matching(filter)
    }

    async fn count(&self, filter: &QuestionFilter) -> Result<u64, StorageError> {
        Ok(self.matching(filter)?.len() as u64)
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn store_result(&self, result: &ExamResult) -> Result<(), StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let log = guard.entry(result.user_id).or_default();
        if log.iter().any(|r| r.session_id == result.session_id) {
            return Err(StorageError::Conflict);
        }
        log.push(result.clone());
        Ok(())
    }

    async fn query_by_user(&self, user_id: UserId) -> Result<Vec<ExamResult>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found = guard.get(&user_id).cloned().unwrap_or_default();
        found.sort_by_key(|r| r.started_at);
        Ok(found)
    }
}

#[async_trait]
impl SessionSnapshotRepository for InMemoryRepository {
    async fn save_snapshot(&self, session: &ExamSession) -> Result<(), StorageError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(session.id(), session.clone());
        Ok(())
    }

    async fn load_snapshot(&self, id: SessionId) -> Result<Option<ExamSession>, StorageError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_snapshots(&self, owner: UserId) -> Result<Vec<ExamSession>, StorageError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<ExamSession> =
            guard.values().filter(|s| s.owner() == owner).cloned().collect();
        found.sort_by_key(ExamSession::started_at);
        Ok(found)
    }

    async fn delete_snapshot(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&id);
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionStore>,
    pub results: Arc<dyn ResultRepository>,
    pub snapshots: Arc<dyn SessionSnapshotRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionStore> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo.clone());
        let snapshots: Arc<dyn SessionSnapshotRepository> = Arc::new(repo);
        Self {
            questions,
            results,
            snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::fixtures::{question, uniform_result};
    use exam_core::model::ExamKind;
    use exam_core::time::fixed_now;
    use std::time::Duration;

    #[tokio::test]
    async fn find_by_topic_respects_limit_and_order() {
        let repo = InMemoryRepository::new();
        for id in [5, 1, 3] {
            repo.upsert_question(&question(id, Topic::DataGovernance))
                .await
                .unwrap();
        }
        repo.upsert_question(&question(2, Topic::LakehousePlatform))
            .await
            .unwrap();

        let found = repo.find_by_topic(Topic::DataGovernance, 2).await.unwrap();
        let ids: Vec<u64> = found.iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![1, 3]);

        let all = QuestionFilter::all();
        assert_eq!(repo.count(&all).await.unwrap(), 4);
        let governance =
            QuestionFilter::for_topic(Topic::DataGovernance).with_tag("data_governance");
        assert_eq!(repo.count(&governance).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn results_are_append_only_per_session() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(9);
        let result = uniform_result(user, fixed_now(), 70);

        repo.store_result(&result).await.unwrap();
        assert!(matches!(
            repo.store_result(&result).await,
            Err(StorageError::Conflict)
        ));
        assert_eq!(repo.query_by_user(user).await.unwrap().len(), 1);
        assert!(repo.query_by_user(UserId::new(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshots_round_trip_and_delete() {
        let repo = InMemoryRepository::new();
        let session = ExamSession::new(
            SessionId::generate(),
            UserId::new(1),
            ExamKind::Practice,
            vec![question(1, Topic::DataGovernance)],
            fixed_now(),
            Duration::from_secs(60),
        )
        .unwrap();

        repo.save_snapshot(&session).await.unwrap();
        assert_eq!(
            repo.load_snapshot(session.id()).await.unwrap(),
            Some(session.clone())
        );
        assert_eq!(repo.list_snapshots(UserId::new(1)).await.unwrap().len(), 1);

        repo.delete_snapshot(session.id()).await.unwrap();
        assert_eq!(repo.load_snapshot(session.id()).await.unwrap(), None);
    }
}
