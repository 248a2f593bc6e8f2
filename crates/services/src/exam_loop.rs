use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use exam_core::AllocationSettings;
use exam_core::allocation::TopicCounts;
use exam_core::model::{ExamKind, ExamResult, ExamSession, SessionId, UserId};
use exam_core::scoring::{ImmediateFeedback, ScoreReport, immediate_feedback, score};
use storage::repository::{SessionSnapshotRepository, StorageError};

use crate::allocator::AdaptiveAllocator;
use crate::error::{ExamLoopError, ProgressError};
use crate::progress::ProgressTracker;
use crate::sessions::SessionEngine;

/// Everything the learner sees once an exam is closed out.
#[derive(Debug, Clone, Serialize)]
pub struct ExamOutcome {
    pub result: ExamResult,
    pub report: ScoreReport,
    pub immediate: ImmediateFeedback,
}

/// Closes the feedback loop: history drives allocation, sessions produce results,
/// results extend history.
#[derive(Clone)]
pub struct ExamLoopService {
    settings: AllocationSettings,
    allocator: Arc<AdaptiveAllocator>,
    engine: SessionEngine,
    progress: Arc<ProgressTracker>,
    snapshots: Arc<dyn SessionSnapshotRepository>,
}

impl ExamLoopService {
    #[must_use]
    pub fn new(
        settings: AllocationSettings,
        allocator: Arc<AdaptiveAllocator>,
        engine: SessionEngine,
        progress: Arc<ProgressTracker>,
        snapshots: Arc<dyn SessionSnapshotRepository>,
    ) -> Self {
        Self {
            settings,
            allocator,
            engine,
            progress,
            snapshots,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    #[must_use]
    pub fn settings(&self) -> &AllocationSettings {
        &self.settings
    }

    /// Allocate from the learner's history and start a timed session.
    ///
    /// # Errors
    ///
    /// Returns `ExamLoopError::NoQuestions` if the bank has nothing to offer, or a
    /// storage error from loading history or questions.
    pub async fn start_exam(
        &self,
        owner: UserId,
        kind: ExamKind,
    ) -> Result<ExamSession, ExamLoopError> {
        let history = self.progress.history(owner).await?;
        let questions = self
            .allocator
            .allocate(history.results(), &self.settings)
            .await?;
        if questions.is_empty() {
            return Err(ExamLoopError::NoQuestions);
        }
        Ok(self.engine.start(owner, kind, questions)?)
    }

    /// Start a comprehensive assessment drawn exactly per its topic distribution.
    ///
    /// # Errors
    ///
    /// Returns `ExamLoopError::Progress` for an invalid distribution,
    /// `ExamLoopError::NoQuestions` for an empty bank, or a storage error.
    pub async fn start_assessment(
        &self,
        owner: UserId,
        total_questions: usize,
        custom: Option<&TopicCounts>,
    ) -> Result<ExamSession, ExamLoopError> {
        let config = self.progress.assessment_config(total_questions, custom)?;
        let questions = self.allocator.allocate_counts(&config.distribution).await?;
        if questions.is_empty() {
            return Err(ExamLoopError::NoQuestions);
        }
        info!(
            owner = %owner,
            requested = config.total_questions,
            drawn = questions.len(),
            "assessment allocated"
        );
        Ok(self.engine.start(owner, ExamKind::Assessment, questions)?)
    }

    /// Record and score a completed session, then release it from the engine.
    ///
    /// The session stays live if recording fails, so the call can be retried. A result
    /// already in the log counts as recorded.
    ///
    /// # Errors
    ///
    /// Returns `ExamLoopError::SessionNotFinished` while the session is unknown or
    /// still running, and validation or storage errors from recording.
    pub async fn finish_exam(&self, session_id: SessionId) -> Result<ExamOutcome, ExamLoopError> {
        let (Some(session), Some(result)) = (
            self.engine.session(session_id),
            self.engine.result(session_id),
        ) else {
            return Err(ExamLoopError::SessionNotFinished(session_id));
        };

        match self.progress.record_result(&result).await {
            Ok(_) => {}
            Err(ProgressError::Storage(StorageError::Conflict)) => {
                info!(session = %session_id, "result already recorded");
            }
            Err(err) => return Err(err.into()),
        }
        self.engine.take_result(session_id);
        if let Err(err) = self.snapshots.delete_snapshot(session_id).await {
            warn!(session = %session_id, error = %err, "snapshot cleanup failed");
        }

        let report = score(&result, session.questions())?;
        let immediate = immediate_feedback(&result);
        Ok(ExamOutcome {
            result,
            report,
            immediate,
        })
    }

    /// Re-register the learner's autosaved sessions, paused, after a restart.
    ///
    /// Snapshots of sessions whose result is already in the log are deleted instead.
    ///
    /// # Errors
    ///
    /// Returns `ExamLoopError::Storage` if snapshots cannot be listed, or a progress
    /// error if the learner's history cannot be loaded.
    pub async fn recover_sessions(&self, owner: UserId) -> Result<Vec<SessionId>, ExamLoopError> {
        let snapshots = self.snapshots.list_snapshots(owner).await?;
        if snapshots.is_empty() {
            return Ok(Vec::new());
        }
        let history = self.progress.history(owner).await?;

        let mut recovered = Vec::with_capacity(snapshots.len());
        for session in snapshots {
            let id = session.id();
            if history.results().iter().any(|r| r.session_id == id) {
                info!(session = %id, "dropping snapshot of a recorded session");
                if let Err(err) = self.snapshots.delete_snapshot(id).await {
                    warn!(session = %id, error = %err, "snapshot cleanup failed");
                }
                continue;
            }
            if self.engine.restore(session) {
                recovered.push(id);
            }
        }
        info!(owner = %owner, sessions = recovered.len(), "sessions recovered");
        Ok(recovered)
    }
}
