use chrono::{DateTime, Utc};
use serde::Serialize;

use exam_core::model::{ExamKind, SessionId, SessionStatus, UserId};

/// Read-only snapshot of a session for display and polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub id: SessionId,
    pub owner: UserId,
    pub kind: ExamKind,
    pub status: SessionStatus,
    pub position: usize,
    pub total_questions: usize,
    pub answered: usize,
    pub remaining_secs: u64,
    pub is_review_mode: bool,
    pub started_at: DateTime<Utc>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub result_ready: bool,
}

impl SessionView {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.status, SessionStatus::Completed(_))
    }

    /// Share of the exam answered so far, 0.0 to 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        self.answered as f64 / self.total_questions as f64
    }
}
