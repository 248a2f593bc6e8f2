use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::model::ids::{QuestionId, SessionId, UserId};
use crate::model::question::Question;
use crate::model::response::QuestionResponse;
use crate::model::result::ExamResult;
use crate::model::topic::ExamKind;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a session transition was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,

    #[error("session already completed")]
    Completed,

    #[error("session is paused")]
    Paused,

    #[error("session is not paused")]
    NotPaused,

    #[error("answer for question {got} but current question is {expected}")]
    QuestionMismatch { expected: QuestionId, got: QuestionId },

    #[error("option {index} is out of range for {options} options")]
    InvalidOption { index: usize, options: usize },

    #[error("question index {index} is out of range for {len} questions")]
    NavigationOutOfRange { index: usize, len: usize },

    #[error("free navigation is only available in review mode")]
    NavigationNotAllowed,
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Why a session stopped accepting answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every question was answered.
    Exhausted,
    /// The learner finished early; the session stays browsable.
    Early,
    /// The countdown reached zero.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed(CompletionReason),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One exam attempt: a fixed question list walked in order.
///
/// This type only encodes the state machine. Timers and elapsed-time measurement
/// live in the services layer, which feeds elapsed durations in through `consume`
/// and the `time_spent_secs` argument of `submit_answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSession {
    id: SessionId,
    owner: UserId,
    kind: ExamKind,
    questions: Vec<Question>,
    position: usize,
    responses: Vec<QuestionResponse>,
    started_at: DateTime<Utc>,
    remaining: Duration,
    status: SessionStatus,
}

impl ExamSession {
    /// Start a session over `questions` with `time_limit` on the clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided.
    pub fn new(
        id: SessionId,
        owner: UserId,
        kind: ExamKind,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
        time_limit: Duration,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        Ok(Self {
            id,
            owner,
            kind,
            questions,
            position: 0,
            responses: Vec::new(),
            started_at,
            remaining: time_limit,
            status: SessionStatus::Active,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn kind(&self) -> ExamKind {
        self.kind
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn responses(&self) -> &[QuestionResponse] {
        &self.responses
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.status == SessionStatus::Paused
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.status, SessionStatus::Completed(_))
    }

    /// Completed early with time left on the clock.
    #[must_use]
    pub fn is_review_mode(&self) -> bool {
        self.status == SessionStatus::Completed(CompletionReason::Early)
            && !self.remaining.is_zero()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.position)
    }

    /// Deduct `elapsed` from the remaining time. Only an active session's clock runs.
    pub fn consume(&mut self, elapsed: Duration) {
        if self.is_active() {
            self.remaining = self.remaining.saturating_sub(elapsed);
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Paused => Err(SessionError::Paused),
            SessionStatus::Completed(_) => Err(SessionError::Completed),
        }
    }

    /// Record an answer for the current question and advance.
    ///
    /// Completes the session with `CompletionReason::Exhausted` after the last question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Paused`/`Completed` in the wrong state,
    /// `QuestionMismatch` for out-of-order answers, or `InvalidOption` for an index
    /// past the question's options.
    pub fn submit_answer(
        &mut self,
        question_id: QuestionId,
        selected: usize,
        time_spent_secs: u32,
        answered_at: DateTime<Utc>,
    ) -> Result<&QuestionResponse, SessionError> {
        self.ensure_active()?;
        let question = self.current_question().ok_or(SessionError::Completed)?;
        if question.id() != question_id {
            return Err(SessionError::QuestionMismatch {
                expected: question.id(),
                got: question_id,
            });
        }
        if selected >= question.options().len() {
            return Err(SessionError::InvalidOption {
                index: selected,
                options: question.options().len(),
            });
        }

        let response = QuestionResponse::answered(question, selected, time_spent_secs, answered_at);
        self.responses.push(response);
        self.position += 1;
        if self.position >= self.questions.len() {
            self.status = SessionStatus::Completed(CompletionReason::Exhausted);
        }

        self.responses.last().ok_or(SessionError::Completed)
    }

    /// # Errors
    ///
    /// Returns `SessionError` unless the session is active.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.status = SessionStatus::Paused;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotPaused` unless the session is paused.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Paused => {
                self.status = SessionStatus::Active;
                Ok(())
            }
            SessionStatus::Completed(_) => Err(SessionError::Completed),
            SessionStatus::Active => Err(SessionError::NotPaused),
        }
    }

    /// Stop accepting answers. Expiry also zeroes the clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` unless the session is active.
    pub fn complete(&mut self, reason: CompletionReason) -> Result<(), SessionError> {
        self.ensure_active()?;
        if reason == CompletionReason::Expired {
            self.remaining = Duration::ZERO;
        }
        self.status = SessionStatus::Completed(reason);
        Ok(())
    }

    /// Move to question `index`.
    ///
    /// In review mode any index is reachable; while active only the current position
    /// is, since in-progress navigation is sequential.
    ///
    /// # Errors
    ///
    /// Returns `NavigationOutOfRange` or `NavigationNotAllowed`.
    pub fn navigate_to(&mut self, index: usize) -> Result<&Question, SessionError> {
        let len = self.questions.len();
        if index >= len {
            return Err(SessionError::NavigationOutOfRange { index, len });
        }
        let allowed = self.is_review_mode() || (self.is_active() && index == self.position);
        if !allowed {
            return Err(SessionError::NavigationNotAllowed);
        }
        self.position = index;
        Ok(&self.questions[index])
    }

    /// Build the immutable result for this session.
    ///
    /// Unanswered questions are filled with sentinel responses so the result always
    /// has one response per question.
    #[must_use]
    pub fn build_result(&self, ended_at: DateTime<Utc>) -> ExamResult {
        ExamResult::from_session(
            self.id,
            self.owner,
            self.kind,
            &self.questions,
            &self.responses,
            self.started_at,
            ended_at,
        )
    }

    /// Re-open a recovered snapshot as paused so the learner decides when the clock restarts.
    pub fn mark_recovered(&mut self) {
        if self.is_active() {
            self.status = SessionStatus::Paused;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::QuestionDraft;
    use crate::time::fixed_now;

    fn question(id: u64) -> Question {
        QuestionDraft {
            topic: "data_governance".into(),
            subtopic: "Unity Catalog".into(),
            difficulty: "easy".into(),
            prompt: format!("Q{id}"),
            options: vec!["A".into(), "B".into()],
            correct_answer: 0,
            explanation: "Because".into(),
            ..QuestionDraft::default()
        }
        .validate(QuestionId::new(id))
        .unwrap()
    }

    fn session(n: u64) -> ExamSession {
        ExamSession::new(
            SessionId::generate(),
            UserId::new(1),
            ExamKind::Practice,
            (1..=n).map(question).collect(),
            fixed_now(),
            Duration::from_secs(600),
        )
        .unwrap()
    }

    #[test]
    fn empty_session_is_rejected() {
        let err = ExamSession::new(
            SessionId::generate(),
            UserId::new(1),
            ExamKind::Practice,
            Vec::new(),
            fixed_now(),
            Duration::from_secs(60),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::Empty);
    }

    #[test]
    fn answers_must_follow_question_order() {
        let mut s = session(3);
        let err = s
            .submit_answer(QuestionId::new(2), 0, 10, fixed_now())
            .unwrap_err();
        assert!(matches!(err, SessionError::QuestionMismatch { .. }));
        assert_eq!(s.position(), 0);

        s.submit_answer(QuestionId::new(1), 0, 10, fixed_now()).unwrap();
        assert_eq!(s.position(), 1);
        assert!(s.responses()[0].is_correct);
    }

    #[test]
    fn last_answer_completes_session() {
        let mut s = session(2);
        s.submit_answer(QuestionId::new(1), 1, 5, fixed_now()).unwrap();
        s.submit_answer(QuestionId::new(2), 0, 5, fixed_now()).unwrap();
        assert_eq!(
            s.status(),
            SessionStatus::Completed(CompletionReason::Exhausted)
        );
        assert!(!s.is_review_mode());
    }

    #[test]
    fn paused_session_rejects_answers_and_keeps_clock() {
        let mut s = session(2);
        s.pause().unwrap();
        s.consume(Duration::from_secs(100));
        assert_eq!(s.remaining(), Duration::from_secs(600));
        assert_eq!(
            s.submit_answer(QuestionId::new(1), 0, 5, fixed_now()),
            Err(SessionError::Paused)
        );
        assert_eq!(s.pause(), Err(SessionError::Paused));
        s.resume().unwrap();
        assert_eq!(s.resume(), Err(SessionError::NotPaused));
    }

    #[test]
    fn early_completion_enables_review_navigation() {
        let mut s = session(3);
        assert_eq!(s.navigate_to(2), Err(SessionError::NavigationNotAllowed));
        s.complete(CompletionReason::Early).unwrap();
        assert!(s.is_review_mode());
        assert_eq!(s.navigate_to(2).unwrap().id(), QuestionId::new(3));
        assert!(matches!(
            s.navigate_to(9),
            Err(SessionError::NavigationOutOfRange { .. })
        ));
    }

    #[test]
    fn expiry_zeroes_clock_and_blocks_review() {
        let mut s = session(2);
        s.complete(CompletionReason::Expired).unwrap();
        assert!(s.remaining().is_zero());
        assert!(!s.is_review_mode());
        assert_eq!(s.complete(CompletionReason::Early), Err(SessionError::Completed));
    }
}
