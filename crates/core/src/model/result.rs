use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::ids::{QuestionId, SessionId, UserId};
use crate::model::question::Question;
use crate::model::response::{QuestionResponse, TopicScore, topic_breakdown};
use crate::model::topic::{ExamKind, Topic};
use crate::validation::ValidationReport;

/// Final outcome of one exam session.
///
/// Holds one response per question, in session order, with sentinels for anything
/// left unanswered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub kind: ExamKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub topic_breakdown: Vec<TopicScore>,
    pub total_time_spent_secs: i64,
    pub responses: Vec<QuestionResponse>,
}

impl ExamResult {
    /// Assemble a result from a session's fixed question list and recorded answers.
    ///
    /// `ended_at` is pushed to at least one second after `started_at` so durations
    /// stay positive even for degenerate sessions.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_session(
        session_id: SessionId,
        user_id: UserId,
        kind: ExamKind,
        questions: &[Question],
        answered: &[QuestionResponse],
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        let min_end = started_at + Duration::seconds(1);
        let ended_at = ended_at.max(min_end);

        let by_id: HashMap<QuestionId, &QuestionResponse> =
            answered.iter().map(|r| (r.question_id, r)).collect();
        let responses: Vec<QuestionResponse> = questions
            .iter()
            .map(|q| {
                by_id.get(&q.id()).map_or_else(
                    || QuestionResponse::unanswered(q.id(), ended_at),
                    |r| (*r).clone(),
                )
            })
            .collect();

        let correct = responses.iter().filter(|r| r.is_correct).count();
        let topic_breakdown = topic_breakdown(questions, &responses);

        Self {
            session_id,
            user_id,
            kind,
            started_at,
            ended_at,
            total_questions: u32::try_from(questions.len()).unwrap_or(u32::MAX),
            correct_answers: u32::try_from(correct).unwrap_or(u32::MAX),
            topic_breakdown,
            total_time_spent_secs: ended_at.signed_duration_since(started_at).num_seconds(),
            responses,
        }
    }

    /// Overall score as a whole-number percentage.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        (f64::from(self.correct_answers) / f64::from(self.total_questions) * 100.0).round()
    }

    #[must_use]
    pub fn topic_score(&self, topic: Topic) -> Option<&TopicScore> {
        self.topic_breakdown.iter().find(|s| s.topic == topic)
    }

    /// Collect shape violations without stopping at the first one.
    #[must_use]
    pub fn check(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        report.check(self.total_questions > 0, || {
            "total questions must be greater than zero".to_string()
        });
        report.check(self.correct_answers <= self.total_questions, || {
            format!(
                "correct answers ({}) must be between 0 and total questions ({})",
                self.correct_answers, self.total_questions
            )
        });
        report.check(self.responses.len() == self.total_questions as usize, || {
            format!(
                "response count ({}) does not match total questions ({})",
                self.responses.len(),
                self.total_questions
            )
        });
        let tallied = self.responses.iter().filter(|r| r.is_correct).count();
        report.check(tallied == self.correct_answers as usize, || {
            format!(
                "correct answers ({}) does not match correct responses ({tallied})",
                self.correct_answers
            )
        });
        report.check(!self.topic_breakdown.is_empty(), || {
            "topic breakdown is missing".to_string()
        });
        report.check(self.total_time_spent_secs >= 0, || {
            format!(
                "total time spent cannot be negative: {}",
                self.total_time_spent_secs
            )
        });
        report.check(self.ended_at >= self.started_at, || {
            "end time is before start time".to_string()
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::QuestionDraft;
    use crate::time::fixed_now;

    fn question(id: u64, topic: &str) -> Question {
        QuestionDraft {
            topic: topic.into(),
            subtopic: "General".into(),
            difficulty: "hard".into(),
            prompt: format!("Q{id}"),
            options: vec!["A".into(), "B".into()],
            correct_answer: 0,
            explanation: "Because".into(),
            ..QuestionDraft::default()
        }
        .validate(QuestionId::new(id))
        .unwrap()
    }

    #[test]
    fn fills_unanswered_questions_with_sentinels() {
        let qs = vec![
            question(1, "lakehouse_platform"),
            question(2, "lakehouse_platform"),
            question(3, "data_governance"),
        ];
        let now = fixed_now();
        let answered = vec![QuestionResponse::answered(&qs[0], 0, 30, now)];

        let result = ExamResult::from_session(
            SessionId::generate(),
            UserId::new(1),
            ExamKind::Practice,
            &qs,
            &answered,
            now,
            now,
        );

        assert_eq!(result.responses.len(), result.total_questions as usize);
        assert_eq!(result.correct_answers, 1);
        assert!(!result.responses[1].is_answered());
        assert!(!result.responses[2].is_answered());
        assert_eq!(result.ended_at, now + Duration::seconds(1));
        assert_eq!(result.total_time_spent_secs, 1);
        assert!(result.check().is_valid());
    }

    #[test]
    fn check_reports_every_broken_invariant() {
        let result = ExamResult {
            session_id: SessionId::generate(),
            user_id: UserId::new(1),
            kind: ExamKind::Assessment,
            started_at: fixed_now(),
            ended_at: fixed_now(),
            total_questions: 0,
            correct_answers: 2,
            topic_breakdown: Vec::new(),
            total_time_spent_secs: -5,
            responses: Vec::new(),
        };
        let report = result.check();
        // zero total, correct > total, correct != tallied, missing breakdown, negative time
        assert_eq!(report.violations().len(), 5);
    }
}
