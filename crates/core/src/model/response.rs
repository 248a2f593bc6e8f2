use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::ids::QuestionId;
use crate::model::question::Question;
use crate::model::topic::Topic;

//
// ─── QUESTION RESPONSE ─────────────────────────────────────────────────────────
//

/// A learner's answer to one question.
///
/// `selected_answer` is `None` for the unanswered sentinel, which is serialized as
/// `null` and corresponds to the `-1` index used by older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question_id: QuestionId,
    pub selected_answer: Option<usize>,
    pub is_correct: bool,
    pub time_spent_secs: u32,
    pub answered_at: DateTime<Utc>,
}

impl QuestionResponse {
    /// Response with correctness derived from the question's answer key.
    #[must_use]
    pub fn answered(
        question: &Question,
        selected: usize,
        time_spent_secs: u32,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id: question.id(),
            selected_answer: Some(selected),
            is_correct: question.is_correct(selected),
            time_spent_secs,
            answered_at,
        }
    }

    /// Sentinel used to fill questions the learner never answered.
    #[must_use]
    pub fn unanswered(question_id: QuestionId, at: DateTime<Utc>) -> Self {
        Self {
            question_id,
            selected_answer: None,
            is_correct: false,
            time_spent_secs: 0,
            answered_at: at,
        }
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selected_answer.is_some()
    }
}

//
// ─── TOPIC SCORE ───────────────────────────────────────────────────────────────
//

/// Per-topic tally derived from a set of responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicScore {
    pub topic: Topic,
    pub attempted: u32,
    pub correct: u32,
    /// Whole-number percentage of `correct / attempted`.
    pub percentage: f64,
    pub average_time_secs: f64,
}

impl TopicScore {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_tally(topic: Topic, attempted: u32, correct: u32, total_time_secs: u64) -> Self {
        let (percentage, average_time_secs) = if attempted == 0 {
            (0.0, 0.0)
        } else {
            (
                (f64::from(correct) / f64::from(attempted) * 100.0).round(),
                total_time_secs as f64 / f64::from(attempted),
            )
        };
        Self {
            topic,
            attempted,
            correct,
            percentage,
            average_time_secs,
        }
    }
}

/// Group `questions` by topic and tally the matching responses.
///
/// Topics appear in `Topic::ALL` order and only when at least one question covers them.
/// A question with no matching response counts as attempted and incorrect.
#[must_use]
pub fn topic_breakdown(questions: &[Question], responses: &[QuestionResponse]) -> Vec<TopicScore> {
    let by_id: HashMap<QuestionId, &QuestionResponse> =
        responses.iter().map(|r| (r.question_id, r)).collect();

    let mut tallies: HashMap<Topic, (u32, u32, u64)> = HashMap::new();
    for question in questions {
        let entry = tallies.entry(question.topic()).or_insert((0, 0, 0));
        entry.0 = entry.0.saturating_add(1);
        if let Some(response) = by_id.get(&question.id()) {
            if response.is_correct {
                entry.1 = entry.1.saturating_add(1);
            }
            entry.2 = entry.2.saturating_add(u64::from(response.time_spent_secs));
        }
    }

    Topic::ALL
        .into_iter()
        .filter_map(|topic| {
            tallies
                .get(&topic)
                .map(|&(attempted, correct, time)| {
                    TopicScore::from_tally(topic, attempted, correct, time)
                })
        })
        .collect()
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
            difficulty: "easy".into(),
            prompt: format!("Q{id}"),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_answer: 1,
            explanation: "Because".into(),
            ..QuestionDraft::default()
        }
        .validate(QuestionId::new(id))
        .unwrap()
    }

    #[test]
    fn breakdown_groups_by_topic_and_rounds() {
        let qs = vec![
            question(1, "data_governance"),
            question(2, "data_governance"),
            question(3, "data_governance"),
            question(4, "production_pipelines"),
        ];
        let now = fixed_now();
        let responses = vec![
            QuestionResponse::answered(&qs[0], 1, 40, now),
            QuestionResponse::answered(&qs[1], 0, 20, now),
            QuestionResponse::unanswered(qs[2].id(), now),
            QuestionResponse::answered(&qs[3], 1, 90, now),
        ];

        let breakdown = topic_breakdown(&qs, &responses);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].topic, Topic::ProductionPipelines);
        assert_eq!(breakdown[0].percentage, 100.0);

        let governance = &breakdown[1];
        assert_eq!(governance.attempted, 3);
        assert_eq!(governance.correct, 1);
        assert_eq!(governance.percentage, 33.0);
        assert_eq!(governance.average_time_secs, 20.0);
    }

    #[test]
    fn sentinel_response_is_never_correct() {
        let r = QuestionResponse::unanswered(QuestionId::new(9), fixed_now());
        assert!(!r.is_answered());
        assert!(!r.is_correct);
        assert_eq!(r.time_spent_secs, 0);
    }
}
