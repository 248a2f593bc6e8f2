//! Builders for questions and results shared by unit and integration tests.

use chrono::{DateTime, Utc};

use crate::model::{
    ExamKind, ExamResult, Question, QuestionDraft, QuestionId, QuestionResponse, SessionId, Topic,
    UserId,
};

/// A valid four-option question whose correct answer is option 0.
///
/// # Panics
///
/// Panics if the fixed draft fails validation.
#[must_use]
pub fn question(id: u64, topic: Topic) -> Question {
    QuestionDraft {
        topic: topic.as_str().to_owned(),
        subtopic: "General".into(),
        difficulty: "medium".into(),
        prompt: format!("{} question {id}", topic.display_name()),
        code_sample: None,
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_answer: 0,
        explanation: "Option A is correct.".into(),
        references: vec!["https://docs.databricks.com/".into()],
        tags: vec![topic.as_str().to_owned()],
    }
    .validate(QuestionId::new(id))
    .expect("fixture question should be valid")
}

/// A result in which each listed topic scored exactly `percent` over 100 questions.
///
/// Every answered question records `secs_per_question` of time.
#[must_use]
pub fn result_with_scores(
    user_id: UserId,
    started_at: DateTime<Utc>,
    scores: &[(Topic, u32)],
    secs_per_question: u32,
) -> ExamResult {
    let mut questions = Vec::new();
    let mut responses = Vec::new();
    let mut next_id = 1;
    for &(topic, percent) in scores {
        for i in 0..100 {
            let q = question(next_id, topic);
            next_id += 1;
            let selected = if i < percent { 0 } else { 1 };
            responses.push(QuestionResponse::answered(
                &q,
                selected,
                secs_per_question,
                started_at,
            ));
            questions.push(q);
        }
    }
    let duration = i64::from(secs_per_question) * i64::try_from(questions.len()).unwrap_or(0);
    ExamResult::from_session(
        SessionId::generate(),
        user_id,
        ExamKind::Practice,
        &questions,
        &responses,
        started_at,
        started_at + chrono::Duration::seconds(duration),
    )
}

/// Same score for every topic.
#[must_use]
pub fn uniform_result(user_id: UserId, started_at: DateTime<Utc>, percent: u32) -> ExamResult {
    let scores: Vec<(Topic, u32)> = Topic::ALL.iter().map(|&t| (t, percent)).collect();
    result_with_scores(user_id, started_at, &scores, 60)
}
