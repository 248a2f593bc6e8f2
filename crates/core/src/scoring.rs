//! Post-exam scoring: per-question feedback, timing, pacing and insights.

use serde::{Deserialize, Serialize};

use crate::model::{
    ExamResult, Question, QuestionId, QuestionResponse, Topic, TopicScore, round2,
};
use crate::time::format_elapsed;
use crate::validation::{ValidationError, ValidationReport};

/// Answers faster than this are flagged as rushed.
pub const RUSHING_THRESHOLD_SECS: u32 = 30;
/// Answers slower than this are flagged as slow.
pub const SLOW_THRESHOLD_SECS: u32 = 300;
/// More than this many rushed or slow answers breaks good pacing.
pub const PACING_ISSUE_LIMIT: usize = 3;
pub const PASS_PERCENTAGE: f64 = 70.0;
pub const EXCELLENT_PERCENTAGE: f64 = 80.0;
pub const STRENGTH_PERCENTAGE: f64 = 80.0;
pub const WEAKNESS_PERCENTAGE: f64 = 70.0;

//
// ─── FEEDBACK ──────────────────────────────────────────────────────────────────
//

/// A response paired with the question it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub question_id: QuestionId,
    pub topic: Topic,
    pub prompt: String,
    pub selected_answer: Option<usize>,
    pub correct_answer: usize,
    pub is_correct: bool,
    pub time_spent_secs: u32,
    pub explanation: String,
    pub references: Vec<String>,
}

fn question_feedback(question: &Question, response: &QuestionResponse) -> QuestionFeedback {
    QuestionFeedback {
        question_id: question.id(),
        topic: question.topic(),
        prompt: question.prompt().to_owned(),
        selected_answer: response.selected_answer,
        correct_answer: question.correct_answer(),
        is_correct: response.is_correct,
        time_spent_secs: response.time_spent_secs,
        explanation: question.explanation().to_owned(),
        references: question.references().to_vec(),
    }
}

//
// ─── TIMING ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionTime {
    pub question_id: QuestionId,
    pub topic: Topic,
    pub time_spent_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTiming {
    pub topic: Topic,
    pub question_count: usize,
    pub total_time_secs: u64,
    pub average_time_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub total_time_secs: u64,
    pub average_time_secs: f64,
    pub fastest: Option<QuestionTime>,
    pub slowest: Option<QuestionTime>,
    pub per_topic: Vec<TopicTiming>,
    pub unanswered: usize,
}

fn answered_times(questions: &[Question], responses: &[QuestionResponse]) -> Vec<QuestionTime> {
    questions
        .iter()
        .zip(responses)
        .filter(|(_, r)| r.is_answered())
        .map(|(q, r)| QuestionTime {
            question_id: q.id(),
            topic: q.topic(),
            time_spent_secs: r.time_spent_secs,
        })
        .collect()
}

/// Time totals over answered questions, overall and per topic.
///
/// Ties for fastest or slowest go to the earliest question.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze_timing(questions: &[Question], responses: &[QuestionResponse]) -> TimingAnalysis {
    let times = answered_times(questions, responses);
    let total_time_secs: u64 = times.iter().map(|t| u64::from(t.time_spent_secs)).sum();
    let average_time_secs = if times.is_empty() {
        0.0
    } else {
        round2(total_time_secs as f64 / times.len() as f64)
    };

    let mut fastest: Option<QuestionTime> = None;
    let mut slowest: Option<QuestionTime> = None;
    for t in &times {
        if fastest.is_none_or(|f| t.time_spent_secs < f.time_spent_secs) {
            fastest = Some(*t);
        }
        if slowest.is_none_or(|s| t.time_spent_secs > s.time_spent_secs) {
            slowest = Some(*t);
        }
    }

    let per_topic = Topic::ALL
        .into_iter()
        .filter_map(|topic| {
            let (count, total) = times
                .iter()
                .filter(|t| t.topic == topic)
                .fold((0usize, 0u64), |(c, s), t| (c + 1, s + u64::from(t.time_spent_secs)));
            (count > 0).then(|| TopicTiming {
                topic,
                question_count: count,
                total_time_secs: total,
                average_time_secs: round2(total as f64 / count as f64),
            })
        })
        .collect();

    TimingAnalysis {
        total_time_secs,
        average_time_secs,
        fastest,
        slowest,
        per_topic,
        unanswered: responses.iter().filter(|r| !r.is_answered()).count(),
    }
}

//
// ─── PACING ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingAnalysis {
    pub rushing: Vec<QuestionId>,
    pub slow: Vec<QuestionId>,
    pub average_time_secs: f64,
    pub std_deviation_secs: f64,
    pub is_well_paced: bool,
    pub recommendations: Vec<String>,
}

/// Consistency of time per answered question.
///
/// Well paced means the standard deviation is under half the average and fewer than
/// `PACING_ISSUE_LIMIT` questions are rushed and fewer are slow.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze_pacing(questions: &[Question], responses: &[QuestionResponse]) -> PacingAnalysis {
    let times = answered_times(questions, responses);
    let rushing: Vec<QuestionId> = times
        .iter()
        .filter(|t| t.time_spent_secs < RUSHING_THRESHOLD_SECS)
        .map(|t| t.question_id)
        .collect();
    let slow: Vec<QuestionId> = times
        .iter()
        .filter(|t| t.time_spent_secs > SLOW_THRESHOLD_SECS)
        .map(|t| t.question_id)
        .collect();

    let (average, std_dev) = if times.is_empty() {
        (0.0, 0.0)
    } else {
        let n = times.len() as f64;
        let mean = times.iter().map(|t| f64::from(t.time_spent_secs)).sum::<f64>() / n;
        let variance = times
            .iter()
            .map(|t| (f64::from(t.time_spent_secs) - mean).powi(2))
            .sum::<f64>()
            / n;
        (mean, variance.sqrt())
    };

    let consistent = std_dev < average / 2.0;
    let is_well_paced =
        consistent && rushing.len() < PACING_ISSUE_LIMIT && slow.len() < PACING_ISSUE_LIMIT;

    let mut recommendations = Vec::new();
    if is_well_paced {
        recommendations
            .push("Your pacing was consistent. Keep the same rhythm on exam day.".to_owned());
    } else {
        if !rushing.is_empty() {
            recommendations.push(format!(
                "You answered {} question(s) in under {RUSHING_THRESHOLD_SECS} seconds. Read every option before committing.",
                rushing.len()
            ));
        }
        if !slow.is_empty() {
            recommendations.push(format!(
                "{} question(s) took over {} minutes. Flag hard questions and come back to them.",
                slow.len(),
                SLOW_THRESHOLD_SECS / 60
            ));
        }
        if !consistent {
            recommendations.push(
                "Time per question varied widely. Aim for a steady pace of about 90 seconds per question."
                    .to_owned(),
            );
        }
    }

    PacingAnalysis {
        rushing,
        slow,
        average_time_secs: round2(average),
        std_deviation_secs: round2(std_dev),
        is_well_paced,
        recommendations,
    }
}

//
// ─── INSIGHTS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Excellent,
    Good,
    NeedsImprovement,
}

impl ScoreTier {
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= EXCELLENT_PERCENTAGE {
            ScoreTier::Excellent
        } else if percentage >= PASS_PERCENTAGE {
            ScoreTier::Good
        } else {
            ScoreTier::NeedsImprovement
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInsights {
    pub tier: ScoreTier,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}

#[must_use]
pub fn performance_insights(result: &ExamResult, pacing: &PacingAnalysis) -> PerformanceInsights {
    let percentage = result.percentage();
    let tier = ScoreTier::from_percentage(percentage);
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut recommendations = Vec::new();

    match tier {
        ScoreTier::Excellent => strengths.push(format!("Excellent overall score of {percentage}%")),
        ScoreTier::Good => strengths.push(format!("Passing overall score of {percentage}%")),
        ScoreTier::NeedsImprovement => {
            weaknesses.push(format!(
                "Overall score of {percentage}% is below the {PASS_PERCENTAGE}% passing mark"
            ));
            recommendations.push(
                "Schedule another full practice exam after reviewing the weak topics.".to_owned(),
            );
        }
    }

    for score in &result.topic_breakdown {
        let name = score.topic.display_name();
        if score.percentage >= STRENGTH_PERCENTAGE {
            strengths.push(format!("Strong performance in {name} ({}%)", score.percentage));
        } else if score.percentage < WEAKNESS_PERCENTAGE {
            weaknesses.push(format!("{name} needs work ({}%)", score.percentage));
            recommendations.push(score.topic.remediation_hint().to_owned());
        }
    }

    if pacing.is_well_paced {
        strengths.push("Consistent pacing across questions".to_owned());
    } else {
        weaknesses.push("Inconsistent pacing across questions".to_owned());
        recommendations.extend(pacing.recommendations.iter().cloned());
    }

    PerformanceInsights {
        tier,
        strengths,
        weaknesses,
        recommendations,
    }
}

//
// ─── REPORTS ───────────────────────────────────────────────────────────────────
//

/// Full post-exam report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub percentage: f64,
    pub passed: bool,
    pub feedback: Vec<QuestionFeedback>,
    pub timing: TimingAnalysis,
    pub pacing: PacingAnalysis,
    pub insights: PerformanceInsights,
}

/// Quick summary shown right after an exam ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmediateFeedback {
    pub percentage: f64,
    pub passed: bool,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub best_topic: Option<TopicScore>,
    pub worst_topic: Option<TopicScore>,
    pub elapsed: String,
}

/// Shape checks on a finished result.
///
/// # Errors
///
/// Returns every violation found, not just the first.
pub fn validate_result(result: &ExamResult) -> Result<(), ValidationError> {
    result.check().into_result()
}

fn check_alignment(result: &ExamResult, questions: &[Question]) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.check(questions.len() == result.responses.len(), || {
        format!(
            "question count ({}) does not match response count ({})",
            questions.len(),
            result.responses.len()
        )
    });
    for (i, (q, r)) in questions.iter().zip(&result.responses).enumerate() {
        report.check(q.id() == r.question_id, || {
            format!(
                "response {i} is for question {} but question {} was asked",
                r.question_id,
                q.id()
            )
        });
    }
    report
}

/// Build the full report for `result`, whose responses must follow `questions` in order.
///
/// # Errors
///
/// Returns `ValidationError` when the result is malformed or does not line up with
/// `questions`.
pub fn score(result: &ExamResult, questions: &[Question]) -> Result<ScoreReport, ValidationError> {
    ValidationReport::combine([result.check(), check_alignment(result, questions)]).into_result()?;

    let pacing = analyze_pacing(questions, &result.responses);
    let percentage = result.percentage();
    Ok(ScoreReport {
        percentage,
        passed: percentage >= PASS_PERCENTAGE,
        feedback: questions
            .iter()
            .zip(&result.responses)
            .map(|(q, r)| question_feedback(q, r))
            .collect(),
        timing: analyze_timing(questions, &result.responses),
        insights: performance_insights(result, &pacing),
        pacing,
    })
}

#[must_use]
pub fn immediate_feedback(result: &ExamResult) -> ImmediateFeedback {
    let percentage = result.percentage();
    let best_topic = result
        .topic_breakdown
        .iter()
        .max_by(|a, b| a.percentage.total_cmp(&b.percentage))
        .cloned();
    let worst_topic = result
        .topic_breakdown
        .iter()
        .min_by(|a, b| a.percentage.total_cmp(&b.percentage))
        .cloned();

    ImmediateFeedback {
        percentage,
        passed: percentage >= PASS_PERCENTAGE,
        correct_answers: result.correct_answers,
        total_questions: result.total_questions,
        best_topic,
        worst_topic,
        elapsed: format_elapsed(result.total_time_spent_secs),
    }
}
