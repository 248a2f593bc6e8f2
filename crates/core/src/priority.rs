//! Study priorities derived from long-run topic performance.

use serde::{Deserialize, Serialize};

use crate::model::{ExamResult, Topic, round2};
use crate::trend::{TopicProgress, TrendDirection};

/// Stagnation threshold for weak topics, in consecutive non-improving sessions.
pub const STAGNANT_SESSIONS: usize = 2;
/// Average at or above which a topic counts as strong for prioritisation.
pub const STRONG_AVERAGE: f64 = 80.0;
pub const DEFAULT_WEAK_THRESHOLD: f64 = 70.0;

//
// ─── WEAK AREAS ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakArea {
    pub topic: Topic,
    pub average_score: f64,
    pub exam_count: usize,
    pub points_needed: f64,
}

/// Topics whose average over the whole history is below `threshold`, weakest first.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weak_areas(results: &[ExamResult], threshold: f64) -> Vec<WeakArea> {
    let mut areas: Vec<WeakArea> = Topic::ALL
        .into_iter()
        .filter_map(|topic| {
            let scores: Vec<f64> = results
                .iter()
                .filter_map(|r| r.topic_score(topic).map(|s| s.percentage))
                .collect();
            if scores.is_empty() {
                return None;
            }
            let average = round2(scores.iter().sum::<f64>() / scores.len() as f64);
            (average < threshold).then(|| WeakArea {
                topic,
                average_score: average,
                exam_count: scores.len(),
                points_needed: round2(threshold - average),
            })
        })
        .collect();
    areas.sort_by(|a, b| a.average_score.total_cmp(&b.average_score));
    areas
}

//
// ─── PRIORITISATION ────────────────────────────────────────────────────────────
//

/// Study priority for one topic, 5 being most urgent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicPriority {
    pub topic: Topic,
    pub priority: u8,
    pub average_score: f64,
    pub trend: TrendDirection,
    pub improvement_rate: f64,
    pub sessions_without_improvement: usize,
    pub reason: String,
    pub recommended_action: String,
}

fn fundamentals_action(topic: Topic) -> String {
    format!(
        "Go back to the fundamentals of {} before taking more practice exams. {}",
        topic.display_name(),
        topic.remediation_hint()
    )
}

fn assess(progress: &TopicProgress, weak_threshold: f64) -> (u8, String, String) {
    let name = progress.topic.display_name();
    let weak = progress.average_score < weak_threshold;
    let stagnant = progress.sessions_without_improvement >= STAGNANT_SESSIONS;

    match (weak, progress.trend) {
        (true, TrendDirection::Declining) => (
            5,
            format!("{name} is below {weak_threshold}% and still declining"),
            fundamentals_action(progress.topic),
        ),
        (true, _) if stagnant => (
            4,
            format!(
                "{name} is below {weak_threshold}% with no meaningful gain in {} sessions",
                progress.sessions_without_improvement
            ),
            fundamentals_action(progress.topic),
        ),
        (true, _) => (
            3,
            format!("{name} is below {weak_threshold}% but moving"),
            format!("Keep targeted practice on {name} until it clears {weak_threshold}%."),
        ),
        (false, TrendDirection::Declining) => (
            3,
            format!("{name} scores are declining"),
            format!("Review recent mistakes in {name} to stop the slide."),
        ),
        (false, TrendDirection::Improving) => (
            1,
            format!("{name} is improving"),
            "Maintain your current pace.".to_owned(),
        ),
        (false, _) if progress.average_score >= STRONG_AVERAGE => (
            1,
            format!("{name} is consistently strong"),
            "Maintain with occasional review.".to_owned(),
        ),
        (false, _) => (
            1,
            format!("{name} is steady"),
            "Maintain your current pace.".to_owned(),
        ),
    }
}

/// Rank topics by urgency, then by how long they have stagnated.
#[must_use]
pub fn prioritize(progress: &[TopicProgress], weak_threshold: f64) -> Vec<TopicPriority> {
    let mut out: Vec<TopicPriority> = progress
        .iter()
        .map(|p| {
            let (priority, reason, recommended_action) = assess(p, weak_threshold);
            TopicPriority {
                topic: p.topic,
                priority,
                average_score: p.average_score,
                trend: p.trend,
                improvement_rate: p.improvement_rate,
                sessions_without_improvement: p.sessions_without_improvement,
                reason,
                recommended_action,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.sessions_without_improvement.cmp(&a.sessions_without_improvement))
    });
    out
}
