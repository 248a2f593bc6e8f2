//! Per-topic score trajectories over a learner's exam history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ExamKind, ExamResult, Topic, round2};

/// Slope magnitude (points per exam) below which a series counts as stable.
pub const STABLE_SLOPE_THRESHOLD: f64 = 1.0;

/// Smallest exam-to-exam gain that counts as real improvement.
pub const MEANINGFUL_GAIN: f64 = 5.0;

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// One exam's score for a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub exam_index: usize,
    pub score: f64,
    pub taken_at: DateTime<Utc>,
    pub time_per_question_secs: f64,
}

/// Score trajectory for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub topic: Topic,
    pub points: Vec<TrendPoint>,
    pub trend: TrendDirection,
    pub improvement_rate: f64,
    pub average_score: f64,
    pub average_time_per_question_secs: f64,
    pub sessions_without_improvement: usize,
}

impl TopicProgress {
    #[must_use]
    pub fn scores(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.score).collect()
    }

    #[must_use]
    pub fn latest_score(&self) -> Option<f64> {
        self.points.last().map(|p| p.score)
    }
}

//
// ─── FILTERS ───────────────────────────────────────────────────────────────────
//

/// Look-back window for trend queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Week,
    Month,
    Quarter,
    Year,
    #[default]
    All,
}

impl Timeframe {
    /// Earliest start time included, or `None` for the whole history.
    #[must_use]
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = match self {
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Quarter => 90,
            Timeframe::Year => 365,
            Timeframe::All => return None,
        };
        Some(now - Duration::days(days))
    }
}

/// Optional restrictions on which results feed a trend query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendFilter {
    pub topic: Option<Topic>,
    pub kind: Option<ExamKind>,
    pub since: Option<DateTime<Utc>>,
}

impl TrendFilter {
    #[must_use]
    pub fn for_timeframe(timeframe: Timeframe, now: DateTime<Utc>) -> Self {
        Self {
            since: timeframe.cutoff(now),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ExamKind) -> Self {
        self.kind = Some(kind);
        self
    }

    fn admits(&self, result: &ExamResult) -> bool {
        self.kind.is_none_or(|k| result.kind == k)
            && self.since.is_none_or(|since| result.started_at >= since)
    }
}

//
// ─── STATISTICS ────────────────────────────────────────────────────────────────
//

/// Least-squares slope of `scores` against their index.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn regression_slope(scores: &[f64]) -> f64 {
    let n = scores.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = scores.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in scores.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 { 0.0 } else { num / den }
}

#[must_use]
pub fn classify_trend(scores: &[f64]) -> TrendDirection {
    let slope = regression_slope(scores);
    if slope.abs() < STABLE_SLOPE_THRESHOLD {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    }
}

/// Average relative gain per exam, in percent, rounded to 2 decimals.
///
/// `(last - first) / first / (count - 1) * 100`; zero when there are fewer than two
/// points or the first score is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn improvement_rate(scores: &[f64]) -> f64 {
    let (Some(&first), Some(&last)) = (scores.first(), scores.last()) else {
        return 0.0;
    };
    if scores.len() < 2 || first == 0.0 {
        return 0.0;
    }
    round2((last - first) / first / (scores.len() - 1) as f64 * 100.0)
}

/// Count trailing exam-to-exam transitions that gained less than `MEANINGFUL_GAIN`.
#[must_use]
pub fn sessions_without_improvement(scores: &[f64]) -> usize {
    scores
        .windows(2)
        .rev()
        .take_while(|w| w[1] - w[0] < MEANINGFUL_GAIN)
        .count()
}

//
// ─── ANALYSIS ──────────────────────────────────────────────────────────────────
//

/// Build the trajectory for `topic` from time-ordered results.
///
/// Only results whose breakdown contains the topic contribute. Returns `None` when
/// no result covers it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze_topic(topic: Topic, results: &[&ExamResult]) -> Option<TopicProgress> {
    let points: Vec<TrendPoint> = results
        .iter()
        .filter_map(|r| r.topic_score(topic).map(|s| (r, s)))
        .enumerate()
        .map(|(exam_index, (r, s))| TrendPoint {
            exam_index,
            score: s.percentage,
            taken_at: r.started_at,
            time_per_question_secs: s.average_time_secs,
        })
        .collect();
    if points.is_empty() {
        return None;
    }

    let scores: Vec<f64> = points.iter().map(|p| p.score).collect();
    let n = points.len() as f64;
    Some(TopicProgress {
        topic,
        trend: classify_trend(&scores),
        improvement_rate: improvement_rate(&scores),
        average_score: round2(scores.iter().sum::<f64>() / n),
        average_time_per_question_secs: round2(
            points.iter().map(|p| p.time_per_question_secs).sum::<f64>() / n,
        ),
        sessions_without_improvement: sessions_without_improvement(&scores),
        points,
    })
}

/// Trajectories for every topic with data, in `Topic::ALL` order.
///
/// Results are sorted by start time before analysis.
#[must_use]
pub fn analyze_trends(results: &[ExamResult], filter: &TrendFilter) -> Vec<TopicProgress> {
    let mut admitted: Vec<&ExamResult> = results.iter().filter(|r| filter.admits(r)).collect();
    admitted.sort_by_key(|r| r.started_at);

    Topic::ALL
        .into_iter()
        .filter(|t| filter.topic.is_none_or(|only| only == *t))
        .filter_map(|t| analyze_topic(t, &admitted))
        .collect()
}

/// Order trajectories by improvement rate, fastest improvers first.
pub fn sort_by_improvement(progress: &mut [TopicProgress]) {
    progress.sort_by(|a, b| b.improvement_rate.total_cmp(&a.improvement_rate));
}
