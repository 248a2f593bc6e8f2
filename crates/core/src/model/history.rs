use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;
use crate::model::result::ExamResult;

/// Aggregates over every stored result for one learner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAggregates {
    pub exam_count: usize,
    pub best_score: f64,
    pub worst_score: f64,
    pub average_score: f64,
    pub total_time_secs: i64,
    pub average_time_secs: f64,
}

impl PerformanceAggregates {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_results(results: &[ExamResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let scores: Vec<f64> = results.iter().map(ExamResult::percentage).collect();
        let total_time_secs: i64 = results.iter().map(|r| r.total_time_spent_secs).sum();
        let n = results.len() as f64;

        Self {
            exam_count: results.len(),
            best_score: scores.iter().copied().fold(f64::MIN, f64::max),
            worst_score: scores.iter().copied().fold(f64::MAX, f64::min),
            average_score: round2(scores.iter().sum::<f64>() / n),
            total_time_secs,
            average_time_secs: round2(total_time_secs as f64 / n),
        }
    }
}

/// Append-only result log for one learner with aggregates kept current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPerformance {
    user_id: UserId,
    results: Vec<ExamResult>,
    aggregates: PerformanceAggregates,
}

impl HistoricalPerformance {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            results: Vec::new(),
            aggregates: PerformanceAggregates::default(),
        }
    }

    /// Rebuild from stored results, ordering them by start time.
    #[must_use]
    pub fn from_results(user_id: UserId, mut results: Vec<ExamResult>) -> Self {
        results.sort_by_key(|r| r.started_at);
        let aggregates = PerformanceAggregates::from_results(&results);
        Self {
            user_id,
            results,
            aggregates,
        }
    }

    /// Append a result and recompute the aggregates.
    pub fn append(&mut self, result: ExamResult) {
        self.results.push(result);
        self.aggregates = PerformanceAggregates::from_results(&self.results);
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn results(&self) -> &[ExamResult] {
        &self.results
    }

    #[must_use]
    pub fn aggregates(&self) -> &PerformanceAggregates {
        &self.aggregates
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::uniform_result;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn empty_history_has_zeroed_aggregates() {
        let history = HistoricalPerformance::new(UserId::new(7));
        assert!(history.is_empty());
        assert_eq!(history.aggregates(), &PerformanceAggregates::default());
    }

    #[test]
    fn append_recomputes_aggregates() {
        let user = UserId::new(7);
        let t0 = fixed_now();
        let mut history = HistoricalPerformance::new(user);
        history.append(uniform_result(user, t0, 60));
        history.append(uniform_result(user, t0 + Duration::days(1), 90));

        let agg = history.aggregates();
        assert_eq!(agg.exam_count, 2);
        assert_eq!(agg.best_score, 90.0);
        assert_eq!(agg.worst_score, 60.0);
        assert_eq!(agg.average_score, 75.0);
        // 500 questions at 60s each per exam.
        assert_eq!(agg.total_time_secs, 60_000);
        assert_eq!(agg.average_time_secs, 30_000.0);
    }

    #[test]
    fn from_results_orders_by_start_time() {
        let user = UserId::new(7);
        let t0 = fixed_now();
        let later = uniform_result(user, t0 + Duration::days(3), 80);
        let earlier = uniform_result(user, t0, 40);
        let history = HistoricalPerformance::from_results(user, vec![later, earlier]);

        assert_eq!(history.results()[0].percentage(), 40.0);
        assert_eq!(history.results()[1].percentage(), 80.0);
    }
}
