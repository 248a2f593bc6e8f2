use std::sync::Arc;

use tracing::{debug, info};

use exam_core::allocation::{
    TopicCounts, TopicRecommendation, analyze_recent, generate_recommendations, plan_distribution,
    topics_to_reduce,
};
use exam_core::assessment::{AssessmentConfig, comprehensive_assessment_config};
use exam_core::model::{ExamResult, HistoricalPerformance, Topic, UserId};
use exam_core::priority::{TopicPriority, WeakArea, prioritize, weak_areas};
use exam_core::scoring::validate_result;
use exam_core::trend::{Timeframe, TopicProgress, TrendFilter, analyze_trends, sort_by_improvement};
use exam_core::{AllocationSettings, Clock};
use storage::repository::ResultRepository;

use crate::error::ProgressError;

/// Append-only per-learner result log and the analytics derived from it.
///
/// Nothing derived is stored; every query recomputes from the learner's results.
#[derive(Clone)]
pub struct ProgressTracker {
    clock: Clock,
    results: Arc<dyn ResultRepository>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(clock: Clock, results: Arc<dyn ResultRepository>) -> Self {
        Self { clock, results }
    }

    /// Validate and append a finished result, returning the refreshed history.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Validation` for a malformed result, or
    /// `ProgressError::Storage` if it cannot be stored (including a second result for
    /// the same session).
    pub async fn record_result(
        &self,
        result: &ExamResult,
    ) -> Result<HistoricalPerformance, ProgressError> {
        validate_result(result)?;
        self.results.store_result(result).await?;
        let history = self.history(result.user_id).await?;
        info!(
            user = %result.user_id,
            session = %result.session_id,
            exams = history.aggregates().exam_count,
            average = history.aggregates().average_score,
            "result recorded"
        );
        Ok(history)
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if results cannot be loaded.
    pub async fn history(&self, user_id: UserId) -> Result<HistoricalPerformance, ProgressError> {
        let results = self.results.query_by_user(user_id).await?;
        Ok(HistoricalPerformance::from_results(user_id, results))
    }

    /// Per-topic trends, sorted by improvement rate descending.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if results cannot be loaded.
    pub async fn trends(
        &self,
        user_id: UserId,
        filter: &TrendFilter,
    ) -> Result<Vec<TopicProgress>, ProgressError> {
        let history = self.history(user_id).await?;
        let mut progress = analyze_trends(history.results(), filter);
        sort_by_improvement(&mut progress);
        Ok(progress)
    }

    /// Trends over a look-back window ending now.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if results cannot be loaded.
    pub async fn trends_for(
        &self,
        user_id: UserId,
        timeframe: Timeframe,
    ) -> Result<Vec<TopicProgress>, ProgressError> {
        let filter = TrendFilter::for_timeframe(timeframe, self.clock.now());
        self.trends(user_id, &filter).await
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if results cannot be loaded.
    pub async fn weak_areas(
        &self,
        user_id: UserId,
        threshold: f64,
    ) -> Result<Vec<WeakArea>, ProgressError> {
        let history = self.history(user_id).await?;
        Ok(weak_areas(history.results(), threshold))
    }

    /// Topics ranked by study urgency over the whole history.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if results cannot be loaded.
    pub async fn prioritize(
        &self,
        user_id: UserId,
        weak_threshold: f64,
    ) -> Result<Vec<TopicPriority>, ProgressError> {
        let history = self.history(user_id).await?;
        let progress = analyze_trends(history.results(), &TrendFilter::default());
        let ranked = prioritize(&progress, weak_threshold);
        debug!(user = %user_id, topics = ranked.len(), "topics prioritised");
        Ok(ranked)
    }

    /// Study guidance based on recent averages, trends and the next exam's split.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if results cannot be loaded.
    pub async fn recommendations(
        &self,
        user_id: UserId,
        settings: &AllocationSettings,
    ) -> Result<Vec<TopicRecommendation>, ProgressError> {
        let history = self.history(user_id).await?;
        let results = history.results();
        let analysis = analyze_recent(results, settings);
        let trends = analyze_trends(results, &TrendFilter::default());
        let counts = plan_distribution(results, settings);
        let reduced = topics_to_reduce(results, settings);
        Ok(generate_recommendations(&analysis, &trends, &counts, &reduced))
    }

    /// Topics that have stayed above the strong threshold for the last
    /// `reduce_after` exams.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if results cannot be loaded.
    pub async fn topics_to_reduce(
        &self,
        user_id: UserId,
        settings: &AllocationSettings,
    ) -> Result<Vec<Topic>, ProgressError> {
        let history = self.history(user_id).await?;
        let reduced = topics_to_reduce(history.results(), settings);
        if !reduced.is_empty() {
            debug!(user = %user_id, topics = reduced.len(), "topics ready for reduction");
        }
        Ok(reduced)
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Assessment` for a zero total or a custom distribution
    /// that does not sum to it.
    pub fn assessment_config(
        &self,
        total_questions: usize,
        custom: Option<&TopicCounts>,
    ) -> Result<AssessmentConfig, ProgressError> {
        Ok(comprehensive_assessment_config(total_questions, custom)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use exam_core::fixtures::{result_with_scores, uniform_result};
    use exam_core::priority::DEFAULT_WEAK_THRESHOLD;
    use exam_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, StorageError};

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn aggregates_follow_each_append() {
        let tracker = tracker();
        let user = UserId::new(3);

        let history = tracker
            .record_result(&uniform_result(user, fixed_now() - Duration::days(2), 60))
            .await
            .unwrap();
        assert_eq!(history.aggregates().exam_count, 1);

        let history = tracker
            .record_result(&uniform_result(user, fixed_now() - Duration::days(1), 80))
            .await
            .unwrap();
        assert_eq!(history.aggregates().exam_count, 2);
        assert_eq!(history.aggregates().best_score, 80.0);
        assert_eq!(history.aggregates().worst_score, 60.0);
        assert_eq!(history.aggregates().average_score, 70.0);
    }

    #[tokio::test]
    async fn malformed_result_is_rejected_before_storage() {
        let tracker = tracker();
        let user = UserId::new(3);
        let mut result = uniform_result(user, fixed_now(), 60);
        result.correct_answers = result.total_questions + 1;

        let err = tracker.record_result(&result).await.unwrap_err();
        assert!(matches!(err, ProgressError::Validation(_)));
        assert!(tracker.history(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_session_is_a_conflict() {
        let tracker = tracker();
        let result = uniform_result(UserId::new(3), fixed_now(), 60);
        tracker.record_result(&result).await.unwrap();
        let err = tracker.record_result(&result).await.unwrap_err();
        assert!(matches!(
            err,
            ProgressError::Storage(StorageError::Conflict)
        ));
    }

    #[tokio::test]
    async fn timeframe_filters_old_results() {
        let tracker = tracker();
        let user = UserId::new(3);
        for (days_ago, score) in [(200, 40), (20, 60), (10, 70), (1, 80)] {
            tracker
                .record_result(&result_with_scores(
                    user,
                    fixed_now() - Duration::days(days_ago),
                    &[(Topic::DataGovernance, score)],
                    60,
                ))
                .await
                .unwrap();
        }

        let month = tracker.trends_for(user, Timeframe::Month).await.unwrap();
        assert_eq!(month[0].points.len(), 3);
        let all = tracker.trends_for(user, Timeframe::All).await.unwrap();
        assert_eq!(all[0].points.len(), 4);
    }

    #[tokio::test]
    async fn weak_areas_and_recommendations() {
        let tracker = tracker();
        let user = UserId::new(3);
        tracker
            .record_result(&result_with_scores(
                user,
                fixed_now(),
                &[
                    (Topic::LakehousePlatform, 90),
                    (Topic::EltWithSparkSql, 50),
                ],
                60,
            ))
            .await
            .unwrap();

        let weak = tracker
            .weak_areas(user, DEFAULT_WEAK_THRESHOLD)
            .await
            .unwrap();
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].topic, Topic::EltWithSparkSql);

        let recs = tracker
            .recommendations(user, &AllocationSettings::default())
            .await
            .unwrap();
        assert_eq!(recs.len(), 5);
        assert_eq!(recs[0].topic, Topic::EltWithSparkSql);
        assert_eq!(recs[0].recommended_questions, 36);
    }

    #[tokio::test]
    async fn strong_streak_marks_topics_for_reduction() {
        let tracker = tracker();
        let user = UserId::new(4);
        let settings = AllocationSettings::default();
        for day in 0..3 {
            tracker
                .record_result(&uniform_result(
                    user,
                    fixed_now() - Duration::days(3 - day),
                    85 + u32::try_from(day).unwrap(),
                ))
                .await
                .unwrap();
            let reduced = tracker.topics_to_reduce(user, &settings).await.unwrap();
            assert_eq!(reduced.is_empty(), day < 2);
        }

        assert_eq!(
            tracker.topics_to_reduce(user, &settings).await.unwrap(),
            Topic::ALL.to_vec()
        );
        let recs = tracker.recommendations(user, &settings).await.unwrap();
        assert!(recs.iter().all(|r| r.reduce_allocation));
    }

    #[test]
    fn assessment_config_rejects_bad_distribution() {
        let custom: TopicCounts = Topic::ALL.iter().map(|&t| (t, 5)).collect();
        assert!(matches!(
            tracker().assessment_config(30, Some(&custom)),
            Err(ProgressError::Assessment(_))
        ));
        assert!(tracker().assessment_config(25, Some(&custom)).is_ok());
    }
}
