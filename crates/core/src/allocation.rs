//! Topic weighting for adaptive exams.
//!
//! The math here decides how many questions each topic gets; drawing the actual
//! questions from a store happens in the services layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{ExamResult, Topic};
use crate::settings::AllocationSettings;
use crate::trend::{TopicProgress, TrendDirection};

pub type TopicCounts = BTreeMap<Topic, usize>;

//
// ─── ANALYSIS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStanding {
    Weak,
    Neutral,
    Strong,
}

/// Recent per-topic averages and the resulting weak/strong split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceAnalysis {
    pub averages: BTreeMap<Topic, f64>,
    pub weak: Vec<Topic>,
    pub strong: Vec<Topic>,
}

impl PerformanceAnalysis {
    #[must_use]
    pub fn standing(&self, topic: Topic) -> TopicStanding {
        if self.weak.contains(&topic) {
            TopicStanding::Weak
        } else if self.strong.contains(&topic) {
            TopicStanding::Strong
        } else {
            TopicStanding::Neutral
        }
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.averages.is_empty()
    }
}

/// Average each topic over the most recent `recency_window` results.
///
/// Topics missing from every recent result get no average and stay neutral.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze_recent(
    results: &[ExamResult],
    settings: &AllocationSettings,
) -> PerformanceAnalysis {
    let mut ordered: Vec<&ExamResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.started_at);
    let skip = ordered.len().saturating_sub(settings.recency_window());
    let recent = &ordered[skip..];

    let mut analysis = PerformanceAnalysis::default();
    for topic in Topic::ALL {
        let scores: Vec<f64> = recent
            .iter()
            .filter_map(|r| r.topic_score(topic).map(|s| s.percentage))
            .collect();
        if scores.is_empty() {
            continue;
        }
        let average = scores.iter().sum::<f64>() / scores.len() as f64;
        analysis.averages.insert(topic, average);
        if average < settings.weak_threshold() {
            analysis.weak.push(topic);
        } else if average > settings.strong_threshold() {
            analysis.strong.push(topic);
        }
    }
    analysis
}

//
// ─── DISTRIBUTIONS ─────────────────────────────────────────────────────────────
//

/// Split `total` over every topic, giving the remainder to the first topics.
#[must_use]
pub fn even_distribution(total: usize) -> TopicCounts {
    split_evenly(total, &Topic::ALL)
}

fn split_evenly(budget: usize, topics: &[Topic]) -> TopicCounts {
    let mut counts = TopicCounts::new();
    if topics.is_empty() {
        return counts;
    }
    let base = budget / topics.len();
    let remainder = budget % topics.len();
    for (i, &topic) in topics.iter().enumerate() {
        counts.insert(topic, base + usize::from(i < remainder));
    }
    counts
}

/// Weight the exam towards weak topics.
///
/// With weak topics present, `ceil(total * weak_share)` questions are split among them
/// and the rest among the others. Without weak topics, strong topics keep
/// `floor(even * strong_share)` and hand the difference round-robin to the rest.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn weighted_distribution(
    analysis: &PerformanceAnalysis,
    settings: &AllocationSettings,
) -> TopicCounts {
    let total = settings.total_questions();
    if analysis.weak.is_empty() {
        return strong_adjusted_distribution(&analysis.strong, total, settings.strong_share());
    }

    let others: Vec<Topic> = Topic::ALL
        .into_iter()
        .filter(|t| !analysis.weak.contains(t))
        .collect();
    let weak_budget = if others.is_empty() {
        total
    } else {
        ((total as f64 * settings.weak_share()).ceil() as usize).min(total)
    };

    let mut counts = split_evenly(weak_budget, &analysis.weak);
    counts.extend(split_evenly(total - weak_budget, &others));
    counts
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn strong_adjusted_distribution(strong: &[Topic], total: usize, strong_share: f64) -> TopicCounts {
    let mut counts = even_distribution(total);
    let receivers: Vec<Topic> = Topic::ALL
        .into_iter()
        .filter(|t| !strong.contains(t))
        .collect();
    if strong.is_empty() || receivers.is_empty() {
        return counts;
    }

    let mut freed = 0;
    for topic in strong {
        if let Some(count) = counts.get_mut(topic) {
            let kept = (*count as f64 * strong_share).floor() as usize;
            freed += *count - kept;
            *count = kept;
        }
    }
    for topic in receivers.iter().cycle().take(freed) {
        *counts.entry(*topic).or_default() += 1;
    }
    counts
}

/// Even split for a first exam, weighted split once history exists.
#[must_use]
pub fn plan_distribution(results: &[ExamResult], settings: &AllocationSettings) -> TopicCounts {
    if results.is_empty() {
        return even_distribution(settings.total_questions());
    }
    weighted_distribution(&analyze_recent(results, settings), settings)
}

/// True when the last `reduce_after` scores for `topic` are all above the strong threshold.
#[must_use]
pub fn should_reduce_allocation(
    topic: Topic,
    results: &[ExamResult],
    settings: &AllocationSettings,
) -> bool {
    let mut ordered: Vec<&ExamResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.started_at);
    let scores: Vec<f64> = ordered
        .iter()
        .filter_map(|r| r.topic_score(topic).map(|s| s.percentage))
        .collect();

    let needed = settings.reduce_after();
    scores.len() >= needed
        && scores[scores.len() - needed..]
            .iter()
            .all(|&s| s > settings.strong_threshold())
}

/// Topics whose share should shrink in future exams, in fixed topic order.
#[must_use]
pub fn topics_to_reduce(results: &[ExamResult], settings: &AllocationSettings) -> Vec<Topic> {
    Topic::ALL
        .into_iter()
        .filter(|&topic| should_reduce_allocation(topic, results, settings))
        .collect()
}

//
// ─── RECOMMENDATIONS ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    High,
    Medium,
    Low,
}

/// Learner-facing study guidance for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecommendation {
    pub topic: Topic,
    pub priority: RecommendationPriority,
    pub standing: TopicStanding,
    pub recent_average: Option<f64>,
    pub trend: Option<TrendDirection>,
    pub recommended_questions: usize,
    /// Set once the topic has stayed above the strong threshold long enough to shrink.
    pub reduce_allocation: bool,
    pub focus_areas: Vec<String>,
    pub message: String,
}

/// One recommendation per topic, high priority first.
///
/// Guidance only; it does not feed back into the allocation counts.
#[must_use]
pub fn generate_recommendations(
    analysis: &PerformanceAnalysis,
    trends: &[TopicProgress],
    counts: &TopicCounts,
    reduced: &[Topic],
) -> Vec<TopicRecommendation> {
    let mut out: Vec<TopicRecommendation> = Topic::ALL
        .into_iter()
        .map(|topic| {
            let standing = analysis.standing(topic);
            let trend = trends.iter().find(|p| p.topic == topic).map(|p| p.trend);
            let reduce_allocation = reduced.contains(&topic);
            let (priority, message) = match standing {
                TopicStanding::Weak => (
                    RecommendationPriority::High,
                    format!(
                        "Focus on {}: {}",
                        topic.display_name(),
                        topic.remediation_hint()
                    ),
                ),
                TopicStanding::Neutral if trend == Some(TrendDirection::Declining) => (
                    RecommendationPriority::Medium,
                    format!(
                        "{} scores are slipping; revisit it before it becomes a weak area.",
                        topic.display_name()
                    ),
                ),
                TopicStanding::Neutral => (
                    RecommendationPriority::Medium,
                    format!(
                        "Keep practising {} to push it above the strong threshold.",
                        topic.display_name()
                    ),
                ),
                TopicStanding::Strong if reduce_allocation => (
                    RecommendationPriority::Low,
                    format!(
                        "{} has stayed strong for several exams; spend fewer questions on it.",
                        topic.display_name()
                    ),
                ),
                TopicStanding::Strong => (
                    RecommendationPriority::Low,
                    format!(
                        "{} is a strength; occasional review is enough.",
                        topic.display_name()
                    ),
                ),
            };
            TopicRecommendation {
                topic,
                priority,
                standing,
                recent_average: analysis.averages.get(&topic).copied(),
                trend,
                recommended_questions: counts.get(&topic).copied().unwrap_or(0),
                reduce_allocation,
                focus_areas: topic.focus_areas().iter().map(|s| (*s).to_owned()).collect(),
                message,
            }
        })
        .collect();
    out.sort_by_key(|r| r.priority);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{result_with_scores, uniform_result};
    use crate::model::UserId;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn total(counts: &TopicCounts) -> usize {
        counts.values().sum()
    }

    #[test]
    fn even_distribution_is_within_one_of_average() {
        for n in [1, 5, 7, 60, 61, 64] {
            let counts = even_distribution(n);
            assert_eq!(total(&counts), n);
            let base = n / 5;
            assert!(counts.values().all(|&c| c == base || c == base + 1));
        }
        let counts = even_distribution(62);
        assert_eq!(counts[&Topic::LakehousePlatform], 13);
        assert_eq!(counts[&Topic::EltWithSparkSql], 13);
        assert_eq!(counts[&Topic::DataGovernance], 12);
    }

    #[test]
    fn empty_history_plans_even_split() {
        let settings = AllocationSettings::default();
        assert_eq!(plan_distribution(&[], &settings), even_distribution(60));
    }

    #[test]
    fn single_weak_topic_gets_weak_budget() {
        let settings = AllocationSettings::default();
        let mut scores: Vec<(Topic, u32)> = Topic::ALL.iter().map(|&t| (t, 85)).collect();
        scores[2].1 = 50;
        let results = vec![result_with_scores(UserId::new(1), fixed_now(), &scores, 40)];

        let counts = plan_distribution(&results, &settings);
        assert_eq!(total(&counts), 60);
        assert_eq!(counts[&Topic::IncrementalDataProcessing], 36);
        assert_eq!(counts[&Topic::LakehousePlatform], 6);
        assert_eq!(counts[&Topic::DataGovernance], 6);
    }

    #[test]
    fn all_weak_topics_share_whole_exam() {
        let settings = AllocationSettings::default();
        let results = vec![uniform_result(UserId::new(1), fixed_now(), 40)];
        let counts = plan_distribution(&results, &settings);
        assert_eq!(counts, even_distribution(60));
    }

    #[test]
    fn strong_topics_shrink_without_weak_topics() {
        let settings = AllocationSettings::default();
        let scores = [
            (Topic::LakehousePlatform, 90),
            (Topic::EltWithSparkSql, 90),
            (Topic::IncrementalDataProcessing, 75),
            (Topic::ProductionPipelines, 75),
            (Topic::DataGovernance, 75),
        ];
        let results = vec![result_with_scores(UserId::new(1), fixed_now(), &scores, 40)];

        let counts = plan_distribution(&results, &settings);
        assert_eq!(total(&counts), 60);
        // floor(12 * 0.75) = 9 each; 6 freed go round-robin to the three others.
        assert_eq!(counts[&Topic::LakehousePlatform], 9);
        assert_eq!(counts[&Topic::EltWithSparkSql], 9);
        assert_eq!(counts[&Topic::IncrementalDataProcessing], 14);
        assert_eq!(counts[&Topic::ProductionPipelines], 14);
        assert_eq!(counts[&Topic::DataGovernance], 14);
    }

    #[test]
    fn recency_window_ignores_old_results() {
        let settings = AllocationSettings::default();
        let user = UserId::new(1);
        let t0 = fixed_now();
        let results = vec![
            uniform_result(user, t0, 10),
            uniform_result(user, t0 + Duration::days(1), 75),
            uniform_result(user, t0 + Duration::days(2), 75),
            uniform_result(user, t0 + Duration::days(3), 75),
        ];
        let analysis = analyze_recent(&results, &settings);
        assert!(analysis.weak.is_empty());
        assert_eq!(analysis.averages[&Topic::DataGovernance], 75.0);
    }

    #[test]
    fn reduce_allocation_after_consecutive_strong_scores() {
        let settings = AllocationSettings::default();
        let user = UserId::new(1);
        let t0 = fixed_now();
        let mut results = vec![
            uniform_result(user, t0, 85),
            uniform_result(user, t0 + Duration::days(1), 90),
        ];
        assert!(!should_reduce_allocation(Topic::DataGovernance, &results, &settings));

        results.push(uniform_result(user, t0 + Duration::days(2), 95));
        assert!(should_reduce_allocation(Topic::DataGovernance, &results, &settings));

        results.push(uniform_result(user, t0 + Duration::days(3), 80));
        assert!(!should_reduce_allocation(Topic::DataGovernance, &results, &settings));
    }

    #[test]
    fn recommendations_rank_weak_topics_first() {
        let settings = AllocationSettings::default();
        let scores = [
            (Topic::LakehousePlatform, 90),
            (Topic::EltWithSparkSql, 75),
            (Topic::IncrementalDataProcessing, 55),
            (Topic::ProductionPipelines, 75),
            (Topic::DataGovernance, 75),
        ];
        let results = vec![result_with_scores(UserId::new(1), fixed_now(), &scores, 40)];
        let analysis = analyze_recent(&results, &settings);
        let counts = weighted_distribution(&analysis, &settings);

        let recs = generate_recommendations(&analysis, &[], &counts, &[]);
        assert_eq!(recs.len(), 5);
        assert_eq!(recs[0].topic, Topic::IncrementalDataProcessing);
        assert_eq!(recs[0].priority, RecommendationPriority::High);
        assert_eq!(recs[0].recommended_questions, 36);
        assert!(!recs[0].focus_areas.is_empty());
        assert_eq!(recs[4].topic, Topic::LakehousePlatform);
        assert_eq!(recs[4].priority, RecommendationPriority::Low);
        assert!(recs.iter().all(|r| !r.reduce_allocation));
    }

    #[test]
    fn consistently_strong_topics_are_flagged_for_reduction() {
        let settings = AllocationSettings::default();
        let user = UserId::new(1);
        let t0 = fixed_now();
        let results: Vec<ExamResult> = (0..3)
            .map(|day| {
                result_with_scores(
                    user,
                    t0 + Duration::days(day),
                    &[
                        (Topic::LakehousePlatform, 90),
                        (Topic::EltWithSparkSql, 75),
                        (Topic::IncrementalDataProcessing, 60),
                        (Topic::ProductionPipelines, 75),
                        (Topic::DataGovernance, 75),
                    ],
                    40,
                )
            })
            .collect();

        let reduced = topics_to_reduce(&results, &settings);
        assert_eq!(reduced, vec![Topic::LakehousePlatform]);

        let analysis = analyze_recent(&results, &settings);
        let counts = weighted_distribution(&analysis, &settings);
        let recs = generate_recommendations(&analysis, &[], &counts, &reduced);
        let lakehouse = recs
            .iter()
            .find(|r| r.topic == Topic::LakehousePlatform)
            .unwrap();
        assert!(lakehouse.reduce_allocation);
        assert!(lakehouse.message.contains("fewer questions"));
        assert!(
            recs.iter()
                .filter(|r| r.topic != Topic::LakehousePlatform)
                .all(|r| !r.reduce_allocation)
        );
    }
}
