use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation::TopicCounts;
use crate::model::Topic;

/// Default share of a comprehensive assessment per topic, in percent, in `Topic::ALL` order.
pub const DEFAULT_ASSESSMENT_WEIGHTS: [(Topic, usize); 5] = [
    (Topic::LakehousePlatform, 20),
    (Topic::EltWithSparkSql, 25),
    (Topic::IncrementalDataProcessing, 20),
    (Topic::ProductionPipelines, 20),
    (Topic::DataGovernance, 15),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentConfigError {
    #[error("assessment must contain at least one question")]
    ZeroQuestions,

    #[error("topic distribution sums to {actual}, expected {expected}")]
    DistributionMismatch { expected: usize, actual: usize },
}

/// How a comprehensive assessment should be drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentConfig {
    pub total_questions: usize,
    pub distribution: TopicCounts,
    pub include_all_difficulties: bool,
    pub balance_subtopics: bool,
}

/// Build the per-topic counts for a full assessment.
///
/// A custom distribution is taken as given once it sums to `total_questions`.
/// Otherwise the default weights are applied and rounding leftovers are handed out
/// one question at a time in topic order.
///
/// # Errors
///
/// Returns `AssessmentConfigError` for a zero total or a custom distribution whose
/// counts do not add up to the total.
pub fn comprehensive_assessment_config(
    total_questions: usize,
    custom: Option<&TopicCounts>,
) -> Result<AssessmentConfig, AssessmentConfigError> {
    if total_questions == 0 {
        return Err(AssessmentConfigError::ZeroQuestions);
    }

    let distribution = match custom {
        Some(custom) => {
            let actual: usize = custom.values().sum();
            if actual != total_questions {
                return Err(AssessmentConfigError::DistributionMismatch {
                    expected: total_questions,
                    actual,
                });
            }
            custom.clone()
        }
        None => weighted_split(total_questions),
    };

    Ok(AssessmentConfig {
        total_questions,
        distribution,
        include_all_difficulties: true,
        balance_subtopics: true,
    })
}

fn weighted_split(total: usize) -> TopicCounts {
    let mut counts: TopicCounts = DEFAULT_ASSESSMENT_WEIGHTS
        .iter()
        .map(|&(topic, weight)| (topic, total * weight / 100))
        .collect();
    let assigned: usize = counts.values().sum();
    for &(topic, _) in DEFAULT_ASSESSMENT_WEIGHTS
        .iter()
        .cycle()
        .take(total - assigned)
    {
        *counts.entry(topic).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_split_for_sixty_sums_exactly() {
        let config = comprehensive_assessment_config(60, None).unwrap();
        assert_eq!(config.distribution.values().sum::<usize>(), 60);
        assert_eq!(config.distribution[&Topic::EltWithSparkSql], 15);
        assert_eq!(config.distribution[&Topic::DataGovernance], 9);
        assert!(config.include_all_difficulties);
        assert!(config.balance_subtopics);
    }

    #[test]
    fn remainders_are_redistributed() {
        for total in [1, 7, 13, 45, 61, 99] {
            let config = comprehensive_assessment_config(total, None).unwrap();
            assert_eq!(config.distribution.values().sum::<usize>(), total);
        }
        // 7 * weights floor to 1,1,1,1,1; two leftovers go to the first two topics.
        let config = comprehensive_assessment_config(7, None).unwrap();
        assert_eq!(config.distribution[&Topic::LakehousePlatform], 2);
        assert_eq!(config.distribution[&Topic::EltWithSparkSql], 2);
        assert_eq!(config.distribution[&Topic::DataGovernance], 1);
    }

    #[test]
    fn custom_distribution_must_match_total() {
        let custom: TopicCounts = Topic::ALL.iter().map(|&t| (t, 10)).collect();
        assert_eq!(
            comprehensive_assessment_config(60, Some(&custom)).unwrap_err(),
            AssessmentConfigError::DistributionMismatch {
                expected: 60,
                actual: 50
            }
        );
        let config = comprehensive_assessment_config(50, Some(&custom)).unwrap();
        assert_eq!(config.distribution, custom);
    }

    #[test]
    fn zero_total_is_rejected() {
        assert_eq!(
            comprehensive_assessment_config(0, None).unwrap_err(),
            AssessmentConfigError::ZeroQuestions
        );
    }
}
