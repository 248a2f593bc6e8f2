use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use exam_core::AllocationSettings;
use exam_core::allocation::{TopicCounts, plan_distribution};
use exam_core::model::{ExamResult, Question, Topic};
use storage::repository::QuestionStore;

use crate::error::AllocatorError;

/// Draws a concrete, shuffled question list for a new exam.
///
/// Each topic's count comes from the allocation math in `exam_core::allocation`;
/// the allocator pulls twice that many candidates from the store, shuffles them and
/// keeps what it needs. Short inventory yields a short exam rather than an error.
pub struct AdaptiveAllocator {
    questions: Arc<dyn QuestionStore>,
    rng: Mutex<StdRng>,
}

impl AdaptiveAllocator {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionStore>) -> Self {
        Self {
            questions,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic allocator for tests and reproducible exams.
    #[must_use]
    pub fn with_seed(questions: Arc<dyn QuestionStore>, seed: u64) -> Self {
        Self {
            questions,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Allocate an exam for a learner with the given history.
    ///
    /// # Errors
    ///
    /// Returns `AllocatorError::Storage` if the question store fails.
    pub async fn allocate(
        &self,
        history: &[ExamResult],
        settings: &AllocationSettings,
    ) -> Result<Vec<Question>, AllocatorError> {
        let counts = plan_distribution(history, settings);
        info!(
            history = history.len(),
            total = settings.total_questions(),
            distribution = ?counts,
            "allocating exam"
        );
        self.allocate_counts(&counts).await
    }

    /// Draw exactly the requested number of questions per topic, where inventory allows.
    ///
    /// # Errors
    ///
    /// Returns `AllocatorError::Storage` if the question store fails.
    pub async fn allocate_counts(
        &self,
        counts: &TopicCounts,
    ) -> Result<Vec<Question>, AllocatorError> {
        let mut selected = Vec::with_capacity(counts.values().sum());
        for (&topic, &count) in counts {
            if count == 0 {
                continue;
            }
            let picked = self.draw(topic, count).await?;
            if picked.len() < count {
                debug!(
                    topic = topic.as_str(),
                    requested = count,
                    available = picked.len(),
                    "short allocation"
                );
            }
            selected.extend(picked);
        }

        self.shuffle(&mut selected);
        info!(questions = selected.len(), "exam allocated");
        Ok(selected)
    }

    async fn draw(&self, topic: Topic, count: usize) -> Result<Vec<Question>, AllocatorError> {
        let limit = u32::try_from(count.saturating_mul(2)).unwrap_or(u32::MAX);
        let mut pool = self.questions.find_by_topic(topic, limit).await?;
        self.shuffle(&mut pool);
        pool.truncate(count);
        Ok(pool)
    }

    fn shuffle(&self, questions: &mut [Question]) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        questions.shuffle(&mut *rng);
    }
}
