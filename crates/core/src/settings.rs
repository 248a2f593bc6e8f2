use std::time::Duration;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("total questions must be > 0")]
    InvalidTotalQuestions,

    #[error("recency window must be > 0")]
    InvalidRecencyWindow,

    #[error("thresholds must be within 0..=100 and weak ({weak}) <= strong ({strong})")]
    InvalidThresholds { weak: f64, strong: f64 },

    #[error("weak share must be in (0, 1], got {0}")]
    InvalidWeakShare(f64),

    #[error("strong share must be in [0, 1], got {0}")]
    InvalidStrongShare(f64),

    #[error("reduce-after count must be > 0")]
    InvalidReduceAfter,

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,

    #[error("autosave interval must be > 0 seconds")]
    InvalidAutosaveInterval,
}

//
// ─── ALLOCATION ────────────────────────────────────────────────────────────────
//

/// Tuning for adaptive question allocation.
///
/// Defaults:
/// - 60 questions per exam
/// - averages over the last 3 results
/// - weak below 70%, strong above 80%
/// - 60% of the exam reserved for weak topics
/// - strong topics keep 75% of an even share when nothing is weak
/// - de-prioritise a topic after 3 consecutive strong scores
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationSettings {
    total_questions: usize,
    recency_window: usize,
    weak_threshold: f64,
    strong_threshold: f64,
    weak_share: f64,
    strong_share: f64,
    reduce_after: usize,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            total_questions: 60,
            recency_window: 3,
            weak_threshold: 70.0,
            strong_threshold: 80.0,
            weak_share: 0.6,
            strong_share: 0.75,
            reduce_after: 3,
        }
    }
}

impl AllocationSettings {
    /// Creates custom allocation settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is out of range.
    pub fn new(
        total_questions: usize,
        recency_window: usize,
        weak_threshold: f64,
        strong_threshold: f64,
        weak_share: f64,
        strong_share: f64,
        reduce_after: usize,
    ) -> Result<Self, SettingsError> {
        if total_questions == 0 {
            return Err(SettingsError::InvalidTotalQuestions);
        }
        if recency_window == 0 {
            return Err(SettingsError::InvalidRecencyWindow);
        }
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(weak_threshold)
            || !in_range(strong_threshold)
            || weak_threshold > strong_threshold
        {
            return Err(SettingsError::InvalidThresholds {
                weak: weak_threshold,
                strong: strong_threshold,
            });
        }
        if !weak_share.is_finite() || weak_share <= 0.0 || weak_share > 1.0 {
            return Err(SettingsError::InvalidWeakShare(weak_share));
        }
        if !strong_share.is_finite() || !(0.0..=1.0).contains(&strong_share) {
            return Err(SettingsError::InvalidStrongShare(strong_share));
        }
        if reduce_after == 0 {
            return Err(SettingsError::InvalidReduceAfter);
        }
        Ok(Self {
            total_questions,
            recency_window,
            weak_threshold,
            strong_threshold,
            weak_share,
            strong_share,
            reduce_after,
        })
    }

    /// Same settings with a different exam size.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidTotalQuestions` for zero.
    pub fn with_total_questions(mut self, total: usize) -> Result<Self, SettingsError> {
        if total == 0 {
            return Err(SettingsError::InvalidTotalQuestions);
        }
        self.total_questions = total;
        Ok(self)
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    #[must_use]
    pub fn recency_window(&self) -> usize {
        self.recency_window
    }

    #[must_use]
    pub fn weak_threshold(&self) -> f64 {
        self.weak_threshold
    }

    #[must_use]
    pub fn strong_threshold(&self) -> f64 {
        self.strong_threshold
    }

    #[must_use]
    pub fn weak_share(&self) -> f64 {
        self.weak_share
    }

    #[must_use]
    pub fn strong_share(&self) -> f64 {
        self.strong_share
    }

    #[must_use]
    pub fn reduce_after(&self) -> usize {
        self.reduce_after
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Timer configuration for exam sessions (90 minute limit, 30 second autosave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    time_limit: Duration,
    autosave_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(5400),
            autosave_interval: Duration::from_secs(30),
        }
    }
}

impl SessionSettings {
    /// # Errors
    ///
    /// Returns `SettingsError` if either duration is zero.
    pub fn new(time_limit_secs: u64, autosave_interval_secs: u64) -> Result<Self, SettingsError> {
        if time_limit_secs == 0 {
            return Err(SettingsError::InvalidTimeLimit);
        }
        if autosave_interval_secs == 0 {
            return Err(SettingsError::InvalidAutosaveInterval);
        }
        Ok(Self {
            time_limit: Duration::from_secs(time_limit_secs),
            autosave_interval: Duration::from_secs(autosave_interval_secs),
        })
    }

    #[must_use]
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        self.autosave_interval
    }
}
