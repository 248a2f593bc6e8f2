use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

use exam_core::{AllocationSettings, SessionSettings};

use crate::error::ConfigError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:exam.sqlite3?mode=rwc";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Runtime configuration assembled from `EXAM_*` environment variables.
///
/// Unset variables fall back to the defaults of `AllocationSettings` and
/// `SessionSettings`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub database_url: String,
    pub rust_log: String,
    pub allocation: AllocationSettings,
    pub session: SessionSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            rust_log: DEFAULT_LOG_FILTER.to_owned(),
            allocation: AllocationSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load `.env` if present, then read the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but unparseable or out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but unparseable or out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AllocationSettings::default();
        let session_defaults = SessionSettings::default();

        let allocation = AllocationSettings::new(
            parse_or(&lookup, "EXAM_TOTAL_QUESTIONS", defaults.total_questions())?,
            parse_or(&lookup, "EXAM_RECENCY_WINDOW", defaults.recency_window())?,
            parse_or(&lookup, "EXAM_WEAK_THRESHOLD", defaults.weak_threshold())?,
            parse_or(&lookup, "EXAM_STRONG_THRESHOLD", defaults.strong_threshold())?,
            parse_or(&lookup, "EXAM_WEAK_SHARE", defaults.weak_share())?,
            defaults.strong_share(),
            defaults.reduce_after(),
        )?;
        let session = SessionSettings::new(
            parse_or(
                &lookup,
                "EXAM_TIME_LIMIT_SECS",
                session_defaults.time_limit().as_secs(),
            )?,
            parse_or(
                &lookup,
                "EXAM_AUTOSAVE_SECS",
                session_defaults.autosave_interval().as_secs(),
            )?,
        )?;

        Ok(Self {
            database_url: lookup("EXAM_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned()),
            allocation,
            session,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
