use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Raised when a string does not name a member of one of the closed enumerations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnumParseError {
    #[error("unknown topic: {0}")]
    Topic(String),

    #[error("unknown difficulty: {0}")]
    Difficulty(String),

    #[error("unknown exam kind: {0}")]
    ExamKind(String),
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// The fixed set of exam subject areas.
///
/// Declaration order is significant: it is the order used for even allocation
/// remainders and for the default assessment weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    LakehousePlatform,
    EltWithSparkSql,
    IncrementalDataProcessing,
    ProductionPipelines,
    DataGovernance,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::LakehousePlatform,
        Topic::EltWithSparkSql,
        Topic::IncrementalDataProcessing,
        Topic::ProductionPipelines,
        Topic::DataGovernance,
    ];

    /// Stable storage key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::LakehousePlatform => "lakehouse_platform",
            Topic::EltWithSparkSql => "elt_with_spark_sql",
            Topic::IncrementalDataProcessing => "incremental_data_processing",
            Topic::ProductionPipelines => "production_pipelines",
            Topic::DataGovernance => "data_governance",
        }
    }

    /// Learner-facing name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Topic::LakehousePlatform => "Databricks Lakehouse Platform",
            Topic::EltWithSparkSql => "ELT with Spark SQL and Python",
            Topic::IncrementalDataProcessing => "Incremental Data Processing",
            Topic::ProductionPipelines => "Production Pipelines",
            Topic::DataGovernance => "Data Governance",
        }
    }

    /// Concepts to concentrate on when the topic needs work.
    #[must_use]
    pub fn focus_areas(self) -> &'static [&'static str] {
        match self {
            Topic::LakehousePlatform => &[
                "Lakehouse architecture and the data/control plane split",
                "Cluster types, pools and runtime versions",
                "Delta Lake fundamentals: ACID transactions and time travel",
                "Repos and notebook workflows",
            ],
            Topic::EltWithSparkSql => &[
                "Creating tables and views from files",
                "Higher-order functions and array/struct manipulation",
                "Joins, window functions and set operations",
                "SQL UDFs and Python string templating",
            ],
            Topic::IncrementalDataProcessing => &[
                "Structured Streaming triggers and checkpoints",
                "Auto Loader and COPY INTO",
                "Multi-hop (bronze/silver/gold) architecture",
                "Delta Live Tables expectations and change data capture",
            ],
            Topic::ProductionPipelines => &[
                "Jobs, tasks and task dependencies",
                "Scheduling, retries and alerting",
                "Delta Live Tables pipeline modes",
                "Dashboards and SQL endpoints",
            ],
            Topic::DataGovernance => &[
                "Unity Catalog object hierarchy",
                "Granting and revoking privileges",
                "Metastores, catalogs and external locations",
                "Data lineage and auditing",
            ],
        }
    }

    /// One-line remediation hint used in post-exam insights.
    #[must_use]
    pub fn remediation_hint(self) -> &'static str {
        match self {
            Topic::LakehousePlatform => {
                "Review the lakehouse architecture and how Delta Lake provides reliability on cloud storage."
            }
            Topic::EltWithSparkSql => {
                "Practise writing Spark SQL transformations and Python DataFrame equivalents side by side."
            }
            Topic::IncrementalDataProcessing => {
                "Work through Structured Streaming and Auto Loader exercises, paying attention to checkpoints and triggers."
            }
            Topic::ProductionPipelines => {
                "Build a multi-task job end to end and study how retries, schedules and alerts are configured."
            }
            Topic::DataGovernance => {
                "Map out the Unity Catalog hierarchy and rehearse the GRANT/REVOKE syntax for each securable."
            }
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Topic {
    type Err = EnumParseError;

    /// Accepts either the storage key or the display name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == trimmed || t.display_name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| EnumParseError::Topic(s.to_owned()))
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(EnumParseError::Difficulty(s.to_owned())),
        }
    }
}

//
// ─── EXAM KIND ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamKind {
    Practice,
    Assessment,
}

impl ExamKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExamKind::Practice => "practice",
            ExamKind::Assessment => "assessment",
        }
    }
}

impl fmt::Display for ExamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamKind {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "practice" => Ok(Self::Practice),
            "assessment" => Ok(Self::Assessment),
            _ => Err(EnumParseError::ExamKind(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_parses_from_key_and_display_name() {
        assert_eq!(
            "incremental_data_processing".parse::<Topic>().unwrap(),
            Topic::IncrementalDataProcessing
        );
        assert_eq!(
            "Incremental Data Processing".parse::<Topic>().unwrap(),
            Topic::IncrementalDataProcessing
        );
        assert!(matches!(
            "Machine Learning".parse::<Topic>(),
            Err(EnumParseError::Topic(_))
        ));
    }

    #[test]
    fn every_topic_has_focus_areas() {
        for topic in Topic::ALL {
            assert!(!topic.focus_areas().is_empty());
            assert!(!topic.remediation_hint().is_empty());
        }
    }

    #[test]
    fn difficulty_rejects_unknown_values() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }
}
