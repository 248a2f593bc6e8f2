use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::ids::QuestionId;
use crate::model::topic::{Difficulty, Topic};
use crate::validation::{ValidationError, ValidationReport};

/// Fewest answer options a multiple-choice question may have.
pub const MIN_OPTIONS: usize = 2;

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question input.
///
/// Topic and difficulty arrive as strings from seed files or admin tooling and are
/// checked against the closed enumerations during `validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub topic: String,
    pub subtopic: String,
    pub difficulty: String,
    pub prompt: String,
    pub code_sample: Option<String>,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
    pub references: Vec<String>,
    pub tags: Vec<String>,
}

impl QuestionDraft {
    /// Collect every violation in this draft without building a question.
    #[must_use]
    pub fn check(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        if let Err(e) = self.topic.parse::<Topic>() {
            report.push(e.to_string());
        }
        if let Err(e) = self.difficulty.parse::<Difficulty>() {
            report.push(e.to_string());
        }
        report.check(!self.subtopic.trim().is_empty(), || {
            "subtopic cannot be empty".to_string()
        });
        report.check(!self.prompt.trim().is_empty(), || {
            "question text cannot be empty".to_string()
        });
        report.check(self.options.len() >= MIN_OPTIONS, || {
            format!(
                "at least {MIN_OPTIONS} options are required, got {}",
                self.options.len()
            )
        });
        for (i, option) in self.options.iter().enumerate() {
            report.check(!option.trim().is_empty(), || {
                format!("option {i} cannot be empty")
            });
        }
        report.check(self.correct_answer < self.options.len(), || {
            format!(
                "correct answer index {} is out of range for {} options",
                self.correct_answer,
                self.options.len()
            )
        });
        report.check(!self.explanation.trim().is_empty(), || {
            "explanation cannot be empty".to_string()
        });
        for link in &self.references {
            let ok = Url::parse(link)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            report.check(ok, || format!("reference is not an http(s) URL: {link}"));
        }

        report
    }

    /// Validate the draft into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` listing every violation found.
    pub fn validate(self, id: QuestionId) -> Result<Question, ValidationError> {
        self.check().into_result()?;

        // Both parses succeeded inside `check`.
        let topic = self
            .topic
            .parse::<Topic>()
            .map_err(|e| ValidationError {
                violations: vec![e.to_string()],
            })?;
        let difficulty = self
            .difficulty
            .parse::<Difficulty>()
            .map_err(|e| ValidationError {
                violations: vec![e.to_string()],
            })?;

        Ok(Question {
            id,
            topic,
            subtopic: self.subtopic.trim().to_owned(),
            difficulty,
            prompt: self.prompt,
            code_sample: self.code_sample.filter(|c| !c.trim().is_empty()),
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
            references: self.references,
            tags: self.tags,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A validated multiple-choice question from the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    topic: Topic,
    subtopic: String,
    difficulty: Difficulty,
    prompt: String,
    code_sample: Option<String>,
    options: Vec<String>,
    correct_answer: usize,
    explanation: String,
    references: Vec<String>,
    tags: Vec<String>,
}

impl Question {
    /// Replace this question's content through the same validation as creation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the draft is invalid; the original is unchanged.
    pub fn updated(&self, draft: QuestionDraft) -> Result<Question, ValidationError> {
        draft.validate(self.id)
    }

    /// Draft pre-filled with this question's content.
    #[must_use]
    pub fn to_draft(&self) -> QuestionDraft {
        QuestionDraft {
            topic: self.topic.as_str().to_owned(),
            subtopic: self.subtopic.clone(),
            difficulty: self.difficulty.as_str().to_owned(),
            prompt: self.prompt.clone(),
            code_sample: self.code_sample.clone(),
            options: self.options.clone(),
            correct_answer: self.correct_answer,
            explanation: self.explanation.clone(),
            references: self.references.clone(),
            tags: self.tags.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    #[must_use]
    pub fn subtopic(&self) -> &str {
        &self.subtopic
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn code_sample(&self) -> Option<&str> {
        self.code_sample.as_deref()
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> usize {
        self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn references(&self) -> &[String] {
        &self.references
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.correct_answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> QuestionDraft {
        QuestionDraft {
            topic: "incremental_data_processing".into(),
            subtopic: "Auto Loader".into(),
            difficulty: "medium".into(),
            prompt: "Which option enables schema inference for Auto Loader?".into(),
            code_sample: None,
            options: vec!["cloudFiles.schemaLocation".into(), "mergeSchema".into()],
            correct_answer: 0,
            explanation: "A schema location is required for inference.".into(),
            references: vec!["https://docs.databricks.com/ingestion/auto-loader".into()],
            tags: vec!["streaming".into()],
        }
    }

    #[test]
    fn valid_draft_builds_question() {
        let q = draft().validate(QuestionId::new(7)).unwrap();
        assert_eq!(q.topic(), Topic::IncrementalDataProcessing);
        assert_eq!(q.difficulty(), Difficulty::Medium);
        assert!(q.is_correct(0));
        assert!(!q.is_correct(1));
        assert!(q.has_tag("Streaming"));
    }

    #[test]
    fn invalid_draft_reports_every_violation() {
        let mut d = draft();
        d.topic = "Machine Learning".into();
        d.difficulty = "extreme".into();
        d.correct_answer = 5;
        d.references = vec!["ftp://example.com/file".into()];

        let err = d.validate(QuestionId::new(1)).unwrap_err();
        assert_eq!(err.violations.len(), 4);
    }

    #[test]
    fn update_keeps_identity() {
        let q = draft().validate(QuestionId::new(3)).unwrap();
        let mut d = q.to_draft();
        d.prompt = "Reworded prompt".into();
        let updated = q.updated(d).unwrap();
        assert_eq!(updated.id(), QuestionId::new(3));
        assert_eq!(updated.prompt(), "Reworded prompt");
    }
}
