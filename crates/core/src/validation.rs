//! Combinable validation results.
//!
//! Entity checks collect every violation instead of stopping at the first one, so an
//! upstream producer can see everything that is wrong with a record in one pass.

use thiserror::Error;

/// Structured data-integrity error carrying every violation that was found.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("validation failed: {}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

/// Accumulator of human-readable violations for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation unconditionally.
    pub fn push(&mut self, violation: impl Into<String>) {
        self.violations.push(violation.into());
    }

    /// Record `violation` when `ok` is false.
    pub fn check(&mut self, ok: bool, violation: impl FnOnce() -> String) {
        if !ok {
            self.violations.push(violation());
        }
    }

    /// Append another report's violations to this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }

    /// Fold many reports into one.
    #[must_use]
    pub fn combine(reports: impl IntoIterator<Item = ValidationReport>) -> Self {
        let mut combined = Self::new();
        for report in reports {
            combined.merge(report);
        }
        combined
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Convert into a `Result`, failing with every collected violation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when at least one violation was recorded.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.violations,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_keeps_all_violations_in_order() {
        let mut a = ValidationReport::new();
        a.push("first");
        let mut b = ValidationReport::new();
        b.check(false, || "second".to_string());
        b.check(true, || "never".to_string());

        let combined = ValidationReport::combine([a, b, ValidationReport::new()]);
        assert_eq!(combined.violations(), ["first", "second"]);

        let err = combined.into_result().unwrap_err();
        assert_eq!(err.to_string(), "validation failed: first; second");
    }

    #[test]
    fn empty_report_is_ok() {
        assert!(ValidationReport::new().into_result().is_ok());
    }
}
