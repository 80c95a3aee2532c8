//! The verdict returned for every submitted source.
//!
//! `is_valid` is derived from the issues at construction time, so a result can
//! never claim validity while carrying errors.

use serde::Serialize;

use crate::issue::{Severity, ValidationIssue};

/// Outcome of validating one piece of source code.
///
/// Serializes as `{ "is_valid": bool, "errors": [...], "warnings": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Build a result from issues in report order.
    ///
    /// Issues are partitioned by severity; relative order within each group
    /// is preserved.
    pub fn from_issues(issues: impl IntoIterator<Item = ValidationIssue>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.severity == Severity::Error);
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// A single-error result, for failures before the tree walk.
    pub fn rejected(issue: ValidationIssue) -> Self {
        Self::from_issues([issue])
    }

    /// True when there are no errors. Warnings never affect validity.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    /// Error messages in report order.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    /// Warning messages in report order.
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.message.clone()).collect()
    }

    /// Consume the result, returning `(errors, warnings)`.
    pub fn into_parts(self) -> (Vec<ValidationIssue>, Vec<ValidationIssue>) {
        (self.errors, self.warnings)
    }
}

/// Raised by `CodeValidator::ensure_valid` when code must not run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("code validation failed: {}", .errors.join("; "))]
pub struct CodeValidationError {
    /// Messages of every error found.
    pub errors: Vec<String>,
    /// Messages of every warning found.
    pub warnings: Vec<String>,
}

impl From<ValidationResult> for CodeValidationError {
    fn from(result: ValidationResult) -> Self {
        Self {
            errors: result.error_messages(),
            warnings: result.warning_messages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueCode;

    fn blocked(name: &str) -> ValidationIssue {
        ValidationIssue::new(
            IssueCode::BlockedImport,
            format!("Import of blocked module '{name}' not allowed"),
        )
    }

    fn suspicious(name: &str) -> ValidationIssue {
        ValidationIssue::new(
            IssueCode::SuspiciousName,
            format!("Suspicious name reference: '{name}'"),
        )
    }

    #[test]
    fn empty_issue_list_is_valid() {
        let result = ValidationResult::from_issues(Vec::new());
        assert!(result.is_valid());
        assert!(result.errors().is_empty());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn warnings_do_not_invalidate() {
        let result = ValidationResult::from_issues([suspicious("__dict__")]);
        assert!(result.is_valid());
        assert_eq!(
            result.warning_messages(),
            vec!["Suspicious name reference: '__dict__'"]
        );
    }

    #[test]
    fn partition_preserves_order() {
        let result = ValidationResult::from_issues([
            blocked("os"),
            suspicious("__class__"),
            blocked("sys"),
            suspicious("__dict__"),
        ]);
        assert!(!result.is_valid());
        assert_eq!(
            result.error_messages(),
            vec![
                "Import of blocked module 'os' not allowed",
                "Import of blocked module 'sys' not allowed",
            ]
        );
        assert_eq!(
            result.warning_messages(),
            vec![
                "Suspicious name reference: '__class__'",
                "Suspicious name reference: '__dict__'",
            ]
        );
    }

    #[test]
    fn serializes_with_is_valid_field() {
        let result = ValidationResult::rejected(blocked("os"));
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["is_valid"], false);
        assert_eq!(json["errors"][0]["code"], "E004");
        assert_eq!(json["warnings"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn validation_error_joins_messages() {
        let result = ValidationResult::from_issues([blocked("os"), blocked("sys")]);
        let err = CodeValidationError::from(result);
        assert_eq!(
            err.to_string(),
            "code validation failed: Import of blocked module 'os' not allowed; \
             Import of blocked module 'sys' not allowed"
        );
    }
}
