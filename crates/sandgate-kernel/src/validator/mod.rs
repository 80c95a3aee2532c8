//! Pre-execution validation of untrusted Python code.
//!
//! [`CodeValidator`] parses the source and walks the tree with a
//! [`SecurityVisitor`], returning a [`ValidationResult`]. Validation never
//! fails: empty input, syntax errors and policy violations all come back as
//! issues, and `is_valid()` is the single signal callers act on.
//!
//! # Issue Codes
//!
//! | Code | Severity | Description |
//! |------|----------|-------------|
//! | E001 | Error | Empty or whitespace-only source |
//! | E002 | Error | Syntax error |
//! | E003 | Error | Parse failure (null bytes, statement too complex) |
//! | E004 | Error | Import of a blocked module or submodule |
//! | E005 | Error | Import of a module not on the allow-list |
//! | E006 | Error | Call to a blocked builtin |
//! | E007 | Error | Call to `system` |
//! | E008 | Error | eval/exec/compile with an f-string |
//! | E009 | Error | eval/exec/compile with string concatenation |
//! | E010 | Error | Access to `system`/`popen`/`spawn`/`exec` |
//! | E011 | Error | Reference to a blocked builtin |
//! | W001 | Warning | Suspicious attribute access |
//! | W002 | Warning | Suspicious name reference |
//! | W003 | Warning | `while True` / `while 1` |

pub mod policy;
mod walker;

use std::collections::HashSet;

use sandgate_types::{CodeValidationError, IssueCode, ValidationIssue, ValidationResult};

use crate::config::ValidatorConfig;
use crate::parser::{self, ParseError};

pub use walker::SecurityVisitor;

/// Validates Python code against the import allow-list and deny-lists.
///
/// Holds no state between calls; one instance can serve any number of
/// threads.
#[derive(Debug, Clone, Default)]
pub struct CodeValidator {
    allowed_imports: HashSet<String>,
}

impl CodeValidator {
    /// Create a validator permitting exactly the given modules.
    pub fn new<I, S>(allowed_imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_imports: allowed_imports.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(config.allowed_imports.iter().cloned())
    }

    pub fn allowed_imports(&self) -> &HashSet<String> {
        &self.allowed_imports
    }

    /// Validate code before execution.
    #[tracing::instrument(level = "debug", skip(self, code), fields(len = code.len()))]
    pub fn validate(&self, code: &str) -> ValidationResult {
        if is_blank(code) {
            return ValidationResult::rejected(ValidationIssue::new(
                IssueCode::EmptySource,
                "Code is empty or contains only whitespace",
            ));
        }

        let suite = match parser::parse(code) {
            Ok(suite) => suite,
            Err(err) => {
                tracing::debug!(error = %err, "rejected unparseable code");
                return ValidationResult::rejected(parse_issue(&err));
            }
        };

        let issues = SecurityVisitor::new(&self.allowed_imports).visit_module(&suite);
        let result = ValidationResult::from_issues(issues);

        for warning in result.warnings() {
            tracing::trace!(code = %warning.code, "{}", warning.message);
        }
        tracing::debug!(
            is_valid = result.is_valid(),
            errors = result.errors().len(),
            warnings = result.warnings().len(),
            "validated code"
        );
        result
    }

    /// Validate code, turning a rejection into an error.
    ///
    /// On success the result may still carry warnings.
    pub fn ensure_valid(&self, code: &str) -> Result<ValidationResult, CodeValidationError> {
        let result = self.validate(code);
        if result.is_valid() {
            Ok(result)
        } else {
            Err(result.into())
        }
    }
}

/// Empty after stripping what Python's `str.strip()` strips: Unicode
/// whitespace plus the ASCII separators U+001C..U+001F.
fn is_blank(code: &str) -> bool {
    code.chars()
        .all(|c| c.is_whitespace() || ('\x1c'..='\x1f').contains(&c))
}

fn parse_issue(err: &ParseError) -> ValidationIssue {
    let issue = if err.is_syntax() {
        ValidationIssue::new(IssueCode::SyntaxError, format!("Syntax error: {}", err))
    } else {
        ValidationIssue::new(
            IssueCode::ParseFailure,
            format!("Failed to parse code: {}", err),
        )
    };
    match err.span() {
        Some(span) => issue.with_span(span),
        None => issue,
    }
}
