//! Validation issues and formatting.

use std::fmt;

use serde::{Serialize, Serializer};

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Errors prevent execution.
    Error,
    /// Warnings are advisory but allow execution.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Categorizes validation issues for filtering and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCode {
    /// Source is empty or whitespace only.
    EmptySource,
    /// Source does not parse as Python.
    SyntaxError,
    /// Parsing failed for a reason other than syntax (null bytes, nesting).
    ParseFailure,
    /// Import of a module (or submodule) on the deny-list.
    BlockedImport,
    /// Import of a module that is not on the allow-list.
    UnapprovedImport,
    /// Call to a denylisted builtin.
    BlockedBuiltinCall,
    /// Call to anything named `system`.
    SystemCall,
    /// eval/exec/compile fed an f-string.
    DynamicCodeFString,
    /// eval/exec/compile fed a `+` expression.
    DynamicCodeConcat,
    /// Access to a process-spawning attribute.
    BlockedAttribute,
    /// Reference to a denylisted builtin without calling it.
    BlockedName,
    /// Reflection/dunder attribute access.
    SuspiciousAttribute,
    /// Reflection/dunder name reference.
    SuspiciousName,
    /// `while True` / `while 1`.
    InfiniteLoop,
}

impl IssueCode {
    /// Returns a short code string for the issue.
    pub fn code(&self) -> &'static str {
        match self {
            IssueCode::EmptySource => "E001",
            IssueCode::SyntaxError => "E002",
            IssueCode::ParseFailure => "E003",
            IssueCode::BlockedImport => "E004",
            IssueCode::UnapprovedImport => "E005",
            IssueCode::BlockedBuiltinCall => "E006",
            IssueCode::SystemCall => "E007",
            IssueCode::DynamicCodeFString => "E008",
            IssueCode::DynamicCodeConcat => "E009",
            IssueCode::BlockedAttribute => "E010",
            IssueCode::BlockedName => "E011",
            IssueCode::SuspiciousAttribute => "W001",
            IssueCode::SuspiciousName => "W002",
            IssueCode::InfiniteLoop => "W003",
        }
    }

    /// Default severity for this issue code.
    pub fn default_severity(&self) -> Severity {
        match self {
            // Reflection and unbounded loops have legitimate uses; runtime
            // isolation and timeouts cover them.
            IssueCode::SuspiciousAttribute | IssueCode::SuspiciousName | IssueCode::InfiniteLoop => {
                Severity::Warning
            }

            IssueCode::EmptySource
            | IssueCode::SyntaxError
            | IssueCode::ParseFailure
            | IssueCode::BlockedImport
            | IssueCode::UnapprovedImport
            | IssueCode::BlockedBuiltinCall
            | IssueCode::SystemCall
            | IssueCode::DynamicCodeFString
            | IssueCode::DynamicCodeConcat
            | IssueCode::BlockedAttribute
            | IssueCode::BlockedName => Severity::Error,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for IssueCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Source location span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    /// Start byte offset in source.
    pub start: usize,
    /// End byte offset in source.
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Shift both ends by `offset` bytes.
    pub fn shifted(self, offset: usize) -> Span {
        Span::new(self.start + offset, self.end + offset)
    }

    /// Convert byte offset to line:column.
    ///
    /// Returns (line, column) where both are 1-indexed.
    pub fn to_line_col(&self, source: &str) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;

        for (i, ch) in source.char_indices() {
            if i >= self.start {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }

        (line, col)
    }

    /// Format span as "line:col" string.
    pub fn format_location(&self, source: &str) -> String {
        let (line, col) = self.to_line_col(source);
        format!("{}:{}", line, col)
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A validation issue found in submitted code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Severity level.
    pub severity: Severity,
    /// Issue category code.
    pub code: IssueCode,
    /// Human-readable message.
    pub message: String,
    /// Optional source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Optional suggestion for fixing the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create an issue with the code's default severity.
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.default_severity(),
            code,
            message: message.into(),
            span: None,
            suggestion: None,
        }
    }

    /// Create a new validation error.
    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::new(code, message)
        }
    }

    /// Create a new validation warning.
    pub fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::new(code, message)
        }
    }

    /// Add a span to this issue.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Add a suggestion to this issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Format the issue for display.
    ///
    /// With source provided, includes line:column information and source context.
    pub fn format(&self, source: &str) -> String {
        let mut result = String::new();

        if let Some(span) = &self.span {
            let loc = span.format_location(source);
            result.push_str(&format!("{}: ", loc));
        }

        result.push_str(&format!("{} [{}]: {}", self.severity, self.code, self.message));

        if let Some(suggestion) = &self.suggestion {
            result.push_str(&format!("\n  → {}", suggestion));
        }

        if let Some(span) = &self.span
            && let Some(line_content) = get_line_at_offset(source, span.start)
        {
            result.push_str(&format!("\n  | {}", line_content));
        }

        result
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)
    }
}

/// Get the line containing a byte offset.
fn get_line_at_offset(source: &str, offset: usize) -> Option<&str> {
    if offset >= source.len() || !source.is_char_boundary(offset) {
        return None;
    }

    let start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = source[offset..]
        .find('\n')
        .map_or(source.len(), |i| offset + i);

    Some(source[start..end].trim_end_matches('\r'))
}
