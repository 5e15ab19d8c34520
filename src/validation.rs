//! Instance validation failures
//!
//! A failed construction reports every offending field at once, each issue
//! carrying the dotted path into the input, the kind of failure and, for
//! validator callables, the validator's name.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Required field absent from input
    Missing,
    /// Value does not match the declared type
    Type,
    /// Explicit null for a non-nullable field
    Null,
    /// Undeclared field under an `extra: forbid` policy
    Extra,
    /// A validator callable rejected the value
    Validator,
    /// Assignment to a frozen record
    Frozen,
    /// Nesting exceeded the configured depth
    Depth,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Missing => "missing",
            Self::Type => "type",
            Self::Null => "null",
            Self::Extra => "extra",
            Self::Validator => "validator",
            Self::Frozen => "frozen",
            Self::Depth => "depth",
        };
        f.write_str(label)
    }
}

/// A single validation issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending value (`$root` for the record itself)
    pub path: String,
    /// Human-readable message
    pub message: String,
    /// Issue category
    pub kind: IssueKind,
    /// Validator that raised the issue, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
            rule: None,
        }
    }

    /// Set the validator that raised this issue
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.path, self.message, self.kind)?;
        if let Some(rule) = &self.rule {
            write!(f, " [rule: {rule}]")?;
        }
        Ok(())
    }
}

/// Validation failure for one schema
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{} validation error(s) for {}{}", .issues.len(), .schema, issue_lines(.issues))]
pub struct ValidationError {
    /// Schema being constructed
    pub schema: String,
    /// All issues found
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Create an error from collected issues
    pub fn new(schema: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self {
            schema: schema.into(),
            issues,
        }
    }

    /// Create an error with a single issue
    pub fn single(schema: impl Into<String>, issue: ValidationIssue) -> Self {
        Self::new(schema, vec![issue])
    }

    /// Whether any issue points at the given path
    #[must_use]
    pub fn has_issue_at(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }

    /// Issues of a specific kind
    #[must_use]
    pub fn issues_of(&self, kind: IssueKind) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|issue| issue.kind == kind).collect()
    }
}

fn issue_lines(issues: &[ValidationIssue]) -> String {
    issues.iter().map(|issue| format!("\n  {issue}")).collect()
}

/// Join a parent path and a child segment
pub(crate) fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}
