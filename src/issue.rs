//! Findings reported by checks.

use std::fmt;

use crate::range::TextRange;

/// Where an issue points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IssueLocation {
    /// The file as a whole
    File,
    /// A range in original-file coordinates
    Range(TextRange),
}

impl IssueLocation {
    /// The range, unless the issue is file-level.
    pub fn range(&self) -> Option<TextRange> {
        match self {
            IssueLocation::File => None,
            IssueLocation::Range(range) => Some(*range),
        }
    }
}

/// A supporting location with an explanatory label.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SecondaryLocation {
    /// Supporting range
    pub range: TextRange,
    /// Label shown next to the range
    pub label: Option<String>,
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Issue {
    /// Key of the rule that raised the issue
    pub rule_key: String,
    /// Message for the user
    pub message: String,
    /// Primary location
    pub location: IssueLocation,
    /// Supporting locations, in reporting order
    pub secondary: Vec<SecondaryLocation>,
}

impl Issue {
    /// Issue at a range.
    pub fn new(rule_key: impl Into<String>, range: TextRange, message: impl Into<String>) -> Self {
        Self {
            rule_key: rule_key.into(),
            message: message.into(),
            location: IssueLocation::Range(range),
            secondary: Vec::new(),
        }
    }

    /// Issue about the whole file.
    pub fn file_level(rule_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_key: rule_key.into(),
            message: message.into(),
            location: IssueLocation::File,
            secondary: Vec::new(),
        }
    }

    /// Adds a secondary location.
    pub fn with_secondary(mut self, range: TextRange, label: Option<String>) -> Self {
        self.secondary.push(SecondaryLocation { range, label });
        self
    }

    /// Primary range, `None` for file-level issues.
    pub fn range(&self) -> Option<TextRange> {
        self.location.range()
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            IssueLocation::File => write!(f, "[{}] {}", self.rule_key, self.message),
            IssueLocation::Range(range) => write!(
                f,
                "{}:{}: [{}] {}",
                range.start_line, range.start_column, self.rule_key, self.message
            ),
        }
    }
}
