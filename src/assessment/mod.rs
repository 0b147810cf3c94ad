//! Structured view of a project's free-form assessment text.
//!
//! The runner stores assessments as whatever text the agent produced. That is
//! usually prose wrapping a fenced JSON block, sometimes bare JSON, and
//! sometimes the plain-text section layout that [`format`] renders. [`parse`]
//! recognizes all three; callers fall back to the raw text on `None`.

mod format;
mod parser;

use serde::{Deserialize, Serialize};

pub use format::{format, RULE};
pub use parser::parse;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAssessment {
    pub overview: String,
    pub analysis: String,
    pub features: Vec<AssessedFeature>,
}

impl StructuredAssessment {
    pub fn is_empty(&self) -> bool {
        self.overview.is_empty() && self.analysis.is_empty() && self.features.is_empty()
    }

    /// Ranking used to pick between several candidate JSON blocks.
    pub(crate) fn score(&self) -> usize {
        self.features.len() * 10 + self.analysis.chars().count() + self.overview.chars().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessedFeature {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl AssessedFeature {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Turn literal `\n` escapes into newlines and trim.
pub(crate) fn clean(value: &str) -> String {
    value.replace("\\n", "\n").trim().to_string()
}

/// Like [`clean`], but collapses every whitespace run (line breaks included)
/// into one space. Feature names and ids must fit on a bullet line.
pub(crate) fn clean_line(value: &str) -> String {
    clean(value).split_whitespace().collect::<Vec<_>>().join(" ")
}
