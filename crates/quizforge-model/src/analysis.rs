//! Intermediate analysis artifacts produced by the preparation stages.

use crate::question::{Difficulty, QuestionType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parse status of an uploaded sample document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One uploaded sample document, as reported by the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDoc {
    pub id: String,
    pub status: ParseStatus,
    /// Extracted text; present once parsing completed.
    #[serde(default)]
    pub text: Option<String>,
}

impl SampleDoc {
    #[must_use]
    pub fn completed(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ParseStatus::Completed,
            text: Some(text.into()),
        }
    }

    #[must_use]
    pub fn with_status(id: impl Into<String>, status: ParseStatus) -> Self {
        Self {
            id: id.into(),
            status,
            text: None,
        }
    }
}

/// A knowledge point with its observed weight (occurrence frequency in the
/// prepared sample text; at least 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub name: String,
    pub weight: usize,
}

/// Histogram of question types, summing to the target question count.
pub type TypeDistribution = BTreeMap<QuestionType, usize>;

/// Histogram of difficulties, summing to the target question count.
pub type DifficultyDistribution = BTreeMap<Difficulty, usize>;

/// Numbering convention observed in the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingStyle {
    /// `Q1.` / `Q01:`
    QPrefixed,
    /// `1.`
    #[default]
    Dotted,
    /// `1)`
    Parenthesized,
    /// `(1)`
    Bracketed,
}

/// Template shape extracted from the samples: how the exam is laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleStructure {
    /// Question types in the order sections appear.
    pub section_order: Vec<QuestionType>,
    /// Dominant option count for choice questions (0 if no choice section).
    pub options_per_choice: usize,
    pub numbering: NumberingStyle,
}

impl Default for SampleStructure {
    fn default() -> Self {
        Self {
            section_order: Vec::new(),
            options_per_choice: 4,
            numbering: NumberingStyle::default(),
        }
    }
}
