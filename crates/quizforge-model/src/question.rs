//! Questions, question banks, and the keys they are stored under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier of a question within one bank (`GEN_###`).
///
/// Identifiers are unique and stable for the lifetime of one bank;
/// regenerating a bank assigns a fresh identifier space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    /// Build the id for the `ordinal`-th generated question (1-based).
    #[inline]
    #[must_use]
    pub fn generated(ordinal: usize) -> Self {
        Self(format!("GEN_{ordinal:03}"))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Question type taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    TrueFalse,
    ShortAnswer,
    Programming,
    Calculation,
}

impl QuestionType {
    /// All types, in canonical presentation order.
    pub const ALL: [QuestionType; 6] = [
        QuestionType::SingleChoice,
        QuestionType::MultiChoice,
        QuestionType::TrueFalse,
        QuestionType::ShortAnswer,
        QuestionType::Programming,
        QuestionType::Calculation,
    ];

    /// Whether the type carries an options list.
    #[inline]
    #[must_use]
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultiChoice)
    }

    /// Whether exact-match grading is meaningful for the type.
    #[inline]
    #[must_use]
    pub fn is_exact_match(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultiChoice | QuestionType::TrueFalse
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultiChoice => "multi_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Programming => "programming",
            QuestionType::Calculation => "calculation",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Difficulty bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
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
        write!(f, "{}", self.as_str())
    }
}

/// A single generated question.
///
/// The stem may embed tables, images, or LaTeX markup; the model treats it
/// as opaque text. `options` is empty for non-choice types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub stem: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub knowledge_points: Vec<String>,
    pub difficulty: Difficulty,
}

impl Question {
    /// Create a question with the minimal required fields.
    #[must_use]
    pub fn new(
        id: QuestionId,
        stem: impl Into<String>,
        question_type: QuestionType,
        answer: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            id,
            stem: stem.into(),
            question_type,
            options: Vec::new(),
            answer: answer.into(),
            explanation: None,
            knowledge_points: Vec::new(),
            difficulty,
        }
    }

    /// With options
    #[must_use]
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// With knowledge-point tags
    #[must_use]
    pub fn with_knowledge_points(mut self, points: Vec<String>) -> Self {
        self.knowledge_points = points;
        self
    }

    /// With explanation text
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }
}

/// Ordered collection of generated questions for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    pub questions: Vec<Question>,
    pub generated_at: DateTime<Utc>,
    /// SHA-256 hex digest of the prepared sample text this bank was built from.
    pub source_fingerprint: String,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Vec<Question>, source_fingerprint: impl Into<String>) -> Self {
        Self {
            questions,
            generated_at: Utc::now(),
            source_fingerprint: source_fingerprint.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Look up a question by id.
    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    /// Union of knowledge-point tags across the bank.
    #[must_use]
    pub fn knowledge_point_union(&self) -> std::collections::BTreeSet<String> {
        self.questions
            .iter()
            .flat_map(|q| q.knowledge_points.iter().cloned())
            .collect()
    }
}

/// Fingerprint of prepared sample text, stored on the bank.
#[must_use]
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Artifact Store key suffixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankSuffix {
    Generated,
    Corrected,
    Graded,
}

impl BankSuffix {
    pub const ALL: [BankSuffix; 3] = [
        BankSuffix::Generated,
        BankSuffix::Corrected,
        BankSuffix::Graded,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BankSuffix::Generated => "_generated",
            BankSuffix::Corrected => "_corrected",
            BankSuffix::Graded => "_graded",
        }
    }
}

/// Artifact Store key: `{conversation_id}{suffix}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BankKey {
    pub conversation_id: String,
    pub suffix: BankSuffix,
}

impl BankKey {
    #[inline]
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, suffix: BankSuffix) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            suffix,
        }
    }

    #[inline]
    #[must_use]
    pub fn generated(conversation_id: impl Into<String>) -> Self {
        Self::new(conversation_id, BankSuffix::Generated)
    }

    #[inline]
    #[must_use]
    pub fn corrected(conversation_id: impl Into<String>) -> Self {
        Self::new(conversation_id, BankSuffix::Corrected)
    }

    #[inline]
    #[must_use]
    pub fn graded(conversation_id: impl Into<String>) -> Self {
        Self::new(conversation_id, BankSuffix::Graded)
    }
}

impl fmt::Display for BankKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.conversation_id, self.suffix.as_str())
    }
}
