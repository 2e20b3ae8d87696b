//! Answer submissions as they arrive from callers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Unique submission identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub Ulid);

impl SubmissionId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A student's submitted answer set.
///
/// Keys are free-form (`Q001`, `GEN_001`, or a bare `1`); the reconciler
/// maps them onto actual question ids before grading. Insertion order is
/// preserved so warnings reference keys the way the caller wrote them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub id: SubmissionId,
    pub answers: IndexMap<String, String>,
}

impl AnswerSubmission {
    #[must_use]
    pub fn new(answers: IndexMap<String, String>) -> Self {
        Self {
            id: SubmissionId::new(),
            answers,
        }
    }

    /// Build a submission from `(key, answer)` pairs.
    #[must_use]
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
