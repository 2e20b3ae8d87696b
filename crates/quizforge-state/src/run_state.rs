//! Write-once shared run state.
//!
//! One [`RunState`] instance is scoped to exactly one pipeline run. Stages
//! communicate only through it: each stage writes the keys it declares and
//! reads the keys its dependencies produced. Both failure modes here are
//! scheduling defects, not runtime conditions, and are never retried.

use parking_lot::RwLock;
use quizforge_model::{
    DifficultyDistribution, KnowledgePoint, QuestionBank, SampleStructure, TypeDistribution,
};
use std::collections::HashMap;
use std::fmt;

/// Names of run-state entries. Closed set: a stage can only declare keys
/// that exist here, which turns typo'd wiring into compile errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    RawText,
    SampleCount,
    KnowledgePoints,
    TypeDistribution,
    DifficultyDistribution,
    SampleStructure,
    GeneratedBank,
    CorrectedBank,
}

impl StateKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::RawText => "raw_text",
            StateKey::SampleCount => "sample_count",
            StateKey::KnowledgePoints => "knowledge_points",
            StateKey::TypeDistribution => "type_distribution",
            StateKey::DifficultyDistribution => "difficulty_distribution",
            StateKey::SampleStructure => "sample_structure",
            StateKey::GeneratedBank => "generated_bank",
            StateKey::CorrectedBank => "corrected_bank",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stage-produced artifact. The key is derived from the variant, so a
/// stage cannot write a value under the wrong name.
#[derive(Debug, Clone)]
pub enum Artifact {
    RawText(String),
    SampleCount(usize),
    KnowledgePoints(Vec<KnowledgePoint>),
    TypeDistribution(TypeDistribution),
    DifficultyDistribution(DifficultyDistribution),
    SampleStructure(SampleStructure),
    GeneratedBank(QuestionBank),
    CorrectedBank(QuestionBank),
}

impl Artifact {
    /// The key this artifact is stored under.
    #[must_use]
    pub fn key(&self) -> StateKey {
        match self {
            Artifact::RawText(_) => StateKey::RawText,
            Artifact::SampleCount(_) => StateKey::SampleCount,
            Artifact::KnowledgePoints(_) => StateKey::KnowledgePoints,
            Artifact::TypeDistribution(_) => StateKey::TypeDistribution,
            Artifact::DifficultyDistribution(_) => StateKey::DifficultyDistribution,
            Artifact::SampleStructure(_) => StateKey::SampleStructure,
            Artifact::GeneratedBank(_) => StateKey::GeneratedBank,
            Artifact::CorrectedBank(_) => StateKey::CorrectedBank,
        }
    }
}

/// Run-state errors. Both indicate a bug in the stage graph itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A stage read a key no dependency produced (ran out of order).
    #[error("missing artifact `{0}`: stage executed before its dependency produced it")]
    MissingArtifact(StateKey),

    /// Two stages wrote the same key within one run.
    #[error("duplicate artifact `{0}`: key was already written in this run")]
    DuplicateArtifact(StateKey),

    /// An artifact was present under a key but carried the wrong variant.
    /// Unreachable through the public API; kept so typed reads stay total.
    #[error("artifact kind mismatch under `{0}`")]
    KindMismatch(StateKey),
}

/// Write-once key-value mapping for one pipeline run.
///
/// An artifact only becomes visible after its producing stage fully
/// returns, so readers never observe partial writes.
#[derive(Debug, Default)]
pub struct RunState {
    entries: RwLock<HashMap<StateKey, Artifact>>,
    warnings: RwLock<Vec<String>>,
}

impl RunState {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an artifact. Write-once: a second write to the same key
    /// within one run fails with [`StateError::DuplicateArtifact`].
    pub fn set(&self, artifact: Artifact) -> Result<(), StateError> {
        let key = artifact.key();
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(StateError::DuplicateArtifact(key));
        }
        entries.insert(key, artifact);
        Ok(())
    }

    /// Fetch an artifact by key.
    pub fn get(&self, key: StateKey) -> Result<Artifact, StateError> {
        self.entries
            .read()
            .get(&key)
            .cloned()
            .ok_or(StateError::MissingArtifact(key))
    }

    /// Whether the key has been written this run.
    #[must_use]
    pub fn contains(&self, key: StateKey) -> bool {
        self.entries.read().contains_key(&key)
    }

    /// Record a non-fatal condition on the run. Unlike artifacts, warnings
    /// accumulate; any stage may append any number of them.
    pub fn push_warning(&self, warning: impl Into<String>) {
        self.warnings.write().push(warning.into());
    }

    /// Warnings recorded so far, in insertion order.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.read().clone()
    }

    /// Clear all entries and warnings. Invoked by the orchestrator exactly
    /// once, at the start of a run, before any stage executes.
    pub fn reset(&self) {
        self.entries.write().clear();
        self.warnings.write().clear();
    }

    // Typed accessors. KindMismatch cannot occur through `set`, but the
    // reads stay total rather than panicking.

    pub fn raw_text(&self) -> Result<String, StateError> {
        match self.get(StateKey::RawText)? {
            Artifact::RawText(text) => Ok(text),
            _ => Err(StateError::KindMismatch(StateKey::RawText)),
        }
    }

    pub fn sample_count(&self) -> Result<usize, StateError> {
        match self.get(StateKey::SampleCount)? {
            Artifact::SampleCount(n) => Ok(n),
            _ => Err(StateError::KindMismatch(StateKey::SampleCount)),
        }
    }

    pub fn knowledge_points(&self) -> Result<Vec<KnowledgePoint>, StateError> {
        match self.get(StateKey::KnowledgePoints)? {
            Artifact::KnowledgePoints(points) => Ok(points),
            _ => Err(StateError::KindMismatch(StateKey::KnowledgePoints)),
        }
    }

    pub fn type_distribution(&self) -> Result<TypeDistribution, StateError> {
        match self.get(StateKey::TypeDistribution)? {
            Artifact::TypeDistribution(dist) => Ok(dist),
            _ => Err(StateError::KindMismatch(StateKey::TypeDistribution)),
        }
    }

    pub fn difficulty_distribution(&self) -> Result<DifficultyDistribution, StateError> {
        match self.get(StateKey::DifficultyDistribution)? {
            Artifact::DifficultyDistribution(dist) => Ok(dist),
            _ => Err(StateError::KindMismatch(StateKey::DifficultyDistribution)),
        }
    }

    pub fn sample_structure(&self) -> Result<SampleStructure, StateError> {
        match self.get(StateKey::SampleStructure)? {
            Artifact::SampleStructure(s) => Ok(s),
            _ => Err(StateError::KindMismatch(StateKey::SampleStructure)),
        }
    }

    pub fn generated_bank(&self) -> Result<QuestionBank, StateError> {
        match self.get(StateKey::GeneratedBank)? {
            Artifact::GeneratedBank(bank) => Ok(bank),
            _ => Err(StateError::KindMismatch(StateKey::GeneratedBank)),
        }
    }

    pub fn corrected_bank(&self) -> Result<QuestionBank, StateError> {
        match self.get(StateKey::CorrectedBank)? {
            Artifact::CorrectedBank(bank) => Ok(bank),
            _ => Err(StateError::KindMismatch(StateKey::CorrectedBank)),
        }
    }

}
