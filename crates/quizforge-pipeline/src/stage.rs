//! Stage identities, declared dataflow, and the execution context.
//!
//! Each generation stage declares which run-state keys it reads and which
//! it writes. The scheduler derives the dependency graph from these
//! declarations alone, so adding a stage cannot silently reorder others.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use quizforge_services::{KnowledgeSource, LanguageModel, SampleSource};
use quizforge_state::{RunState, StateKey};
use std::fmt;
use std::sync::Arc;

/// The generation stages, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageName {
    /// Collect parsed sample text into one normalized blob.
    Prepare,
    /// Extract and weight knowledge points from the samples.
    KnowledgeScan,
    /// Decide question-type and difficulty distributions.
    Blueprint,
    /// Extract the structural template of the sample exams.
    Template,
    /// Generate candidate questions slot by slot.
    Generate,
    /// Deduplicate, normalize, and close coverage gaps.
    Review,
}

impl StageName {
    /// All generation stages.
    pub const GENERATION: [StageName; 6] = [
        StageName::Prepare,
        StageName::KnowledgeScan,
        StageName::Blueprint,
        StageName::Template,
        StageName::Generate,
        StageName::Review,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Prepare => "prepare",
            StageName::KnowledgeScan => "knowledge_scan",
            StageName::Blueprint => "blueprint",
            StageName::Template => "template",
            StageName::Generate => "generate",
            StageName::Review => "review",
        }
    }

    /// Run-state keys the stage reads.
    #[must_use]
    pub fn inputs(self) -> &'static [StateKey] {
        match self {
            StageName::Prepare => &[],
            StageName::KnowledgeScan | StageName::Blueprint | StageName::Template => {
                &[StateKey::RawText]
            }
            StageName::Generate => &[
                StateKey::RawText,
                StateKey::KnowledgePoints,
                StateKey::TypeDistribution,
                StateKey::DifficultyDistribution,
                StateKey::SampleStructure,
            ],
            StageName::Review => &[StateKey::GeneratedBank, StateKey::KnowledgePoints],
        }
    }

    /// Run-state keys the stage writes.
    #[must_use]
    pub fn outputs(self) -> &'static [StateKey] {
        match self {
            StageName::Prepare => &[StateKey::RawText, StateKey::SampleCount],
            StageName::KnowledgeScan => &[StateKey::KnowledgePoints],
            StageName::Blueprint => &[
                StateKey::TypeDistribution,
                StateKey::DifficultyDistribution,
            ],
            StageName::Template => &[StateKey::SampleStructure],
            StageName::Generate => &[StateKey::GeneratedBank],
            StageName::Review => &[StateKey::CorrectedBank],
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a stage can touch: the write-once run state, the external
/// collaborators, and the run's configuration.
#[derive(Clone)]
pub struct StageContext {
    pub conversation_id: String,
    pub state: Arc<RunState>,
    pub llm: Arc<dyn LanguageModel>,
    pub knowledge: Arc<dyn KnowledgeSource>,
    pub samples: Arc<dyn SampleSource>,
    pub config: PipelineConfig,
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

/// One unit of pipeline work. A stage reads only its declared inputs and
/// writes each declared output exactly once.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    async fn run(&self, ctx: &StageContext) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_output_is_distinct() {
        let mut seen = std::collections::HashSet::new();
        for stage in StageName::GENERATION {
            for key in stage.outputs() {
                assert!(seen.insert(*key), "{stage} rewrites {key}");
            }
        }
    }

    #[test]
    fn every_input_has_a_producer() {
        let producers: std::collections::HashSet<_> = StageName::GENERATION
            .iter()
            .flat_map(|s| s.outputs().iter().copied())
            .collect();
        for stage in StageName::GENERATION {
            for key in stage.inputs() {
                assert!(producers.contains(key), "{stage} reads unproduced {key}");
            }
        }
    }
}
