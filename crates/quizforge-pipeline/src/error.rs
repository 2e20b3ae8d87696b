//! Pipeline error taxonomy.
//!
//! Precondition errors are caller-visible and actionable without any work
//! having been lost: nothing has been invalidated or written when they are
//! returned. Everything else surfaces after a run has started.

use crate::stage::StageName;
use quizforge_services::ServiceError;
use quizforge_state::{StateError, StoreError};

/// Errors surfaced by the orchestrator and its stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No documents have been uploaded for the conversation.
    #[error("no sample documents uploaded for conversation `{0}`")]
    NoSamples(String),

    /// At least one document is still being parsed.
    #[error("sample documents for conversation `{0}` are still being parsed; retry when parsing completes")]
    SamplesPending(String),

    /// Parsing finished but produced no usable text.
    #[error("sample parsing failed for conversation `{0}`; re-upload the documents before generating")]
    SamplesFailed(String),

    /// A run for this conversation is already executing.
    #[error("a pipeline run is already in progress for conversation `{0}`")]
    RunAlreadyInProgress(String),

    /// No generated bank exists to grade against.
    #[error("no question bank exists for conversation `{0}`; generate one first")]
    BankMissing(String),

    /// No graded report exists to derive advice from.
    #[error("no grading report exists for conversation `{0}`; grade a submission first")]
    ReportMissing(String),

    /// A stage failed for a stage-specific reason.
    #[error("stage {stage} failed: {message}")]
    Stage { stage: StageName, message: String },

    /// The run was cancelled between stages.
    #[error("pipeline run cancelled for conversation `{0}`")]
    Cancelled(String),

    /// Shared-state violation: a scheduling defect, never retried.
    #[error(transparent)]
    State(#[from] StateError),

    /// Artifact store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// External service failure that exhausted its retry budget.
    #[error("service call failed: {0}")]
    Service(#[from] ServiceError),

    /// The stage graph itself is malformed.
    #[error(transparent)]
    Graph(#[from] crate::graph::GraphError),
}

impl PipelineError {
    /// Failed before any work started; the caller can fix the input and
    /// retry without losing anything.
    #[inline]
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::NoSamples(_)
                | PipelineError::SamplesPending(_)
                | PipelineError::SamplesFailed(_)
                | PipelineError::RunAlreadyInProgress(_)
                | PipelineError::BankMissing(_)
                | PipelineError::ReportMissing(_)
        )
    }

    /// Indicates a defect in the pipeline wiring rather than bad input or
    /// a flaky collaborator.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::State(_) | PipelineError::Graph(_))
    }

    /// Shorthand for a stage-scoped failure.
    #[must_use]
    pub fn stage(stage: StageName, message: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage,
            message: message.into(),
        }
    }
}
