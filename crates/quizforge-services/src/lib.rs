//! External collaborator interfaces consumed by the pipeline.
//!
//! The pipeline treats all three services as unreliable: every call goes
//! through a per-call timeout with at most one simplified retry, and LLM
//! output is validated before it is trusted.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod knowledge;
pub mod llm;
pub mod parse;
pub mod retry;
pub mod samples;

pub use error::ServiceError;
pub use knowledge::{KnowledgeReply, KnowledgeSource, QueryMode};
pub use llm::{CompletionRequest, LanguageModel};
pub use retry::{call_with_retry, Attempt};
pub use samples::SampleSource;
