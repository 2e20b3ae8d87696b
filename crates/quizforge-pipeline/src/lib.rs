//! Quizforge orchestration pipeline.
//!
//! Turns uploaded sample exams plus a per-conversation knowledge index
//! into a question bank, grades submissions against it, and derives
//! learning advice from the graded results.
//!
//! The generation pipeline is a dataflow DAG over six stages:
//!
//! ```text
//! prepare ─┬─ knowledge_scan ─┐
//!          ├─ blueprint ──────┼─ generate ── review
//!          └─ template ───────┘
//! ```
//!
//! Stages communicate only through a write-once [`quizforge_state::RunState`];
//! the scheduler derives ordering and concurrency from each stage's declared
//! inputs and outputs. Grading and advice are separate entrypoints on
//! [`Orchestrator`].

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod advise;
pub mod config;
pub mod error;
pub mod grade;
pub mod graph;
pub mod heuristics;
pub mod orchestrator;
pub mod reconcile;
pub mod stage;
pub mod stages;

pub use advise::derive_advice;
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use grade::Grader;
pub use graph::{GraphError, StageGraph};
pub use orchestrator::{Orchestrator, PipelineRun, StageOutcome, StageRecord};
pub use reconcile::{reconcile_answers, Reconciliation};
pub use stage::{Stage, StageContext, StageName};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
