//! The generation stages.
//!
//! Stage order and concurrency are decided by [`crate::graph::StageGraph`]
//! from each stage's declared dataflow, never by this module.

mod blueprint;
mod generate;
mod knowledge_scan;
mod prepare;
mod review;
mod template;

pub use blueprint::BlueprintStage;
pub use generate::GenerateStage;
pub use knowledge_scan::KnowledgeScanStage;
pub use prepare::PrepareStage;
pub use review::ReviewStage;
pub use template::TemplateStage;

use crate::stage::Stage;
use std::sync::Arc;

/// All generation stages, ready for scheduling.
#[must_use]
pub fn generation_stages() -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(PrepareStage),
        Arc::new(KnowledgeScanStage),
        Arc::new(BlueprintStage),
        Arc::new(TemplateStage),
        Arc::new(GenerateStage),
        Arc::new(ReviewStage),
    ]
}
