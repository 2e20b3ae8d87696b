//! Sample preparation: collect parsed document text into one blob.

use crate::error::PipelineError;
use crate::stage::{Stage, StageContext, StageName};
use async_trait::async_trait;
use quizforge_model::ParseStatus;
use quizforge_state::Artifact;

/// Reads every completed sample document, normalizes its text, and writes
/// the combined blob plus the document count.
#[derive(Debug, Clone, Copy)]
pub struct PrepareStage;

#[async_trait]
impl Stage for PrepareStage {
    fn name(&self) -> StageName {
        StageName::Prepare
    }

    async fn run(&self, ctx: &StageContext) -> Result<(), PipelineError> {
        let docs = ctx.samples.list_samples(&ctx.conversation_id).await?;

        let texts: Vec<String> = docs
            .iter()
            .filter(|doc| doc.status == ParseStatus::Completed)
            .filter_map(|doc| doc.text.as_deref())
            .map(normalize_text)
            .filter(|text| !text.is_empty())
            .collect();

        if texts.is_empty() {
            return Err(PipelineError::stage(
                self.name(),
                "no completed sample contains text",
            ));
        }

        tracing::info!(
            conversation_id = %ctx.conversation_id,
            samples = texts.len(),
            "prepared sample text"
        );

        ctx.state.set(Artifact::SampleCount(texts.len()))?;
        ctx.state.set(Artifact::RawText(texts.join("\n\n")))?;
        Ok(())
    }
}

/// Normalize line endings, strip trailing whitespace, and collapse runs of
/// blank lines so downstream regexes see a predictable shape.
fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in unified.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
