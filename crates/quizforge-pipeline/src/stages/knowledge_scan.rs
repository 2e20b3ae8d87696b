//! Knowledge scan: extract and weight the knowledge points the samples touch.

use crate::error::PipelineError;
use crate::stage::{Stage, StageContext, StageName};
use async_trait::async_trait;
use quizforge_model::KnowledgePoint;
use quizforge_services::{call_with_retry, Attempt, QueryMode};
use quizforge_state::Artifact;
use std::collections::HashSet;

/// How much text the simplified retry sends.
const SIMPLIFIED_QUERY_CHARS: usize = 2000;

/// Queries the knowledge source with the prepared text and weights each
/// returned point by how often it occurs in the samples.
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeScanStage;

#[async_trait]
impl Stage for KnowledgeScanStage {
    fn name(&self) -> StageName {
        StageName::KnowledgeScan
    }

    async fn run(&self, ctx: &StageContext) -> Result<(), PipelineError> {
        let text = ctx.state.raw_text()?;

        let reply = call_with_retry(ctx.config.knowledge_timeout, |attempt| {
            let query = match attempt {
                Attempt::Initial => text.as_str(),
                Attempt::Simplified => truncate_chars(&text, SIMPLIFIED_QUERY_CHARS),
            };
            ctx.knowledge
                .query(&ctx.conversation_id, query, QueryMode::Hybrid)
        })
        .await?;

        let points = weight_points(&reply.knowledge_points, &text, ctx.config.max_knowledge_points);
        tracing::info!(
            conversation_id = %ctx.conversation_id,
            points = points.len(),
            "knowledge scan complete"
        );

        ctx.state.set(Artifact::KnowledgePoints(points))?;
        Ok(())
    }
}

/// Weight each distinct point by its occurrence count in the sample text
/// (minimum 1), highest weight first.
fn weight_points(names: &[String], text: &str, cap: usize) -> Vec<KnowledgePoint> {
    let haystack = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut points: Vec<KnowledgePoint> = names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .map(|name| KnowledgePoint {
            name: name.to_string(),
            weight: haystack.matches(&name.to_lowercase()).count().max(1),
        })
        .collect();

    points.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.name.cmp(&b.name)));
    points.truncate(cap);
    points
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use quizforge_state::RunState;
    use quizforge_test_utils::{CannedKnowledge, FixedSamples, ScriptedLlm};
    use std::sync::Arc;

    fn ctx_with(knowledge: CannedKnowledge, raw_text: &str) -> StageContext {
        let state = Arc::new(RunState::new());
        state.set(Artifact::RawText(raw_text.to_string())).unwrap();
        StageContext {
            conversation_id: "conv".to_string(),
            state,
            llm: Arc::new(ScriptedLlm::new()),
            knowledge: Arc::new(knowledge),
            samples: Arc::new(FixedSamples::empty()),
            config: PipelineConfig::default(),
        }
    }

    #[tokio::test]
    async fn points_are_weighted_by_occurrence() {
        let knowledge = CannedKnowledge::with_points(&["tcp", "routing"]);
        let ctx = ctx_with(knowledge, "tcp handshake, tcp windows, and routing tables");

        KnowledgeScanStage.run(&ctx).await.unwrap();

        let points = ctx.state.knowledge_points().unwrap();
        assert_eq!(points[0].name, "tcp");
        assert_eq!(points[0].weight, 2);
        assert_eq!(points[1].name, "routing");
        assert_eq!(points[1].weight, 1);
    }

    #[tokio::test]
    async fn unseen_points_get_minimum_weight() {
        let knowledge = CannedKnowledge::with_points(&["congestion control"]);
        let ctx = ctx_with(knowledge, "nothing relevant here");

        KnowledgeScanStage.run(&ctx).await.unwrap();

        let points = ctx.state.knowledge_points().unwrap();
        assert_eq!(points[0].weight, 1);
    }

    #[test]
    fn weighting_dedupes_case_insensitively() {
        let names = vec!["TCP".to_string(), "tcp".to_string(), "".to_string()];
        let points = weight_points(&names, "tcp tcp tcp", 10);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].weight, 3);
    }

    #[test]
    fn weighting_respects_cap() {
        let names: Vec<String> = (0..30).map(|i| format!("point-{i}")).collect();
        let points = weight_points(&names, "", 20);
        assert_eq!(points.len(), 20);
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
