//! Question generation: fill each blueprint slot with a drafted question.
//!
//! Slots are drafted concurrently. A slot whose language-model call fails
//! both attempts, or whose draft does not validate, is dropped with a
//! warning; the stage only fails when fewer than the configured minimum
//! survive.

use crate::error::PipelineError;
use crate::stage::{Stage, StageContext, StageName};
use async_trait::async_trait;
use futures::future::join_all;
use quizforge_model::{
    fingerprint, Difficulty, DifficultyDistribution, KnowledgePoint, Question, QuestionBank,
    QuestionId, QuestionType, SampleStructure, TypeDistribution,
};
use quizforge_services::{call_with_retry, parse, Attempt, CompletionRequest, QueryMode};
use quizforge_state::Artifact;
use serde::Deserialize;

const GENERATOR_SYSTEM: &str =
    "You are an exam author. Reply with a single JSON object and nothing else.";

/// One planned question: type and difficulty from the blueprint, topic
/// assigned round-robin over the weighted knowledge points.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: Difficulty,
    pub(crate) knowledge_point: Option<String>,
}

/// What the model is asked to return for a slot.
#[derive(Debug, Deserialize)]
struct Draft {
    stem: String,
    #[serde(default)]
    options: Vec<String>,
    answer: String,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    knowledge_points: Vec<String>,
}

/// Drafts one question per blueprint slot and writes the generated bank.
#[derive(Debug, Clone, Copy)]
pub struct GenerateStage;

#[async_trait]
impl Stage for GenerateStage {
    fn name(&self) -> StageName {
        StageName::Generate
    }

    async fn run(&self, ctx: &StageContext) -> Result<(), PipelineError> {
        let raw_text = ctx.state.raw_text()?;
        let points = ctx.state.knowledge_points()?;
        let types = ctx.state.type_distribution()?;
        let difficulties = ctx.state.difficulty_distribution()?;
        let structure = ctx.state.sample_structure()?;

        let slots = build_slots(&types, &difficulties, &structure, &points);
        let drafts = join_all(
            slots
                .iter()
                .map(|slot| draft_question(ctx, slot, &structure)),
        )
        .await;

        let mut questions: Vec<Question> = Vec::with_capacity(slots.len());
        for (slot, draft) in slots.iter().zip(drafts) {
            let draft = match draft {
                Ok(draft) => draft,
                Err(error) => {
                    tracing::warn!(%error, question_type = %slot.question_type, "slot dropped");
                    continue;
                }
            };
            match to_question(questions.len() + 1, slot, draft) {
                Ok(question) => questions.push(question),
                Err(reason) => {
                    tracing::warn!(reason, question_type = %slot.question_type, "draft rejected");
                }
            }
        }

        let min = ctx.config.min_generated_count();
        if questions.len() < min {
            return Err(PipelineError::stage(
                self.name(),
                format!(
                    "only {} of {} questions could be generated (minimum {})",
                    questions.len(),
                    slots.len(),
                    min
                ),
            ));
        }

        tracing::info!(
            conversation_id = %ctx.conversation_id,
            generated = questions.len(),
            planned = slots.len(),
            "question bank generated"
        );
        ctx.state.set(Artifact::GeneratedBank(QuestionBank::new(
            questions,
            fingerprint(&raw_text),
        )))?;
        Ok(())
    }
}

/// Expand the distributions into concrete slots. Types appear in sample
/// section order first, then any remaining blueprint types; difficulties
/// and topics cycle across slots.
pub(crate) fn build_slots(
    types: &TypeDistribution,
    difficulties: &DifficultyDistribution,
    structure: &SampleStructure,
    points: &[KnowledgePoint],
) -> Vec<Slot> {
    let mut ordered_types: Vec<QuestionType> = structure
        .section_order
        .iter()
        .copied()
        .filter(|t| types.contains_key(t))
        .collect();
    for question_type in types.keys() {
        if !ordered_types.contains(question_type) {
            ordered_types.push(*question_type);
        }
    }

    let mut difficulty_cycle: Vec<Difficulty> = difficulties
        .iter()
        .flat_map(|(difficulty, count)| std::iter::repeat(*difficulty).take(*count))
        .collect();
    if difficulty_cycle.is_empty() {
        difficulty_cycle.push(Difficulty::Medium);
    }

    let mut slots = Vec::new();
    let mut index = 0usize;
    for question_type in ordered_types {
        for _ in 0..types[&question_type] {
            let knowledge_point = if points.is_empty() {
                None
            } else {
                Some(points[index % points.len()].name.clone())
            };
            slots.push(Slot {
                question_type,
                difficulty: difficulty_cycle[index % difficulty_cycle.len()],
                knowledge_point,
            });
            index += 1;
        }
    }
    slots
}

async fn draft_question(
    ctx: &StageContext,
    slot: &Slot,
    structure: &SampleStructure,
) -> Result<Draft, PipelineError> {
    let snippets = match &slot.knowledge_point {
        Some(point) => {
            let result = call_with_retry(ctx.config.knowledge_timeout, |_| {
                ctx.knowledge
                    .query(&ctx.conversation_id, point, QueryMode::Hybrid)
            })
            .await;
            match result {
                Ok(reply) => reply.snippets,
                Err(error) => {
                    tracing::warn!(%error, point, "drafting without knowledge context");
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };

    let draft = call_with_retry(ctx.config.llm_timeout, |attempt| {
        let request = generation_request(slot, structure, &snippets, attempt);
        async move {
            let text = ctx.llm.complete(request).await?;
            parse::first_object::<Draft>(&text)
        }
    })
    .await?;
    Ok(draft)
}

fn generation_request(
    slot: &Slot,
    structure: &SampleStructure,
    snippets: &[String],
    attempt: Attempt,
) -> CompletionRequest {
    let topic = slot.knowledge_point.as_deref().unwrap_or("the course material");
    let mut prompt = format!(
        "Write one {difficulty} {kind} exam question about {topic}.\n",
        difficulty = slot.difficulty,
        kind = slot.question_type,
    );
    if slot.question_type.is_choice() {
        prompt.push_str(&format!(
            "Provide exactly {} options labeled A, B, C... and put the correct label(s) in `answer`.\n",
            structure.options_per_choice
        ));
    }
    prompt.push_str(
        "Return a JSON object with fields: stem, options, answer, explanation, knowledge_points.\n",
    );

    if attempt == Attempt::Initial && !snippets.is_empty() {
        prompt.push_str("Base the question on this material:\n");
        for snippet in snippets.iter().take(3) {
            prompt.push_str("- ");
            prompt.push_str(snippet);
            prompt.push('\n');
        }
    }

    CompletionRequest::new(GENERATOR_SYSTEM, prompt)
}

/// Validate a draft and fix its identity fields from the slot.
fn to_question(ordinal: usize, slot: &Slot, draft: Draft) -> Result<Question, &'static str> {
    let stem = draft.stem.trim();
    if stem.is_empty() {
        return Err("empty stem");
    }
    if draft.answer.trim().is_empty() {
        return Err("empty answer");
    }
    if slot.question_type.is_choice() && draft.options.len() < 2 {
        return Err("choice question without options");
    }

    let knowledge_points = if draft.knowledge_points.is_empty() {
        slot.knowledge_point.iter().cloned().collect()
    } else {
        draft.knowledge_points
    };

    let mut question = Question::new(
        QuestionId::generated(ordinal),
        stem,
        slot.question_type,
        draft.answer.trim(),
        slot.difficulty,
    )
    .with_knowledge_points(knowledge_points);
    if slot.question_type.is_choice() {
        question = question.with_options(draft.options);
    }
    if let Some(explanation) = draft.explanation {
        question = question.with_explanation(explanation);
    }
    Ok(question)
}
