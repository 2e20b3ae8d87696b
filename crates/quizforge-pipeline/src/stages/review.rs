//! Quality review: normalize, deduplicate, and close coverage gaps.
//!
//! Works over the generated bank and writes the corrected bank. Coverage
//! is binary per knowledge point: a point is covered only when some
//! question carries its tag. Gap filling is bounded by
//! `coverage_rounds_max`; points still uncovered afterwards are recorded
//! as run warnings.

use crate::error::PipelineError;
use crate::stage::{Stage, StageContext, StageName};
use async_trait::async_trait;
use quizforge_model::{
    Difficulty, KnowledgePoint, Question, QuestionBank, QuestionId, QuestionType,
};
use quizforge_services::{call_with_retry, parse, Attempt, CompletionRequest};
use quizforge_state::Artifact;
use serde::Deserialize;
use std::collections::HashSet;

const REVIEWER_SYSTEM: &str =
    "You are an exam author. Reply with a single JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct GapDraft {
    stem: String,
    answer: String,
    #[serde(default)]
    explanation: Option<String>,
}

/// Reviews the generated bank and writes the corrected bank.
#[derive(Debug, Clone, Copy)]
pub struct ReviewStage;

#[async_trait]
impl Stage for ReviewStage {
    fn name(&self) -> StageName {
        StageName::Review
    }

    async fn run(&self, ctx: &StageContext) -> Result<(), PipelineError> {
        let bank = ctx.state.generated_bank()?;
        let points = ctx.state.knowledge_points()?;

        let mut questions = normalize_questions(bank.questions);
        let before = questions.len();
        questions = dedup_questions(questions, ctx.config.dedup_similarity_threshold);
        if questions.len() < before {
            tracing::info!(removed = before - questions.len(), "duplicates removed");
        }

        for round in 0..ctx.config.coverage_rounds_max {
            let uncovered = uncovered_points(&questions, &points);
            if uncovered.is_empty() {
                break;
            }
            tracing::info!(round, gaps = uncovered.len(), "filling coverage gaps");
            for point in uncovered {
                match fill_gap(ctx, &point, next_ordinal(&questions)).await {
                    Ok(question) => questions.push(question),
                    Err(error) => {
                        tracing::warn!(%error, point, "coverage gap left open");
                    }
                }
            }
        }
        for point in uncovered_points(&questions, &points) {
            ctx.state
                .push_warning(format!("knowledge point `{point}` has no covering question"));
        }

        ctx.state.set(Artifact::CorrectedBank(QuestionBank::new(
            questions,
            bank.source_fingerprint,
        )))?;
        Ok(())
    }
}

/// Trim whitespace and canonicalize objective answers (choice labels are
/// stored uppercase). Choice questions that lost their options are dropped.
fn normalize_questions(questions: Vec<Question>) -> Vec<Question> {
    questions
        .into_iter()
        .filter_map(|mut question| {
            question.stem = question.stem.trim().to_string();
            question.answer = question.answer.trim().to_string();
            if question.question_type.is_choice() {
                if question.options.len() < 2 {
                    tracing::warn!(id = %question.id, "choice question without options dropped");
                    return None;
                }
                question.answer = question.answer.to_uppercase();
            }
            for option in &mut question.options {
                *option = option.trim().to_string();
            }
            Some(question)
        })
        .collect()
}

/// Keep the first of any pair of questions whose stems are near-identical.
fn dedup_questions(questions: Vec<Question>, threshold: f64) -> Vec<Question> {
    let mut kept: Vec<Question> = Vec::with_capacity(questions.len());
    for question in questions {
        let duplicate = kept
            .iter()
            .any(|earlier| jaccard(&earlier.stem, &question.stem) >= threshold);
        if duplicate {
            tracing::debug!(id = %question.id, "near-duplicate stem dropped");
        } else {
            kept.push(question);
        }
    }
    kept
}

/// Word-set Jaccard similarity of two stems, case-insensitive.
pub(crate) fn jaccard(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let words_b: HashSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();
    if words_a.is_empty() && words_b.is_empty() {
        return 1.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Points with no tagged question. A stem mentioning a point does not
/// count: only tags do, so coverage stays checkable downstream.
fn uncovered_points(questions: &[Question], points: &[KnowledgePoint]) -> Vec<String> {
    points
        .iter()
        .map(|point| point.name.as_str())
        .filter(|name| {
            let lower = name.to_lowercase();
            !questions.iter().any(|question| {
                question
                    .knowledge_points
                    .iter()
                    .any(|kp| kp.to_lowercase() == lower)
            })
        })
        .map(String::from)
        .collect()
}

fn next_ordinal(questions: &[Question]) -> usize {
    questions
        .iter()
        .filter_map(|question| {
            question
                .id
                .as_str()
                .strip_prefix("GEN_")
                .and_then(|n| n.parse::<usize>().ok())
        })
        .max()
        .unwrap_or(0)
        + 1
}

/// Draft one targeted short-answer question for an uncovered point.
async fn fill_gap(
    ctx: &StageContext,
    point: &str,
    ordinal: usize,
) -> Result<Question, PipelineError> {
    let draft = call_with_retry(ctx.config.llm_timeout, |attempt| {
        let prompt = match attempt {
            Attempt::Initial => format!(
                "Write one medium short-answer exam question specifically about {point}.\n\
                 Return a JSON object with fields: stem, answer, explanation.\n"
            ),
            Attempt::Simplified => format!(
                "Write a short-answer question about {point} as JSON with fields stem and answer.\n"
            ),
        };
        let request = CompletionRequest::new(REVIEWER_SYSTEM, prompt);
        async move {
            let text = ctx.llm.complete(request).await?;
            parse::first_object::<GapDraft>(&text)
        }
    })
    .await?;

    let mut question = Question::new(
        QuestionId::generated(ordinal),
        draft.stem.trim(),
        QuestionType::ShortAnswer,
        draft.answer.trim(),
        Difficulty::Medium,
    )
    .with_knowledge_points(vec![point.to_string()]);
    if let Some(explanation) = draft.explanation {
        question = question.with_explanation(explanation);
    }
    Ok(question)
}
