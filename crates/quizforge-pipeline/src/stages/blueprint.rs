//! Blueprint: decide how many questions of each type and difficulty to aim
//! for, scaled to the configured target count.
//!
//! Type weights come from cue counting over the sample text; when the
//! samples show no recognizable cues a stock exam mix is used. Counts are
//! scaled with the largest-remainder method so they always sum exactly to
//! the target.

use crate::error::PipelineError;
use crate::stage::{Stage, StageContext, StageName};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use quizforge_model::{Difficulty, QuestionType};
use regex::Regex;
use std::collections::BTreeMap;

// Option markers may share a line (`A. foo  B. bar`) or start one.
static OPTION_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|\s)[A-F][.)]\s").expect("static regex"));
static MULTI_CUES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)select all|choose all|multiple answers").expect("static regex"));
static TRUE_FALSE_CUES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)true or false|\bt/f\b").expect("static regex"));
static SHORT_ANSWER_CUES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(explain|describe|define|discuss|why)\b").expect("static regex"));
static PROGRAMMING_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(write (a |an )?(function|program)|implement|pseudocode)\b")
        .expect("static regex")
});
static CALCULATION_CUES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(calculate|compute|solve|evaluate)\b").expect("static regex"));

/// Stock mix applied when cue counting finds nothing.
const DEFAULT_TYPE_MIX: [(QuestionType, f64); 6] = [
    (QuestionType::SingleChoice, 0.35),
    (QuestionType::MultiChoice, 0.10),
    (QuestionType::TrueFalse, 0.10),
    (QuestionType::ShortAnswer, 0.25),
    (QuestionType::Programming, 0.10),
    (QuestionType::Calculation, 0.10),
];

const DIFFICULTY_MIX: [(Difficulty, f64); 3] = [
    (Difficulty::Easy, 0.30),
    (Difficulty::Medium, 0.50),
    (Difficulty::Hard, 0.20),
];

/// Writes the type and difficulty distributions.
#[derive(Debug, Clone, Copy)]
pub struct BlueprintStage;

#[async_trait]
impl Stage for BlueprintStage {
    fn name(&self) -> StageName {
        StageName::Blueprint
    }

    async fn run(&self, ctx: &StageContext) -> Result<(), PipelineError> {
        let text = ctx.state.raw_text()?;
        let target = ctx.config.target_question_count;

        let type_weights = type_cue_weights(&text);
        let types = allocate(&type_weights, target);
        let difficulties = allocate(&DIFFICULTY_MIX, target);

        tracing::debug!(
            conversation_id = %ctx.conversation_id,
            ?types,
            "blueprint fixed"
        );

        ctx.state
            .set(quizforge_state::Artifact::TypeDistribution(types))?;
        ctx.state
            .set(quizforge_state::Artifact::DifficultyDistribution(difficulties))?;
        Ok(())
    }
}

/// Per-type weights from cue counting; falls back to the stock mix when
/// the samples show no cues at all.
fn type_cue_weights(text: &str) -> Vec<(QuestionType, f64)> {
    // Four option markers make roughly one choice question.
    let choice = OPTION_MARKERS.find_iter(text).count() as f64 / 4.0;
    let weights = vec![
        (QuestionType::SingleChoice, choice),
        (
            QuestionType::MultiChoice,
            MULTI_CUES.find_iter(text).count() as f64,
        ),
        (
            QuestionType::TrueFalse,
            TRUE_FALSE_CUES.find_iter(text).count() as f64,
        ),
        (
            QuestionType::ShortAnswer,
            SHORT_ANSWER_CUES.find_iter(text).count() as f64,
        ),
        (
            QuestionType::Programming,
            PROGRAMMING_CUES.find_iter(text).count() as f64,
        ),
        (
            QuestionType::Calculation,
            CALCULATION_CUES.find_iter(text).count() as f64,
        ),
    ];

    if weights.iter().all(|(_, w)| *w == 0.0) {
        DEFAULT_TYPE_MIX.to_vec()
    } else {
        weights
    }
}

/// Largest-remainder allocation: scale `weights` to integer counts summing
/// exactly to `total`. Zero-count entries are omitted.
fn allocate<K: Ord + Copy>(weights: &[(K, f64)], total: usize) -> BTreeMap<K, usize> {
    let sum: f64 = weights.iter().map(|(_, w)| w.max(0.0)).sum();
    if sum <= 0.0 || total == 0 {
        return BTreeMap::new();
    }

    let mut counts: Vec<(K, usize, f64)> = weights
        .iter()
        .map(|&(key, weight)| {
            let quota = weight.max(0.0) / sum * total as f64;
            (key, quota.floor() as usize, quota.fract())
        })
        .collect();

    let assigned: usize = counts.iter().map(|(_, n, _)| n).sum();
    let mut remaining = total - assigned;

    // Hand leftovers to the largest fractional parts; ties break by key
    // order so allocation is deterministic.
    counts.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    for entry in counts.iter_mut() {
        if remaining == 0 {
            break;
        }
        entry.1 += 1;
        remaining -= 1;
    }

    counts
        .into_iter()
        .filter(|(_, n, _)| *n > 0)
        .map(|(key, n, _)| (key, n))
        .collect()
}
