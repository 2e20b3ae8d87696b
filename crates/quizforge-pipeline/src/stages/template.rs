//! Template extraction: how the sample exams are laid out.

use crate::error::PipelineError;
use crate::stage::{Stage, StageContext, StageName};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use quizforge_model::{NumberingStyle, QuestionType, SampleStructure};
use quizforge_state::Artifact;
use regex::Regex;

static Q_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Q\d+[.:)]").expect("static regex"));
static DOTTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+\.").expect("static regex"));
static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d+\)").expect("static regex"));
static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\(\d+\)").expect("static regex"));

static OPTION_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|\s)([A-F])[.)]\s").expect("static regex"));

static SECTION_CUES: Lazy<Vec<(QuestionType, Regex)>> = Lazy::new(|| {
    vec![
        (
            QuestionType::MultiChoice,
            Regex::new(r"(?i)select all|choose all|multiple answers").expect("static regex"),
        ),
        (
            QuestionType::SingleChoice,
            Regex::new(r"(?i:multiple choice)|(?:^|\s)A[.)]\s").expect("static regex"),
        ),
        (
            QuestionType::TrueFalse,
            Regex::new(r"(?i)true or false|\bt/f\b").expect("static regex"),
        ),
        (
            QuestionType::ShortAnswer,
            Regex::new(r"(?i)short answer|\b(explain|describe|discuss)\b").expect("static regex"),
        ),
        (
            QuestionType::Programming,
            Regex::new(r"(?i)programming|\b(write (a |an )?(function|program)|implement)\b")
                .expect("static regex"),
        ),
        (
            QuestionType::Calculation,
            Regex::new(r"(?i)\b(calculate|compute|solve)\b").expect("static regex"),
        ),
    ]
});

/// Extracts section order, dominant option count, and numbering style.
#[derive(Debug, Clone, Copy)]
pub struct TemplateStage;

#[async_trait]
impl Stage for TemplateStage {
    fn name(&self) -> StageName {
        StageName::Template
    }

    async fn run(&self, ctx: &StageContext) -> Result<(), PipelineError> {
        let text = ctx.state.raw_text()?;

        let structure = SampleStructure {
            section_order: section_order(&text),
            options_per_choice: options_per_choice(&text),
            numbering: numbering_style(&text),
        };

        tracing::debug!(conversation_id = %ctx.conversation_id, ?structure, "template extracted");
        ctx.state.set(Artifact::SampleStructure(structure))?;
        Ok(())
    }
}

fn numbering_style(text: &str) -> NumberingStyle {
    let candidates = [
        (NumberingStyle::QPrefixed, Q_PREFIXED.find_iter(text).count()),
        (NumberingStyle::Dotted, DOTTED.find_iter(text).count()),
        (
            NumberingStyle::Parenthesized,
            PARENTHESIZED.find_iter(text).count(),
        ),
        (NumberingStyle::Bracketed, BRACKETED.find_iter(text).count()),
    ];
    candidates
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(style, _)| style)
        .unwrap_or_default()
}

/// Dominant option count: total markers over the number of `A` markers,
/// i.e. the average options per choice question. Defaults to 4.
fn options_per_choice(text: &str) -> usize {
    let mut total = 0usize;
    let mut first_options = 0usize;
    for caps in OPTION_MARKERS.captures_iter(text) {
        total += 1;
        if caps.get(1).map(|m| m.as_str()) == Some("A") {
            first_options += 1;
        }
    }
    if first_options == 0 {
        return 4;
    }
    (total / first_options).clamp(2, 6)
}

/// Question types in the order their first cue appears.
fn section_order(text: &str) -> Vec<QuestionType> {
    let mut found: Vec<(usize, QuestionType)> = SECTION_CUES
        .iter()
        .filter_map(|(question_type, cue)| {
            cue.find(text).map(|m| (m.start(), *question_type))
        })
        .collect();
    found.sort_by_key(|(offset, _)| *offset);

    let order: Vec<QuestionType> = found.into_iter().map(|(_, t)| t).collect();
    if order.is_empty() {
        vec![QuestionType::SingleChoice, QuestionType::ShortAnswer]
    } else {
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use quizforge_state::RunState;
    use quizforge_test_utils::{exam_text, CannedKnowledge, FixedSamples, ScriptedLlm};
    use std::sync::Arc;

    fn ctx_with(raw_text: &str) -> StageContext {
        let state = Arc::new(RunState::new());
        state.set(Artifact::RawText(raw_text.to_string())).unwrap();
        StageContext {
            conversation_id: "conv".to_string(),
            state,
            llm: Arc::new(ScriptedLlm::new()),
            knowledge: Arc::new(CannedKnowledge::with_points(&[])),
            samples: Arc::new(FixedSamples::empty()),
            config: PipelineConfig::default(),
        }
    }

    #[tokio::test]
    async fn extracts_structure_from_exam_text() {
        let ctx = ctx_with(&exam_text());
        TemplateStage.run(&ctx).await.unwrap();

        let structure = ctx.state.sample_structure().unwrap();
        assert_eq!(structure.numbering, NumberingStyle::Dotted);
        assert_eq!(structure.options_per_choice, 4);
        assert_eq!(structure.section_order.first(), Some(&QuestionType::SingleChoice));
        assert!(structure.section_order.contains(&QuestionType::ShortAnswer));
    }

    #[test]
    fn numbering_prefers_most_frequent_style() {
        let text = "Q1: first\nQ2: second\n1. stray\n";
        assert_eq!(numbering_style(text), NumberingStyle::QPrefixed);
        assert_eq!(numbering_style("(1) a\n(2) b\n"), NumberingStyle::Bracketed);
        assert_eq!(numbering_style("no numbering at all"), NumberingStyle::Dotted);
    }

    #[test]
    fn option_count_averages_over_questions() {
        let text = "1. pick\nA. x  B. y  C. z\n2. pick\nA. x  B. y  C. z\n";
        assert_eq!(options_per_choice(text), 3);
        assert_eq!(options_per_choice("no options"), 4);
    }

    #[test]
    fn section_order_defaults_when_cueless() {
        assert_eq!(
            section_order("blank"),
            vec![QuestionType::SingleChoice, QuestionType::ShortAnswer]
        );
    }
}
