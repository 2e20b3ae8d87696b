//! Deterministic grading fallbacks.
//!
//! Used whenever the language model cannot grade an answer (timeout, both
//! attempts malformed) and directly for objective question types, which
//! never need a model. Same inputs always produce the same grade.

use once_cell::sync::Lazy;
use quizforge_model::{Question, QuestionType};
use regex::Regex;

static CODE_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fn|def|class|return|for|while|if|print|var|let|int|void)\b|[{};=]|->")
        .expect("static regex")
});

/// Grade an answer without the language model. Returns `(score, feedback)`
/// with score in `0..=100`.
#[must_use]
pub fn fallback_grade(question: &Question, answer: &str) -> (u8, String) {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return (0, "empty answer".to_string());
    }

    match question.question_type {
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            exact_match(&question.answer, trimmed, false)
        }
        // Selection order must not matter: "AC" and "CA" are the same set.
        QuestionType::MultiChoice => exact_match(&question.answer, trimmed, true),
        QuestionType::Programming => {
            if CODE_MARKERS.is_match(trimmed) {
                (
                    50,
                    "code structure detected; correctness not verified automatically".to_string(),
                )
            } else {
                (0, "no code structure detected".to_string())
            }
        }
        QuestionType::ShortAnswer | QuestionType::Calculation => length_tier(trimmed),
    }
}

fn exact_match(expected: &str, actual: &str, sort: bool) -> (u8, String) {
    if normalize(expected, sort) == normalize(actual, sort) {
        (100, "answer matches the key".to_string())
    } else {
        (0, "answer does not match the key".to_string())
    }
}

fn normalize(text: &str, sort: bool) -> String {
    let mut chars: Vec<char> = text
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    if sort {
        chars.sort_unstable();
    }
    chars.into_iter().collect()
}

fn length_tier(answer: &str) -> (u8, String) {
    let len = answer.chars().count();
    let score = if len < 10 {
        20
    } else if len < 50 {
        40
    } else {
        60
    };
    (
        score,
        "assessed automatically by answer length; manual review recommended".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_model::{Difficulty, QuestionId};

    fn question(question_type: QuestionType, answer: &str) -> Question {
        Question::new(
            QuestionId::generated(1),
            "stem",
            question_type,
            answer,
            Difficulty::Medium,
        )
    }

    #[test]
    fn single_choice_is_case_insensitive() {
        let q = question(QuestionType::SingleChoice, "B");
        assert_eq!(fallback_grade(&q, "b").0, 100);
        assert_eq!(fallback_grade(&q, " B ").0, 100);
        assert_eq!(fallback_grade(&q, "C").0, 0);
    }

    #[test]
    fn true_false_mismatch_scores_zero() {
        let q = question(QuestionType::TrueFalse, "false");
        assert_eq!(fallback_grade(&q, "True").0, 0);
        assert_eq!(fallback_grade(&q, "FALSE").0, 100);
    }

    #[test]
    fn multi_choice_ignores_selection_order() {
        let q = question(QuestionType::MultiChoice, "AC");
        assert_eq!(fallback_grade(&q, "CA").0, 100);
        assert_eq!(fallback_grade(&q, "A, C").0, 100);
        assert_eq!(fallback_grade(&q, "AB").0, 0);
    }

    #[test]
    fn programming_needs_code_markers() {
        let q = question(QuestionType::Programming, "reference");
        assert_eq!(fallback_grade(&q, "fn add(a: i32, b: i32) -> i32 { a + b }").0, 50);
        assert_eq!(fallback_grade(&q, "i would loop over the list somehow").0, 0);
    }

    #[test]
    fn free_text_scores_by_length_tier() {
        let q = question(QuestionType::ShortAnswer, "reference");
        assert_eq!(fallback_grade(&q, "short").0, 20);
        assert_eq!(fallback_grade(&q, "a medium length answer here").0, 40);
        let long = "x".repeat(80);
        assert_eq!(fallback_grade(&q, &long).0, 60);
    }

    #[test]
    fn empty_answer_scores_zero() {
        let q = question(QuestionType::ShortAnswer, "reference");
        let (score, feedback) = fallback_grade(&q, "   ");
        assert_eq!(score, 0);
        assert_eq!(feedback, "empty answer");
    }

    #[test]
    fn same_input_same_grade() {
        let q = question(QuestionType::Calculation, "42");
        assert_eq!(fallback_grade(&q, "about 42"), fallback_grade(&q, "about 42"));
    }
}
