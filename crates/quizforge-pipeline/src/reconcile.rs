//! Mapping submitted answer keys onto bank question ids.
//!
//! Callers label answers however their client did (`GEN_003`, `Q3`, `3.`,
//! a bare `3`). An exact id match wins; otherwise the trailing ordinal in
//! the key selects the n-th bank question (1-based). Keys that resolve to
//! nothing, or to a question another key already claimed, are excluded
//! from grading and reported as warnings.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use quizforge_model::{AnswerSubmission, QuestionBank, QuestionId};
use regex::Regex;

static TRAILING_ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*$").expect("static regex"));

/// Outcome of mapping one submission onto one bank.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Resolved answers, keyed by bank question id, in submission order.
    pub answers: IndexMap<QuestionId, String>,
    /// Submission keys that could not be mapped, with the reason.
    pub unresolved: Vec<String>,
}

/// Map every submission key onto a bank question id.
#[must_use]
pub fn reconcile_answers(submission: &AnswerSubmission, bank: &QuestionBank) -> Reconciliation {
    let mut result = Reconciliation::default();

    for (key, answer) in &submission.answers {
        let Some(id) = resolve_key(key, bank) else {
            result
                .unresolved
                .push(format!("`{key}`: no matching question"));
            continue;
        };
        if result.answers.contains_key(&id) {
            result
                .unresolved
                .push(format!("`{key}`: question {id} already answered"));
            continue;
        }
        result.answers.insert(id, answer.clone());
    }

    result
}

fn resolve_key(key: &str, bank: &QuestionBank) -> Option<QuestionId> {
    let trimmed = key.trim();
    if bank.question(&QuestionId::from(trimmed)).is_some() {
        return Some(QuestionId::from(trimmed));
    }

    let captures = TRAILING_ORDINAL.captures(trimmed)?;
    let ordinal: usize = captures.get(1)?.as_str().parse().ok()?;
    if ordinal == 0 || ordinal > bank.len() {
        return None;
    }
    Some(bank.questions[ordinal - 1].id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_model::{Difficulty, Question, QuestionId, QuestionType};

    fn bank(n: usize) -> QuestionBank {
        QuestionBank::new(
            (1..=n)
                .map(|i| {
                    Question::new(
                        QuestionId::generated(i),
                        format!("stem {i}"),
                        QuestionType::ShortAnswer,
                        "ref",
                        Difficulty::Medium,
                    )
                })
                .collect(),
            "fp",
        )
    }

    #[test]
    fn exact_ids_map_to_themselves() {
        let bank = bank(3);
        let sub = AnswerSubmission::from_pairs([("GEN_002", "my answer")]);
        let rec = reconcile_answers(&sub, &bank);
        assert_eq!(rec.answers[&QuestionId::generated(2)], "my answer");
        assert!(rec.unresolved.is_empty());
    }

    #[test]
    fn trailing_ordinal_selects_positionally() {
        let bank = bank(5);
        let sub = AnswerSubmission::from_pairs([
            ("Q001", "a"),
            ("Q3", "c"),
            ("question 5", "e"),
            ("4", "d"),
        ]);
        let rec = reconcile_answers(&sub, &bank);
        assert_eq!(rec.answers[&QuestionId::generated(1)], "a");
        assert_eq!(rec.answers[&QuestionId::generated(3)], "c");
        assert_eq!(rec.answers[&QuestionId::generated(5)], "e");
        assert_eq!(rec.answers[&QuestionId::generated(4)], "d");
        assert!(rec.unresolved.is_empty());
    }

    #[test]
    fn out_of_range_and_digitless_keys_are_unresolved() {
        let bank = bank(3);
        let sub =
            AnswerSubmission::from_pairs([("Q999", "x"), ("Q0", "y"), ("intro", "z")]);
        let rec = reconcile_answers(&sub, &bank);
        assert!(rec.answers.is_empty());
        assert_eq!(rec.unresolved.len(), 3);
        assert!(rec.unresolved[0].contains("Q999"));
    }

    #[test]
    fn duplicate_targets_keep_first_answer() {
        let bank = bank(3);
        let sub = AnswerSubmission::from_pairs([("GEN_002", "first"), ("Q2", "second")]);
        let rec = reconcile_answers(&sub, &bank);
        assert_eq!(rec.answers[&QuestionId::generated(2)], "first");
        assert_eq!(rec.unresolved.len(), 1);
        assert!(rec.unresolved[0].contains("Q2"));
    }

    #[test]
    fn submission_order_is_preserved() {
        let bank = bank(3);
        let sub = AnswerSubmission::from_pairs([("Q3", "c"), ("Q1", "a")]);
        let rec = reconcile_answers(&sub, &bank);
        let ids: Vec<&QuestionId> = rec.answers.keys().collect();
        assert_eq!(
            ids,
            [&QuestionId::generated(3), &QuestionId::generated(1)]
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn resolved_ids_always_exist_in_bank(
                key in "[A-Za-z ]{0,8}[0-9]{0,4}",
                n in 1usize..20,
            ) {
                let bank = bank(n);
                let sub = AnswerSubmission::from_pairs([(key, "ans".to_string())]);
                let rec = reconcile_answers(&sub, &bank);
                for id in rec.answers.keys() {
                    prop_assert!(bank.question(id).is_some());
                }
                prop_assert_eq!(rec.answers.len() + rec.unresolved.len(), 1);
            }

            #[test]
            fn in_range_ordinals_always_resolve(ordinal in 1usize..=10, n in 10usize..15) {
                let bank = bank(n);
                let sub = AnswerSubmission::from_pairs([(format!("Q{ordinal}"), "ans")]);
                let rec = reconcile_answers(&sub, &bank);
                prop_assert_eq!(
                    rec.answers.keys().next(),
                    Some(&bank.questions[ordinal - 1].id)
                );
            }
        }
    }
}
