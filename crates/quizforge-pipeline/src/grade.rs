//! Submission grading.
//!
//! Every bank question receives exactly one grade, in bank order.
//! Objective types are graded deterministically; subjective types go to
//! the language model with the standard retry policy and fall back to the
//! deterministic heuristics when the model cannot produce a usable grade.

use crate::config::PipelineConfig;
use crate::heuristics::fallback_grade;
use crate::reconcile::{reconcile_answers, Reconciliation};
use chrono::Utc;
use futures::future::join_all;
use quizforge_model::{
    AnswerSubmission, GradingReport, Question, QuestionBank, QuestionGrade,
};
use quizforge_services::{call_with_retry, parse, Attempt, CompletionRequest, LanguageModel};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const GRADER_SYSTEM: &str =
    "You are a strict but fair exam grader. Reply with a single JSON object and nothing else.";

/// What the model is asked to return for one answer.
#[derive(Debug, Deserialize)]
struct LlmGrade {
    score: f64,
    feedback: String,
    #[serde(default)]
    issues: Vec<String>,
}

/// Grades one submission against one bank.
pub struct Grader {
    llm: Arc<dyn LanguageModel>,
    config: PipelineConfig,
}

impl Grader {
    #[must_use]
    pub fn new(llm: Arc<dyn LanguageModel>, config: PipelineConfig) -> Self {
        Self { llm, config }
    }

    /// Produce the complete grading report. Model failures degrade
    /// individual grades to the heuristic fallback; they never abort the
    /// report.
    pub async fn grade(
        &self,
        conversation_id: &str,
        bank: &QuestionBank,
        submission: &AnswerSubmission,
    ) -> GradingReport {
        let reconciliation = reconcile_answers(submission, bank);

        let per_question = join_all(
            bank.questions
                .iter()
                .map(|question| self.grade_one(question, &reconciliation)),
        )
        .await;

        let mut report = GradingReport {
            conversation_id: conversation_id.to_string(),
            graded_at: Utc::now(),
            per_question,
            average_score: 0.0,
            mastery: BTreeMap::new(),
            warnings: reconciliation.unresolved.clone(),
        };
        report.finalize();
        report
    }

    async fn grade_one(
        &self,
        question: &Question,
        reconciliation: &Reconciliation,
    ) -> QuestionGrade {
        let answer = reconciliation.answers.get(&question.id);

        let (score, feedback, issues) = match answer {
            None => (0, "no answer".to_string(), Vec::new()),
            Some(answer) if question.question_type.is_exact_match() => {
                let (score, feedback) = fallback_grade(question, answer);
                (score, feedback, Vec::new())
            }
            Some(answer) => self.grade_subjective(question, answer).await,
        };

        QuestionGrade {
            question_id: question.id.clone(),
            question_type: question.question_type,
            score,
            feedback,
            issues,
            knowledge_points: question.knowledge_points.clone(),
        }
    }

    async fn grade_subjective(
        &self,
        question: &Question,
        answer: &str,
    ) -> (u8, String, Vec<String>) {
        let result = call_with_retry(self.config.llm_timeout, |attempt| {
            let request = grading_request(question, answer, attempt);
            async move {
                let text = self.llm.complete(request).await?;
                parse::first_object::<LlmGrade>(&text)
            }
        })
        .await;

        match result {
            Ok(grade) => (
                clamp_score(grade.score),
                grade.feedback,
                grade.issues,
            ),
            Err(error) => {
                tracing::warn!(%error, id = %question.id, "model grading failed, using fallback");
                let (score, feedback) = fallback_grade(question, answer);
                (score, feedback, vec!["graded by fallback heuristic".to_string()])
            }
        }
    }
}

fn grading_request(question: &Question, answer: &str, attempt: Attempt) -> CompletionRequest {
    let mut prompt = format!(
        "Grade this {kind} answer from 0 to 100.\nQuestion: {stem}\n",
        kind = question.question_type,
        stem = question.stem,
    );
    if attempt == Attempt::Initial {
        prompt.push_str(&format!("Reference answer: {}\n", question.answer));
        if let Some(explanation) = &question.explanation {
            prompt.push_str(&format!("Reference explanation: {explanation}\n"));
        }
    }
    prompt.push_str(&format!(
        "Student answer: {answer}\nReturn a JSON object with fields: score, feedback, issues.\n"
    ));
    CompletionRequest::new(GRADER_SYSTEM, prompt)
}

fn clamp_score(score: f64) -> u8 {
    score.round().clamp(0.0, 100.0) as u8
}
