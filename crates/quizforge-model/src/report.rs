//! Grading reports and derived learning advice.

use crate::question::{QuestionId, QuestionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grade for a single question.
///
/// Every question in the bank gets exactly one entry, including questions
/// the student never answered (score 0, feedback "no answer").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub question_id: QuestionId,
    pub question_type: QuestionType,
    /// Score in `0..=100`.
    pub score: u8,
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub knowledge_points: Vec<String>,
}

/// Aggregated mastery for one knowledge point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasteryStat {
    /// Score ratio across all questions tagged with the point, in `0.0..=1.0`.
    pub mastery: f64,
    pub question_count: usize,
}

/// The `_graded` artifact for a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
    pub conversation_id: String,
    pub graded_at: DateTime<Utc>,
    /// One entry per bank question, in bank order.
    pub per_question: Vec<QuestionGrade>,
    pub average_score: f64,
    pub mastery: BTreeMap<String, MasteryStat>,
    /// Unresolved submission keys and similar non-fatal findings.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl GradingReport {
    /// Recompute the average and per-knowledge-point mastery from
    /// `per_question`. Call after the per-question entries are final.
    pub fn finalize(&mut self) {
        let count = self.per_question.len();
        let total: u64 = self.per_question.iter().map(|g| u64::from(g.score)).sum();
        self.average_score = if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        };

        let mut sums: BTreeMap<String, (u64, usize)> = BTreeMap::new();
        for grade in &self.per_question {
            for kp in &grade.knowledge_points {
                let entry = sums.entry(kp.clone()).or_insert((0, 0));
                entry.0 += u64::from(grade.score);
                entry.1 += 1;
            }
        }
        self.mastery = sums
            .into_iter()
            .map(|(kp, (sum, count))| {
                (
                    kp,
                    MasteryStat {
                        mastery: sum as f64 / (count as f64 * 100.0),
                        question_count: count,
                    },
                )
            })
            .collect();
    }
}

/// A knowledge point flagged as weak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakPoint {
    pub name: String,
    pub mastery: f64,
    pub question_count: usize,
}

/// One prioritized topic with the reason it ranks where it does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityTopic {
    pub topic: String,
    pub rationale: String,
}

/// One phase of the staged study plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPhase {
    pub phase: usize,
    pub description: String,
}

/// Derived learning advice. Computed from a [`GradingReport`] only and
/// never written back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningAdvice {
    pub weak_points: Vec<WeakPoint>,
    pub priority_topics: Vec<PriorityTopic>,
    pub study_plan: Vec<StudyPhase>,
    pub practice_suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(id: usize, score: u8, kps: &[&str]) -> QuestionGrade {
        QuestionGrade {
            question_id: QuestionId::generated(id),
            question_type: QuestionType::ShortAnswer,
            score,
            feedback: String::new(),
            issues: vec![],
            knowledge_points: kps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn finalize_computes_average_and_mastery() {
        let mut report = GradingReport {
            conversation_id: "c1".into(),
            graded_at: Utc::now(),
            per_question: vec![
                grade(1, 100, &["sorting"]),
                grade(2, 50, &["sorting", "graphs"]),
                grade(3, 0, &["graphs"]),
            ],
            average_score: 0.0,
            mastery: BTreeMap::new(),
            warnings: vec![],
        };
        report.finalize();

        assert!((report.average_score - 50.0).abs() < f64::EPSILON);
        let sorting = &report.mastery["sorting"];
        assert!((sorting.mastery - 0.75).abs() < 1e-9);
        assert_eq!(sorting.question_count, 2);
        let graphs = &report.mastery["graphs"];
        assert!((graphs.mastery - 0.25).abs() < 1e-9);
    }

    #[test]
    fn finalize_empty_report() {
        let mut report = GradingReport {
            conversation_id: "c1".into(),
            graded_at: Utc::now(),
            per_question: vec![],
            average_score: 42.0,
            mastery: BTreeMap::new(),
            warnings: vec![],
        };
        report.finalize();
        assert_eq!(report.average_score, 0.0);
        assert!(report.mastery.is_empty());
    }
}
