//! Learning advice derived from a grading report.
//!
//! Pure computation: same report and threshold always produce the same
//! advice, and nothing here touches the store or the model.

use quizforge_model::{
    GradingReport, LearningAdvice, PriorityTopic, QuestionType, StudyPhase, WeakPoint,
};
use std::collections::BTreeMap;

const MAX_PRIORITY_TOPICS: usize = 5;
const LOW_SCORE_CUTOFF: u8 = 60;

/// Derive advice from a finalized report. Knowledge points with mastery
/// below `mastery_threshold` are weak; the weakest (then the most
/// frequently tested) come first.
#[must_use]
pub fn derive_advice(report: &GradingReport, mastery_threshold: f64) -> LearningAdvice {
    let mut weak_points: Vec<WeakPoint> = report
        .mastery
        .iter()
        .filter(|(_, stat)| stat.mastery < mastery_threshold)
        .map(|(name, stat)| WeakPoint {
            name: name.clone(),
            mastery: stat.mastery,
            question_count: stat.question_count,
        })
        .collect();
    weak_points.sort_by(|a, b| {
        a.mastery
            .partial_cmp(&b.mastery)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.question_count.cmp(&a.question_count))
            .then_with(|| a.name.cmp(&b.name))
    });

    let priority_topics = weak_points
        .iter()
        .take(MAX_PRIORITY_TOPICS)
        .map(|point| PriorityTopic {
            topic: point.name.clone(),
            rationale: format!(
                "mastery {:.0}% across {} question(s)",
                point.mastery * 100.0,
                point.question_count
            ),
        })
        .collect();

    LearningAdvice {
        study_plan: study_plan(&weak_points),
        practice_suggestions: practice_suggestions(report, &weak_points),
        weak_points,
        priority_topics,
    }
}

fn study_plan(weak_points: &[WeakPoint]) -> Vec<StudyPhase> {
    if weak_points.is_empty() {
        return vec![StudyPhase {
            phase: 1,
            description: "Mastery is solid across all assessed topics; keep it fresh with \
                          periodic mixed practice."
                .to_string(),
        }];
    }

    let focus: Vec<&str> = weak_points
        .iter()
        .take(3)
        .map(|p| p.name.as_str())
        .collect();
    vec![
        StudyPhase {
            phase: 1,
            description: format!("Revisit the fundamentals of {}.", focus.join(", ")),
        },
        StudyPhase {
            phase: 2,
            description: "Work targeted exercises on each weak topic until answers come \
                          without notes."
                .to_string(),
        },
        StudyPhase {
            phase: 3,
            description: "Take a timed mixed quiz covering all topics to confirm the gaps \
                          have closed."
                .to_string(),
        },
    ]
}

fn practice_suggestions(report: &GradingReport, weak_points: &[WeakPoint]) -> Vec<String> {
    let mut suggestions = Vec::new();
    for point in weak_points.iter().take(MAX_PRIORITY_TOPICS) {
        let question_type = dominant_low_scoring_type(report, &point.name);
        suggestions.push(format!(
            "Practice more {question_type} questions on {}.",
            point.name
        ));
    }
    if report.average_score < f64::from(LOW_SCORE_CUTOFF) && !report.per_question.is_empty() {
        suggestions
            .push("Re-take the full question bank after working through the plan.".to_string());
    }
    suggestions
}

/// The question type that most often scored poorly on this point.
fn dominant_low_scoring_type(report: &GradingReport, point: &str) -> QuestionType {
    let mut counts: BTreeMap<QuestionType, usize> = BTreeMap::new();
    for grade in &report.per_question {
        if grade.score < LOW_SCORE_CUTOFF
            && grade.knowledge_points.iter().any(|kp| kp == point)
        {
            *counts.entry(grade.question_type).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(question_type, _)| question_type)
        .unwrap_or(QuestionType::ShortAnswer)
}
