//! Quizforge data model
//!
//! Defines the artifacts exchanged between pipeline stages:
//! - Questions and question banks
//! - Answer submissions
//! - Grading reports and learning advice
//! - Analysis artifacts (knowledge points, distributions, sample structure)
//!
//! Everything here is plain serializable data; behavior lives in the
//! pipeline crate.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod analysis;
pub mod question;
pub mod report;
pub mod submission;

pub use analysis::{
    DifficultyDistribution, KnowledgePoint, NumberingStyle, ParseStatus, SampleDoc,
    SampleStructure, TypeDistribution,
};
pub use question::{
    fingerprint, BankKey, BankSuffix, Difficulty, Question, QuestionBank, QuestionId,
    QuestionType,
};
pub use report::{
    GradingReport, LearningAdvice, MasteryStat, PriorityTopic, QuestionGrade, StudyPhase,
    WeakPoint,
};
pub use submission::{AnswerSubmission, SubmissionId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
