//! Testing utilities for the Quizforge workspace.
//!
//! Scripted fakes for the three external services, plus fixtures for
//! sample documents and question banks.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use quizforge_model::{
    Difficulty, ParseStatus, Question, QuestionBank, QuestionId, QuestionType, SampleDoc,
};
use quizforge_services::{
    CompletionRequest, KnowledgeReply, KnowledgeSource, LanguageModel, QueryMode, SampleSource,
    ServiceError,
};
use std::collections::VecDeque;

/// Language model fake that replays a queue of scripted replies.
///
/// Each `complete` call pops the front of the queue; an empty queue yields
/// [`ServiceError::Unavailable`] so a test that under-scripts fails loudly.
/// Every received request is recorded for assertion.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn fail(self, error: ServiceError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Unavailable("script exhausted".to_string())))
    }
}

/// Knowledge source fake that returns one canned reply for every query.
#[derive(Debug)]
pub struct CannedKnowledge {
    reply: KnowledgeReply,
    queries: Mutex<Vec<(String, QueryMode)>>,
}

impl CannedKnowledge {
    #[must_use]
    pub fn new(reply: KnowledgeReply) -> Self {
        Self {
            reply,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Canned reply listing the given knowledge points with no snippets.
    #[must_use]
    pub fn with_points(points: &[&str]) -> Self {
        Self::new(KnowledgeReply {
            snippets: Vec::new(),
            knowledge_points: points.iter().map(|p| (*p).to_string()).collect(),
        })
    }

    /// Query texts received so far, in call order.
    pub fn queries(&self) -> Vec<(String, QueryMode)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl KnowledgeSource for CannedKnowledge {
    async fn query(
        &self,
        _conversation_id: &str,
        text: &str,
        mode: QueryMode,
    ) -> Result<KnowledgeReply, ServiceError> {
        self.queries.lock().push((text.to_string(), mode));
        Ok(self.reply.clone())
    }
}

/// Sample source fake returning a fixed document list.
#[derive(Debug, Default)]
pub struct FixedSamples {
    docs: Vec<SampleDoc>,
}

impl FixedSamples {
    #[must_use]
    pub fn new(docs: Vec<SampleDoc>) -> Self {
        Self { docs }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SampleSource for FixedSamples {
    async fn list_samples(&self, _conversation_id: &str) -> Result<Vec<SampleDoc>, ServiceError> {
        Ok(self.docs.clone())
    }
}

/// A fully parsed sample document.
pub fn completed_sample(id: &str, text: &str) -> SampleDoc {
    SampleDoc::completed(id, text)
}

/// A sample document still being parsed.
pub fn pending_sample(id: &str) -> SampleDoc {
    SampleDoc::with_status(id, ParseStatus::Processing)
}

/// A sample document whose parse failed.
pub fn failed_sample(id: &str) -> SampleDoc {
    SampleDoc::with_status(id, ParseStatus::Failed)
}

/// A plausible exam excerpt exercising two question sections.
pub fn exam_text() -> String {
    concat!(
        "Section I: Multiple Choice\n",
        "1. Which layer of the TCP/IP model handles routing?\n",
        "A. Application  B. Transport  C. Network  D. Link\n",
        "Answer: C\n",
        "2. Which protocol guarantees in-order delivery?\n",
        "A. UDP  B. TCP  C. ICMP  D. ARP\n",
        "Answer: B\n",
        "Section II: Short Answer\n",
        "3. Explain the purpose of the three-way handshake.\n",
    )
    .to_string()
}

/// Build a small single-choice question for fixtures.
pub fn choice_question(ordinal: usize, answer: &str, points: &[&str]) -> Question {
    Question::new(
        QuestionId::generated(ordinal),
        format!("Placeholder stem {ordinal}"),
        QuestionType::SingleChoice,
        answer,
        Difficulty::Medium,
    )
    .with_options(vec![
        "A. first".to_string(),
        "B. second".to_string(),
        "C. third".to_string(),
        "D. fourth".to_string(),
    ])
    .with_knowledge_points(points.iter().map(|p| (*p).to_string()).collect())
}

/// A three-question bank covering two knowledge points.
pub fn small_bank() -> QuestionBank {
    QuestionBank::new(
        vec![
            choice_question(1, "A", &["TCP handshake"]),
            choice_question(2, "B", &["TCP handshake"]),
            Question::new(
                QuestionId::generated(3),
                "Explain congestion control in TCP.",
                QuestionType::ShortAnswer,
                "Discusses slow start and congestion avoidance.",
                Difficulty::Hard,
            )
            .with_knowledge_points(vec!["congestion control".to_string()]),
        ],
        "fixture",
    )
}
