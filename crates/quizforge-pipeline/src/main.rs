//! `quizforge` binary: run the pipeline end to end against built-in demo
//! collaborators, for inspection and smoke testing without live services.

use anyhow::Context;
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, Command};
use quizforge_model::{AnswerSubmission, SampleDoc};
use quizforge_pipeline::{Orchestrator, PipelineConfig};
use quizforge_services::{
    CompletionRequest, KnowledgeReply, KnowledgeSource, LanguageModel, QueryMode, SampleSource,
    ServiceError,
};
use quizforge_state::{ArtifactStore, JsonDirStore, MemoryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEMO_EXAM: &str = "\
Section I: Multiple Choice
1. Which layer of the TCP/IP model handles routing?
A. Application  B. Transport  C. Network  D. Link
Answer: C
2. Which protocol guarantees in-order delivery?
A. UDP  B. TCP  C. ICMP  D. ARP
Answer: B
Section II: Short Answer
3. Explain the purpose of the three-way handshake.
4. Describe how congestion control reacts to packet loss.
";

/// Deterministic stand-in for the model gateway. Tells generation prompts
/// from grading prompts by their requested output shape.
struct DemoLlm {
    drafted: AtomicUsize,
}

#[async_trait]
impl LanguageModel for DemoLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError> {
        if request.prompt.contains("score, feedback") {
            return Ok(
                r#"{"score": 70, "feedback": "covers the main idea", "issues": ["missing detail"]}"#
                    .to_string(),
            );
        }
        let n = self.drafted.fetch_add(1, Ordering::SeqCst) + 1;
        if request.prompt.contains("options") && request.prompt.contains("labeled") {
            Ok(format!(
                r#"{{"stem": "Demo choice question {n}: which protocol applies here?",
                     "options": ["A. TCP", "B. UDP", "C. ICMP", "D. ARP"],
                     "answer": "A",
                     "knowledge_points": ["transport protocols"]}}"#
            ))
        } else {
            Ok(format!(
                r#"{{"stem": "Demo question {n}: explain the relevant mechanism.",
                     "answer": "A reference answer describing the mechanism.",
                     "knowledge_points": ["congestion control"]}}"#
            ))
        }
    }
}

struct DemoKnowledge;

#[async_trait]
impl KnowledgeSource for DemoKnowledge {
    async fn query(
        &self,
        _conversation_id: &str,
        _text: &str,
        _mode: QueryMode,
    ) -> Result<KnowledgeReply, ServiceError> {
        Ok(KnowledgeReply {
            snippets: vec!["TCP provides reliable, in-order delivery.".to_string()],
            knowledge_points: vec![
                "transport protocols".to_string(),
                "congestion control".to_string(),
            ],
        })
    }
}

struct DemoSamples;

#[async_trait]
impl SampleSource for DemoSamples {
    async fn list_samples(&self, _conversation_id: &str) -> Result<Vec<SampleDoc>, ServiceError> {
        Ok(vec![SampleDoc::completed("demo-exam", DEMO_EXAM)])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Command::new("quizforge")
        .version(quizforge_pipeline::VERSION)
        .about("Question bank generation and grading pipeline")
        .subcommand_required(true)
        .subcommand(
            Command::new("demo")
                .about("Run generate, grade, and advise against built-in demo services")
                .arg(
                    Arg::new("questions")
                        .long("questions")
                        .default_value("6")
                        .value_parser(value_parser!(usize))
                        .help("Target question count"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .help("Directory to persist artifacts as JSON (in-memory if omitted)"),
                )
                .arg(
                    Arg::new("skip-grading")
                        .long("skip-grading")
                        .action(ArgAction::SetTrue)
                        .help("Stop after generation"),
                ),
        );

    match cli.get_matches().subcommand() {
        Some(("demo", args)) => {
            let questions = *args.get_one::<usize>("questions").unwrap();
            let store: Arc<dyn ArtifactStore> = match args.get_one::<String>("out") {
                Some(dir) => Arc::new(JsonDirStore::open(dir).context("opening artifact dir")?),
                None => Arc::new(MemoryStore::new()),
            };
            run_demo(questions, store, args.get_flag("skip-grading")).await
        }
        _ => unreachable!("subcommand required"),
    }
}

async fn run_demo(
    questions: usize,
    store: Arc<dyn ArtifactStore>,
    skip_grading: bool,
) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(
        Arc::new(DemoLlm {
            drafted: AtomicUsize::new(0),
        }),
        Arc::new(DemoKnowledge),
        Arc::new(DemoSamples),
        store,
        PipelineConfig::default().with_target_question_count(questions),
    );

    let conversation = "demo";
    let run = orchestrator.generate(conversation).await?;
    println!("run {} completed with {} questions:", run.run_id, run.question_count);
    for record in &run.records {
        println!(
            "  {:<15} {:?} ({} ms)",
            record.stage.to_string(),
            record.outcome,
            (record.finished_at - record.started_at).num_milliseconds()
        );
    }
    for warning in &run.warnings {
        println!("  warning: {warning}");
    }

    if skip_grading {
        return Ok(());
    }

    let submission = AnswerSubmission::from_pairs([
        ("Q1", "A"),
        ("Q2", "B"),
        ("Q3", "The handshake synchronizes sequence numbers before data flows."),
    ]);
    let report = orchestrator.grade(conversation, &submission).await?;
    println!("\naverage score: {:.1}", report.average_score);
    println!("{}", serde_json::to_string_pretty(&report)?);

    let advice = orchestrator.advise(conversation)?;
    println!("\n{}", serde_json::to_string_pretty(&advice)?);
    Ok(())
}
