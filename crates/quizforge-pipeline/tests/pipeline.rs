//! End-to-end pipeline behavior over scripted collaborators.

use async_trait::async_trait;
use quizforge_model::{AnswerSubmission, BankKey, QuestionId};
use quizforge_pipeline::{Orchestrator, PipelineConfig, PipelineError, StageName, StageOutcome};
use quizforge_services::{CompletionRequest, LanguageModel, ServiceError};
use quizforge_state::{ArtifactStore, MemoryStore, StoredArtifact};
use quizforge_test_utils::{
    completed_sample, exam_text, pending_sample, small_bank, CannedKnowledge, FixedSamples,
    ScriptedLlm,
};
use std::sync::Arc;
use std::time::Duration;

fn choice_draft(n: usize, point: &str) -> String {
    format!(
        r#"{{"stem": "Scripted choice question number {n} about {point} internals",
             "options": ["A. first", "B. second", "C. third", "D. fourth"],
             "answer": "A",
             "knowledge_points": ["{point}"]}}"#
    )
}

fn short_draft(n: usize, point: &str) -> String {
    format!(
        r#"{{"stem": "Scripted short answer prompt number {n} covering {point} behavior",
             "answer": "A scripted reference answer for {point}.",
             "knowledge_points": ["{point}"]}}"#
    )
}

/// LLM scripted for one full 4-question generation run over `exam_text()`:
/// the blueprint yields three choice slots and one short-answer slot.
fn generation_llm() -> ScriptedLlm {
    ScriptedLlm::new()
        .reply(choice_draft(1, "tcp"))
        .reply(choice_draft(2, "routing"))
        .reply(choice_draft(3, "tcp"))
        .reply(short_draft(4, "routing"))
}

fn orchestrator_with(
    llm: impl LanguageModel + 'static,
    store: Arc<MemoryStore>,
) -> Orchestrator {
    Orchestrator::new(
        Arc::new(llm),
        Arc::new(CannedKnowledge::with_points(&["tcp", "routing"])),
        Arc::new(FixedSamples::new(vec![completed_sample(
            "d1",
            &exam_text(),
        )])),
        store,
        PipelineConfig::default().with_target_question_count(4),
    )
}

#[tokio::test]
async fn generation_persists_both_banks() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator_with(generation_llm(), store.clone());

    let run = orch.generate("conv").await.unwrap();

    assert_eq!(run.question_count, 4);
    assert_eq!(run.records.len(), StageName::GENERATION.len());
    assert!(run
        .records
        .iter()
        .all(|r| r.outcome == StageOutcome::Succeeded));

    // The reviewed bank is authoritative and lands under both suffixes.
    let generated = store.get_bank(&BankKey::generated("conv")).unwrap().unwrap();
    let corrected = store.get_bank(&BankKey::corrected("conv")).unwrap().unwrap();
    assert_eq!(generated.len(), 4);
    assert_eq!(corrected.len(), 4);
    assert_eq!(generated.questions[0].id, QuestionId::generated(1));
    assert_eq!(generated.questions[3].id, QuestionId::generated(4));
    assert_eq!(generated.source_fingerprint, corrected.source_fingerprint);
    assert!(run.warnings.is_empty());
}

#[tokio::test]
async fn a_completed_sample_unblocks_generation_despite_pending_uploads() {
    let store = Arc::new(MemoryStore::new());
    let orch = Orchestrator::new(
        Arc::new(generation_llm()),
        Arc::new(CannedKnowledge::with_points(&["tcp", "routing"])),
        Arc::new(FixedSamples::new(vec![
            completed_sample("d1", &exam_text()),
            pending_sample("d2"),
        ])),
        store.clone(),
        PipelineConfig::default().with_target_question_count(4),
    );

    // The pending upload must not block the run: one completed sample is
    // enough, and prepare only reads completed documents.
    let run = orch.generate("conv").await.unwrap();
    assert_eq!(run.question_count, 4);
    assert!(store.get_bank(&BankKey::generated("conv")).unwrap().is_some());
}

#[tokio::test]
async fn unfilled_coverage_gaps_surface_as_run_warnings() {
    let store = Arc::new(MemoryStore::new());
    // "congestion control" never appears in a draft's tags and the script
    // has nothing left for gap filling.
    let orch = Orchestrator::new(
        Arc::new(generation_llm()),
        Arc::new(CannedKnowledge::with_points(&[
            "tcp",
            "routing",
            "congestion control",
        ])),
        Arc::new(FixedSamples::new(vec![completed_sample(
            "d1",
            &exam_text(),
        )])),
        store.clone(),
        PipelineConfig::default().with_target_question_count(4),
    );

    let run = orch.generate("conv").await.unwrap();

    // Every knowledge point is either tagged in the bank or named in a
    // warning on the run.
    let bank = store.get_bank(&BankKey::generated("conv")).unwrap().unwrap();
    for point in ["tcp", "routing", "congestion control"] {
        let tagged = bank
            .questions
            .iter()
            .any(|q| q.knowledge_points.iter().any(|kp| kp == point));
        let warned = run.warnings.iter().any(|w| w.contains(point));
        assert!(tagged || warned, "{point} is neither covered nor warned about");
    }
    assert!(run
        .warnings
        .iter()
        .any(|w| w.contains("congestion control")));
}

#[tokio::test]
async fn concurrent_runs_admit_exactly_one() {
    /// Delays each completion so the first run is still in flight when the
    /// second is admitted.
    struct SlowLlm(ScriptedLlm);

    #[async_trait]
    impl LanguageModel for SlowLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.complete(request).await
        }
    }

    let store = Arc::new(MemoryStore::new());
    let orch = Arc::new(orchestrator_with(SlowLlm(generation_llm()), store));

    let (first, second) = tokio::join!(orch.generate("conv"), orch.generate("conv"));

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(PipelineError::RunAlreadyInProgress(_))
    ));
    // The guard is gone once the winning run finishes.
    assert!(!orch.is_running("conv"));
}

#[tokio::test]
async fn cancellation_takes_effect_at_the_next_stage_boundary() {
    use tokio::sync::watch;

    /// Signals when the first completion is requested, then holds every
    /// call until the test opens the gate.
    struct GatedLlm {
        inner: ScriptedLlm,
        entered: watch::Sender<bool>,
        gate: watch::Receiver<bool>,
    }

    #[async_trait]
    impl LanguageModel for GatedLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError> {
            self.entered.send_replace(true);
            let mut gate = self.gate.clone();
            while !*gate.borrow() {
                gate.changed().await.expect("gate outlives the run");
            }
            self.inner.complete(request).await
        }
    }

    let (entered_tx, mut entered_rx) = watch::channel(false);
    let (gate_tx, gate_rx) = watch::channel(false);
    let store = Arc::new(MemoryStore::new());
    let orch = Arc::new(orchestrator_with(
        GatedLlm {
            inner: generation_llm(),
            entered: entered_tx,
            gate: gate_rx,
        },
        store.clone(),
    ));

    let run = tokio::spawn({
        let orch = Arc::clone(&orch);
        async move { orch.generate("conv").await }
    });

    // Wait until drafting is in flight, cancel, then let the stage finish.
    entered_rx.changed().await.unwrap();
    assert!(orch.cancel("conv"));
    gate_tx.send_replace(true);

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled(_)));
    // Nothing was persisted and the conversation lock is released.
    assert!(store.get_bank(&BankKey::generated("conv")).unwrap().is_none());
    assert!(store.get_bank(&BankKey::corrected("conv")).unwrap().is_none());
    assert!(!orch.is_running("conv"));
}

#[tokio::test]
async fn runs_against_different_conversations_do_not_block_each_other() {
    let store = Arc::new(MemoryStore::new());
    // Enough scripted drafts for two full runs.
    let llm = ScriptedLlm::new()
        .reply(choice_draft(1, "tcp"))
        .reply(choice_draft(2, "routing"))
        .reply(choice_draft(3, "tcp"))
        .reply(short_draft(4, "routing"))
        .reply(choice_draft(5, "tcp"))
        .reply(choice_draft(6, "routing"))
        .reply(choice_draft(7, "tcp"))
        .reply(short_draft(8, "routing"));
    let orch = Arc::new(orchestrator_with(llm, store));

    let (a, b) = tokio::join!(orch.generate("conv-a"), orch.generate("conv-b"));
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn failed_run_still_invalidates_stale_artifacts() {
    let store = Arc::new(MemoryStore::new());
    store
        .put(
            &BankKey::generated("conv"),
            StoredArtifact::Bank(small_bank()),
        )
        .unwrap();

    // Empty script: generation fails mid-run, after invalidation.
    let orch = orchestrator_with(ScriptedLlm::new(), store.clone());
    let err = orch.generate("conv").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Stage {
            stage: StageName::Generate,
            ..
        }
    ));

    assert!(store.get_bank(&BankKey::generated("conv")).unwrap().is_none());
}

#[tokio::test]
async fn precondition_failures_leave_the_store_untouched() {
    let store = Arc::new(MemoryStore::new());
    store
        .put(
            &BankKey::generated("conv"),
            StoredArtifact::Bank(small_bank()),
        )
        .unwrap();

    let orch = Orchestrator::new(
        Arc::new(ScriptedLlm::new()),
        Arc::new(CannedKnowledge::with_points(&[])),
        Arc::new(FixedSamples::empty()),
        store.clone(),
        PipelineConfig::default(),
    );

    let err = orch.generate("conv").await.unwrap_err();
    assert!(err.is_precondition());
    assert!(store.get_bank(&BankKey::generated("conv")).unwrap().is_some());
}

#[tokio::test]
async fn regeneration_assigns_a_fresh_id_space() {
    let store = Arc::new(MemoryStore::new());
    let llm = ScriptedLlm::new()
        .reply(choice_draft(1, "tcp"))
        .reply(choice_draft(2, "routing"))
        .reply(choice_draft(3, "tcp"))
        .reply(short_draft(4, "routing"))
        // Second run: first slot fails both attempts, so the bank shrinks
        // but ids restart at GEN_001.
        .reply("garbage")
        .reply("garbage")
        .reply(choice_draft(5, "routing"))
        .reply(choice_draft(6, "tcp"))
        .reply(short_draft(7, "routing"));
    let orch = orchestrator_with(llm, store.clone());

    orch.generate("conv").await.unwrap();
    let first = store.get_bank(&BankKey::generated("conv")).unwrap().unwrap();
    orch.generate("conv").await.unwrap();
    let second = store.get_bank(&BankKey::generated("conv")).unwrap().unwrap();

    assert_eq!(first.len(), 4);
    assert_eq!(second.len(), 3);
    assert_eq!(second.questions[0].id, QuestionId::generated(1));
}

#[tokio::test]
async fn grading_covers_every_bank_question() {
    let store = Arc::new(MemoryStore::new());
    store
        .put(
            &BankKey::generated("conv"),
            StoredArtifact::Bank(small_bank()),
        )
        .unwrap();
    // Empty script: subjective answers grade by the deterministic fallback.
    let orch = orchestrator_with(ScriptedLlm::new(), store);

    let submission = AnswerSubmission::from_pairs([
        ("Q001", "A"),
        ("Q2", "C"),
        ("Q999", "never lands anywhere"),
    ]);
    let report = orch.grade("conv", &submission).await.unwrap();

    assert_eq!(report.per_question.len(), 3);
    assert_eq!(report.per_question[0].score, 100);
    assert_eq!(report.per_question[1].score, 0);
    // GEN_003 was never answered.
    assert_eq!(report.per_question[2].score, 0);
    assert_eq!(report.per_question[2].feedback, "no answer");
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Q999"));
}

#[tokio::test]
async fn grade_prefers_the_corrected_bank() {
    let store = Arc::new(MemoryStore::new());
    let mut corrected = small_bank();
    corrected.questions.truncate(1);
    store
        .put(
            &BankKey::generated("conv"),
            StoredArtifact::Bank(small_bank()),
        )
        .unwrap();
    store
        .put(&BankKey::corrected("conv"), StoredArtifact::Bank(corrected))
        .unwrap();
    let orch = orchestrator_with(ScriptedLlm::new(), store);

    let report = orch
        .grade("conv", &AnswerSubmission::from_pairs([("Q1", "A")]))
        .await
        .unwrap();
    assert_eq!(report.per_question.len(), 1);
}

#[tokio::test]
async fn grading_without_a_bank_is_rejected() {
    let orch = orchestrator_with(ScriptedLlm::new(), Arc::new(MemoryStore::new()));
    let err = orch
        .grade("conv", &AnswerSubmission::from_pairs([("Q1", "A")]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::BankMissing(_)));
}

#[tokio::test]
async fn advice_follows_grading() {
    let store = Arc::new(MemoryStore::new());
    store
        .put(
            &BankKey::generated("conv"),
            StoredArtifact::Bank(small_bank()),
        )
        .unwrap();
    let orch = orchestrator_with(ScriptedLlm::new(), store);

    // Before grading: no report to advise from.
    assert!(matches!(
        orch.advise("conv"),
        Err(PipelineError::ReportMissing(_))
    ));

    // Answer one choice correctly, miss the other, skip the short answer.
    let submission = AnswerSubmission::from_pairs([("Q1", "A"), ("Q2", "D")]);
    orch.grade("conv", &submission).await.unwrap();

    let advice = orch.advise("conv").unwrap();
    // Both fixture knowledge points score below the mastery threshold.
    assert!(advice
        .weak_points
        .iter()
        .any(|p| p.name == "congestion control"));
    assert_eq!(advice.study_plan.len(), 3);
    assert!(!advice.practice_suggestions.is_empty());
}
