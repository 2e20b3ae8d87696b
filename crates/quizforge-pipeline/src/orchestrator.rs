//! The orchestrator: run admission, scheduling, persistence.
//!
//! One orchestrator serves many conversations. Per conversation, at most
//! one run executes at a time; a second request while one is in flight is
//! rejected immediately rather than queued. Stale artifacts are
//! invalidated before any stage runs, so a failed run can never leave old
//! and new output mixed.

use crate::advise::derive_advice;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::grade::Grader;
use crate::graph::StageGraph;
use crate::stage::{Stage, StageContext, StageName};
use crate::stages::generation_stages;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use quizforge_model::{AnswerSubmission, BankKey, GradingReport, LearningAdvice, ParseStatus};
use quizforge_services::{KnowledgeSource, LanguageModel, SampleSource};
use quizforge_state::{ArtifactStore, RunState, StoredArtifact};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ulid::Ulid;

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Succeeded,
    Failed(String),
    /// Not executed because an earlier stage failed or the run was
    /// cancelled.
    Skipped,
}

/// Execution record for one stage of one run.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: StageName,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: StageOutcome,
}

/// Summary of one completed generation run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Ulid,
    pub conversation_id: String,
    /// Size of the persisted bank.
    pub question_count: usize,
    pub records: Vec<StageRecord>,
    /// Non-fatal conditions stages recorded, such as coverage gaps left
    /// open after bounded regeneration.
    pub warnings: Vec<String>,
}

/// Removes the conversation's in-flight marker when the run ends, however
/// it ends.
struct RunGuard<'a> {
    in_flight: &'a DashMap<String, Arc<AtomicBool>>,
    conversation_id: String,
    cancel: Arc<AtomicBool>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.conversation_id);
    }
}

/// Drives generation runs, grading, and advice for any number of
/// conversations.
pub struct Orchestrator {
    llm: Arc<dyn LanguageModel>,
    knowledge: Arc<dyn KnowledgeSource>,
    samples: Arc<dyn SampleSource>,
    store: Arc<dyn ArtifactStore>,
    config: PipelineConfig,
    in_flight: DashMap<String, Arc<AtomicBool>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        knowledge: Arc<dyn KnowledgeSource>,
        samples: Arc<dyn SampleSource>,
        store: Arc<dyn ArtifactStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            knowledge,
            samples,
            store,
            config,
            in_flight: DashMap::new(),
        }
    }

    /// Run the full generation pipeline for a conversation.
    ///
    /// Precondition failures are returned before anything is invalidated.
    /// On success the reviewed bank is persisted under both `_generated`
    /// and `_corrected`; it is the bank all later grading reads.
    pub async fn generate(&self, conversation_id: &str) -> Result<PipelineRun, PipelineError> {
        let guard = self.admit(conversation_id)?;
        self.check_samples(conversation_id).await?;

        // Point of no return: stale artifacts for this conversation are
        // gone even if the run fails.
        self.store.invalidate_conversation(conversation_id)?;

        let state = Arc::new(RunState::new());
        let ctx = StageContext {
            conversation_id: conversation_id.to_string(),
            state: Arc::clone(&state),
            llm: Arc::clone(&self.llm),
            knowledge: Arc::clone(&self.knowledge),
            samples: Arc::clone(&self.samples),
            config: self.config.clone(),
        };

        let run_id = Ulid::new();
        tracing::info!(%run_id, conversation_id, "generation run started");
        let records = self
            .execute(&ctx, &StageGraph::generation()?, &guard.cancel)
            .await?;

        // The reviewed bank is authoritative when the review stage produced
        // one; it is persisted under `_generated` either way.
        let authoritative = match state.corrected_bank() {
            Ok(corrected) => {
                self.store.put(
                    &BankKey::corrected(conversation_id),
                    StoredArtifact::Bank(corrected.clone()),
                )?;
                corrected
            }
            Err(_) => state.generated_bank()?,
        };
        let question_count = authoritative.len();
        self.store.put(
            &BankKey::generated(conversation_id),
            StoredArtifact::Bank(authoritative),
        )?;

        let warnings = state.warnings();
        tracing::info!(
            %run_id,
            conversation_id,
            question_count,
            warnings = warnings.len(),
            "generation run finished"
        );
        Ok(PipelineRun {
            run_id,
            conversation_id: conversation_id.to_string(),
            question_count,
            records,
            warnings,
        })
    }

    /// Grade a submission against the conversation's current bank and
    /// persist the report under `_graded`.
    pub async fn grade(
        &self,
        conversation_id: &str,
        submission: &AnswerSubmission,
    ) -> Result<GradingReport, PipelineError> {
        let bank = match self.store.get_bank(&BankKey::corrected(conversation_id))? {
            Some(bank) => bank,
            None => self
                .store
                .get_bank(&BankKey::generated(conversation_id))?
                .ok_or_else(|| PipelineError::BankMissing(conversation_id.to_string()))?,
        };

        let grader = Grader::new(Arc::clone(&self.llm), self.config.clone());
        let report = grader.grade(conversation_id, &bank, submission).await;
        self.store.put(
            &BankKey::graded(conversation_id),
            StoredArtifact::Report(report.clone()),
        )?;
        Ok(report)
    }

    /// Derive learning advice from the conversation's grading report.
    pub fn advise(&self, conversation_id: &str) -> Result<LearningAdvice, PipelineError> {
        let report = self
            .store
            .get_report(&BankKey::graded(conversation_id))?
            .ok_or_else(|| PipelineError::ReportMissing(conversation_id.to_string()))?;
        Ok(derive_advice(&report, self.config.mastery_threshold))
    }

    /// Request cancellation of the conversation's in-flight run. Takes
    /// effect at the next stage boundary. Returns whether a run was
    /// actually in flight.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        match self.in_flight.get(conversation_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Whether a run is currently executing for the conversation.
    #[must_use]
    pub fn is_running(&self, conversation_id: &str) -> bool {
        self.in_flight.contains_key(conversation_id)
    }

    fn admit(&self, conversation_id: &str) -> Result<RunGuard<'_>, PipelineError> {
        match self.in_flight.entry(conversation_id.to_string()) {
            Entry::Occupied(_) => Err(PipelineError::RunAlreadyInProgress(
                conversation_id.to_string(),
            )),
            Entry::Vacant(vacant) => {
                let cancel = Arc::new(AtomicBool::new(false));
                vacant.insert(Arc::clone(&cancel));
                Ok(RunGuard {
                    in_flight: &self.in_flight,
                    conversation_id: conversation_id.to_string(),
                    cancel,
                })
            }
        }
    }

    async fn check_samples(&self, conversation_id: &str) -> Result<(), PipelineError> {
        let docs = self.samples.list_samples(conversation_id).await?;
        if docs.is_empty() {
            return Err(PipelineError::NoSamples(conversation_id.to_string()));
        }
        // One completed, text-bearing sample is enough to proceed; the
        // prepare stage ignores everything else.
        let usable = docs
            .iter()
            .any(|d| d.status == ParseStatus::Completed && d.text.is_some());
        if usable {
            return Ok(());
        }
        if docs
            .iter()
            .any(|d| matches!(d.status, ParseStatus::Pending | ParseStatus::Processing))
        {
            return Err(PipelineError::SamplesPending(conversation_id.to_string()));
        }
        Err(PipelineError::SamplesFailed(conversation_id.to_string()))
    }

    /// Execute the graph wave by wave. Stages within a wave run
    /// concurrently and all finish even if one fails; once a wave carries
    /// a failure, every later stage is recorded as skipped and the first
    /// failure is returned.
    async fn execute(
        &self,
        ctx: &StageContext,
        graph: &StageGraph,
        cancel: &AtomicBool,
    ) -> Result<Vec<StageRecord>, PipelineError> {
        let stages = generation_stages();
        let mut records = Vec::new();
        let mut failure: Option<PipelineError> = None;

        for wave in graph.waves() {
            if failure.is_some() || cancel.load(Ordering::SeqCst) {
                let now = Utc::now();
                records.extend(wave.into_iter().map(|stage| StageRecord {
                    stage,
                    started_at: now,
                    finished_at: now,
                    outcome: StageOutcome::Skipped,
                }));
                continue;
            }

            let running: Vec<&Arc<dyn Stage>> = wave
                .iter()
                .map(|name| {
                    stages
                        .iter()
                        .find(|stage| stage.name() == *name)
                        .expect("every graph node has a stage")
                })
                .collect();

            let outcomes = join_all(running.iter().map(|stage| async {
                let started_at = Utc::now();
                let result = stage.run(ctx).await;
                (stage.name(), started_at, Utc::now(), result)
            }))
            .await;

            for (stage, started_at, finished_at, result) in outcomes {
                let outcome = match result {
                    Ok(()) => StageOutcome::Succeeded,
                    Err(error) => {
                        tracing::error!(%stage, %error, "stage failed");
                        let message = error.to_string();
                        if failure.is_none() {
                            failure = Some(error);
                        }
                        StageOutcome::Failed(message)
                    }
                };
                records.push(StageRecord {
                    stage,
                    started_at,
                    finished_at,
                    outcome,
                });
            }
        }

        if let Some(error) = failure {
            return Err(error);
        }
        if cancel.load(Ordering::SeqCst) {
            return Err(PipelineError::Cancelled(ctx.conversation_id.clone()));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_state::MemoryStore;
    use quizforge_test_utils::{
        completed_sample, exam_text, failed_sample, pending_sample, CannedKnowledge,
        FixedSamples, ScriptedLlm,
    };

    fn orchestrator(llm: ScriptedLlm, samples: FixedSamples) -> Orchestrator {
        Orchestrator::new(
            Arc::new(llm),
            Arc::new(CannedKnowledge::with_points(&["tcp", "routing"])),
            Arc::new(samples),
            Arc::new(MemoryStore::new()),
            PipelineConfig::default().with_target_question_count(2),
        )
    }

    #[tokio::test]
    async fn empty_conversation_is_a_precondition_failure() {
        let orch = orchestrator(ScriptedLlm::new(), FixedSamples::empty());
        let err = orch.generate("conv").await.unwrap_err();
        assert!(matches!(err, PipelineError::NoSamples(_)));
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn pending_parse_wins_over_failed_parse() {
        let orch = orchestrator(
            ScriptedLlm::new(),
            FixedSamples::new(vec![failed_sample("d1"), pending_sample("d2")]),
        );
        let err = orch.generate("conv").await.unwrap_err();
        assert!(matches!(err, PipelineError::SamplesPending(_)));
    }

    #[tokio::test]
    async fn all_failed_parses_reject_the_run() {
        let orch = orchestrator(
            ScriptedLlm::new(),
            FixedSamples::new(vec![failed_sample("d1"), failed_sample("d2")]),
        );
        let err = orch.generate("conv").await.unwrap_err();
        assert!(matches!(err, PipelineError::SamplesFailed(_)));
    }

    #[tokio::test]
    async fn guard_releases_after_a_failed_run() {
        let orch = orchestrator(ScriptedLlm::new(), FixedSamples::empty());
        assert!(orch.generate("conv").await.is_err());
        assert!(!orch.is_running("conv"));
        // A later attempt is admitted again (and fails the same way).
        let err = orch.generate("conv").await.unwrap_err();
        assert!(matches!(err, PipelineError::NoSamples(_)));
    }

    #[tokio::test]
    async fn cancel_without_a_run_is_a_no_op() {
        let orch = orchestrator(ScriptedLlm::new(), FixedSamples::empty());
        assert!(!orch.cancel("conv"));
    }

    #[tokio::test]
    async fn failed_stage_skips_downstream_stages() {
        // LLM never produces a draft, so Generate fails after the first
        // wave of scans succeeded; Review must be skipped.
        let orch = orchestrator(
            ScriptedLlm::new(),
            FixedSamples::new(vec![completed_sample("d1", &exam_text())]),
        );
        let err = orch.generate("conv").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: StageName::Generate,
                ..
            }
        ));
    }
}
