//! Analysis orchestrator — runs the two-stage pipeline and owns the session.
//!
//! Flow: skills prompt → model → normalize → repair → validate(skills) →
//!       boolean prompt (embedding the validated skills) → model →
//!       normalize → repair → validate(booleanSearches) → merge → persist.
//!
//! Stages run strictly in sequence; any stage error aborts the run, moves the
//! stage to `Failed`, and leaves the previously completed result untouched.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::normalizer::{normalize, NormalizationError};
use crate::analysis::prompts::{BOOLEAN_PROMPT_TEMPLATE, SKILLS_PROMPT_TEMPLATE};
use crate::analysis::repair::{repair, RepairError};
use crate::analysis::schema::{validate, Shape, ValidationError};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{GatewayError, ModelGateway};
use crate::models::analysis::{AnalysisResult, PipelineStage, SessionSnapshot, SkillsReport};
use crate::storage::AnalysisStore;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job description is empty")]
    InputEmpty,

    #[error("an analysis run is already in progress")]
    RunInProgress,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Repair(#[from] RepairError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to encode skills for the boolean-search prompt: {0}")]
    PromptEncoding(#[from] serde_json::Error),
}

impl PipelineError {
    /// Which step of a stage produced the error, for logs.
    pub fn step(&self) -> &'static str {
        match self {
            PipelineError::Gateway(e) if e.is_transport() => "model call",
            PipelineError::Gateway(_) => "model response",
            PipelineError::Normalization(_) => "normalize",
            PipelineError::Repair(_) => "repair",
            PipelineError::Validation(_) => "validate",
            PipelineError::PromptEncoding(_) => "prompt build",
            PipelineError::InputEmpty | PipelineError::RunInProgress => "admission",
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    job_description: Option<String>,
    result: Option<Arc<AnalysisResult>>,
}

/// Sequences the analysis stages. Share it as `Arc<AnalysisOrchestrator>`.
pub struct AnalysisOrchestrator {
    gateway: Arc<dyn ModelGateway>,
    store: Arc<dyn AnalysisStore>,
    stage_tx: watch::Sender<PipelineStage>,
    session: RwLock<Session>,
    /// Held for the whole run; a second caller gets `RunInProgress`.
    run_guard: Mutex<()>,
}

impl AnalysisOrchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>, store: Arc<dyn AnalysisStore>) -> Self {
        let (stage_tx, _) = watch::channel(PipelineStage::Idle);
        Self {
            gateway,
            store,
            stage_tx,
            session: RwLock::new(Session::default()),
            run_guard: Mutex::new(()),
        }
    }

    /// Loads the last input and result from the store. A failing store
    /// leaves the session empty.
    pub async fn restore(&self) {
        match self.store.load().await {
            Ok(stored) => {
                info!(
                    "Restored session (input: {}, result: {})",
                    stored.last_input.is_some(),
                    stored.last_result.is_some()
                );
                let mut session = self.session.write().await;
                session.job_description = stored.last_input;
                session.result = stored.last_result.map(Arc::new);
            }
            Err(e) => warn!("Could not restore session, starting empty: {e:#}"),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        *self.stage_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStage> {
        self.stage_tx.subscribe()
    }

    pub async fn session(&self) -> SessionSnapshot {
        let session = self.session.read().await;
        SessionSnapshot {
            job_description: session.job_description.clone(),
            result: session.result.clone(),
            stage: self.stage(),
        }
    }

    /// Accepts a job description captured outside the pipeline (e.g. a text
    /// selection) as the current input without running an analysis.
    pub async fn accept_selection(&self, text: &str) -> Result<(), PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::InputEmpty);
        }
        let _guard = self
            .run_guard
            .try_lock()
            .map_err(|_| PipelineError::RunInProgress)?;

        self.remember_input(text).await;
        info!("Accepted captured job description ({} chars)", text.len());
        Ok(())
    }

    /// Clears the stored input and result and returns the stage to `Idle`.
    pub async fn reset(&self) -> Result<(), PipelineError> {
        let _guard = self
            .run_guard
            .try_lock()
            .map_err(|_| PipelineError::RunInProgress)?;

        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear stored session: {e:#}");
        }
        *self.session.write().await = Session::default();
        self.advance(PipelineStage::Idle);
        info!("Session reset");
        Ok(())
    }

    /// Runs the full pipeline for one job description.
    pub async fn run(&self, job_description: &str) -> Result<Arc<AnalysisResult>, PipelineError> {
        let job_description = job_description.trim();
        if job_description.is_empty() {
            return Err(PipelineError::InputEmpty);
        }

        let _guard = self
            .run_guard
            .try_lock()
            .map_err(|_| PipelineError::RunInProgress)?;

        let run_id = Uuid::new_v4();
        let _abandoned = AbandonedRunGuard {
            run_id,
            stage_tx: &self.stage_tx,
        };
        info!(
            "Run {run_id}: analyzing job description ({} chars)",
            job_description.len()
        );
        self.remember_input(job_description).await;

        match self.run_stages(run_id, job_description).await {
            Ok(result) => {
                let result = Arc::new(result);
                if let Err(e) = self.store.save_result(&result).await {
                    warn!("Run {run_id}: failed to persist result: {e:#}");
                }
                self.session.write().await.result = Some(Arc::clone(&result));
                self.advance(PipelineStage::Complete);
                info!(
                    "Run {run_id}: complete with {} skills",
                    result.skills.len()
                );
                Ok(result)
            }
            Err(e) => {
                let failed_during = self.stage();
                self.advance(PipelineStage::Failed);
                warn!(
                    "Run {run_id}: {} step failed during {failed_during:?}: {e}",
                    e.step()
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        job_description: &str,
    ) -> Result<AnalysisResult, PipelineError> {
        // Stage 1: skills
        self.advance(PipelineStage::SkillsInFlight);
        let parsed = self.complete_json(&build_skills_prompt(job_description)).await?;
        let report = validate(&parsed, Shape::Skills)?.into_skills()?;
        info!(
            "Run {run_id}: extracted {} skills, {} red flags",
            report.key_skills.len(),
            report.red_flags.len()
        );

        // Stage 2: boolean searches, built from the validated skills only
        self.advance(PipelineStage::BooleanInFlight);
        let parsed = self.complete_json(&build_boolean_prompt(&report)?).await?;
        let boolean_searches =
            validate(&parsed, Shape::BooleanSearches)?.into_boolean_searches()?;

        Ok(AnalysisResult::merge(run_id, report, boolean_searches))
    }

    async fn complete_json(&self, prompt: &str) -> Result<Value, PipelineError> {
        let raw = self.gateway.complete(prompt).await?;
        parse_model_output(&raw)
    }

    async fn remember_input(&self, job_description: &str) {
        self.session.write().await.job_description = Some(job_description.to_string());
        if let Err(e) = self.store.save_input(job_description).await {
            warn!("Failed to persist job description: {e:#}");
        }
    }

    fn advance(&self, stage: PipelineStage) {
        let previous = self.stage_tx.send_replace(stage);
        debug!("Pipeline stage {previous:?} -> {stage:?}");
    }
}

/// Marks a run `Failed` when its future is dropped mid-stage, e.g. when the
/// HTTP client disconnects before the pipeline finishes.
struct AbandonedRunGuard<'a> {
    run_id: Uuid,
    stage_tx: &'a watch::Sender<PipelineStage>,
}

impl Drop for AbandonedRunGuard<'_> {
    fn drop(&mut self) {
        let in_flight = self.stage_tx.borrow().is_in_flight();
        if in_flight {
            warn!("Run {}: dropped while in flight, marking failed", self.run_id);
            self.stage_tx.send_replace(PipelineStage::Failed);
        }
    }
}

/// Raw model text → parsed JSON value, via normalize and repair.
pub fn parse_model_output(raw: &str) -> Result<Value, PipelineError> {
    let normalized = normalize(raw)?;
    let repaired = repair(&normalized)?;
    serde_json::from_str(&repaired)
        .map_err(|e| PipelineError::Repair(RepairError::UnrepairableStructure(e.to_string())))
}

fn build_skills_prompt(job_description: &str) -> String {
    SKILLS_PROMPT_TEMPLATE
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
        .replace("{job_description}", job_description)
}

fn build_boolean_prompt(report: &SkillsReport) -> Result<String, PipelineError> {
    let skills_json = serde_json::to_string_pretty(report)?;
    Ok(BOOLEAN_PROMPT_TEMPLATE
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
        .replace("{skills_json}", &skills_json))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
