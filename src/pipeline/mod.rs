//! Sequential technique pipeline.
//!
//! Stages run strictly in order against one fixed output path. The input of
//! each stage is an accumulator that only moves to the output path after a
//! stage succeeds, so a failed stage hands its own input to the next one.

pub mod progress;

#[cfg(test)]
mod tests;

pub use progress::{ProgressObserver, SilentObserver, StageObserver};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ErrorCode, ObfusError};
use crate::technique::{StageToken, TechniqueId, TechniqueInvoker, TechniqueResult, TechniqueSelection};

/// One run's worth of validated input. Not modified once built.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub selection: TechniqueSelection,
    /// Artifact handed to the first stage.
    pub input: PathBuf,
    /// Workspace holding every artifact of the run.
    pub workspace: PathBuf,
    pub output_name: String,
    pub timeout: Duration,
}

impl PipelineRequest {
    pub fn output_path(&self) -> PathBuf {
        self.workspace.join(&self.output_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Completed,
    Failed,
    Interrupted,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Completed => write!(f, "completed"),
            PipelineState::Failed => write!(f, "failed"),
            PipelineState::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub results: Vec<TechniqueResult>,
    /// Unknown identifiers that were skipped.
    pub skipped: Vec<String>,
    pub successful: Vec<TechniqueId>,
    /// Final artifact, present only if it exists on disk.
    pub artifact: Option<PathBuf>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Completed
    }

    pub fn failures(&self) -> impl Iterator<Item = &TechniqueResult> {
        self.results.iter().filter(|result| !result.success)
    }

    /// The final artifact, or the error that ends the run.
    pub fn into_artifact(self) -> Result<PathBuf, ObfusError> {
        match (self.state, self.artifact) {
            (PipelineState::Completed, Some(path)) => Ok(path),
            (PipelineState::Interrupted, _) => Err(ObfusError::pipeline(
                ErrorCode::PIPELINE_INTERRUPTED,
                "interrupted before all techniques ran",
            )),
            (_, None) if !self.successful.is_empty() => Err(ObfusError::pipeline(
                ErrorCode::PIPELINE_MISSING_ARTIFACT,
                "final artifact is missing",
            )),
            _ => Err(ObfusError::pipeline(
                ErrorCode::PIPELINE_NO_SUCCESS,
                "no technique succeeded",
            )),
        }
    }
}

/// Input for the stage after `result`: the output path if it succeeded,
/// otherwise the unchanged current input.
pub fn next_input(current: PathBuf, result: &TechniqueResult, output: &Path) -> PathBuf {
    if result.success {
        output.to_path_buf()
    } else {
        current
    }
}

/// Whether two paths name the same file, following `..` and symlinks.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub struct PipelineOrchestrator<'a> {
    invoker: &'a TechniqueInvoker,
    observer: Box<dyn StageObserver + 'a>,
    interrupted: Arc<AtomicBool>,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(invoker: &'a TechniqueInvoker) -> Self {
        Self {
            invoker,
            observer: Box::new(SilentObserver),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn StageObserver + 'a>) -> Self {
        self.observer = observer;
        self
    }

    /// Flag checked at every stage boundary.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub async fn run(&self, request: &PipelineRequest) -> PipelineOutcome {
        let output = request.output_path();
        let stages = request.selection.stages();
        let total = stages.len();

        // A leftover artifact from an earlier run would satisfy the output check.
        if output.exists() && !same_file(&output, &request.input) {
            tracing::debug!("Removing previous artifact {}", output.display());
            if let Err(err) = std::fs::remove_file(&output) {
                tracing::warn!("Could not remove previous artifact {}: {}", output.display(), err);
            }
        }

        tracing::info!(
            techniques = %request.selection,
            input = %request.input.display(),
            output = %output.display(),
            "Starting pipeline"
        );
        self.observer.pipeline_started(total);

        let mut current_input = request.input.clone();
        let mut results = Vec::with_capacity(total);
        let mut skipped = Vec::new();
        let mut interrupted = false;

        for (index, stage) in stages.iter().enumerate() {
            if self.is_interrupted() {
                tracing::warn!("Interrupt received, stopping before stage {}", index + 1);
                interrupted = true;
                break;
            }

            let id = match stage {
                StageToken::Known(id) => *id,
                StageToken::Unknown(raw) => {
                    tracing::warn!(technique = raw.as_str(), "Skipping unknown technique");
                    self.observer.stage_skipped(index, total, raw);
                    skipped.push(raw.clone());
                    continue;
                }
            };

            self.observer.stage_started(index, total, id);
            let result = self
                .invoker
                .run_technique(id.descriptor(), &current_input, &output, request.timeout)
                .await;

            if result.success {
                tracing::info!(
                    technique = id.as_str(),
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "Technique succeeded"
                );
            } else {
                tracing::warn!(
                    technique = id.as_str(),
                    reason = result.diagnostic.as_deref().unwrap_or("unknown"),
                    "Technique failed"
                );
            }
            self.observer.stage_finished(index, total, &result);

            current_input = next_input(current_input, &result, &output);
            results.push(result);
        }

        if self.is_interrupted() {
            interrupted = true;
        }

        let successful: Vec<TechniqueId> = results
            .iter()
            .filter(|result| result.success)
            .map(|result| result.technique)
            .collect();
        let artifact = output.is_file().then_some(output);

        let state = if interrupted {
            PipelineState::Interrupted
        } else if artifact.is_some() && !successful.is_empty() {
            PipelineState::Completed
        } else {
            PipelineState::Failed
        };

        let outcome = PipelineOutcome {
            state,
            results,
            skipped,
            successful,
            artifact,
        };
        tracing::info!(
            state = %outcome.state,
            succeeded = outcome.successful.len(),
            "Pipeline finished"
        );
        self.observer.pipeline_finished(&outcome);
        outcome
    }
}
