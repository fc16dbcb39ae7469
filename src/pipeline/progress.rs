use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use super::{PipelineOutcome, PipelineState};
use crate::technique::{TechniqueId, TechniqueResult};

/// Receives stage lifecycle events from the orchestrator.
pub trait StageObserver: Send + Sync {
    fn pipeline_started(&self, _total: usize) {}
    fn stage_started(&self, _index: usize, _total: usize, _technique: TechniqueId) {}
    fn stage_skipped(&self, _index: usize, _total: usize, _raw: &str) {}
    fn stage_finished(&self, _index: usize, _total: usize, _result: &TechniqueResult) {}
    fn pipeline_finished(&self, _outcome: &PipelineOutcome) {}
}

/// Observer that ignores every event.
pub struct SilentObserver;

impl StageObserver for SilentObserver {}

/// Terminal progress: one overall bar plus a result line per stage.
pub struct ProgressObserver {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn create_bar(total: usize) -> ProgressBar {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        bar.set_style(style);
        // The bar keeps animating while a technique blocks.
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StageObserver for ProgressObserver {
    fn pipeline_started(&self, total: usize) {
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Self::create_bar(total));
    }

    fn stage_started(&self, index: usize, total: usize, technique: TechniqueId) {
        self.with_bar(|bar| {
            bar.set_message(format!(
                "[{}/{}] Running {}",
                index + 1,
                total,
                technique.descriptor().name
            ));
        });
    }

    fn stage_skipped(&self, index: usize, total: usize, raw: &str) {
        self.with_bar(|bar| {
            bar.println(format!("  - [{}/{}] {}: unknown technique, skipped", index + 1, total, raw));
            bar.inc(1);
        });
    }

    fn stage_finished(&self, index: usize, total: usize, result: &TechniqueResult) {
        self.with_bar(|bar| {
            let line = if result.success {
                format!(
                    "  ✓ [{}/{}] {} ({:.1}s)",
                    index + 1,
                    total,
                    result.technique.descriptor().name,
                    result.elapsed.as_secs_f64()
                )
            } else {
                format!(
                    "  ✗ [{}/{}] {}: {}",
                    index + 1,
                    total,
                    result.technique.descriptor().name,
                    result.diagnostic.as_deref().unwrap_or("failed")
                )
            };
            bar.println(line);
            bar.inc(1);
        });
    }

    fn pipeline_finished(&self, outcome: &PipelineOutcome) {
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = guard.take() {
            match outcome.state {
                PipelineState::Completed => bar.finish_with_message("done"),
                PipelineState::Failed => bar.abandon_with_message("no technique succeeded"),
                PipelineState::Interrupted => bar.abandon_with_message("interrupted"),
            }
        }
    }
}
