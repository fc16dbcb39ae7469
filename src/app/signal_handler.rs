use anyhow::Result;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// What the handler does with one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Raise the flag; the pipeline stops at the next stage boundary.
    StopAfterStage,
    Exit,
}

/// Interrupt state shared between the signal thread and the run.
///
/// Outside the pipeline (prompts, environment check, presentation) a signal
/// exits at once, since a blocking stdin read would never look at the flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
    in_pipeline: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// The flag the orchestrator checks between stages.
    pub fn raised(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.raised)
    }

    /// Mark the pipeline as running until the returned guard is dropped.
    pub fn pipeline_scope(&self) -> PipelineScope {
        self.in_pipeline.store(true, Ordering::SeqCst);
        PipelineScope {
            in_pipeline: Arc::clone(&self.in_pipeline),
        }
    }

    pub fn on_signal(&self) -> SignalAction {
        if !self.in_pipeline.load(Ordering::SeqCst) {
            return SignalAction::Exit;
        }
        if self.raised.swap(true, Ordering::SeqCst) {
            SignalAction::Exit
        } else {
            SignalAction::StopAfterStage
        }
    }
}

pub struct PipelineScope {
    in_pipeline: Arc<AtomicBool>,
}

impl Drop for PipelineScope {
    fn drop(&mut self) {
        self.in_pipeline.store(false, Ordering::SeqCst);
    }
}

/// Set up interrupt handlers for SIGINT and SIGTERM.
///
/// During the pipeline the first signal raises the flag and a second one
/// exits. Anywhere else the process exits with 130 straight away.
pub fn setup_interrupt_handlers() -> Result<InterruptFlag> {
    let flag = InterruptFlag::new();
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let state = flag.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            match state.on_signal() {
                SignalAction::StopAfterStage => {
                    tracing::warn!(signal = sig, "Interrupt received, stopping after the current stage");
                    eprintln!("\nStopping after the current stage (interrupt again to exit now)");
                }
                SignalAction::Exit => {
                    tracing::warn!(signal = sig, "Interrupt received, exiting");
                    eprintln!("\nInterrupted, exiting");
                    std::process::exit(130);
                }
            }
        }
    });

    Ok(flag)
}
