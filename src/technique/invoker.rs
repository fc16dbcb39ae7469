//! Runs one technique as an external process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ErrorCode, ObfusError};
use crate::subprocess::{powershell_quote, ExitStatus, ProcessError, ProcessRunner, ShellLine};

use super::{Interpreter, OutputConvention, TechniqueDescriptor, TechniqueId};

/// Default bound on a single technique run.
pub const DEFAULT_TECHNIQUE_TIMEOUT: Duration = Duration::from_secs(120);

/// Why a stage failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Backing file not found under the tools directory; nothing was spawned.
    MissingTool,
    ExitCode(i32),
    Signal(i32),
    Timeout(Duration),
    /// Process exited cleanly but left no output file.
    MissingOutput,
    /// Output file exists but is empty.
    EmptyOutput,
    /// The process could not be started or its pipes failed.
    Spawn,
    /// Output of a relocating technique could not be copied into place.
    Relocate,
}

impl FailureKind {
    pub fn code(&self) -> u16 {
        match self {
            FailureKind::ExitCode(_) | FailureKind::Signal(_) => ErrorCode::TECHNIQUE_EXIT_CODE,
            FailureKind::Timeout(_) => ErrorCode::TECHNIQUE_TIMEOUT,
            FailureKind::MissingOutput | FailureKind::EmptyOutput => {
                ErrorCode::TECHNIQUE_MISSING_OUTPUT
            }
            FailureKind::Spawn => ErrorCode::TECHNIQUE_SPAWN,
            FailureKind::MissingTool | FailureKind::Relocate => ErrorCode::TECHNIQUE_GENERIC,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::MissingTool => write!(f, "backing tool missing"),
            FailureKind::ExitCode(code) => write!(f, "exited with code {code}"),
            FailureKind::Signal(signal) => write!(f, "terminated by signal {signal}"),
            FailureKind::Timeout(after) => write!(f, "timed out after {}s", after.as_secs()),
            FailureKind::MissingOutput => write!(f, "no output file produced"),
            FailureKind::EmptyOutput => write!(f, "output file is empty"),
            FailureKind::Spawn => write!(f, "could not run process"),
            FailureKind::Relocate => write!(f, "could not relocate output"),
        }
    }
}

/// Outcome of one technique invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueResult {
    pub technique: TechniqueId,
    pub success: bool,
    /// Input path this stage was handed.
    pub input: PathBuf,
    pub failure: Option<FailureKind>,
    /// Captured stderr, or the failure reason when there was none.
    pub diagnostic: Option<String>,
    pub elapsed: Duration,
}

impl TechniqueResult {
    fn succeeded(technique: TechniqueId, input: &Path, elapsed: Duration) -> Self {
        Self {
            technique,
            success: true,
            input: input.to_path_buf(),
            failure: None,
            diagnostic: None,
            elapsed,
        }
    }

    fn failed(
        technique: TechniqueId,
        input: &Path,
        failure: FailureKind,
        diagnostic: Option<String>,
        elapsed: Duration,
    ) -> Self {
        let diagnostic = diagnostic
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .or_else(|| Some(failure.to_string()));
        Self {
            technique,
            success: false,
            input: input.to_path_buf(),
            failure: Some(failure),
            diagnostic,
            elapsed,
        }
    }
}

impl TechniqueResult {
    /// The failure as a reportable error; `None` for a successful stage.
    pub fn to_error(&self) -> Option<ObfusError> {
        let failure = self.failure.as_ref()?;
        let message = self
            .diagnostic
            .clone()
            .unwrap_or_else(|| failure.to_string());
        Some(ObfusError::technique(
            failure.code(),
            self.technique.as_str(),
            message,
        ))
    }
}

/// Builds and runs technique commands through the injected [`ProcessRunner`].
pub struct TechniqueInvoker {
    runner: Arc<dyn ProcessRunner>,
    tools_dir: PathBuf,
    powershell: String,
    python: String,
}

impl TechniqueInvoker {
    pub fn new(runner: Arc<dyn ProcessRunner>, tools_dir: PathBuf) -> Self {
        Self {
            runner,
            tools_dir,
            powershell: "pwsh".to_string(),
            python: "python3".to_string(),
        }
    }

    pub fn with_interpreters(
        mut self,
        powershell: impl Into<String>,
        python: impl Into<String>,
    ) -> Self {
        self.powershell = powershell.into();
        self.python = python.into();
        self
    }

    /// Command line for one technique. Every interpolated path is quoted.
    pub fn command_line(
        &self,
        descriptor: &TechniqueDescriptor,
        input: &Path,
        output: &Path,
    ) -> ShellLine {
        let script = descriptor.script_path(&self.tools_dir);
        let script_str = script.to_string_lossy();
        let input_str = input.to_string_lossy();
        let output_str = output.to_string_lossy();

        match descriptor.id {
            TechniqueId::Invoke => ShellLine::new(&self.powershell)
                .arg("-NoProfile")
                .arg("-Command")
                .arg(format!(
                    "Import-Module {}; Invoke-PSObfuscation -Path {} -Cmdlets -Comments \
                     -NamespaceClasses -Variables -OutFile {}",
                    powershell_quote(&script_str),
                    powershell_quote(&input_str),
                    powershell_quote(&output_str)
                )),
            TechniqueId::Xencrypt => ShellLine::new(&self.powershell)
                .arg("-NoProfile")
                .arg("-Command")
                .arg(format!(
                    "Import-Module {}; Invoke-BetterXencrypt -InFile {} -OutFile {} -Iterations 10",
                    powershell_quote(&script_str),
                    powershell_quote(&input_str),
                    powershell_quote(&output_str)
                )),
            TechniqueId::Chameleon => ShellLine::new(&self.python)
                .path(&script)
                .path(input)
                .arg("-o")
                .path(output)
                .arg("-a")
                .arg("-l")
                .arg("3")
                .arg("--random-backticks"),
            TechniqueId::Pyfuscation => ShellLine::new(&self.python)
                .path(&script)
                .arg("-fvp")
                .arg("--ps")
                .path(input),
        }
    }

    fn interpreter_program(&self, interpreter: Interpreter) -> &str {
        match interpreter {
            Interpreter::PowerShell => &self.powershell,
            Interpreter::Python => &self.python,
        }
    }

    /// Run one technique against `input`, leaving its result at `output`.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// returned [`TechniqueResult`].
    pub async fn run_technique(
        &self,
        descriptor: &TechniqueDescriptor,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> TechniqueResult {
        let start = Instant::now();
        let script = descriptor.script_path(&self.tools_dir);

        if !script.is_file() {
            tracing::warn!(
                technique = descriptor.id.as_str(),
                path = %script.display(),
                "Backing tool not found"
            );
            return TechniqueResult::failed(
                descriptor.id,
                input,
                FailureKind::MissingTool,
                Some(format!("{} not found at {}", descriptor.name, script.display())),
                start.elapsed(),
            );
        }

        if let OutputConvention::Relocate { file, .. } = descriptor.output {
            let stale = self.relocate_source(descriptor, file);
            if stale.exists() {
                tracing::debug!("Removing stale relocation source {}", stale.display());
                if let Err(err) = tokio::fs::remove_file(&stale).await {
                    tracing::debug!("Could not remove {}: {}", stale.display(), err);
                }
            }
        }

        let line = self.command_line(descriptor, input, output);
        tracing::info!(
            technique = descriptor.id.as_str(),
            interpreter = self.interpreter_program(descriptor.interpreter),
            "Running {}",
            descriptor.name
        );
        tracing::debug!("Command line: {}", line);

        let mut builder = line
            .into_command()
            .current_dir(&descriptor.script_dir(&self.tools_dir))
            .timeout(timeout);
        if descriptor.interpreter == Interpreter::Python {
            // Captured output is decoded as UTF-8.
            builder = builder.env("PYTHONIOENCODING", "utf-8");
        }
        let command = builder.build();

        let process_output = match self.runner.run(command).await {
            Ok(process_output) => process_output,
            Err(err) => {
                let failure = match &err {
                    ProcessError::Timeout(after) => FailureKind::Timeout(*after),
                    _ => FailureKind::Spawn,
                };
                tracing::warn!(
                    technique = descriptor.id.as_str(),
                    "Technique run failed: {}",
                    err
                );
                self.cleanup_relocation(descriptor).await;
                return TechniqueResult::failed(
                    descriptor.id,
                    input,
                    failure,
                    Some(err.to_string()),
                    start.elapsed(),
                );
            }
        };

        let stderr = Some(process_output.stderr.clone());
        match process_output.status {
            ExitStatus::Success => {}
            ExitStatus::Error(code) => {
                self.cleanup_relocation(descriptor).await;
                return TechniqueResult::failed(
                    descriptor.id,
                    input,
                    FailureKind::ExitCode(code),
                    stderr,
                    start.elapsed(),
                );
            }
            ExitStatus::Signal(signal) => {
                self.cleanup_relocation(descriptor).await;
                return TechniqueResult::failed(
                    descriptor.id,
                    input,
                    FailureKind::Signal(signal),
                    stderr,
                    start.elapsed(),
                );
            }
        }

        if let OutputConvention::Relocate { file, .. } = descriptor.output {
            let relocated = self.relocate(descriptor, file, output).await;
            self.cleanup_relocation(descriptor).await;
            if let Err(failure) = relocated {
                return TechniqueResult::failed(
                    descriptor.id,
                    input,
                    failure,
                    stderr,
                    start.elapsed(),
                );
            }
        }

        match check_output(output).await {
            Ok(()) => TechniqueResult::succeeded(descriptor.id, input, start.elapsed()),
            Err(failure) => {
                TechniqueResult::failed(descriptor.id, input, failure, stderr, start.elapsed())
            }
        }
    }

    fn relocate_source(&self, descriptor: &TechniqueDescriptor, file: &str) -> PathBuf {
        match descriptor.output {
            OutputConvention::Relocate { temp_dir, .. } => {
                self.tools_dir.join(temp_dir).join(file)
            }
            OutputConvention::Direct => self.tools_dir.join(file),
        }
    }

    async fn relocate(
        &self,
        descriptor: &TechniqueDescriptor,
        file: &str,
        output: &Path,
    ) -> Result<(), FailureKind> {
        let source = self.relocate_source(descriptor, file);
        if !source.is_file() {
            tracing::warn!(
                technique = descriptor.id.as_str(),
                "Expected output {} was not written",
                source.display()
            );
            return Err(FailureKind::MissingOutput);
        }

        tokio::fs::copy(&source, output).await.map_err(|err| {
            tracing::warn!(
                "Could not copy {} to {}: {}",
                source.display(),
                output.display(),
                err
            );
            FailureKind::Relocate
        })?;
        tracing::debug!("Relocated {} to {}", source.display(), output.display());
        Ok(())
    }

    /// Best-effort removal of a relocating technique's temporary directory.
    async fn cleanup_relocation(&self, descriptor: &TechniqueDescriptor) {
        if let OutputConvention::Relocate { temp_dir, .. } = descriptor.output {
            let dir = self.tools_dir.join(temp_dir);
            if dir.exists() {
                if let Err(err) = tokio::fs::remove_dir_all(&dir).await {
                    tracing::debug!("Ignoring cleanup failure for {}: {}", dir.display(), err);
                }
            }
        }
    }
}

/// A stage only counts when it leaves a non-empty file behind.
async fn check_output(output: &Path) -> Result<(), FailureKind> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(meta) if meta.is_file() => Err(FailureKind::EmptyOutput),
        _ => Err(FailureKind::MissingOutput),
    }
}
