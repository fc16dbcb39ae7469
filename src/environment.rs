//! Advisory check of the external tools and interpreters.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ErrorCode, ObfusError};
use crate::subprocess::{ProcessCommandBuilder, ProcessRunner};
use crate::technique::{Interpreter, TechniqueId, CATALOG};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub technique: TechniqueId,
    pub name: &'static str,
    pub path: PathBuf,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterStatus {
    pub interpreter: Interpreter,
    pub program: String,
    pub available: bool,
    /// First line the interpreter printed for its version query.
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub tools: Vec<ToolStatus>,
    pub interpreters: Vec<InterpreterStatus>,
}

impl EnvironmentReport {
    /// Names of every missing tool and interpreter.
    pub fn missing(&self) -> Vec<String> {
        let tools = self
            .tools
            .iter()
            .filter(|tool| !tool.present)
            .map(|tool| tool.name.to_string());
        let interpreters = self
            .interpreters
            .iter()
            .filter(|interp| !interp.available)
            .map(|interp| format!("{} ({})", interp.interpreter, interp.program));
        tools.chain(interpreters).collect()
    }

    /// One environment error per missing tool or unavailable interpreter.
    pub fn problems(&self) -> Vec<ObfusError> {
        let tools = self.tools.iter().filter(|tool| !tool.present).map(|tool| {
            ObfusError::environment(
                ErrorCode::ENV_MISSING_TOOL,
                format!("{} not found at {}", tool.name, tool.path.display()),
            )
        });
        let interpreters = self
            .interpreters
            .iter()
            .filter(|interp| !interp.available)
            .map(|interp| {
                ObfusError::environment(
                    ErrorCode::ENV_MISSING_INTERPRETER,
                    format!("{} ({}) is not runnable", interp.interpreter, interp.program),
                )
            });
        tools.chain(interpreters).collect()
    }

    pub fn all_present(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = format!("{:<24} {:<10} {}\n", "Component", "Status", "Location");
        for tool in &self.tools {
            out.push_str(&format!(
                "{:<24} {:<10} {}\n",
                tool.name,
                status_label(tool.present),
                tool.path.display()
            ));
        }
        for interp in &self.interpreters {
            out.push_str(&format!(
                "{:<24} {:<10} {}\n",
                interp.interpreter.to_string(),
                status_label(interp.available),
                interp.version.as_deref().unwrap_or(&interp.program)
            ));
        }
        out
    }
}

fn status_label(ok: bool) -> &'static str {
    if ok {
        "found"
    } else {
        "MISSING"
    }
}

pub struct EnvironmentProber {
    runner: Arc<dyn ProcessRunner>,
    tools_dir: PathBuf,
    powershell: String,
    python: String,
}

impl EnvironmentProber {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        tools_dir: &Path,
        powershell: impl Into<String>,
        python: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            tools_dir: tools_dir.to_path_buf(),
            powershell: powershell.into(),
            python: python.into(),
        }
    }

    pub fn check_tools(&self) -> Vec<ToolStatus> {
        CATALOG
            .iter()
            .map(|descriptor| {
                let path = descriptor.script_path(&self.tools_dir);
                let present = path.is_file();
                tracing::debug!(
                    technique = descriptor.id.as_str(),
                    present,
                    "Checked {}",
                    path.display()
                );
                ToolStatus {
                    technique: descriptor.id,
                    name: descriptor.name,
                    path,
                    present,
                }
            })
            .collect()
    }

    async fn check_interpreter(&self, interpreter: Interpreter) -> InterpreterStatus {
        let (program, flag) = match interpreter {
            Interpreter::PowerShell => (self.powershell.as_str(), "-Version"),
            Interpreter::Python => (self.python.as_str(), "--version"),
        };
        let command = ProcessCommandBuilder::new(program)
            .arg(flag)
            .timeout(PROBE_TIMEOUT)
            .build();

        let (available, version) = match self.runner.run(command).await {
            Ok(output) if output.status.success() => {
                // Older Pythons print the version on stderr.
                let text = if output.stdout.trim().is_empty() {
                    output.stderr
                } else {
                    output.stdout
                };
                let version = text
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty());
                (true, version)
            }
            Ok(output) => {
                tracing::debug!("{} {} exited with {}", program, flag, output.status);
                (false, None)
            }
            Err(err) => {
                tracing::debug!("{} {} failed: {}", program, flag, err);
                (false, None)
            }
        };

        InterpreterStatus {
            interpreter,
            program: program.to_string(),
            available,
            version,
        }
    }

    /// Probe every tool and both interpreters. Never fails.
    pub async fn probe(&self) -> EnvironmentReport {
        let tools = self.check_tools();
        let interpreters = vec![
            self.check_interpreter(Interpreter::PowerShell).await,
            self.check_interpreter(Interpreter::Python).await,
        ];
        let report = EnvironmentReport {
            tools,
            interpreters,
        };

        let missing = report.missing();
        if missing.is_empty() {
            tracing::info!("All tools and interpreters found");
        } else {
            tracing::warn!(missing = %missing.join(", "), "Environment incomplete");
        }
        report
    }
}
