//! System clipboard through the platform's clipboard commands.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ErrorCode, ObfusError};
use crate::subprocess::{ProcessCommandBuilder, ProcessRunner};

const CLIPBOARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Argument vectors for the copy and paste commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardCommands {
    pub copy: Vec<String>,
    pub paste: Vec<String>,
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ClipboardCommands {
    /// Commands for the current platform. `wayland` selects wl-clipboard on
    /// Linux.
    pub fn for_platform(os: &str, wayland: bool) -> Self {
        match os {
            "macos" => Self {
                copy: words(&["pbcopy"]),
                paste: words(&["pbpaste"]),
            },
            "windows" => Self {
                copy: words(&["clip"]),
                paste: words(&["powershell", "-NoProfile", "-Command", "Get-Clipboard"]),
            },
            _ if wayland => Self {
                copy: words(&["wl-copy"]),
                paste: words(&["wl-paste", "--no-newline"]),
            },
            _ => Self {
                copy: words(&["xclip", "-selection", "clipboard"]),
                paste: words(&["xclip", "-selection", "clipboard", "-o"]),
            },
        }
    }

    pub fn detect() -> Self {
        let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
        Self::for_platform(std::env::consts::OS, wayland)
    }

    /// Replace either command with a shell-style command line from config.
    pub fn with_overrides(
        mut self,
        copy: Option<&str>,
        paste: Option<&str>,
    ) -> Result<Self, ObfusError> {
        if let Some(line) = copy {
            self.copy = split_command(line)?;
        }
        if let Some(line) = paste {
            self.paste = split_command(line)?;
        }
        Ok(self)
    }
}

fn split_command(line: &str) -> Result<Vec<String>, ObfusError> {
    let parts = shell_words::split(line).map_err(|e| {
        ObfusError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, "invalid clipboard command")
            .with_context(line)
            .with_source(e)
    })?;
    if parts.is_empty() {
        return Err(ObfusError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            "clipboard command is empty",
        ));
    }
    Ok(parts)
}

pub struct Clipboard {
    runner: Arc<dyn ProcessRunner>,
    commands: ClipboardCommands,
}

impl Clipboard {
    pub fn new(runner: Arc<dyn ProcessRunner>, commands: ClipboardCommands) -> Self {
        Self { runner, commands }
    }

    fn command(argv: &[String]) -> ProcessCommandBuilder {
        ProcessCommandBuilder::from_argv(argv).timeout(CLIPBOARD_TIMEOUT)
    }

    pub async fn copy(&self, text: &str) -> Result<(), ObfusError> {
        let command = Self::command(&self.commands.copy)
            .stdin(text.to_string())
            .build();
        let program = command.program.clone();

        let output = self.runner.run(command).await.map_err(|e| {
            ObfusError::presentation(ErrorCode::PRESENTATION_CLIPBOARD, "clipboard copy failed")
                .with_context(&e)
                .with_source(e)
        })?;
        if !output.status.success() {
            return Err(ObfusError::presentation(
                ErrorCode::PRESENTATION_CLIPBOARD,
                format!("{program} exited with {}", output.status),
            ));
        }
        tracing::debug!("Copied {} bytes to clipboard", text.len());
        Ok(())
    }

    pub async fn paste(&self) -> Result<String, ObfusError> {
        let command = Self::command(&self.commands.paste).build();
        let program = command.program.clone();

        let output = self.runner.run(command).await.map_err(|e| {
            ObfusError::pipeline(ErrorCode::PIPELINE_INPUT, "could not read clipboard")
                .with_context(&e)
                .with_source(e)
        })?;
        if !output.status.success() {
            return Err(ObfusError::pipeline(
                ErrorCode::PIPELINE_INPUT,
                format!("{program} exited with {}", output.status),
            ));
        }
        Ok(output.stdout)
    }
}
