//! Resolving where the first stage's input comes from.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::clipboard::Clipboard;
use crate::error::{ErrorCode, ErrorExt, ObfusError};

pub const CLIPBOARD_SCRIPT: &str = "clipboard_script.ps1";
pub const GENERATED_SCRIPT: &str = "generated_script.ps1";

pub const LHOST_PLACEHOLDER: &str = "{{LHOST}}";
pub const LPORT_PLACEHOLDER: &str = "{{LPORT}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// An existing script, used in place.
    Custom(PathBuf),
    /// Clipboard text saved into the workspace.
    Clipboard,
    /// A template rendered with the listener address.
    Generate {
        ip: IpAddr,
        port: u16,
        template: PathBuf,
    },
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Custom(path) => write!(f, "custom script {}", path.display()),
            InputSource::Clipboard => write!(f, "clipboard"),
            InputSource::Generate { ip, port, .. } => write!(f, "generated for {ip}:{port}"),
        }
    }
}

/// Substitute the listener address into a template.
pub fn render_template(template: &str, ip: IpAddr, port: u16) -> String {
    template
        .replace(LHOST_PLACEHOLDER, &ip.to_string())
        .replace(LPORT_PLACEHOLDER, &port.to_string())
}

fn write_workspace_file(workspace: &Path, name: &str, content: &str) -> Result<PathBuf, ObfusError> {
    let path = workspace.join(name);
    std::fs::write(&path, content)
        .to_pipeline_error(format!("could not write {}", path.display()))?;
    Ok(path)
}

/// Produce the file the first stage reads.
pub async fn resolve_input(
    source: &InputSource,
    workspace: &Path,
    clipboard: &Clipboard,
) -> Result<PathBuf, ObfusError> {
    match source {
        InputSource::Custom(path) => {
            let path = std::fs::canonicalize(path)
                .to_pipeline_error(format!("input script {} not found", path.display()))?;
            tracing::info!(path = %path.display(), "Using custom script");
            Ok(path)
        }
        InputSource::Clipboard => {
            let content = clipboard.paste().await?;
            if content.trim().is_empty() {
                return Err(ObfusError::pipeline(
                    ErrorCode::PIPELINE_INPUT,
                    "clipboard is empty",
                ));
            }
            tracing::info!(chars = content.chars().count(), "Read script from clipboard");
            write_workspace_file(workspace, CLIPBOARD_SCRIPT, &content)
        }
        InputSource::Generate { ip, port, template } => {
            let text = std::fs::read_to_string(template).to_pipeline_error(format!(
                "could not read template {}",
                template.display()
            ))?;
            if !text.contains(LHOST_PLACEHOLDER) || !text.contains(LPORT_PLACEHOLDER) {
                tracing::warn!(
                    template = %template.display(),
                    "Template lacks {} or {}",
                    LHOST_PLACEHOLDER,
                    LPORT_PLACEHOLDER
                );
            }
            let path = write_workspace_file(workspace, GENERATED_SCRIPT, &render_template(&text, *ip, *port))?;
            tracing::info!(path = %path.display(), "Generated script from template");
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::ClipboardCommands;
    use crate::subprocess::MockProcessRunner;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn clipboard(mock: &MockProcessRunner) -> Clipboard {
        Clipboard::new(
            Arc::new(mock.clone()),
            ClipboardCommands::for_platform("macos", false),
        )
    }

    #[test]
    fn test_render_template() {
        let rendered = render_template(
            "$h = \"{{LHOST}}\"; $p = {{LPORT}}; # {{LHOST}}",
            "10.0.0.5".parse().unwrap(),
            4444,
        );
        assert_eq!(rendered, "$h = \"10.0.0.5\"; $p = 4444; # 10.0.0.5");
    }

    #[tokio::test]
    async fn test_custom_script_is_used_in_place() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("mine.ps1");
        std::fs::write(&script, "Get-Process").unwrap();
        let mock = MockProcessRunner::new();

        let path = resolve_input(
            &InputSource::Custom(script.clone()),
            dir.path(),
            &clipboard(&mock),
        )
        .await
        .unwrap();

        assert_eq!(path, std::fs::canonicalize(&script).unwrap());
    }

    #[tokio::test]
    async fn test_clipboard_text_is_saved() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockProcessRunner::new();
        mock.expect_command("pbpaste")
            .returns_stdout("Write-Output 'clip'")
            .finish();

        let path = resolve_input(&InputSource::Clipboard, dir.path(), &clipboard(&mock))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join(CLIPBOARD_SCRIPT));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Write-Output 'clip'");
    }

    #[tokio::test]
    async fn test_empty_clipboard_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockProcessRunner::new();
        mock.expect_command("pbpaste").returns_stdout("  \n").finish();

        let err = resolve_input(&InputSource::Clipboard, dir.path(), &clipboard(&mock))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PIPELINE_INPUT);
        assert!(!dir.path().join(CLIPBOARD_SCRIPT).exists());
    }

    #[tokio::test]
    async fn test_generate_from_template() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("payload.ps1");
        std::fs::write(&template, "connect {{LHOST}}:{{LPORT}}").unwrap();
        let mock = MockProcessRunner::new();

        let path = resolve_input(
            &InputSource::Generate {
                ip: "::1".parse().unwrap(),
                port: 9001,
                template,
            },
            dir.path(),
            &clipboard(&mock),
        )
        .await
        .unwrap();

        assert_eq!(path, dir.path().join(GENERATED_SCRIPT));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "connect ::1:9001");
    }

    #[tokio::test]
    async fn test_missing_template() {
        let dir = TempDir::new().unwrap();
        let mock = MockProcessRunner::new();

        let err = resolve_input(
            &InputSource::Generate {
                ip: "127.0.0.1".parse().unwrap(),
                port: 1,
                template: dir.path().join("none.ps1"),
            },
            dir.path(),
            &clipboard(&mock),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("could not read template"));
    }
}
