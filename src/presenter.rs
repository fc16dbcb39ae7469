//! Reporting on the final artifact.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::clipboard::Clipboard;
use crate::error::{ErrorCode, ErrorExt, ObfusError};
use crate::interaction::UserInteraction;
use crate::technique::TechniqueId;

pub const PREVIEW_LIMIT: usize = 500;
pub const BASE64_PREVIEW_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeReport {
    pub original: u64,
    pub obfuscated: u64,
}

impl SizeReport {
    pub fn new(original: u64, obfuscated: u64) -> Self {
        Self {
            original,
            obfuscated,
        }
    }

    /// Obfuscated size over original size; an empty original counts as 1 byte.
    pub fn ratio(&self) -> f64 {
        self.obfuscated as f64 / self.original.max(1) as f64
    }
}

impl std::fmt::Display for SizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Original size: {} bytes\nObfuscated size: {} bytes\nSize ratio: {:.2}x",
            self.original,
            self.obfuscated,
            self.ratio()
        )
    }
}

/// Sibling file that receives the base64 form of `artifact`.
pub fn base64_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    artifact.with_file_name(format!("{stem}_base64.txt"))
}

/// Base64-encode `artifact` (standard alphabet, padded) next to it.
pub fn encode_base64(artifact: &Path) -> Result<(PathBuf, String), ObfusError> {
    let bytes = std::fs::read(artifact).to_presentation_error(
        ErrorCode::PRESENTATION_ENCODING,
        format!("could not read {}", artifact.display()),
    )?;
    let encoded = STANDARD.encode(bytes);
    let target = base64_path(artifact);
    std::fs::write(&target, &encoded).to_presentation_error(
        ErrorCode::PRESENTATION_ENCODING,
        format!("could not write {}", target.display()),
    )?;
    tracing::info!(path = %target.display(), "Wrote base64 artifact");
    Ok((target, encoded))
}

/// First `limit` characters of `text`, with `...` when cut.
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// What the presenter needs to know about a finished run.
pub struct Presentation<'a> {
    pub original: &'a Path,
    pub artifact: &'a Path,
    pub successful: &'a [TechniqueId],
    pub encode: bool,
    pub view: bool,
}

pub struct Presenter<'a> {
    ui: &'a dyn UserInteraction,
    clipboard: &'a Clipboard,
}

impl<'a> Presenter<'a> {
    pub fn new(ui: &'a dyn UserInteraction, clipboard: &'a Clipboard) -> Self {
        Self { ui, clipboard }
    }

    /// Report the run. Problems here are shown as warnings and never fail
    /// the run.
    pub async fn present(&self, run: &Presentation<'_>) {
        let names: Vec<&str> = run.successful.iter().map(|id| id.as_str()).collect();
        self.ui.display_success(&format!(
            "Obfuscation complete: {} ({})",
            run.artifact.display(),
            names.join(", ")
        ));

        // Tools may emit UTF-16 or other non-UTF-8 output; sizes and base64
        // work on bytes, text views are lossy.
        let original = std::fs::read(run.original);
        let artifact = match std::fs::read(run.artifact) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.warn(
                    ObfusError::presentation(ErrorCode::PRESENTATION_GENERIC, "could not read artifact")
                        .with_context(e),
                );
                return;
            }
        };

        match &original {
            Ok(bytes) => self
                .ui
                .display_block(&SizeReport::new(bytes.len() as u64, artifact.len() as u64).to_string()),
            Err(e) => self.warn(
                ObfusError::presentation(ErrorCode::PRESENTATION_GENERIC, "could not compute sizes")
                    .with_context(e),
            ),
        }
        let original_text = original
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        let artifact_text = String::from_utf8_lossy(&artifact).into_owned();

        let encoded = if run.encode {
            match encode_base64(run.artifact) {
                Ok((path, encoded)) => {
                    self.ui
                        .display_info(&format!("Base64 written to {}", path.display()));
                    Some(encoded)
                }
                Err(e) => {
                    self.warn(e);
                    None
                }
            }
        } else {
            None
        };

        if run.view {
            self.ui.display_block(&format!(
                "--- Original ---\n{}\n--- Obfuscated ---\n{}",
                preview(&original_text, PREVIEW_LIMIT),
                preview(&artifact_text, PREVIEW_LIMIT)
            ));
            if let Some(encoded) = &encoded {
                self.ui.display_block(&format!(
                    "--- Base64 ---\n{}",
                    preview(encoded, BASE64_PREVIEW_LIMIT)
                ));
            }
        }

        match self.clipboard.copy(&artifact_text).await {
            Ok(()) => self.ui.display_info("Obfuscated script copied to clipboard"),
            Err(e) => self.warn(e),
        }
    }

    fn warn(&self, err: ObfusError) {
        tracing::warn!(code = err.code(), "{}", err);
        self.ui.display_warning(&err.user_message());
    }
}
