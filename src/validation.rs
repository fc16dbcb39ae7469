//! Input validation.
//!
//! Every `validate_*` predicate is pure over its argument and the fixed
//! catalog. The `check_*` twins return the rejection reason so callers can
//! tell the operator what was wrong.

use std::net::IpAddr;
use std::path::Path;

use thiserror::Error;

use crate::error::ErrorCode;
use crate::technique::{parse_selection, TechniqueSelection};

/// Default ceiling for an input script.
pub const MAX_SCRIPT_SIZE: u64 = 10 * 1024 * 1024;

/// Extensions accepted without an explicit override.
pub const ALLOWED_EXTENSIONS: &[&str] = &["ps1", "py", "txt", "psm1"];

const MAX_FILENAME_LEN: usize = 255;
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} does not exist")]
    ScriptNotFound(String),

    #[error("{0} is not a regular file")]
    ScriptNotFile(String),

    #[error("{path} is {size} bytes, limit is {limit}")]
    ScriptTooLarge { path: String, size: u64, limit: u64 },

    #[error("{path} has unsupported extension '{extension}'")]
    UnsupportedExtension { path: String, extension: String },

    #[error("'{0}' is not an IPv4 or IPv6 address")]
    InvalidIp(String),

    #[error("{0} is outside 1-65535")]
    InvalidPort(i64),

    #[error("output name must not be empty")]
    EmptyOutputName,

    #[error("'{0}' contains a path component")]
    PathTraversal(String),

    #[error("'{0}' is a reserved device name")]
    ReservedName(String),

    #[error("'{name}' contains forbidden character {ch:?}")]
    ForbiddenCharacter { name: String, ch: char },

    #[error("output name is {0} characters, limit is 255")]
    NameTooLong(usize),

    #[error("no technique selected")]
    EmptySelection,

    #[error("unknown technique(s): {}", .0.join(", "))]
    UnknownTechniques(Vec<String>),
}

impl ValidationError {
    /// Error code and the operator-facing name of the offending field.
    pub fn code_and_field(&self) -> (u16, &'static str) {
        match self {
            Self::ScriptNotFound(_)
            | Self::ScriptNotFile(_)
            | Self::ScriptTooLarge { .. }
            | Self::UnsupportedExtension { .. } => (ErrorCode::VALIDATION_SCRIPT_PATH, "script path"),
            Self::InvalidIp(_) => (ErrorCode::VALIDATION_IP, "ip address"),
            Self::InvalidPort(_) => (ErrorCode::VALIDATION_PORT, "port"),
            Self::EmptyOutputName
            | Self::PathTraversal(_)
            | Self::ReservedName(_)
            | Self::ForbiddenCharacter { .. }
            | Self::NameTooLong(_) => (ErrorCode::VALIDATION_OUTPUT_NAME, "output name"),
            Self::EmptySelection | Self::UnknownTechniques(_) => {
                (ErrorCode::VALIDATION_TECHNIQUES, "technique list")
            }
        }
    }
}

fn rejected<T>(field: &'static str, value: &str, err: ValidationError) -> Result<T, ValidationError> {
    tracing::warn!(field, value, reason = %err, "Validation rejected input");
    Err(err)
}

/// Check an input script against existence, size and extension rules.
pub fn check_script_path(
    path: &Path,
    max_size: u64,
    allow_any_extension: bool,
) -> Result<(), ValidationError> {
    let display = path.display().to_string();
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return rejected("script path", &display, ValidationError::ScriptNotFound(display.clone())),
    };
    if !meta.is_file() {
        return rejected("script path", &display, ValidationError::ScriptNotFile(display.clone()));
    }
    if meta.len() > max_size {
        return rejected(
            "script path",
            &display,
            ValidationError::ScriptTooLarge {
                path: display.clone(),
                size: meta.len(),
                limit: max_size,
            },
        );
    }

    if !allow_any_extension {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return rejected(
                "script path",
                &display,
                ValidationError::UnsupportedExtension {
                    path: display.clone(),
                    extension,
                },
            );
        }
    }
    Ok(())
}

pub fn validate_script_path(path: &Path, allow_any_extension: bool) -> bool {
    check_script_path(path, MAX_SCRIPT_SIZE, allow_any_extension).is_ok()
}

pub fn check_ip(value: &str) -> Result<IpAddr, ValidationError> {
    value
        .parse::<IpAddr>()
        .or_else(|_| rejected("ip address", value, ValidationError::InvalidIp(value.to_string())))
}

pub fn validate_ip(value: &str) -> bool {
    check_ip(value).is_ok()
}

pub fn check_port(port: i64) -> Result<u16, ValidationError> {
    match u16::try_from(port) {
        Ok(port) if port >= 1 => Ok(port),
        _ => rejected("port", &port.to_string(), ValidationError::InvalidPort(port)),
    }
}

pub fn validate_port(port: i64) -> bool {
    check_port(port).is_ok()
}

/// Check that `name` is a bare file name safe to create in the workspace.
pub fn check_output_filename(name: &str) -> Result<(), ValidationError> {
    const FIELD: &str = "output name";

    if name.trim().is_empty() {
        return rejected(FIELD, name, ValidationError::EmptyOutputName);
    }
    let length = name.chars().count();
    if length > MAX_FILENAME_LEN {
        return rejected(FIELD, name, ValidationError::NameTooLong(length));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return rejected(FIELD, name, ValidationError::PathTraversal(name.to_string()));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| FORBIDDEN_CHARS.contains(ch) || ch.is_control())
    {
        return rejected(
            FIELD,
            name,
            ValidationError::ForbiddenCharacter {
                name: name.to_string(),
                ch,
            },
        );
    }

    // `nul.txt` is as reserved as `NUL`.
    let stem = name.split('.').next().unwrap_or(name).trim_end();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        return rejected(FIELD, name, ValidationError::ReservedName(name.to_string()));
    }
    Ok(())
}

pub fn validate_output_filename(name: &str) -> bool {
    check_output_filename(name).is_ok()
}

/// Parse a technique list, rejecting empty selections and unknown ids.
pub fn check_techniques(value: &str) -> Result<TechniqueSelection, ValidationError> {
    let selection = parse_selection(value);
    if selection.is_empty() {
        return rejected("technique list", value, ValidationError::EmptySelection);
    }
    let unknown = selection.unknown();
    if !unknown.is_empty() {
        let unknown = unknown.into_iter().map(str::to_string).collect();
        return rejected(
            "technique list",
            value,
            ValidationError::UnknownTechniques(unknown),
        );
    }
    Ok(selection)
}

pub fn validate_techniques(value: &str) -> bool {
    check_techniques(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::technique::TechniqueId;
    use tempfile::TempDir;

    #[test]
    fn test_script_path_accepts_allowed_extensions() {
        let dir = TempDir::new().unwrap();
        for name in ["a.ps1", "b.PY", "c.txt", "d.psm1"] {
            let path = dir.path().join(name);
            std::fs::write(&path, "x").unwrap();
            assert!(validate_script_path(&path, false), "{name}");
        }
    }

    #[test]
    fn test_script_path_extension_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("payload.bat");
        std::fs::write(&path, "echo").unwrap();

        assert!(matches!(
            check_script_path(&path, MAX_SCRIPT_SIZE, false),
            Err(ValidationError::UnsupportedExtension { .. })
        ));
        assert!(validate_script_path(&path, true));
    }

    #[test]
    fn test_script_path_rejects_missing_and_directories() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            check_script_path(&dir.path().join("nope.ps1"), MAX_SCRIPT_SIZE, false),
            Err(ValidationError::ScriptNotFound(_))
        ));
        assert!(matches!(
            check_script_path(dir.path(), MAX_SCRIPT_SIZE, true),
            Err(ValidationError::ScriptNotFile(_))
        ));
    }

    #[test]
    fn test_script_path_size_ceiling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.ps1");
        std::fs::write(&path, vec![b'a'; 64]).unwrap();

        assert!(check_script_path(&path, 64, false).is_ok());
        assert_eq!(
            check_script_path(&path, 63, false),
            Err(ValidationError::ScriptTooLarge {
                path: path.display().to_string(),
                size: 64,
                limit: 63
            })
        );
    }

    #[test]
    fn test_ip_literals() {
        assert!(validate_ip("10.0.0.1"));
        assert!(validate_ip("::1"));
        assert!(validate_ip("fe80::1ff:fe23:4567:890a"));
        assert!(!validate_ip("999.999.999.999"));
        assert!(!validate_ip("localhost"));
        assert!(!validate_ip(""));
        assert!(!validate_ip(" 10.0.0.1"));
    }

    #[test]
    fn test_port_bounds() {
        assert!(!validate_port(0));
        assert!(validate_port(1));
        assert!(validate_port(4444));
        assert!(validate_port(65535));
        assert!(!validate_port(65536));
        assert!(!validate_port(-1));
        assert_eq!(check_port(8080), Ok(8080));
    }

    #[test]
    fn test_output_filename_rejections() {
        assert!(validate_output_filename("obfuscated.ps1"));
        assert!(validate_output_filename("stage 2.ps1"));
        assert!(validate_output_filename("console.ps1"));

        assert_eq!(
            check_output_filename("../../etc/passwd"),
            Err(ValidationError::PathTraversal("../../etc/passwd".to_string()))
        );
        for bad in [
            "", "   ", "a/b.ps1", "a\\b.ps1", "..", "CON", "nul.txt", "Com1", "lpt9.ps1",
            "out?.ps1", "a<b", "x:y", "pipe|d", "tab\there",
        ] {
            assert!(!validate_output_filename(bad), "{bad:?}");
        }
        assert!(matches!(
            check_output_filename(&"a".repeat(256)),
            Err(ValidationError::NameTooLong(256))
        ));
        assert!(validate_output_filename(&"a".repeat(255)));
    }

    #[test]
    fn test_output_filename_is_idempotent() {
        for name in ["obfuscated.ps1", "../../etc/passwd", "NUL", "ok"] {
            assert_eq!(validate_output_filename(name), validate_output_filename(name));
        }
    }

    #[test]
    fn test_techniques() {
        assert!(validate_techniques("invoke"));
        assert!(validate_techniques(" Invoke , CHAMELEON "));
        assert!(validate_techniques("ALL"));
        assert!(!validate_techniques(""));
        assert!(!validate_techniques(" , "));
        assert!(!validate_techniques("invoke,bogus"));

        assert_eq!(
            check_techniques("bogus,nope"),
            Err(ValidationError::UnknownTechniques(vec![
                "bogus".to_string(),
                "nope".to_string()
            ]))
        );
        assert_eq!(
            check_techniques("xencrypt,invoke").unwrap().known(),
            vec![TechniqueId::Xencrypt, TechniqueId::Invoke]
        );
    }

    #[test]
    fn test_code_and_field() {
        assert_eq!(
            ValidationError::InvalidPort(0).code_and_field(),
            (ErrorCode::VALIDATION_PORT, "port")
        );
        assert_eq!(
            ValidationError::EmptySelection.code_and_field().0,
            ErrorCode::VALIDATION_TECHNIQUES
        );
    }
}
