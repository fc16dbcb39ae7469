//! Layered configuration.
//!
//! Defaults, then the global `config.toml`, then `obfusengine.toml` in the
//! base directory, then an explicit `--config` file, then `OBFUS_*`
//! environment variables. Command line flags are applied last by the caller.

use directories::ProjectDirs;
use serde::de::value::StrDeserializer;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::error::{ErrorCode, ObfusError};
use crate::technique::invoker::DEFAULT_TECHNIQUE_TIMEOUT;
use crate::validation::MAX_SCRIPT_SIZE;

/// File looked up in the base directory.
pub const PROJECT_CONFIG_FILE: &str = "obfusengine.toml";
pub const DEFAULT_LOG_FILE: &str = "obfusengine.log";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for ObfusError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Parse { .. } => ErrorCode::CONFIG_PARSE_ERROR,
            ConfigError::InvalidValue { .. } => ErrorCode::CONFIG_INVALID_VALUE,
            ConfigError::Read { .. } => ErrorCode::CONFIG_GENERIC,
        };
        let message = err.to_string();
        ObfusError::config_with_code(code, message).with_source(err)
    }
}

/// Parse a human readable duration such as `90s` or `2m 30s`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let de: StrDeserializer<'_, serde::de::value::Error> = value.trim().into_deserializer();
    humantime_serde::deserialize(de).ok()
}

/// Global config directory, e.g. `~/.config/obfusengine` on Linux.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "obfusengine").map(|dirs| dirs.config_dir().to_path_buf())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClipboardConfig {
    pub copy_command: Option<String>,
    pub paste_command: Option<String>,
}

/// One config file. Every key is optional; unset keys leave the lower layer
/// alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub max_script_size: Option<u64>,
    pub tools_dir: Option<PathBuf>,
    pub workspace_name: Option<String>,
    pub powershell: Option<String>,
    pub python: Option<String>,
    pub log_file: Option<PathBuf>,
    pub template_path: Option<PathBuf>,
    #[serde(default)]
    pub clipboard: ClipboardConfig,
}

impl ConfigFile {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfusConfig {
    /// Bound on each technique run.
    pub timeout: Duration,
    pub max_script_size: u64,
    /// Relative paths are resolved against the base directory.
    pub tools_dir: PathBuf,
    pub workspace_name: String,
    pub powershell: String,
    pub python: String,
    pub log_file: Option<PathBuf>,
    pub template_path: Option<PathBuf>,
    pub clipboard: ClipboardConfig,
}

impl Default for ObfusConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TECHNIQUE_TIMEOUT,
            max_script_size: MAX_SCRIPT_SIZE,
            tools_dir: PathBuf::from("Obfuscation_Technique"),
            workspace_name: "ObfusWorkspace".to_string(),
            powershell: "pwsh".to_string(),
            python: "python3".to_string(),
            log_file: None,
            template_path: None,
            clipboard: ClipboardConfig::default(),
        }
    }
}

impl ObfusConfig {
    /// Load every layer that applies to `base_dir`.
    pub fn load(base_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut candidates = Vec::new();
        if let Some(dir) = global_config_dir() {
            candidates.push(dir.join("config.toml"));
        }
        candidates.push(base_dir.join(PROJECT_CONFIG_FILE));

        let mut config = Self::load_layers(&candidates, explicit)?;
        config.merge_env_vars()?;
        Ok(config)
    }

    /// Apply optional `candidates` in order, then the required `explicit`
    /// file.
    pub fn load_layers(
        candidates: &[PathBuf],
        explicit: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for path in candidates.iter().filter(|path| path.is_file()) {
            tracing::debug!("Loading config from {}", path.display());
            config.apply(ConfigFile::read(path)?);
        }
        if let Some(path) = explicit {
            tracing::debug!("Loading config from {}", path.display());
            config.apply(ConfigFile::read(path)?);
        }
        Ok(config)
    }

    pub fn apply(&mut self, file: ConfigFile) {
        if let Some(timeout) = file.timeout {
            self.timeout = timeout;
        }
        if let Some(size) = file.max_script_size {
            self.max_script_size = size;
        }
        if let Some(dir) = file.tools_dir {
            self.tools_dir = dir;
        }
        if let Some(name) = file.workspace_name {
            self.workspace_name = name;
        }
        if let Some(program) = file.powershell {
            self.powershell = program;
        }
        if let Some(program) = file.python {
            self.python = program;
        }
        if file.log_file.is_some() {
            self.log_file = file.log_file;
        }
        if file.template_path.is_some() {
            self.template_path = file.template_path;
        }
        if file.clipboard.copy_command.is_some() {
            self.clipboard.copy_command = file.clipboard.copy_command;
        }
        if file.clipboard.paste_command.is_some() {
            self.clipboard.paste_command = file.clipboard.paste_command;
        }
    }

    pub fn merge_env_vars(&mut self) -> Result<(), ConfigError> {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `OBFUS_*` overrides read through `lookup`.
    pub fn merge_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("OBFUS_TIMEOUT") {
            self.timeout = parse_duration(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: "OBFUS_TIMEOUT".to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("OBFUS_POWERSHELL") {
            self.powershell = value;
        }
        if let Some(value) = lookup("OBFUS_PYTHON") {
            self.python = value;
        }
        if let Some(value) = lookup("OBFUS_LOG_FILE") {
            self.log_file = Some(PathBuf::from(value));
        }
        Ok(())
    }

    fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn tools_dir(&self, base_dir: &Path) -> PathBuf {
        Self::resolve(base_dir, &self.tools_dir)
    }

    pub fn workspace_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.workspace_name)
    }

    pub fn log_file(&self, base_dir: &Path) -> PathBuf {
        match &self.log_file {
            Some(path) => Self::resolve(base_dir, path),
            None => base_dir.join(DEFAULT_LOG_FILE),
        }
    }

    pub fn template_path(&self, base_dir: &Path) -> PathBuf {
        match &self.template_path {
            Some(path) => Self::resolve(base_dir, path),
            None => base_dir.join("templates").join("payload.ps1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ObfusConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.max_script_size, 10 * 1024 * 1024);

        let base = Path::new("/work");
        assert_eq!(
            config.tools_dir(base),
            PathBuf::from("/work/Obfuscation_Technique")
        );
        assert_eq!(config.workspace_dir(base), PathBuf::from("/work/ObfusWorkspace"));
        assert_eq!(config.log_file(base), PathBuf::from("/work/obfusengine.log"));
        assert_eq!(
            config.template_path(base),
            PathBuf::from("/work/templates/payload.ps1")
        );
    }

    #[test]
    fn test_parse_file() {
        let file = ConfigFile::parse(
            r#"
timeout = "90s"
python = "python3.12"
tools_dir = "/opt/obfus"

[clipboard]
copy_command = "xsel --clipboard --input"
"#,
            Path::new("obfusengine.toml"),
        )
        .unwrap();

        assert_eq!(file.timeout, Some(Duration::from_secs(90)));
        assert_eq!(file.python.as_deref(), Some("python3.12"));
        assert_eq!(
            file.clipboard.copy_command.as_deref(),
            Some("xsel --clipboard --input")
        );
        assert!(file.powershell.is_none());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = ConfigFile::parse("timeuot = \"1s\"", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        let err: ObfusError = err.into();
        assert_eq!(err.code(), ErrorCode::CONFIG_PARSE_ERROR);
    }

    #[test]
    fn test_later_layers_win() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("obfusengine.toml");
        let explicit = dir.path().join("explicit.toml");
        std::fs::write(&global, "timeout = \"30s\"\npython = \"py-global\"\n").unwrap();
        std::fs::write(&project, "python = \"py-project\"\n").unwrap();
        std::fs::write(&explicit, "powershell = \"pwsh-preview\"\n").unwrap();

        let config = ObfusConfig::load_layers(
            &[global, dir.path().join("absent.toml"), project],
            Some(&explicit),
        )
        .unwrap();

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.python, "py-project");
        assert_eq!(config.powershell, "pwsh-preview");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = ObfusConfig::load_layers(&[], Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_merge_env() {
        let env: HashMap<&str, &str> = [
            ("OBFUS_TIMEOUT", "2m"),
            ("OBFUS_PYTHON", "/usr/bin/python3"),
            ("OBFUS_LOG_FILE", "/var/log/obfus.log"),
        ]
        .into_iter()
        .collect();

        let mut config = ObfusConfig::default();
        config
            .merge_env_with(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.python, "/usr/bin/python3");
        assert_eq!(config.powershell, "pwsh");
        assert_eq!(
            config.log_file(Path::new("/work")),
            PathBuf::from("/var/log/obfus.log")
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration(" 2m 30s "), Some(Duration::from_secs(150)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_bad_env_timeout() {
        let mut config = ObfusConfig::default();
        let err = config
            .merge_env_with(|key| (key == "OBFUS_TIMEOUT").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
