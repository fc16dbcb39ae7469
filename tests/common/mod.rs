//! Shared helpers for the integration tests

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A base directory with an empty workspace and no global config.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.base().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    /// The binary, pointed at this base directory with interpreters that
    /// cannot be found unless the test configures them.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("obfusengine").unwrap();
        cmd.arg("-d")
            .arg(self.base())
            .env("XDG_CONFIG_HOME", self.base().join(".config"))
            .env("HOME", self.base())
            .env("OBFUS_POWERSHELL", "/nonexistent/pwsh")
            .env("OBFUS_PYTHON", "/nonexistent/python3")
            .env_remove("RUST_LOG");
        cmd
    }
}
