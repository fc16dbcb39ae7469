//! Command line composition for the system shell.
//!
//! Technique commands are handed to the shell as a single line. Every
//! interpolated value goes through [`shell_words::quote`] so file names with
//! shell metacharacters stay a single literal argument, and values embedded
//! in a PowerShell `-Command` script go through [`powershell_quote`] first.

use std::path::Path;

use super::builder::ProcessCommandBuilder;

/// Quote a value as a PowerShell single-quoted string literal.
///
/// Single quotes are the only metacharacter inside such a literal and are
/// escaped by doubling.
pub fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A program plus its arguments, rendered as one quoted shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellLine {
    program: String,
    args: Vec<String>,
}

impl ShellLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path(self, path: &Path) -> Self {
        let rendered = path.to_string_lossy().into_owned();
        self.arg(rendered)
    }

    /// The full line with every word quoted for a POSIX shell.
    pub fn render(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(self.args.iter()))
    }

    /// Build the process command that executes this line.
    ///
    /// On Unix the line runs under `sh -c` and `exec` replaces the shell with
    /// the tool, so the runner's timeout kill reaches the tool itself. Windows has no POSIX shell, so
    /// the program is started directly with its argument vector, which the
    /// standard library quotes for `CreateProcess`.
    pub fn into_command(self) -> ProcessCommandBuilder {
        if cfg!(windows) {
            ProcessCommandBuilder::new(&self.program).args(&self.args)
        } else {
            let line = self.render();
            ProcessCommandBuilder::new("sh")
                .arg("-c")
                .arg(&format!("exec {line}"))
        }
    }
}

impl std::fmt::Display for ShellLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}
