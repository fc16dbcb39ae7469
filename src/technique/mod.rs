//! The fixed technique catalog.
//!
//! Each technique is one external obfuscator with a fixed invocation
//! contract. The four entries are data, not types: the invoker dispatches on
//! [`TechniqueId`] and reads everything else from the [`TechniqueDescriptor`].

pub mod invoker;
pub mod selection;

pub use invoker::{FailureKind, TechniqueInvoker, TechniqueResult};
pub use selection::{parse_selection, StageToken, TechniqueSelection};

use std::path::{Path, PathBuf};

/// Catalog key of a technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechniqueId {
    Invoke,
    Xencrypt,
    Chameleon,
    Pyfuscation,
}

impl TechniqueId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechniqueId::Invoke => "invoke",
            TechniqueId::Xencrypt => "xencrypt",
            TechniqueId::Chameleon => "chameleon",
            TechniqueId::Pyfuscation => "pyfuscation",
        }
    }

    /// Case-insensitive lookup of a catalog key.
    pub fn from_key(key: &str) -> Option<Self> {
        CATALOG
            .iter()
            .map(|descriptor| descriptor.id)
            .find(|id| id.as_str().eq_ignore_ascii_case(key.trim()))
    }

    pub fn descriptor(&self) -> &'static TechniqueDescriptor {
        match self {
            TechniqueId::Invoke => &CATALOG[0],
            TechniqueId::Xencrypt => &CATALOG[1],
            TechniqueId::Chameleon => &CATALOG[2],
            TechniqueId::Pyfuscation => &CATALOG[3],
        }
    }
}

impl std::fmt::Display for TechniqueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime that executes a technique's backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpreter {
    PowerShell,
    Python,
}

impl std::fmt::Display for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interpreter::PowerShell => f.write_str("PowerShell"),
            Interpreter::Python => f.write_str("Python"),
        }
    }
}

/// Where a technique leaves its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputConvention {
    /// Writes to the output path it is given.
    Direct,
    /// Ignores the requested output and always writes `file` inside
    /// `temp_dir` (relative to the tools directory). The invoker copies the
    /// file to the pipeline output and removes `temp_dir`.
    Relocate {
        temp_dir: &'static str,
        file: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueDescriptor {
    pub id: TechniqueId,
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub interpreter: Interpreter,
    /// Backing file, relative to the tools directory.
    pub script: &'static str,
    pub output: OutputConvention,
}

impl TechniqueDescriptor {
    pub fn script_path(&self, tools_dir: &Path) -> PathBuf {
        tools_dir.join(self.script)
    }

    /// Directory holding the backing file.
    pub fn script_dir(&self, tools_dir: &Path) -> PathBuf {
        let script = self.script_path(tools_dir);
        script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| tools_dir.to_path_buf())
    }
}

/// Sentinel accepted in technique lists; expands to the whole catalog.
pub const ALL_TECHNIQUES: &str = "all";

pub static CATALOG: [TechniqueDescriptor; 4] = [
    TechniqueDescriptor {
        id: TechniqueId::Invoke,
        name: "Invoke-PSObfuscation",
        category: "PowerShell",
        description: "PowerShell cmdlets, comments, and variable obfuscation",
        interpreter: Interpreter::PowerShell,
        script: "Invoke-PSObfuscation.ps1",
        output: OutputConvention::Direct,
    },
    TechniqueDescriptor {
        id: TechniqueId::Xencrypt,
        name: "BetterXencrypt",
        category: "PowerShell",
        description: "Advanced PowerShell encryption and obfuscation",
        interpreter: Interpreter::PowerShell,
        script: "BetterXencrypt.ps1",
        output: OutputConvention::Direct,
    },
    TechniqueDescriptor {
        id: TechniqueId::Chameleon,
        name: "Chameleon",
        category: "PowerShell",
        description: "Multi-layer PowerShell obfuscation with random backticks",
        interpreter: Interpreter::Python,
        script: "Chameleon/chameleon.py",
        output: OutputConvention::Direct,
    },
    TechniqueDescriptor {
        id: TechniqueId::Pyfuscation,
        name: "PyFuscation",
        category: "PowerShell",
        description: "Python-based PowerShell script obfuscation",
        interpreter: Interpreter::Python,
        script: "PyFuscation/PyFuscation.py",
        output: OutputConvention::Relocate {
            temp_dir: "PyFuscation/tmp",
            file: "script.ps1",
        },
    },
];

/// Render the catalog as the menu shown before technique selection.
pub fn render_catalog() -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:<22} {:<11} {}\n",
        "ID", "Technique", "Type", "Description"
    ));
    for descriptor in CATALOG.iter() {
        out.push_str(&format!(
            "{:<12} {:<22} {:<11} {}\n",
            descriptor.id.as_str(),
            descriptor.name,
            descriptor.category,
            descriptor.description
        ));
    }
    out.push_str(&format!(
        "{:<12} {:<22} {:<11} {}\n",
        ALL_TECHNIQUES, "All Techniques", "Combined", "Run all available techniques sequentially"
    ));
    out
}
