//! # obfusengine
//!
//! Chains external PowerShell and Python obfuscators over a single script.
//!
//! ## Usage
//!
//! ```bash
//! obfusengine -I script.ps1 -t invoke,chameleon -e
//! obfusengine -i 10.0.0.5 -p 4444 -t all
//! obfusengine            # interactive
//! ```
//!
//! ## Modules
//!
//! - `app` - Logging, interrupt handling, and the run flow
//! - `cli` - Command line definition and interactive prompts
//! - `clipboard` - System clipboard through platform commands
//! - `config` - Layered TOML configuration with environment overrides
//! - `environment` - Probing for tools and interpreters
//! - `input` - Resolving the first stage's input file
//! - `pipeline` - Sequential technique pipeline and progress reporting
//! - `presenter` - Size report, base64 export, and previews
//! - `subprocess` - Process execution behind a mockable runner
//! - `technique` - Technique catalog, selection parsing, and invocation
//! - `validation` - Checks for operator-supplied values
pub mod app;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod environment;
pub mod error;
pub mod input;
pub mod interaction;
pub mod pipeline;
pub mod presenter;
pub mod subprocess;
pub mod technique;
pub mod validation;
