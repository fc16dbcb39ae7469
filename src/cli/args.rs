//! CLI argument structures

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::parse_duration;

/// Chain PowerShell and Python obfuscators over one script
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "obfusengine")]
#[command(
    about = "obfusengine - Chain external script obfuscators into one pipeline",
    long_about = "Runs the selected obfuscation techniques one after another, feeding each \
                  successful result into the next. Run without arguments for interactive mode."
)]
#[command(version)]
pub struct Cli {
    /// Existing script to obfuscate
    #[arg(short = 'I', long = "input-script", value_name = "PATH")]
    pub input_script: Option<PathBuf>,

    /// Listener address for a script generated from the template
    #[arg(short = 'i', long, value_name = "IP")]
    pub ip: Option<String>,

    /// Listener port for a script generated from the template
    #[arg(short = 'p', long, value_name = "PORT", allow_negative_numbers = true)]
    pub port: Option<i64>,

    /// Read the input script from the clipboard
    #[arg(long)]
    pub hxshell: bool,

    /// Template used to generate a script (placeholders {{LHOST}} and {{LPORT}})
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Accept an input script with any extension
    #[arg(long)]
    pub allow_any_extension: bool,

    /// Comma separated techniques, or 'all'
    #[arg(short = 't', long = "technique", value_name = "LIST")]
    pub technique: Option<String>,

    /// Base directory holding the tools and the workspace (defaults to current directory)
    #[arg(short = 'd', long, value_name = "DIR")]
    pub directory: Option<String>,

    /// Output file name inside the workspace [default: obfuscated.ps1]
    #[arg(short = 'o', long = "output-name", alias = "oN", value_name = "NAME")]
    pub output_name: Option<String>,

    /// Also write a base64 encoded copy of the result
    #[arg(short = 'e', long)]
    pub encode: bool,

    /// Show original and obfuscated script side by side
    #[arg(short = 'v', long)]
    pub view: bool,

    /// Continue without asking when tools are missing
    #[arg(short = 'y', long = "yes")]
    pub auto_accept: bool,

    /// Per-technique timeout, e.g. 90s or 5m
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Configuration file
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file [default: <DIR>/obfusengine.log]
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// No progress bars or informational output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase console log verbosity (repeatable)
    #[arg(long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    match parse_duration(value) {
        Some(duration) if !duration.is_zero() => Ok(duration),
        Some(_) => Err("timeout must be greater than zero".to_string()),
        None => Err(format!("'{value}' is not a duration (try 90s or 5m)")),
    }
}

impl Cli {
    /// True when enough was given on the command line to skip the prompts.
    pub fn is_complete(&self) -> bool {
        let has_source =
            self.input_script.is_some() || self.hxshell || (self.ip.is_some() && self.port.is_some());
        self.technique.is_some() && has_source
    }
}
