//! Command line surface.
//!
//! `args` holds the clap definition; `interactive` fills in whatever the
//! command line left out by asking the operator.

pub mod args;
pub mod interactive;

pub use args::Cli;
pub use interactive::{options_from_cli, prompt_options, RunOptions, SourceChoice};

/// Console filter for a `--verbose` count.
pub fn get_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
