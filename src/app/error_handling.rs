//! Error handling utilities
//!
//! This module turns a fatal error into operator output and an exit status.

use tracing::error;

use crate::error::{describe_error_code, ObfusError};

/// Report a fatal error and return the exit status for it.
///
/// - `verbose = 0`: the user-facing message only
/// - `verbose >= 1`: also the code and the source chain
pub fn handle_fatal_error(err: &ObfusError, verbose: u8) -> i32 {
    error!(code = err.code(), "Fatal error: {}", err);

    eprintln!("❌ {}", err.user_message());
    if verbose >= 1 {
        eprintln!("{}", code_line(err.code()));
        eprintln!("\nError chain:");
        eprintln!("  0: {err}");
        let mut source = std::error::Error::source(err);
        let mut depth = 1;
        while let Some(cause) = source {
            eprintln!("  {depth}: {cause}");
            source = cause.source();
            depth += 1;
        }
    }

    err.exit_code()
}

fn code_line(code: u16) -> String {
    format!("Error code: E{code:04} ({})", describe_error_code(code))
}
