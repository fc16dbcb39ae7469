//! Application module
//!
//! This module contains application-level functionality including:
//! - Logging setup
//! - Interrupt handling
//! - The run flow from options to presentation

pub mod error_handling;
pub mod logging;
pub mod run;
pub mod signal_handler;


pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
pub use run::{resolve_base_dir, App};
pub use signal_handler::{setup_interrupt_handlers, InterruptFlag};
