use clap::Parser;
use std::sync::Arc;
use tracing::debug;

use obfusengine::app::{
    handle_fatal_error, init_logging, resolve_base_dir, setup_interrupt_handlers, App,
};
use obfusengine::cli::Cli;
use obfusengine::config::ObfusConfig;
use obfusengine::error::ObfusError;
use obfusengine::interaction::DefaultUserInteraction;
use obfusengine::subprocess::SubprocessManager;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli.clone()).await {
        Ok(()) => 0,
        Err(err) => handle_fatal_error(&err, cli.verbose),
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), ObfusError> {
    let base_dir = resolve_base_dir(cli.directory.as_deref())?;
    let mut config = ObfusConfig::load(&base_dir, cli.config.as_deref())?;
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }
    if let Some(path) = &cli.log_file {
        config.log_file = Some(path.clone());
    }

    init_logging(cli.verbose, Some(&config.log_file(&base_dir)));
    debug!(base_dir = %base_dir.display(), ?config, "Configuration loaded");

    let interrupted = setup_interrupt_handlers().map_err(|e| {
        ObfusError::other("could not install interrupt handler").with_source(e)
    })?;

    let ui = Arc::new(DefaultUserInteraction::new(cli.quiet));
    App::new(ui, SubprocessManager::production(), config, base_dir)
        .with_interrupt_flag(interrupted)
        .run(&cli)
        .await
        .map(|_| ())
}
