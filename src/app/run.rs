//! The end-to-end flow for one invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::signal_handler::InterruptFlag;
use crate::cli::{options_from_cli, prompt_options, Cli, RunOptions, SourceChoice};
use crate::clipboard::{Clipboard, ClipboardCommands};
use crate::config::ObfusConfig;
use crate::environment::EnvironmentProber;
use crate::error::{ErrorCode, ErrorExt, ObfusError};
use crate::input::{resolve_input, InputSource};
use crate::interaction::UserInteraction;
use crate::pipeline::{
    PipelineOrchestrator, PipelineRequest, ProgressObserver, SilentObserver, StageObserver,
};
use crate::presenter::{Presentation, Presenter};
use crate::subprocess::{ProcessRunner, SubprocessManager};
use crate::technique::TechniqueInvoker;

/// Resolve `-d` into an absolute base directory. `~` is expanded and
/// relative paths are taken from the current directory.
pub fn resolve_base_dir(directory: Option<&str>) -> Result<PathBuf, ObfusError> {
    let cwd = std::env::current_dir().to_pipeline_error("could not read current directory")?;
    Ok(match directory {
        Some(raw) => {
            let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
            if expanded.is_absolute() {
                expanded
            } else {
                cwd.join(expanded)
            }
        }
        None => cwd,
    })
}

pub struct App {
    ui: Arc<dyn UserInteraction>,
    runner: Arc<dyn ProcessRunner>,
    config: ObfusConfig,
    base_dir: PathBuf,
    interrupted: InterruptFlag,
}

impl App {
    pub fn new(
        ui: Arc<dyn UserInteraction>,
        subprocess: SubprocessManager,
        config: ObfusConfig,
        base_dir: PathBuf,
    ) -> Self {
        Self {
            ui,
            runner: subprocess.runner(),
            config,
            base_dir,
            interrupted: InterruptFlag::new(),
        }
    }

    pub fn with_interrupt_flag(mut self, flag: InterruptFlag) -> Self {
        self.interrupted = flag;
        self
    }

    /// Run once and return the final artifact.
    pub async fn run(&self, cli: &Cli) -> Result<PathBuf, ObfusError> {
        let options = self.collect_options(cli).await?;
        debug!(?options, "Run options");

        let workspace = self.config.workspace_dir(&self.base_dir);
        std::fs::create_dir_all(&workspace).to_pipeline_error(format!(
            "could not create workspace {}",
            workspace.display()
        ))?;
        // Input paths are canonical, so the workspace must be too.
        let workspace = std::fs::canonicalize(&workspace).to_pipeline_error(format!(
            "could not resolve workspace {}",
            workspace.display()
        ))?;

        let tools_dir = self.config.tools_dir(&self.base_dir);
        self.check_environment(&tools_dir, cli.auto_accept).await?;

        let clipboard = Clipboard::new(
            Arc::clone(&self.runner),
            ClipboardCommands::detect().with_overrides(
                self.config.clipboard.copy_command.as_deref(),
                self.config.clipboard.paste_command.as_deref(),
            )?,
        );

        let source = self.input_source(&options.source, cli.template.as_deref());
        info!(%source, "Resolving input");
        let input = resolve_input(&source, &workspace, &clipboard).await?;

        let invoker = TechniqueInvoker::new(Arc::clone(&self.runner), tools_dir)
            .with_interpreters(self.config.powershell.clone(), self.config.python.clone());
        let observer: Box<dyn StageObserver> = if cli.quiet {
            Box::new(SilentObserver)
        } else {
            Box::new(ProgressObserver::new())
        };
        let request = PipelineRequest {
            selection: options.selection.clone(),
            input: input.clone(),
            workspace,
            output_name: options.output_name.clone(),
            timeout: self.config.timeout,
        };
        let outcome = {
            let _scope = self.interrupted.pipeline_scope();
            PipelineOrchestrator::new(&invoker)
                .with_observer(observer)
                .with_interrupt_flag(self.interrupted.raised())
                .run(&request)
                .await
        };
        info!(state = %outcome.state, "Pipeline finished");

        if !outcome.is_success() {
            for err in outcome.failures().filter_map(|result| result.to_error()) {
                warn!(code = err.code(), "{}", err);
                self.ui.display_error(&err.user_message());
            }
        }
        let successful = outcome.successful.clone();
        let artifact = outcome.into_artifact()?;

        Presenter::new(self.ui.as_ref(), &clipboard)
            .present(&Presentation {
                original: &input,
                artifact: &artifact,
                successful: &successful,
                encode: options.encode,
                view: options.view,
            })
            .await;

        Ok(artifact)
    }

    async fn collect_options(&self, cli: &Cli) -> Result<RunOptions, ObfusError> {
        if cli.is_complete() {
            return options_from_cli(cli, self.config.max_script_size);
        }
        prompt_options(self.ui.as_ref(), cli, self.config.max_script_size)
            .await
            .map_err(|e| {
                ObfusError::validation_with_code(
                    ErrorCode::VALIDATION_INCOMPLETE,
                    "interactive input ended before all options were given",
                    None,
                )
                .with_source(e)
            })
    }

    async fn check_environment(&self, tools_dir: &Path, auto_accept: bool) -> Result<(), ObfusError> {
        let report = EnvironmentProber::new(
            Arc::clone(&self.runner),
            tools_dir,
            self.config.powershell.clone(),
            self.config.python.clone(),
        )
        .probe()
        .await;
        self.ui.display_block(&report.render());

        let problems = report.problems();
        if problems.is_empty() {
            return Ok(());
        }
        for problem in &problems {
            warn!(code = problem.code(), "{}", problem);
            self.ui.display_warning(&problem.user_message());
        }
        if auto_accept {
            info!("Continuing with missing tools (--yes)");
            return Ok(());
        }

        let proceed = self
            .ui
            .prompt_yes_no("Continue anyway?", false)
            .await
            .unwrap_or(false);
        if proceed {
            Ok(())
        } else {
            Err(ObfusError::environment(
                ErrorCode::ENV_DECLINED,
                format!("missing {}", report.missing().join(", ")),
            ))
        }
    }

    fn input_source(&self, choice: &SourceChoice, template: Option<&Path>) -> InputSource {
        match choice {
            SourceChoice::Custom(path) => InputSource::Custom(path.clone()),
            SourceChoice::Clipboard => InputSource::Clipboard,
            SourceChoice::Generate { ip, port } => InputSource::Generate {
                ip: *ip,
                port: *port,
                template: template
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.config.template_path(&self.base_dir)),
            },
        }
    }
}
