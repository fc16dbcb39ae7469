//! Turning command line flags or operator answers into run options.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Result;

use super::Cli;
use crate::error::{ErrorCode, ObfusError};
use crate::interaction::UserInteraction;
use crate::technique::{render_catalog, TechniqueSelection};
use crate::validation::{
    check_ip, check_output_filename, check_port, check_script_path, check_techniques,
    ValidationError,
};

pub const DEFAULT_OUTPUT_NAME: &str = "obfuscated.ps1";
pub const DEFAULT_TECHNIQUES: &str = "invoke";
pub const DEFAULT_PORT: &str = "4444";

/// Source menu, in the order the answers are matched.
const SOURCE_MENU: [&str; 3] = ["Custom script", "Generate from template", "Clipboard"];

/// Where the input script comes from, before it is materialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChoice {
    Custom(PathBuf),
    Clipboard,
    Generate { ip: IpAddr, port: u16 },
}

/// Validated answers for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub source: SourceChoice,
    pub selection: TechniqueSelection,
    pub output_name: String,
    pub encode: bool,
    pub view: bool,
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).into_owned())
}

/// The source named on the command line, if one was given in full.
fn source_from_cli(
    cli: &Cli,
    max_script_size: u64,
) -> Option<Result<SourceChoice, ValidationError>> {
    if cli.hxshell {
        return Some(Ok(SourceChoice::Clipboard));
    }
    if let Some(path) = &cli.input_script {
        let path = expand_path(&path.to_string_lossy());
        return Some(
            check_script_path(&path, max_script_size, cli.allow_any_extension)
                .map(|()| SourceChoice::Custom(path)),
        );
    }
    let (Some(ip), Some(port)) = (&cli.ip, cli.port) else {
        return None;
    };
    Some(check_ip(ip).and_then(|ip| {
        Ok(SourceChoice::Generate {
            ip,
            port: check_port(port)?,
        })
    }))
}

/// Build options from a complete command line. Any invalid value is an
/// error; nothing is asked.
pub fn options_from_cli(cli: &Cli, max_script_size: u64) -> Result<RunOptions, ObfusError> {
    let techniques = cli.technique.as_deref().ok_or_else(|| {
        ObfusError::validation_with_code(
            ErrorCode::VALIDATION_INCOMPLETE,
            "a technique list is required (-t)",
            None,
        )
    })?;
    let selection = check_techniques(techniques)?;

    let source = match source_from_cli(cli, max_script_size) {
        Some(source) => source?,
        None => {
            return Err(ObfusError::validation_with_code(
                ErrorCode::VALIDATION_INCOMPLETE,
                "no input source: give -I, --hxshell, or both -i and -p",
                None,
            ))
        }
    };

    let output_name = cli
        .output_name
        .clone()
        .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string());
    check_output_filename(&output_name)?;

    Ok(RunOptions {
        source,
        selection,
        output_name,
        encode: cli.encode,
        view: cli.view,
    })
}

/// Ask for everything, re-asking until each answer is valid. Values given on
/// the command line become the defaults.
pub async fn prompt_options(
    ui: &dyn UserInteraction,
    cli: &Cli,
    max_script_size: u64,
) -> Result<RunOptions> {
    let source = match source_from_cli(cli, max_script_size) {
        Some(Ok(source)) => {
            ui.display_info("Step 1: using the script source from the command line");
            source
        }
        Some(Err(e)) => {
            ui.display_error(&e.to_string());
            prompt_source(ui, cli, max_script_size).await?
        }
        None => prompt_source(ui, cli, max_script_size).await?,
    };

    ui.display_info("Step 2: select obfuscation techniques");
    ui.display_block(&render_catalog());
    let default_techniques = cli.technique.as_deref().unwrap_or(DEFAULT_TECHNIQUES);
    let selection = loop {
        let answer = ui
            .prompt_text(
                "Techniques (comma separated) or 'all'",
                Some(default_techniques),
            )
            .await?;
        match check_techniques(&answer) {
            Ok(selection) => break selection,
            Err(e) => ui.display_error(&e.to_string()),
        }
    };

    ui.display_info("Step 3: output");
    let default_output = cli.output_name.as_deref().unwrap_or(DEFAULT_OUTPUT_NAME);
    let output_name = loop {
        let answer = ui
            .prompt_text("Output file name", Some(default_output))
            .await?;
        let answer = answer.trim().to_string();
        match check_output_filename(&answer) {
            Ok(()) => break answer,
            Err(e) => ui.display_error(&e.to_string()),
        }
    };

    let encode = ui
        .prompt_yes_no("Base64 encode the output?", cli.encode)
        .await?;
    let view = ui
        .prompt_yes_no("Show script contents after obfuscation?", cli.view)
        .await?;

    Ok(RunOptions {
        source,
        selection,
        output_name,
        encode,
        view,
    })
}

async fn prompt_source(
    ui: &dyn UserInteraction,
    cli: &Cli,
    max_script_size: u64,
) -> Result<SourceChoice> {
    ui.display_info("Step 1: choose your script source");
    let choices: Vec<String> = SOURCE_MENU.iter().map(|s| s.to_string()).collect();
    Ok(match ui.prompt_choice("Script source:", &choices).await? {
        0 => prompt_custom_path(ui, cli.allow_any_extension, max_script_size).await?,
        1 => prompt_listener(ui, cli).await?,
        _ => SourceChoice::Clipboard,
    })
}

async fn prompt_custom_path(
    ui: &dyn UserInteraction,
    allow_any_extension: bool,
    max_script_size: u64,
) -> Result<SourceChoice> {
    loop {
        let answer = ui.prompt_text("Path to your script", None).await?;
        let path = expand_path(&answer);
        match check_script_path(&path, max_script_size, allow_any_extension) {
            Ok(()) => return Ok(SourceChoice::Custom(path)),
            Err(ValidationError::UnsupportedExtension { .. }) => {
                if ui
                    .prompt_yes_no("Unusual extension. Use it anyway?", false)
                    .await?
                    && check_script_path(&path, max_script_size, true).is_ok()
                {
                    return Ok(SourceChoice::Custom(path));
                }
            }
            Err(e) => ui.display_error(&e.to_string()),
        }
    }
}

async fn prompt_listener(ui: &dyn UserInteraction, cli: &Cli) -> Result<SourceChoice> {
    let default_port = cli
        .port
        .filter(|port| check_port(*port).is_ok())
        .map(|port| port.to_string());
    let default_port = default_port.as_deref().unwrap_or(DEFAULT_PORT);
    let ip = loop {
        let answer = ui
            .prompt_text("Listener IP address", cli.ip.as_deref())
            .await?;
        match check_ip(answer.trim()) {
            Ok(ip) => break ip,
            Err(e) => ui.display_error(&e.to_string()),
        }
    };
    let port = loop {
        let answer = ui.prompt_text("Listener port", Some(default_port)).await?;
        let parsed = answer.trim().parse::<i64>().map_err(|_| ValidationError::InvalidPort(0));
        match parsed.and_then(check_port) {
            Ok(port) => break port,
            Err(_) => ui.display_error(&format!("'{}' is not a port between 1 and 65535", answer.trim())),
        }
    };
    Ok(SourceChoice::Generate { ip, port })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::mocks::MockUserInteraction;
    use crate::technique::TechniqueId;
    use crate::validation::MAX_SCRIPT_SIZE;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["obfusengine"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_from_cli_custom_script() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("a.ps1");
        std::fs::write(&script, "x").unwrap();

        let options = options_from_cli(
            &cli(&["-I", script.to_str().unwrap(), "-t", "ALL", "-e"]),
            MAX_SCRIPT_SIZE,
        )
        .unwrap();

        assert_eq!(options.source, SourceChoice::Custom(script));
        assert_eq!(options.selection, TechniqueSelection::all());
        assert_eq!(options.output_name, DEFAULT_OUTPUT_NAME);
        assert!(options.encode);
        assert!(!options.view);
    }

    #[test]
    fn test_from_cli_rejects_traversal_output() {
        let err = options_from_cli(
            &cli(&["--hxshell", "-t", "invoke", "-o", "../../etc/passwd"]),
            MAX_SCRIPT_SIZE,
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_OUTPUT_NAME);
    }

    #[test]
    fn test_from_cli_rejects_bad_ip() {
        let err = options_from_cli(
            &cli(&["-i", "999.999.999.999", "-p", "4444", "-t", "invoke"]),
            MAX_SCRIPT_SIZE,
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_IP);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_from_cli_rejects_unknown_technique() {
        let err = options_from_cli(&cli(&["--hxshell", "-t", "invoke,zzz"]), MAX_SCRIPT_SIZE)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_TECHNIQUES);
    }

    #[test]
    fn test_from_cli_requires_source() {
        let err = options_from_cli(&cli(&["-t", "invoke"]), MAX_SCRIPT_SIZE).unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_INCOMPLETE);
    }

    #[tokio::test]
    async fn test_prompts_reask_on_bad_ip() {
        let ui = MockUserInteraction::new();
        ui.add_choice_response(1);
        ui.add_text_response("999.999.999.999");
        ui.add_text_response("192.168.1.10");
        ui.add_text_response("");
        ui.add_text_response("bogus");
        ui.add_text_response("chameleon, invoke");
        ui.add_text_response("../x.ps1");
        ui.add_text_response("");

        let options = prompt_options(&ui, &Cli::default(), MAX_SCRIPT_SIZE)
            .await
            .unwrap();

        assert_eq!(
            options.source,
            SourceChoice::Generate {
                ip: "192.168.1.10".parse().unwrap(),
                port: 4444
            }
        );
        assert_eq!(
            options.selection.known(),
            vec![TechniqueId::Chameleon, TechniqueId::Invoke]
        );
        assert_eq!(options.output_name, DEFAULT_OUTPUT_NAME);
        assert!(!options.encode);
        assert!(!options.view);
        assert!(ui.has_message("ERROR:", "999.999.999.999"));
        assert!(ui.has_message("ERROR:", "bogus"));
        assert!(ui.has_message("ERROR:", "../x.ps1"));
    }

    #[tokio::test]
    async fn test_prompts_custom_path_with_override() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("payload.bat");
        std::fs::write(&script, "echo").unwrap();

        let ui = MockUserInteraction::new();
        ui.add_choice_response(0);
        ui.add_text_response(dir.path().join("missing.ps1").to_str().unwrap());
        ui.add_text_response(script.to_str().unwrap());
        ui.add_yes_no_response(true);
        ui.add_text_response("");
        ui.add_text_response("");
        ui.add_yes_no_response(true);
        ui.add_yes_no_response(false);

        let options = prompt_options(&ui, &Cli::default(), MAX_SCRIPT_SIZE)
            .await
            .unwrap();

        assert_eq!(options.source, SourceChoice::Custom(script));
        assert!(options.encode);
        assert!(!options.view);
        assert!(ui.has_message("ERROR:", "does not exist"));
    }

    #[tokio::test]
    async fn test_prompt_defaults_come_from_cli() {
        let ui = MockUserInteraction::new();
        ui.add_choice_response(2);
        ui.add_text_response("");
        ui.add_text_response("");

        let options = prompt_options(
            &ui,
            &cli(&["-t", "xencrypt", "-o", "mine.ps1"]),
            MAX_SCRIPT_SIZE,
        )
        .await
        .unwrap();

        assert_eq!(options.source, SourceChoice::Clipboard);
        assert_eq!(options.selection.known(), vec![TechniqueId::Xencrypt]);
        assert_eq!(options.output_name, "mine.ps1");
    }

    #[tokio::test]
    async fn test_partial_command_line_keeps_source_and_view() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("x.ps1");
        std::fs::write(&script, "Write-Host 'x'").unwrap();

        // Only the technique and output prompts are answered.
        let ui = MockUserInteraction::new();
        ui.add_text_response("");
        ui.add_text_response("");

        let options = prompt_options(
            &ui,
            &cli(&["-I", script.to_str().unwrap(), "-v"]),
            MAX_SCRIPT_SIZE,
        )
        .await
        .unwrap();

        assert_eq!(options.source, SourceChoice::Custom(script));
        assert_eq!(options.selection.known(), vec![TechniqueId::Invoke]);
        assert!(options.view);
        assert!(!options.encode);
    }

    #[tokio::test]
    async fn test_bad_source_on_command_line_falls_back_to_menu() {
        let ui = MockUserInteraction::new();
        ui.add_choice_response(1);
        ui.add_text_response("");
        ui.add_text_response("");
        ui.add_text_response("");
        ui.add_text_response("");

        let options = prompt_options(
            &ui,
            &cli(&["-i", "10.0.0.5", "-p", "70000"]),
            MAX_SCRIPT_SIZE,
        )
        .await
        .unwrap();

        assert_eq!(
            options.source,
            SourceChoice::Generate {
                ip: "10.0.0.5".parse().unwrap(),
                port: 4444
            }
        );
        assert!(ui.has_message("ERROR:", "70000"));
    }
}
