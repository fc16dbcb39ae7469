//! Line-based prompts on stdin/stdout

use anyhow::Result;
use async_trait::async_trait;
use std::io::{self, Write};

/// Questions asked on the operator's terminal.
#[async_trait]
pub trait UserPrompter: Send + Sync {
    /// Yes/no question; an empty answer selects `default`
    async fn prompt_yes_no(&self, message: &str, default: bool) -> Result<bool>;

    /// Free text; an empty answer selects `default` when there is one
    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String>;

    /// Numbered menu, returning the 0-based index
    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize>;
}

/// Prompts on the process's own stdin and stdout.
///
/// Every read fails once stdin is closed, so piped input that runs out
/// ends the run instead of looping.
#[derive(Default)]
pub struct UserPrompterImpl;

impl UserPrompterImpl {
    pub fn new() -> Self {
        Self
    }

    fn ask(prompt: &str) -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            anyhow::bail!("Input closed while waiting for an answer");
        }
        Ok(input.trim().to_string())
    }

    /// Interpret a yes/no answer. Returns None for anything unrecognised.
    pub fn parse_yes_no(input: &str, default: bool) -> Option<bool> {
        match input.trim().to_lowercase().as_str() {
            "" => Some(default),
            "y" | "yes" => Some(true),
            "n" | "no" => Some(false),
            _ => None,
        }
    }

    /// 1-based menu answer to a 0-based index.
    pub fn parse_choice(input: &str, num_choices: usize) -> Option<usize> {
        match input.trim().parse::<usize>() {
            Ok(n) if (1..=num_choices).contains(&n) => Some(n - 1),
            _ => None,
        }
    }

    pub fn render_menu(message: &str, choices: &[String]) -> String {
        let mut menu = format!("{message}\n");
        for (i, choice) in choices.iter().enumerate() {
            menu.push_str(&format!("  {}. {}\n", i + 1, choice));
        }
        menu
    }
}

#[async_trait]
impl UserPrompter for UserPrompterImpl {
    async fn prompt_yes_no(&self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let input = Self::ask(&format!("{message} {hint}: "))?;
            if let Some(answer) = Self::parse_yes_no(&input, default) {
                return Ok(answer);
            }
            println!("Please answer y or n.");
        }
    }

    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String> {
        let prompt = match default {
            Some(value) => format!("{message} [{value}]: "),
            None => format!("{message}: "),
        };
        let input = Self::ask(&prompt)?;

        match default {
            Some(value) if input.is_empty() => Ok(value.to_string()),
            _ => Ok(input),
        }
    }

    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize> {
        if choices.is_empty() {
            anyhow::bail!("No choices provided");
        }

        print!("{}", Self::render_menu(message, choices));
        let prompt = format!("Enter choice (1-{}): ", choices.len());
        loop {
            let input = Self::ask(&prompt)?;
            if let Some(index) = Self::parse_choice(&input, choices.len()) {
                return Ok(index);
            }
            println!("'{input}' is not on the menu.");
        }
    }
}
