//! User interaction: prompts and terminal messages.

pub mod display;
pub mod prompts;

pub use display::{MessageDisplay, MessageDisplayImpl};
pub use prompts::{UserPrompter, UserPrompterImpl};

use anyhow::Result;
use async_trait::async_trait;

/// Everything the run flow needs from the operator's terminal.
#[async_trait]
pub trait UserInteraction: Send + Sync {
    async fn prompt_yes_no(&self, message: &str, default: bool) -> Result<bool>;

    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String>;

    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize>;

    fn display_info(&self, message: &str);

    fn display_warning(&self, message: &str);

    fn display_error(&self, message: &str);

    fn display_success(&self, message: &str);

    fn display_block(&self, text: &str);
}

/// Default implementation of user interaction
pub struct DefaultUserInteraction {
    prompter: UserPrompterImpl,
    display: MessageDisplayImpl,
}

impl Default for DefaultUserInteraction {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DefaultUserInteraction {
    pub fn new(quiet: bool) -> Self {
        Self {
            prompter: UserPrompterImpl::new(),
            display: MessageDisplayImpl::new(quiet),
        }
    }
}

#[async_trait]
impl UserInteraction for DefaultUserInteraction {
    async fn prompt_yes_no(&self, message: &str, default: bool) -> Result<bool> {
        self.prompter.prompt_yes_no(message, default).await
    }

    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String> {
        self.prompter.prompt_text(message, default).await
    }

    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize> {
        self.prompter.prompt_choice(message, choices).await
    }

    fn display_info(&self, message: &str) {
        self.display.info(message);
    }

    fn display_warning(&self, message: &str) {
        self.display.warning(message);
    }

    fn display_error(&self, message: &str) {
        self.display.error(message);
    }

    fn display_success(&self, message: &str) {
        self.display.success(message);
    }

    fn display_block(&self, text: &str) {
        self.display.block(text);
    }
}
