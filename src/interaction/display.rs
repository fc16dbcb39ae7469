//! Message display

/// Trait for displaying messages
pub trait MessageDisplay: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn success(&self, message: &str);
    /// Print preformatted text (tables, previews) as is.
    fn block(&self, text: &str);
}

/// Terminal display. Warnings and errors go to stderr.
pub struct MessageDisplayImpl {
    quiet: bool,
}

impl Default for MessageDisplayImpl {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MessageDisplayImpl {
    /// A quiet display drops info and success lines.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl MessageDisplay for MessageDisplayImpl {
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("ℹ️  {message}");
        }
    }

    fn warning(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("❌ {message}");
    }

    fn success(&self, message: &str) {
        if !self.quiet {
            println!("✅ {message}");
        }
    }

    fn block(&self, text: &str) {
        print!("{text}");
        if !text.ends_with('\n') {
            println!();
        }
    }
}
