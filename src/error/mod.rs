use std::fmt::Display;
use thiserror::Error;

pub mod codes;
pub mod helpers;

#[cfg(test)]
mod tests;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::ErrorExt;

/// The unified error type for ObfusEngine
///
/// Technique failures are never raised through this type during a run: they
/// are recorded in the stage's `TechniqueResult`. The `Technique` variant
/// exists for callers that need to surface one as a hard error.
#[derive(Error, Debug)]
pub enum ObfusError {
    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Environment error: {message}")]
    Environment {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Technique '{technique}' failed: {message}")]
    Technique {
        code: u16,
        technique: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Pipeline error: {message}")]
    Pipeline {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Presentation error: {message}")]
    Presentation {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ObfusError {
    /// Create a validation error with default code
    pub fn validation(message: impl Into<String>) -> Self {
        Self::validation_with_code(ErrorCode::VALIDATION_GENERIC, message, None)
    }

    /// Create a validation error with specific code and field
    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    pub fn environment(code: u16, message: impl Into<String>) -> Self {
        Self::Environment {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn technique(code: u16, technique: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Technique {
            code,
            technique: technique.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn pipeline(code: u16, message: impl Into<String>) -> Self {
        Self::Pipeline {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn presentation(code: u16, message: impl Into<String>) -> Self {
        Self::Presentation {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with default code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a generic other error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Validation { source: src, .. }
            | Self::Environment { source: src, .. }
            | Self::Technique { source: src, .. }
            | Self::Pipeline { source: src, .. }
            | Self::Presentation { source: src, .. }
            | Self::Config { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Validation { message, .. }
            | Self::Environment { message, .. }
            | Self::Technique { message, .. }
            | Self::Pipeline { message, .. }
            | Self::Presentation { message, .. }
            | Self::Config { message, .. }
            | Self::Other { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation { code, .. }
            | Self::Environment { code, .. }
            | Self::Technique { code, .. }
            | Self::Pipeline { code, .. }
            | Self::Presentation { code, .. }
            | Self::Config { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Pipeline { code, .. } if *code == ErrorCode::PIPELINE_INTERRUPTED => 130,
            _ => 1,
        }
    }

    /// Presentation problems are reported but never change the run status.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Presentation { .. })
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, field, .. } => match field {
                Some(f) => format!("Invalid {}: {}", f, message),
                None => format!("Validation error: {}", message),
            },
            Self::Environment { message, .. } => format!("Environment problem: {}", message),
            Self::Technique {
                technique, message, ..
            } => format!("{} failed: {}", technique, message),
            Self::Pipeline { message, .. } => format!("Obfuscation failed: {}", message),
            Self::Presentation { message, .. } => message.clone(),
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::Other { message, .. } => message.clone(),
        }
    }
}

impl From<std::io::Error> for ObfusError {
    fn from(err: std::io::Error) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_IO,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<crate::validation::ValidationError> for ObfusError {
    fn from(err: crate::validation::ValidationError) -> Self {
        let (code, field) = err.code_and_field();
        Self::Validation {
            code,
            message: err.to_string(),
            field: Some(field.to_string()),
            source: None,
        }
    }
}
