use super::{ErrorCode, ObfusError};

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    fn to_pipeline_error(self, message: impl Into<String>) -> Result<T, ObfusError>;
    fn to_presentation_error(self, code: u16, message: impl Into<String>)
        -> Result<T, ObfusError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_pipeline_error(self, message: impl Into<String>) -> Result<T, ObfusError> {
        self.map_err(|e| {
            let source = e.into();
            ObfusError::pipeline(ErrorCode::PIPELINE_INPUT, message)
                .with_context(&source)
                .with_source(source)
        })
    }

    fn to_presentation_error(
        self,
        code: u16,
        message: impl Into<String>,
    ) -> Result<T, ObfusError> {
        self.map_err(|e| {
            let source = e.into();
            ObfusError::presentation(code, message)
                .with_context(&source)
                .with_source(source)
        })
    }
}
