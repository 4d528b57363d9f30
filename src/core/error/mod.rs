#![allow(clippy::result_large_err)] // Engine modules return EngineError directly to preserve structured diagnostic context without boxing.

use crate::core::types::ErrorCategory;
use std::fmt;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Structured engine error carrying a category, a stable code, and optional source/context.
#[derive(Debug)]
pub struct EngineError {
    pub category: ErrorCategory,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub context: Option<String>,
    pub code: String,
}

impl EngineError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        EngineError {
            category,
            message: message.into(),
            source: None,
            context: None,
            code: default_code(category).to_string(),
        }
    }

    pub fn with_source<T: Into<String>>(
        category: ErrorCategory,
        message: T,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        let mut error = EngineError::new(category, message);
        error.source = Some(source);
        error
    }

    pub fn with_context<T: Into<String>>(mut self, context: T) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    /// True when the error should refuse an operation rather than report a failure.
    pub fn is_conflict(&self) -> bool {
        self.category == ErrorCategory::ConflictError
    }
}

fn default_code(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::ParameterError => "WF-PARAM-000",
        ErrorCategory::StagingError => "WF-STAGE-000",
        ErrorCategory::ContainerError => "WF-RUN-000",
        ErrorCategory::ResultManifestError => "WF-RES-000",
        ErrorCategory::CryptError => "WF-CRYPT-000",
        ErrorCategory::UnknownCommandError => "WF-CMD-000",
        ErrorCategory::ConflictError => "WF-CONFLICT-000",
        ErrorCategory::NotFoundError => "WF-MISSING-000",
        ErrorCategory::IoError => "WF-IO-000",
        ErrorCategory::SerializationError => "WF-SER-000",
        ErrorCategory::InternalError => "WF-INT-000",
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        if let Some(ref context) = self.context {
            write!(f, " (Context: {})", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::with_source(ErrorCategory::IoError, err.to_string(), Box::new(err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::with_source(
            ErrorCategory::SerializationError,
            err.to_string(),
            Box::new(err),
        )
    }
}
