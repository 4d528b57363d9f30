//! Shared enumerations used across the workflow engine.

use serde::{Deserialize, Serialize};

/// Error classification used by `EngineError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    ParameterError,
    StagingError,
    ContainerError,
    ResultManifestError,
    CryptError,
    UnknownCommandError,
    ConflictError,
    NotFoundError,
    IoError,
    SerializationError,
    InternalError,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Coarse workflow state reported to pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    NotStarted,
    Running,
    Finished,
}

impl RunState {
    /// Numeric code used by the polling surface.
    pub fn as_code(&self) -> u8 {
        match self {
            RunState::NotStarted => 0,
            RunState::Running => 1,
            RunState::Finished => 2,
        }
    }
}

/// Declared type of a template field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    File,
    Folder,
    String,
    Float,
    Int,
}

/// Where a field value comes from: the caller's UI or a prior step's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldVisibility {
    Ui,
    Server,
}

impl Default for FieldVisibility {
    fn default() -> Self {
        FieldVisibility::Ui
    }
}

/// Declared type of a step result artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    File,
    Folder,
}
