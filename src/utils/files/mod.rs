use crate::core::error::{EngineError, EngineResult};
use crate::core::types::ErrorCategory;
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Load and parse a JSON file.
pub fn load_json_file(path: &Path) -> EngineResult<Value> {
    let raw = fs::read_to_string(path).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::IoError,
            format!("failed to read JSON file {}", path.display()),
            Box::new(err),
        )
    })?;
    serde_json::from_str(&raw).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::SerializationError,
            format!("failed to parse JSON file {}", path.display()),
            Box::new(err),
        )
    })
}

/// Write a JSON value to a file with pretty formatting.
pub fn write_json_file(path: &Path, value: &Value) -> EngineResult<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    fs::write(path, rendered).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::IoError,
            format!("failed to write JSON file {}", path.display()),
            Box::new(err),
        )
    })
}

/// Write a JSON value atomically: serialise to a sibling temp file, then rename.
///
/// Readers racing with the write therefore always observe a complete document.
pub fn write_json_atomic(path: &Path, value: &Value) -> EngineResult<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    let parent = path.parent().ok_or_else(|| {
        EngineError::new(
            ErrorCategory::IoError,
            format!("no parent directory for {}", path.display()),
        )
    })?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot");
    let temp_path = parent.join(format!(".{}.tmp", file_name));
    fs::write(&temp_path, rendered).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::IoError,
            format!("failed to write {}", temp_path.display()),
            Box::new(err),
        )
    })?;
    fs::rename(&temp_path, path).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::IoError,
            format!("failed to replace {}", path.display()),
            Box::new(err),
        )
    })
}

/// True for a 32-character lowercase-hex workflow identifier.
pub fn is_workflow_id(name: &str) -> bool {
    name.len() == 32 && name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Resolve `.` and `..` components lexically, without touching the filesystem.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::RootDir | Component::Prefix(_) => normalized.push(component.as_os_str()),
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}
