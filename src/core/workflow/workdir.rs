//! Per-workflow and per-step working-directory lifecycle with path confinement.

use crate::core::error::{EngineError, EngineResult};
use crate::core::types::ErrorCategory;
use crate::utils::files::normalize_lexical;
use std::fs;
use std::path::{Path, PathBuf};

/// Create (or reuse) the root directory owned by a workflow instance.
pub fn create_workflow_root(run_root: &Path, workflow_id: &str) -> EngineResult<PathBuf> {
    let root = run_root.join(workflow_id);
    fs::create_dir_all(&root).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::IoError,
            format!("failed to create workflow root {}", root.display()),
            Box::new(err),
        )
    })?;
    Ok(root)
}

/// Prepare the working directory for one step, named by its command.
///
/// A pre-existing directory has its contents removed file-by-file; cleanup
/// failures are logged and skipped rather than failing the workflow.
pub fn setup_step_folder(workflow_root: &Path, command: &str) -> EngineResult<PathBuf> {
    if !workflow_root.is_dir() {
        return Err(EngineError::new(
            ErrorCategory::IoError,
            format!(
                "top level folder is not a valid directory \"{}\"",
                workflow_root.display()
            ),
        )
        .with_code("WF-DIR-002"));
    }
    validate_command_name(command)?;

    let workflow_root = workflow_root.canonicalize().map_err(|err| {
        EngineError::with_source(
            ErrorCategory::IoError,
            format!(
                "failed to canonicalize workflow root {}",
                workflow_root.display()
            ),
            Box::new(err),
        )
    })?;
    let step_folder = confine(&workflow_root, &workflow_root.join(command))?;

    if !step_folder.is_dir() {
        fs::create_dir(&step_folder).map_err(|err| {
            EngineError::with_source(
                ErrorCategory::IoError,
                format!(
                    "failed to create command working folder {}",
                    step_folder.display()
                ),
                Box::new(err),
            )
        })?;
        return Ok(step_folder);
    }

    let entries = match fs::read_dir(&step_folder) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(
                folder = %step_folder.display(),
                error = %err,
                "unable to list step folder for cleanup"
            );
            return Ok(step_folder);
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(err) = removed {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "ignoring cleanup failure and continuing"
            );
        }
    }

    Ok(step_folder)
}

/// Verify that `candidate`, after lexical normalisation, stays inside the
/// workflow root. Returns the normalised absolute path.
pub fn confine(workflow_root: &Path, candidate: &Path) -> EngineResult<PathBuf> {
    let root = normalize_lexical(workflow_root);
    let absolute = if candidate.is_absolute() {
        normalize_lexical(candidate)
    } else {
        normalize_lexical(&root.join(candidate))
    };
    if !absolute.starts_with(&root) {
        return Err(EngineError::new(
            ErrorCategory::ParameterError,
            format!(
                "path \"{}\" escapes the workflow root \"{}\"",
                candidate.display(),
                root.display()
            ),
        )
        .with_code("WF-DIR-001"));
    }
    Ok(absolute)
}

fn validate_command_name(command: &str) -> EngineResult<()> {
    let valid = !command.is_empty()
        && command
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(EngineError::new(
            ErrorCategory::ParameterError,
            format!("command \"{}\" is not usable as a folder name", command),
        )
        .with_code("WF-DIR-001"));
    }
    Ok(())
}
