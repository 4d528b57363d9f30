//! Result manifest loading and the container-to-host path rewrite.

use crate::core::error::{EngineError, EngineResult};
use crate::core::types::ErrorCategory;
use crate::utils::files::load_json_file;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// Manifest written by a step into its working directory.
pub const RESULT_FILE_NAME: &str = "result.json";
/// Container-side mount of the step's working directory.
pub const CONTAINER_OUTPUT_FOLDER: &str = "/output";
/// Container-side mount of the workflow input area.
pub const CONTAINER_INPUT_FOLDER: &str = "/input";

/// Re-root `path` from `from_folder` onto `to_folder`.
///
/// Only whole path components count as a match: `/a/b/c` is not a prefix of
/// `/a/b/concord` but is of `/a/b/c/dogs.csv`. `None` when the prefix does
/// not apply.
pub fn replace_folder_path(path: &str, from_folder: &str, to_folder: &str) -> Option<String> {
    let remainder = path.strip_prefix(from_folder)?;
    let trimmed = from_folder.trim_end_matches(['/', '\\']);
    match path.as_bytes().get(trimmed.len()) {
        Some(b'/') | Some(b'\\') => {}
        _ => return None,
    }
    let remainder = remainder.trim_start_matches(['/', '\\']);
    Some(
        Path::new(to_folder)
            .join(remainder)
            .to_string_lossy()
            .into_owned(),
    )
}

/// Rewrite a container-qualified output path onto the step directory.
pub fn rewrite_output_path(path: &str, working_folder: &Path) -> Option<String> {
    replace_folder_path(
        path,
        CONTAINER_OUTPUT_FOLDER,
        &working_folder.to_string_lossy(),
    )
}

fn rewrite_file_entries(files: &mut Value, working_folder: &Path) {
    let Some(items) = files.as_array_mut() else {
        return;
    };
    for item in items {
        let Some(entry) = item.as_object_mut() else {
            continue;
        };
        if let Some(Value::String(path)) = entry.get("path") {
            match rewrite_output_path(path, working_folder) {
                Some(host_path) => {
                    entry.insert("path".to_string(), Value::String(host_path));
                }
                None => {
                    tracing::debug!(path = %path, "manifest path is not container-qualified");
                    entry.insert("path".to_string(), Value::Null);
                }
            }
        }
    }
}

/// Load the step's result manifest and rewrite its paths to host paths.
///
/// A missing manifest yields an empty object; a malformed one is an error the
/// caller treats as terminal when the step requires results.
pub fn load_step_results(working_folder: &Path) -> EngineResult<Value> {
    let manifest_path = working_folder.join(RESULT_FILE_NAME);
    if !manifest_path.exists() {
        return Ok(json!({}));
    }
    let mut manifest = load_json_file(&manifest_path).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::ResultManifestError,
            format!("unable to load results from {}", manifest_path.display()),
            Box::new(err),
        )
        .with_code("WF-RES-001")
    })?;
    if !manifest.is_object() {
        return Err(EngineError::new(
            ErrorCategory::ResultManifestError,
            format!("unexpected manifest shape in {}", manifest_path.display()),
        )
        .with_code("WF-RES-001"));
    }

    if let Some(files) = manifest.get_mut("file") {
        rewrite_file_entries(files, working_folder);
    }
    if let Some(Value::Array(containers)) = manifest.get_mut("container") {
        for container in containers {
            if let Some(files) = container.get_mut("file") {
                rewrite_file_entries(files, working_folder);
            }
        }
    }

    Ok(manifest)
}

/// Load manifests recursively: the step directory's own manifest followed by
/// every manifest found in its subdirectories, depth-first.
///
/// Empty manifests are omitted; per-plot steps rely on this to aggregate one
/// manifest per plot subdirectory.
pub fn load_step_results_recursive(working_folder: &Path) -> EngineResult<Vec<Value>> {
    let mut manifests = Vec::new();
    let top = load_step_results(working_folder)?;
    if top.as_object().map(|map| !map.is_empty()).unwrap_or(false) {
        manifests.push(top);
    }

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(working_folder)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect()
        })
        .unwrap_or_default();
    subdirs.sort();

    for subdir in subdirs {
        manifests.extend(load_step_results_recursive(&subdir)?);
    }
    Ok(manifests)
}

/// Rewrite the `DIR` entries of a found-files JSON onto `target_folder` and
/// write the adjusted copy into `working_folder` under the same basename.
///
/// When `source_folder` is absent the first entry's parent directory is used
/// as a best guess. `None` on any failure; the caller then falls back to the
/// unmodified file.
pub fn repoint_found_files(
    filename: &Path,
    source_folder: Option<&str>,
    target_folder: &str,
    working_folder: &Path,
) -> Option<PathBuf> {
    if !filename.is_file() {
        tracing::warn!(file = %filename.display(), "invalid file specified for repointing");
        return None;
    }
    if !working_folder.is_dir() {
        tracing::warn!(
            folder = %working_folder.display(),
            "invalid working folder specified for repointing"
        );
        return None;
    }

    let document = match load_json_file(filename) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(file = %filename.display(), error = %err, "unable to load found-files JSON");
            return None;
        }
    };
    let Some(entries) = document.get("FILE_LIST").and_then(Value::as_array) else {
        tracing::warn!(file = %filename.display(), "found-files JSON is missing a FILE_LIST array");
        return None;
    };

    let source = match source_folder.filter(|folder| !folder.is_empty()) {
        Some(folder) => folder.to_string(),
        None => {
            let first_dir = entries
                .first()
                .and_then(|entry| entry.get("DIR"))
                .and_then(Value::as_str)?;
            let trimmed = first_dir.trim_end_matches(['/', '\\']);
            Path::new(trimmed)
                .parent()
                .map(|parent| parent.to_string_lossy().into_owned())?
        }
    };

    let mut adjusted = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut entry = entry.as_object().cloned().unwrap_or_else(Map::new);
        let Some(dir) = entry.get("DIR").and_then(Value::as_str).map(str::to_string) else {
            tracing::warn!(file = %filename.display(), "found-files entry has no DIR key");
            return None;
        };
        if dir.starts_with(&source) {
            if let Some(new_dir) = replace_folder_path(&dir, &source, target_folder) {
                entry.insert("DIR".to_string(), Value::String(new_dir));
            } else {
                tracing::warn!(dir = %dir, "found-files DIR not re-rooted; keeping original");
            }
        }
        adjusted.push(Value::Object(entry));
    }

    let new_file = working_folder.join(filename.file_name()?);
    let rendered = serde_json::to_string_pretty(&json!({ "FILE_LIST": adjusted })).ok()?;
    if let Err(err) = std::fs::write(&new_file, rendered) {
        tracing::warn!(file = %new_file.display(), error = %err, "unable to write repointed JSON");
        return None;
    }
    Some(new_file)
}
