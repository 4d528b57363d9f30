//! Step registry: maps a command name onto its container invocation contract.
//!
//! Adding an algorithm means registering one handler here; the executor never
//! changes.

pub mod canopycover;
pub mod find_files;
pub mod git;
pub mod greenness;
pub mod merge_csv;
pub mod plotclip;
pub mod soilmask;
pub mod soilmask_ratio;

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, EngineResult};
use crate::core::types::ErrorCategory;
use crate::core::workflow::logs::LogSink;
use crate::core::workflow::results::{replace_folder_path, CONTAINER_INPUT_FOLDER};
use crate::core::workflow::runner::{
    ContainerRunner, MountSpec, RunRequest, DEFAULT_CONTAINER_IMAGE,
};
use crate::core::workflow::schema::{ResolvedParameter, ResolvedStep};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the argument JSON written into each step directory.
pub const ARGS_FILE_NAME: &str = "args.json";

/// Everything a step handler needs to run its container.
pub struct StepContext<'a> {
    pub config: &'a EngineConfig,
    /// Workflow root, mounted at `/input`.
    pub input_folder: &'a Path,
    /// Step directory, mounted at `/output`.
    pub working_folder: &'a Path,
    pub runner: &'a dyn ContainerRunner,
    pub messages: &'a LogSink,
    pub errors: &'a LogSink,
}

/// Trait implemented by workflow step handlers.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Command name used in workflow templates.
    fn command(&self) -> &'static str;

    /// Run the step and return the result object threaded to the next step.
    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value>;
}

/// Builder used to register step handlers before execution.
#[derive(Default)]
pub struct StepRegistryBuilder {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl StepRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: StepHandler + 'static>(mut self, handler: T) -> Self {
        let command = handler.command();
        if self.handlers.contains_key(command) {
            panic!("duplicate step handler registered: {}", command);
        }
        self.handlers.insert(command.to_string(), Arc::new(handler));
        self
    }

    pub fn build(self) -> StepRegistry {
        StepRegistry {
            inner: Arc::new(self.handlers),
        }
    }
}

/// Immutable registry available during workflow execution.
#[derive(Clone)]
pub struct StepRegistry {
    inner: Arc<HashMap<String, Arc<dyn StepHandler>>>,
}

impl StepRegistry {
    pub fn builder() -> StepRegistryBuilder {
        StepRegistryBuilder::new()
    }

    pub fn get(&self, command: &str) -> Option<Arc<dyn StepHandler>> {
        self.inner.get(command).cloned()
    }
}

/// The closed set of built-in steps plus the generic git entry.
pub fn builtin_registry() -> StepRegistry {
    StepRegistry::builder()
        .register(soilmask::SoilmaskStep)
        .register(soilmask_ratio::SoilmaskRatioStep)
        .register(plotclip::PlotclipStep)
        .register(find_files::FindFilesStep)
        .register(canopycover::CanopyCoverStep)
        .register(greenness::GreennessIndicesStep)
        .register(merge_csv::MergeCsvStep)
        .register(git::GitStep)
        .build()
}

/// Look up a parameter value, treating JSON null like an absent value.
pub(crate) fn parameter_value<'a>(
    parameters: &'a [ResolvedParameter],
    field_name: &str,
) -> Option<&'a Value> {
    parameters
        .iter()
        .rev()
        .find(|parameter| parameter.field_name == field_name)
        .and_then(|parameter| parameter.value.as_ref())
        .filter(|value| !value.is_null())
}

/// Parameter value as text; scalars are stringified, structures are not.
pub(crate) fn parameter_str(parameters: &[ResolvedParameter], field_name: &str) -> Option<String> {
    match parameter_value(parameters, field_name)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Fail with a parameter error naming every absent mandatory value.
pub(crate) fn require_parameters(
    process_name: &str,
    checks: &[(&str, bool)],
) -> EngineResult<()> {
    let missing: Vec<&str> = checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(EngineError::new(
        ErrorCategory::ParameterError,
        format!(
            "Missing required parameter(s) \"{}\" for {}",
            missing.join("\",\""),
            process_name
        ),
    )
    .with_code("WF-PARAM-003"))
}

/// Fail with a staging error for every named path that is not a file.
pub(crate) fn require_files(process_name: &str, items: &[(&str, &str)]) -> EngineResult<()> {
    let invalid: Vec<&(&str, &str)> = items
        .iter()
        .filter(|(_, path)| !Path::new(path).is_file())
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    let names: Vec<&str> = invalid.iter().map(|(name, _)| *name).collect();
    let values: Vec<&str> = invalid.iter().map(|(_, path)| *path).collect();
    Err(EngineError::new(
        ErrorCategory::StagingError,
        format!(
            "Required files \"{}\" for {} are missing or are not files: \"{}\"",
            names.join("\",\""),
            process_name,
            values.join("\",\"")
        ),
    )
    .with_code("WF-STAGE-004"))
}

/// Fail with a staging error for every named path that is not a folder.
pub(crate) fn require_folders(process_name: &str, items: &[(&str, &str)]) -> EngineResult<()> {
    let invalid: Vec<&(&str, &str)> = items
        .iter()
        .filter(|(_, path)| !Path::new(path).is_dir())
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    let names: Vec<&str> = invalid.iter().map(|(name, _)| *name).collect();
    let values: Vec<&str> = invalid.iter().map(|(_, path)| *path).collect();
    Err(EngineError::new(
        ErrorCategory::StagingError,
        format!(
            "Required folders \"{}\" for {} are missing or are not folders: \"{}\"",
            names.join("\",\""),
            process_name,
            values.join("\",\"")
        ),
    )
    .with_code("WF-STAGE-004"))
}

/// Write the step argument JSON into the working directory.
pub(crate) fn write_args_json(working_folder: &Path, args: &Value) -> EngineResult<PathBuf> {
    let path = working_folder.join(ARGS_FILE_NAME);
    let rendered = serde_json::to_string_pretty(args)?;
    std::fs::write(&path, rendered).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::IoError,
            format!("exception caught while writing command arguments to \"{}\"", path.display()),
            Box::new(err),
        )
    })?;
    tracing::debug!(args = %args, "command JSON");
    Ok(path)
}

/// Derive the `<basename>_mask<ext>` output name for masking steps.
pub(crate) fn mask_filename(image_path: &str) -> String {
    let base = Path::new(image_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_path.to_string());
    match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_mask.{}", stem, ext),
        None => format!("{}_mask", base),
    }
}

/// Rewrite a host path under the workflow root into the `/input` namespace.
pub(crate) fn to_input_path(path: &str, input_folder: &Path) -> Option<String> {
    replace_folder_path(path, &input_folder.to_string_lossy(), CONTAINER_INPUT_FOLDER)
}

/// Run the built-in container image for `command` and return its exit code.
pub(crate) async fn run_container(
    ctx: &StepContext<'_>,
    command: &str,
    args_file: &Path,
    extra_mounts: &[MountSpec],
) -> EngineResult<i32> {
    run_image(ctx, DEFAULT_CONTAINER_IMAGE, command, args_file, extra_mounts).await
}

/// Run an arbitrary image under the standard mount contract.
pub(crate) async fn run_image(
    ctx: &StepContext<'_>,
    image: &str,
    command: &str,
    args_file: &Path,
    extra_mounts: &[MountSpec],
) -> EngineResult<i32> {
    let request = RunRequest {
        command,
        image,
        input_folder: ctx.input_folder,
        output_folder: ctx.working_folder,
        args_file,
        extra_mounts,
    };
    ctx.runner.run(&request, ctx.messages, ctx.errors).await
}

/// Turn a non-zero exit code into a terminal container error.
pub(crate) fn ensure_success(command: &str, exit_code: i32) -> EngineResult<()> {
    if exit_code == 0 {
        return Ok(());
    }
    Err(EngineError::new(
        ErrorCategory::ContainerError,
        format!("command \"{}\" failed with exit code {}", command, exit_code),
    )
    .with_code("WF-RUN-001"))
}
