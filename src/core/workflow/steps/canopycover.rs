//! Per-plot canopy cover calculation.

use super::{
    ensure_success, parameter_str, require_files, require_parameters, run_container,
    to_input_path, write_args_json, StepContext, StepHandler,
};
use crate::core::error::EngineResult;
use crate::core::workflow::results::{load_step_results_recursive, repoint_found_files};
use crate::core::workflow::runner::MountSpec;
use crate::core::workflow::schema::ResolvedStep;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const FILES_MOUNT_POINT: &str = "/scif/apps/src/canopy_cover_files.json";

pub struct CanopyCoverStep;

/// Shared preparation for the per-plot calculation steps: repoint the
/// found-files JSON at `/output` and fold the optional experiment metadata
/// into the options string.
pub(super) async fn prepare_plot_calculation(
    process_name: &str,
    step: &ResolvedStep,
    ctx: &StepContext<'_>,
) -> EngineResult<(PathBuf, String)> {
    let found_json = parameter_str(&step.parameters, "found_json_file");
    let experiment_file = parameter_str(&step.parameters, "experimentdata");
    let search_folder = parameter_str(&step.parameters, "results_search_folder");

    require_parameters(process_name, &[("found_json_file", found_json.is_some())])?;
    let found_json = found_json.unwrap_or_default();
    require_files(process_name, &[("found_json_file", &found_json)])?;

    let repointed = repoint_found_files(
        Path::new(&found_json),
        search_folder.as_deref(),
        "/output",
        ctx.working_folder,
    )
    .unwrap_or_else(|| PathBuf::from(&found_json));

    let mut options = parameter_str(&step.parameters, "options").unwrap_or_default();
    if let Some(experiment_file) = experiment_file {
        if Path::new(&experiment_file).is_file() {
            if let Some(container_path) = to_input_path(&experiment_file, ctx.input_folder) {
                options.push_str(&format!(" --metadata {}", container_path));
            }
        } else {
            let warning = format!(
                "Warning: invalid experiment file specified for {} \"{}\"",
                process_name, experiment_file
            );
            tracing::warn!("{}", warning);
            ctx.messages.append_message(&warning).await;
        }
    }

    Ok((repointed, options))
}

#[async_trait]
impl StepHandler for CanopyCoverStep {
    fn command(&self) -> &'static str {
        "canopycover"
    }

    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value> {
        let (files_json, options) = prepare_plot_calculation("canopy cover", step, ctx).await?;

        let args = json!({ "CANOPYCOVER_OPTIONS": options });
        let args_file = write_args_json(ctx.working_folder, &args)?;

        let mounts = [MountSpec::new(files_json, FILES_MOUNT_POINT)];
        let exit_code = run_container(ctx, "canopycover", &args_file, &mounts).await?;
        ensure_success("canopycover", exit_code)?;

        Ok(json!({
            "results": load_step_results_recursive(ctx.working_folder)?,
            "top_path": ctx.working_folder.display().to_string(),
        }))
    }
}
