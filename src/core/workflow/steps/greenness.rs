//! Per-plot greenness index calculation.

use super::canopycover::prepare_plot_calculation;
use super::{ensure_success, run_container, write_args_json, StepContext, StepHandler};
use crate::core::error::EngineResult;
use crate::core::workflow::results::load_step_results_recursive;
use crate::core::workflow::runner::MountSpec;
use crate::core::workflow::schema::ResolvedStep;
use async_trait::async_trait;
use serde_json::{json, Value};

const FILES_MOUNT_POINT: &str = "/scif/apps/src/greenness_indices_files.json";

pub struct GreennessIndicesStep;

#[async_trait]
impl StepHandler for GreennessIndicesStep {
    fn command(&self) -> &'static str {
        "greenness_indices"
    }

    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value> {
        let (files_json, options) =
            prepare_plot_calculation("greenness indices", step, ctx).await?;

        let args = json!({ "GREENNESS_INDICES_OPTIONS": options });
        let args_file = write_args_json(ctx.working_folder, &args)?;

        // The image exposes both calculations through its canopycover entry
        // point; the mounted file list selects the greenness variant.
        let mounts = [MountSpec::new(files_json, FILES_MOUNT_POINT)];
        let exit_code = run_container(ctx, "canopycover", &args_file, &mounts).await?;
        ensure_success("greenness_indices", exit_code)?;

        Ok(json!({
            "results": load_step_results_recursive(ctx.working_folder)?,
            "top_path": ctx.working_folder.display().to_string(),
        }))
    }
}
