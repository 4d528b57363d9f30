//! Soil masking over an orthomosaic image.

use super::{
    ensure_success, mask_filename, parameter_str, require_files, require_parameters,
    run_container, to_input_path, write_args_json, StepContext, StepHandler,
};
use crate::core::error::EngineResult;
use crate::core::workflow::results::load_step_results;
use crate::core::workflow::schema::ResolvedStep;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct SoilmaskStep;

#[async_trait]
impl StepHandler for SoilmaskStep {
    fn command(&self) -> &'static str {
        "soilmask"
    }

    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value> {
        let image = parameter_str(&step.parameters, "image");
        let options = parameter_str(&step.parameters, "options");

        require_parameters("soilmask", &[("image", image.is_some())])?;
        let image = image.unwrap_or_default();
        require_files("soilmask", &[("image", &image)])?;

        let args = json!({
            "SOILMASK_SOURCE_FILE": to_input_path(&image, ctx.input_folder),
            "SOILMASK_MASK_FILE": mask_filename(&image),
            "SOILMASK_WORKING_FOLDER": "/output",
            "SOILMASK_OPTIONS": options.unwrap_or_default(),
        });
        let args_file = write_args_json(ctx.working_folder, &args)?;

        let exit_code = run_container(ctx, "soilmask", &args_file, &[]).await?;
        ensure_success("soilmask", exit_code)?;

        load_step_results(ctx.working_folder)
    }
}
