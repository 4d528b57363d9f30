//! Soil masking using a green-to-red ratio threshold.

use super::{
    ensure_success, mask_filename, parameter_str, parameter_value, require_files,
    require_parameters, run_container, to_input_path, write_args_json, StepContext, StepHandler,
};
use crate::core::error::EngineResult;
use crate::core::workflow::results::load_step_results;
use crate::core::workflow::schema::ResolvedStep;
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_RATIO: &str = "1.0";

pub struct SoilmaskRatioStep;

/// Render the bound ratio exactly as the caller wrote it: an integer binding
/// stays `2`, a float stays `2.5`, and the unbound default is `1.0`.
fn ratio_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.clone(),
        _ => DEFAULT_RATIO.to_string(),
    }
}

#[async_trait]
impl StepHandler for SoilmaskRatioStep {
    fn command(&self) -> &'static str {
        "soilmask_ratio"
    }

    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value> {
        let image = parameter_str(&step.parameters, "image");
        let ratio = ratio_text(parameter_value(&step.parameters, "ratio"));

        require_parameters("soilmask ratio", &[("image", image.is_some())])?;
        let image = image.unwrap_or_default();
        require_files("soilmask ratio", &[("image", &image)])?;

        let mut options = parameter_str(&step.parameters, "options").unwrap_or_default();
        options.push_str(&format!(" --ratio {}", ratio));

        let args = json!({
            "SOILMASK_RATIO_SOURCE_FILE": to_input_path(&image, ctx.input_folder),
            "SOILMASK_RATIO_MASK_FILE": mask_filename(&image),
            "SOILMASK_RATIO_WORKING_FOLDER": "/output",
            "SOILMASK_RATIO_OPTIONS": options,
        });
        let args_file = write_args_json(ctx.working_folder, &args)?;

        let exit_code = run_container(ctx, "soilmask_ratio", &args_file, &[]).await?;
        ensure_success("soilmask_ratio", exit_code)?;

        load_step_results(ctx.working_folder)
    }
}
