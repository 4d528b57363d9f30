//! Clipping an image to the plot geometries of a GeoJSON file.

use super::{
    ensure_success, parameter_str, require_files, require_parameters, run_container,
    to_input_path, write_args_json, StepContext, StepHandler,
};
use crate::core::error::EngineResult;
use crate::core::workflow::results::load_step_results;
use crate::core::workflow::schema::ResolvedStep;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;

pub struct PlotclipStep;

#[async_trait]
impl StepHandler for PlotclipStep {
    fn command(&self) -> &'static str {
        "plotclip"
    }

    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value> {
        let image = parameter_str(&step.parameters, "image");
        let geometries = parameter_str(&step.parameters, "geometries");
        let options = parameter_str(&step.parameters, "options");

        require_parameters(
            "plotclip",
            &[
                ("image", image.is_some()),
                ("plot_geometries", geometries.is_some()),
            ],
        )?;
        let image = image.unwrap_or_default();
        let geometries = geometries.unwrap_or_default();
        require_files(
            "plotclip",
            &[("image", &image), ("plot_geometries", &geometries)],
        )?;

        let args = json!({
            "PLOTCLIP_SOURCE_FILE": to_input_path(&image, ctx.input_folder),
            "PLOTCLIP_PLOTGEOMETRY_FILE": to_input_path(&geometries, ctx.input_folder),
            "PLOTCLIP_WORKING_FOLDER": "/output",
            "PLOTCLIP_OPTIONS": options.unwrap_or_default(),
        });
        let args_file = write_args_json(ctx.working_folder, &args)?;

        let exit_code = run_container(ctx, "plotclip", &args_file, &[]).await?;
        ensure_success("plotclip", exit_code)?;

        let mut results = load_step_results(ctx.working_folder)?;
        if let Some(map) = results.as_object_mut() {
            // The next steps search the clipped plots by the source image name.
            let file_name = Path::new(&image)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or(image.clone());
            map.insert("file_name".to_string(), Value::String(file_name));
            map.insert(
                "top_path".to_string(),
                Value::String(ctx.working_folder.display().to_string()),
            );
        }
        Ok(results)
    }
}
