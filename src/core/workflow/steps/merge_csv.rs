//! Merging per-plot CSV outputs into one file.

use super::{
    ensure_success, parameter_str, require_folders, require_parameters, run_container,
    to_input_path, write_args_json, StepContext, StepHandler,
};
use crate::core::error::EngineResult;
use crate::core::workflow::results::load_step_results;
use crate::core::workflow::schema::ResolvedStep;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct MergeCsvStep;

#[async_trait]
impl StepHandler for MergeCsvStep {
    fn command(&self) -> &'static str {
        "merge_csv"
    }

    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value> {
        let search_folder = parameter_str(&step.parameters, "top_path");
        let options = parameter_str(&step.parameters, "options");

        require_parameters("merge_csv", &[("top_path", search_folder.is_some())])?;
        let search_folder = search_folder.unwrap_or_default();
        require_folders("merge_csv", &[("top_path", &search_folder)])?;

        let args = json!({
            "MERGECSV_SOURCE": to_input_path(&search_folder, ctx.input_folder),
            "MERGECSV_TARGET": "/output",
            "MERGECSV_OPTIONS": options.unwrap_or_default(),
        });
        let args_file = write_args_json(ctx.working_folder, &args)?;

        let exit_code = run_container(ctx, "merge_csv", &args_file, &[]).await?;
        ensure_success("merge_csv", exit_code)?;

        load_step_results(ctx.working_folder)
    }
}
