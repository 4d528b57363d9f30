//! Generating the found-files JSON consumed by the per-plot calculations.

use super::{
    ensure_success, parameter_str, require_folders, require_parameters, run_container,
    to_input_path, write_args_json, StepContext, StepHandler,
};
use crate::core::error::EngineResult;
use crate::core::workflow::results::{load_step_results, rewrite_output_path};
use crate::core::workflow::schema::ResolvedStep;
use async_trait::async_trait;
use serde_json::{json, Value};

const FOUND_FILES_JSON: &str = "/output/found_files.json";

pub struct FindFilesStep;

#[async_trait]
impl StepHandler for FindFilesStep {
    fn command(&self) -> &'static str {
        "find_files2json"
    }

    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value> {
        let search_name = parameter_str(&step.parameters, "file_name");
        let search_folder = parameter_str(&step.parameters, "top_path");

        require_parameters(
            "find_files2json",
            &[
                ("file_name", search_name.is_some()),
                ("top_path", search_folder.is_some()),
            ],
        )?;
        let search_folder = search_folder.unwrap_or_default();
        require_folders("find_files2json", &[("top_path", &search_folder)])?;

        let container_search_folder = to_input_path(&search_folder, ctx.input_folder);
        let args = json!({
            "FILES2JSON_SEARCH_NAME": search_name,
            "FILES2JSON_SEARCH_FOLDER": container_search_folder.clone(),
            "FILES2JSON_JSON_FILE": FOUND_FILES_JSON,
        });
        let args_file = write_args_json(ctx.working_folder, &args)?;

        let exit_code = run_container(ctx, "find_files2json", &args_file, &[]).await?;
        ensure_success("find_files2json", exit_code)?;

        let mut results = load_step_results(ctx.working_folder)?;
        if let Some(map) = results.as_object_mut() {
            map.insert(
                "found_json_file".to_string(),
                rewrite_output_path(FOUND_FILES_JSON, ctx.working_folder)
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            map.insert(
                "results_search_folder".to_string(),
                container_search_folder.map(Value::String).unwrap_or(Value::Null),
            );
        }
        Ok(results)
    }
}
