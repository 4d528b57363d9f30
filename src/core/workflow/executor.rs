//! Sequential workflow execution over a persisted step queue.
//!
//! The executor consumes the queue left-to-right, threading each step's
//! result object into the next step's deferred parameters, and externalises
//! its state through atomic status snapshots. Terminal failures are written
//! to the snapshot; the process itself exits cleanly either way.

use crate::core::config::EngineConfig;
use crate::core::crypt::Crypt;
use crate::core::error::{EngineError, EngineResult};
use crate::core::types::{ErrorCategory, FieldType, FieldVisibility};
use crate::core::workflow::handlers::HandlerRegistry;
use crate::core::workflow::logs::LogSink;
use crate::core::workflow::resolve::{incorporate_previous_results, unseal_auth};
use crate::core::workflow::runner::runner_for;
use crate::core::workflow::schema::{ResolvedParameter, ResolvedStep};
use crate::core::workflow::status::{
    clear_run_files, queue_path, write_status, STATUS_COMPLETED, STATUS_RUNNING, STATUS_STARTING,
};
use crate::core::workflow::steps::{builtin_registry, StepContext, StepHandler};
use crate::core::workflow::workdir::setup_step_folder;
use crate::utils::files::load_json_file;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Run the workflow rooted at `workdir`, which may name either the workflow
/// root directory or the queue file inside it.
pub async fn run_workflow(workdir: &Path, config: &EngineConfig) -> EngineResult<()> {
    let (workflow_root, queue_file) = if workdir.is_dir() {
        (workdir.to_path_buf(), queue_path(workdir))
    } else {
        let root = workdir.parent().map(Path::to_path_buf).ok_or_else(|| {
            EngineError::new(
                ErrorCategory::NotFoundError,
                format!("invalid or missing folder specified \"{}\"", workdir.display()),
            )
        })?;
        (root, workdir.to_path_buf())
    };
    run_queue(&workflow_root, &queue_file, config).await
}

/// Execute the given queue file against its workflow root.
pub async fn run_queue(
    workflow_root: &Path,
    queue_file: &Path,
    config: &EngineConfig,
) -> EngineResult<()> {
    // Step directories are handed out canonicalized; the root must match or
    // the host-to-container path rewrites would miss.
    let workflow_root = &workflow_root
        .canonicalize()
        .unwrap_or_else(|_| workflow_root.to_path_buf());
    let messages = LogSink::messages(workflow_root);
    let errors = LogSink::errors(workflow_root);

    clear_run_files(workflow_root).await;
    write_status(
        workflow_root,
        STATUS_STARTING,
        json!({"message": "Preparing workflow"}),
    )
    .await?;

    let queue: Vec<ResolvedStep> = match load_queue(queue_file) {
        Ok(queue) => queue,
        Err(err) => {
            tracing::error!(
                queue = %queue_file.display(),
                error = %err,
                "unable to load workflow queue"
            );
            errors.append_message(&err.to_string()).await;
            write_status(
                workflow_root,
                STATUS_COMPLETED,
                json!({"error": "Unable to start workflow"}),
            )
            .await?;
            return Ok(());
        }
    };
    if queue.is_empty() {
        tracing::error!(queue = %queue_file.display(), "empty workflow loaded");
        write_status(
            workflow_root,
            STATUS_COMPLETED,
            json!({"message": "No commands were found to execute"}),
        )
        .await?;
        return Ok(());
    }

    let registry = builtin_registry();
    let runner = runner_for(config);
    let handlers = HandlerRegistry::standard(config);
    let crypt = Crypt::new(&config.salt_value);

    let mut previous: Option<Value> = None;
    let mut wrote_final_status = false;

    for step in &queue {
        tracing::debug!(?previous, "incorporating previous results");

        let is_git_step = step.git_repo.is_some() && step.git_branch.is_some();
        let handler = if is_git_step {
            registry.get("git")
        } else {
            registry.get(&step.command)
        };
        let Some(handler) = handler else {
            let message = format!("Unknown command \"{}\"", step.command);
            tracing::error!(command = %step.command, "unknown workflow command");
            write_status(workflow_root, STATUS_COMPLETED, json!({"error": message})).await?;
            wrote_final_status = true;
            break;
        };

        tracing::info!(command = %step.command, "running command");
        let outcome = execute_step(
            step,
            handler.as_ref(),
            previous.as_ref(),
            workflow_root,
            config,
            &handlers,
            &crypt,
            runner.as_ref(),
            &messages,
            &errors,
        )
        .await;

        match outcome {
            Ok(results) => previous = Some(results),
            Err(err) => {
                tracing::error!(command = %step.command, error = %err, "step failed");
                errors.append_message(&err.to_string()).await;
                write_status(
                    workflow_root,
                    STATUS_COMPLETED,
                    json!({"error": err.message}),
                )
                .await?;
                wrote_final_status = true;
                break;
            }
        }
    }

    if !wrote_final_status {
        write_status(
            workflow_root,
            STATUS_COMPLETED,
            json!({"message": "Completed"}),
        )
        .await?;
        tracing::debug!(queue = %queue_file.display(), "completed running workflow");
    }
    Ok(())
}

fn load_queue(queue_file: &Path) -> EngineResult<Vec<ResolvedStep>> {
    let raw = load_json_file(queue_file)?;
    serde_json::from_value(raw).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::SerializationError,
            format!("queue file {} is not a step list", queue_file.display()),
            Box::new(err),
        )
    })
}

#[allow(clippy::too_many_arguments)]
async fn execute_step(
    step: &ResolvedStep,
    handler: &dyn StepHandler,
    previous: Option<&Value>,
    workflow_root: &Path,
    config: &EngineConfig,
    handlers: &HandlerRegistry,
    crypt: &Crypt,
    runner: &dyn crate::core::workflow::runner::ContainerRunner,
    messages: &LogSink,
    errors: &LogSink,
) -> EngineResult<Value> {
    let working_folder = setup_step_folder(workflow_root, &step.command)?;
    let mut parameters = incorporate_previous_results(&step.parameters, previous);

    write_status(
        workflow_root,
        STATUS_RUNNING,
        json!({"message": format!("Running {}", step.command)}),
    )
    .await?;

    stage_inputs(&mut parameters, &working_folder, handlers, crypt, config).await?;

    let staged = ResolvedStep {
        parameters,
        ..step.clone()
    };

    let ctx = StepContext {
        config,
        input_folder: workflow_root,
        working_folder: &working_folder,
        runner,
        messages,
        errors,
    };
    handler.execute(&staged, &ctx).await
}

/// Stage every remaining file-typed parameter into the step directory.
///
/// Server-visibility parameters already carry host paths from the previous
/// step's result and are left alone; only bindings tagged with a `data_type`
/// go through their file handler. Optional misses are skipped.
async fn stage_inputs(
    parameters: &mut [ResolvedParameter],
    working_folder: &Path,
    handlers: &HandlerRegistry,
    crypt: &Crypt,
    config: &EngineConfig,
) -> EngineResult<()> {
    for parameter in parameters.iter_mut() {
        if parameter.visibility == FieldVisibility::Server {
            continue;
        }
        if parameter.field_type != FieldType::File {
            continue;
        }
        let Some(tag) = parameter.data_type.clone() else {
            continue;
        };
        let handler = handlers.get(&tag).ok_or_else(|| {
            EngineError::new(
                ErrorCategory::StagingError,
                format!("no file handler registered for data type \"{}\"", tag),
            )
            .with_code("WF-STAGE-005")
        })?;

        let source = match &parameter.value {
            Some(Value::String(source)) => source.clone(),
            _ if parameter.mandatory => {
                return Err(EngineError::new(
                    ErrorCategory::ParameterError,
                    format!(
                        "file parameter \"{}\" has no source path to stage",
                        parameter.field_name
                    ),
                ));
            }
            _ => continue,
        };

        let file_name = Path::new(&source)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&source));
        let dest = working_folder.join(file_name);

        let auth = match &parameter.auth {
            Some(sealed) => Some(unseal_auth(crypt, sealed, &config.default_passcode)?),
            None => None,
        };

        tracing::debug!(source = %source, dest = %dest.display(), "downloading file");
        match handler.get_file(auth.as_ref(), &source, &dest).await {
            Ok(()) => {
                parameter.value = Some(Value::String(dest.display().to_string()));
            }
            Err(err) if parameter.mandatory => return Err(err),
            Err(err) => {
                tracing::warn!(
                    field = %parameter.field_name,
                    error = %err,
                    "skipping optional file that could not be staged"
                );
                parameter.value = None;
            }
        }
    }
    Ok(())
}
