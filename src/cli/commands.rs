//! Command dispatch for the CLI surface over the workflow engine.

use crate::cli::{Args, Command};
use crate::core::config::EngineConfig;
use crate::core::error::EngineResult;
use crate::core::workflow::catalog::TemplateCatalog;
use crate::core::workflow::executor::run_workflow;
use crate::core::workflow::schema::{ParameterBinding, SavedWorkflow, WorkflowTemplate};
use crate::core::workflow::status::{read_messages, workflow_status};
use crate::core::workflow::store::{DetachedLauncher, ExecutorLauncher, WorkflowStore};
use crate::utils::files::load_json_file;
use crate::Result;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;

/// Execute the parsed CLI command.
pub async fn execute(args: Args) -> Result<()> {
    let config = EngineConfig::from_env();
    match args.command {
        Command::Submit(args) => {
            let store = WorkflowStore::new(config.clone());
            let catalog = TemplateCatalog::load(config.workflow_folder.as_deref());
            let template = resolve_submit_template(&args, &catalog)?;
            let bindings: Vec<ParameterBinding> =
                serde_json::from_value(load_json_file(&args.params)?)
                    .context("parameter file is not a binding list")?;
            let outcome = if args.foreground {
                let launcher = ForegroundLauncher {
                    config: config.clone(),
                };
                store.submit(&template, &bindings, &launcher).await?
            } else {
                store.submit(&template, &bindings, &DetachedLauncher).await?
            };
            print_json(&serde_json::to_value(&outcome)?)
        }
        Command::Run(args) => {
            run_workflow(&args.workdir, &config).await?;
            Ok(())
        }
        Command::Status(args) => {
            let store = WorkflowStore::new(config);
            let root = known_workflow_root(&store, &args.workflow_id)?;
            let report = workflow_status(&root).await;
            print_json(&serde_json::to_value(&report)?)
        }
        Command::Messages(args) => {
            let store = WorkflowStore::new(config);
            let root = known_workflow_root(&store, &args.workflow_id)?;
            let (messages, errors) = read_messages(&root).await;
            print_json(&json!({"messages": messages, "errors": errors}))
        }
        Command::List(_) => {
            let store = WorkflowStore::new(config);
            let recovered = store.list().await?;
            print_json(&serde_json::to_value(&recovered)?)
        }
        Command::Delete(args) => {
            let store = WorkflowStore::new(config);
            store.delete(&args.workflow_id).await?;
            print_json(&json!({"id": args.workflow_id, "deleted": true}))
        }
        Command::Artifact(args) => {
            let store = WorkflowStore::new(config);
            let artifact = store
                .artifact(&args.workflow_id, &args.command, &args.result)
                .await?;
            if let Some(output) = &args.output {
                std::fs::copy(&artifact.path, output).with_context(|| {
                    format!("failed to copy artifact to {}", output.display())
                })?;
            }
            print_json(&serde_json::to_value(&artifact)?)
        }
        Command::Download(args) => {
            let store = WorkflowStore::new(config);
            let document = store.download(&args.workflow_id, &args.passcode).await?;
            emit_document(&serde_json::to_value(&document)?, args.output.as_deref())
        }
        Command::DownloadAll(args) => {
            let store = WorkflowStore::new(config.clone());
            let catalog = TemplateCatalog::load(config.workflow_folder.as_deref());
            let document = store.download_all(&catalog);
            emit_document(&serde_json::to_value(&document)?, args.output.as_deref())
        }
        Command::Upload(args) => {
            let store = WorkflowStore::new(config.clone());
            let document: SavedWorkflow = serde_json::from_value(load_json_file(&args.file)?)
                .context("file is not a saved workflow document")?;
            let (mut template, parameters) = store.upload(document, &args.passcode)?;
            if args.register {
                let catalog = TemplateCatalog::load(config.workflow_folder.as_deref());
                template.id = catalog.add(template.clone(), config.workflow_folder.as_deref())?;
            }
            print_json(&json!({"workflow": template, "parameters": parameters}))
        }
        Command::Templates(_) => {
            let catalog = TemplateCatalog::load(config.workflow_folder.as_deref());
            print_json(&serde_json::to_value(catalog.all())?)
        }
    }
}

fn resolve_submit_template(
    args: &crate::cli::SubmitArgs,
    catalog: &TemplateCatalog,
) -> Result<WorkflowTemplate> {
    if let Some(file) = &args.template {
        let template = serde_json::from_value(load_json_file(file)?)
            .context("template file is not a workflow template")?;
        return Ok(template);
    }
    let id = args
        .id
        .as_deref()
        .ok_or_else(|| anyhow!("either --template or --id is required"))?;
    let id_value = match id.parse::<u64>() {
        Ok(number) => json!(number),
        Err(_) => Value::String(id.to_string()),
    };
    catalog
        .find(&id_value)
        .ok_or_else(|| anyhow!("unable to find workflow associated with workflow ID {}", id))
}

fn known_workflow_root(store: &WorkflowStore, workflow_id: &str) -> Result<std::path::PathBuf> {
    let root = store.config().workflow_root(workflow_id);
    if !root.is_dir() {
        return Err(anyhow!("requested workflow {} no longer exists", workflow_id));
    }
    Ok(root)
}

fn emit_document(document: &Value, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            crate::utils::files::write_json_file(path, document)?;
            Ok(())
        }
        None => print_json(document),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs the executor inline so the submit call only returns on completion.
struct ForegroundLauncher {
    config: EngineConfig,
}

#[async_trait]
impl ExecutorLauncher for ForegroundLauncher {
    async fn launch(&self, workflow_root: &Path) -> EngineResult<()> {
        run_workflow(workflow_root, &self.config).await
    }
}
