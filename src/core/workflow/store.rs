//! Workflow lifecycle operations: submit, list/recover, delete, artifact
//! fetch, and the versioned download/upload documents.

use crate::core::config::EngineConfig;
use crate::core::crypt::Crypt;
use crate::core::error::{EngineError, EngineResult};
use crate::core::types::{ErrorCategory, RunState};
use crate::core::workflow::catalog::TemplateCatalog;
use crate::core::workflow::executor::run_workflow;
use crate::core::workflow::handlers::HandlerRegistry;
use crate::core::workflow::resolve::{resolve_template, seal_auth, unseal_auth};
use crate::core::workflow::results::load_step_results;
use crate::core::workflow::schema::{
    validate_template, ExportedDefinition, ParameterBinding, SavedWorkflow, WorkflowDefinitionExport,
    WorkflowTemplate, DEFINITION_EXPORT_TYPE, SAVE_FORMAT_VERSION,
};
use crate::core::workflow::status::{queue_path, workflow_status, StatusReport};
use crate::core::workflow::workdir::confine;
use crate::utils::files::{is_workflow_id, load_json_file, write_json_file};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persisted copy of the submitted template inside a workflow root.
pub const WORKFLOW_SAVE_FILE: &str = "_workflow";
/// Persisted copy of the submitted parameter list inside a workflow root.
pub const PARAMS_SAVE_FILE: &str = "_params";

/// Result of a submit call.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub id: String,
    pub start_ts: DateTime<Utc>,
}

/// One recovered workflow instance.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveredWorkflow {
    pub id: String,
    pub workflow: WorkflowTemplate,
    pub parameters: Vec<ParameterBinding>,
    pub status: StatusReport,
}

/// A resolved, confinement-checked artifact ready to be served.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub file_name: String,
    pub restricted: bool,
}

/// How the executor gets started for a submitted workflow.
#[async_trait]
pub trait ExecutorLauncher: Send + Sync {
    async fn launch(&self, workflow_root: &Path) -> EngineResult<()>;
}

/// Spawns a detached `atlana run <root>` child; the submit call returns
/// before step 1 completes.
pub struct DetachedLauncher;

#[async_trait]
impl ExecutorLauncher for DetachedLauncher {
    async fn launch(&self, workflow_root: &Path) -> EngineResult<()> {
        let exe = std::env::current_exe().map_err(|err| {
            EngineError::with_source(
                ErrorCategory::InternalError,
                "unable to locate the engine executable",
                Box::new(err),
            )
        })?;
        let child = tokio::process::Command::new(exe)
            .arg("run")
            .arg(workflow_root)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|err| {
                EngineError::with_source(
                    ErrorCategory::InternalError,
                    "failed to launch the workflow executor",
                    Box::new(err),
                )
            })?;
        // The child owns the workflow from here; dropping the handle detaches.
        drop(child);
        Ok(())
    }
}

/// Runs the executor as an in-process task; used by embedders and tests.
pub struct InProcessLauncher {
    config: EngineConfig,
}

impl InProcessLauncher {
    pub fn new(config: EngineConfig) -> Self {
        InProcessLauncher { config }
    }
}

#[async_trait]
impl ExecutorLauncher for InProcessLauncher {
    async fn launch(&self, workflow_root: &Path) -> EngineResult<()> {
        let config = self.config.clone();
        let root = workflow_root.to_path_buf();
        tokio::spawn(async move {
            if let Err(err) = run_workflow(&root, &config).await {
                tracing::error!(root = %root.display(), error = %err, "executor task failed");
            }
        });
        Ok(())
    }
}

/// Lifecycle operations over workflow IDs persisted as directories.
pub struct WorkflowStore {
    config: EngineConfig,
    crypt: Crypt,
    handlers: HandlerRegistry,
}

impl WorkflowStore {
    pub fn new(config: EngineConfig) -> Self {
        let crypt = Crypt::new(&config.salt_value);
        let handlers = HandlerRegistry::standard(&config);
        WorkflowStore {
            config,
            crypt,
            handlers,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn root_for(&self, workflow_id: &str) -> EngineResult<PathBuf> {
        if !is_workflow_id(workflow_id) {
            return Err(EngineError::new(
                ErrorCategory::ParameterError,
                format!("\"{}\" is not a workflow identifier", workflow_id),
            )
            .with_code("WF-STORE-001"));
        }
        Ok(self.config.workflow_root(workflow_id))
    }

    /// Resolve, persist, and start a workflow. Parameter errors surface here
    /// and leave no directory behind.
    pub async fn submit(
        &self,
        template: &WorkflowTemplate,
        bindings: &[ParameterBinding],
        launcher: &dyn ExecutorLauncher,
    ) -> EngineResult<SubmitOutcome> {
        validate_template(template)?;

        let id = Uuid::new_v4().simple().to_string();
        let root = self.config.workflow_root(&id);

        // Resolution runs before anything touches the filesystem.
        let queue = resolve_template(
            template,
            bindings,
            &self.handlers,
            &self.crypt,
            &self.config.default_passcode,
            &root,
        )?;

        crate::core::workflow::workdir::create_workflow_root(&self.config.working_folder, &id)?;
        tracing::info!(id = %id, root = %root.display(), "queueing workflow");

        write_json_file(&root.join(WORKFLOW_SAVE_FILE), &serde_json::to_value(template)?)?;
        let sealed = self.seal_bindings(bindings, &self.config.default_passcode)?;
        write_json_file(&root.join(PARAMS_SAVE_FILE), &serde_json::to_value(&sealed)?)?;
        write_json_file(&queue_path(&root), &serde_json::to_value(&queue)?)?;

        launcher.launch(&root).await?;

        Ok(SubmitOutcome {
            id,
            start_ts: Utc::now(),
        })
    }

    /// Restart the executor for an existing workflow without touching its
    /// queue. Recovering a workflow whose queue file is gone is an error.
    pub async fn recover(
        &self,
        workflow_id: &str,
        launcher: &dyn ExecutorLauncher,
    ) -> EngineResult<()> {
        let root = self.root_for(workflow_id)?;
        let queue_file = queue_path(&root);
        if !queue_file.is_file() {
            return Err(EngineError::new(
                ErrorCategory::NotFoundError,
                format!("attempting to recover a missing workflow {}", root.display()),
            )
            .with_code("WF-STORE-004"));
        }
        launcher.launch(&root).await
    }

    /// Recover every workflow whose root directory and persistence files
    /// survive; anything else is forgotten.
    pub async fn list(&self) -> EngineResult<Vec<RecoveredWorkflow>> {
        let mut recovered = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.config.working_folder) else {
            return Ok(recovered);
        };
        for entry in entries.flatten() {
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_workflow_id(&id) || !entry.path().is_dir() {
                continue;
            }
            let root = entry.path();
            let workflow_file = root.join(WORKFLOW_SAVE_FILE);
            let params_file = root.join(PARAMS_SAVE_FILE);
            if !workflow_file.is_file() || !params_file.is_file() {
                tracing::debug!(id = %id, "forgetting workflow without persistence files");
                continue;
            }
            let loaded = load_json_file(&workflow_file)
                .and_then(|raw| serde_json::from_value::<WorkflowTemplate>(raw).map_err(Into::into))
                .and_then(|workflow| {
                    let parameters = load_json_file(&params_file).and_then(|raw| {
                        serde_json::from_value::<Vec<ParameterBinding>>(raw).map_err(Into::into)
                    })?;
                    Ok((workflow, parameters))
                });
            match loaded {
                Ok((workflow, parameters)) => {
                    let status = workflow_status(&root).await;
                    recovered.push(RecoveredWorkflow {
                        id,
                        workflow,
                        parameters,
                        status,
                    });
                }
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "skipping unreadable workflow state");
                }
            }
        }
        recovered.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(recovered)
    }

    /// Delete a finished workflow; anything still running is a conflict.
    pub async fn delete(&self, workflow_id: &str) -> EngineResult<()> {
        let root = self.root_for(workflow_id)?;
        if !root.is_dir() {
            return Err(self.unknown_workflow(workflow_id));
        }
        let status = workflow_status(&root).await;
        if status.state != RunState::Finished {
            return Err(EngineError::new(
                ErrorCategory::ConflictError,
                format!(
                    "workflow {} has not finished; refusing to delete",
                    workflow_id
                ),
            )
            .with_code("WF-STORE-002"));
        }
        std::fs::remove_dir_all(&root).map_err(|err| {
            EngineError::with_source(
                ErrorCategory::IoError,
                format!("failed to remove workflow root {}", root.display()),
                Box::new(err),
            )
        })
    }

    /// Resolve a declared artifact of the workflow to a confined host path.
    pub async fn artifact(
        &self,
        workflow_id: &str,
        command: &str,
        result_name: &str,
    ) -> EngineResult<ArtifactFile> {
        let root = self.root_for(workflow_id)?;
        if !root.is_dir() {
            return Err(self.unknown_workflow(workflow_id));
        }
        let template: WorkflowTemplate =
            serde_json::from_value(load_json_file(&root.join(WORKFLOW_SAVE_FILE))?)?;
        let step = template
            .steps
            .iter()
            .find(|step| step.command == command)
            .ok_or_else(|| {
                EngineError::new(
                    ErrorCategory::NotFoundError,
                    format!("workflow has no step with command \"{}\"", command),
                )
            })?;
        let declared = step
            .results
            .iter()
            .find(|result| result.name == result_name)
            .ok_or_else(|| {
                EngineError::new(
                    ErrorCategory::NotFoundError,
                    format!(
                        "step \"{}\" declares no result named \"{}\"",
                        command, result_name
                    ),
                )
            })?;

        let step_dir = root.join(command);
        let candidate = match &declared.filename {
            Some(filename) => step_dir.join(filename),
            None => self.manifest_artifact(&step_dir)?,
        };
        let confined = confine(&root, &candidate)?;
        if !confined.is_file() {
            return Err(EngineError::new(
                ErrorCategory::NotFoundError,
                format!("artifact \"{}\" has not been produced", result_name),
            ));
        }
        let file_name = confined
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| result_name.to_string());
        Ok(ArtifactFile {
            path: confined,
            file_name,
            restricted: declared.restricted,
        })
    }

    fn manifest_artifact(&self, step_dir: &Path) -> EngineResult<PathBuf> {
        let manifest = load_step_results(step_dir)?;
        manifest
            .get("file")
            .and_then(Value::as_array)
            .and_then(|files| {
                files
                    .iter()
                    .filter_map(|entry| entry.get("path").and_then(Value::as_str))
                    .map(PathBuf::from)
                    .find(|path| path.is_file())
            })
            .ok_or_else(|| {
                EngineError::new(
                    ErrorCategory::NotFoundError,
                    format!(
                        "no produced artifact recorded under {}",
                        step_dir.display()
                    ),
                )
            })
    }

    /// Serialise a workflow and its run parameters into a versioned document,
    /// re-sealing credentials under the caller's passcode.
    pub async fn download(&self, workflow_id: &str, passcode: &str) -> EngineResult<SavedWorkflow> {
        let root = self.root_for(workflow_id)?;
        if !root.is_dir() {
            return Err(self.unknown_workflow(workflow_id));
        }
        let template: WorkflowTemplate =
            serde_json::from_value(load_json_file(&root.join(WORKFLOW_SAVE_FILE))?)?;
        let stored: Vec<ParameterBinding> =
            serde_json::from_value(load_json_file(&root.join(PARAMS_SAVE_FILE))?)?;

        let mut parameters = Vec::with_capacity(stored.len());
        for mut binding in stored {
            if let Some(sealed) = &binding.auth {
                let raw = unseal_auth(&self.crypt, sealed, &self.config.default_passcode)?;
                binding.auth = Some(seal_auth(&self.crypt, &raw, passcode)?);
            }
            parameters.push(binding);
        }

        Ok(SavedWorkflow {
            version: SAVE_FORMAT_VERSION.to_string(),
            name: template.name,
            description: template.description,
            steps: template.steps,
            parameters,
        })
    }

    /// Serialise the whole template catalogue.
    pub fn download_all(&self, catalog: &TemplateCatalog) -> WorkflowDefinitionExport {
        WorkflowDefinitionExport {
            version: SAVE_FORMAT_VERSION.to_string(),
            kind: DEFINITION_EXPORT_TYPE.to_string(),
            workflows: catalog
                .all()
                .into_iter()
                .map(|template| ExportedDefinition {
                    name: template.name,
                    description: template.description,
                    id: template.id,
                    steps: template.steps,
                })
                .collect(),
        }
    }

    /// Open a saved-workflow document, recovering sealed credentials with the
    /// caller's passcode. A wrong passcode fails cleanly.
    pub fn upload(
        &self,
        document: SavedWorkflow,
        passcode: &str,
    ) -> EngineResult<(WorkflowTemplate, Vec<ParameterBinding>)> {
        let mut parameters = Vec::with_capacity(document.parameters.len());
        for mut binding in document.parameters {
            if let Some(sealed) = &binding.auth {
                binding.auth = Some(unseal_auth(&self.crypt, sealed, passcode)?);
            }
            parameters.push(binding);
        }
        let template = WorkflowTemplate {
            name: document.name,
            description: document.description,
            id: Value::Null,
            steps: document.steps,
        };
        validate_template(&template)?;
        Ok((template, parameters))
    }

    fn seal_bindings(
        &self,
        bindings: &[ParameterBinding],
        passcode: &str,
    ) -> EngineResult<Vec<ParameterBinding>> {
        let mut sealed = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let mut binding = binding.clone();
            if let Some(auth) = &binding.auth {
                binding.auth = Some(seal_auth(&self.crypt, auth, passcode)?);
            }
            sealed.push(binding);
        }
        Ok(sealed)
    }

    fn unknown_workflow(&self, workflow_id: &str) -> EngineError {
        EngineError::new(
            ErrorCategory::NotFoundError,
            format!("requested workflow {} no longer exists", workflow_id),
        )
        .with_code("WF-STORE-003")
    }
}
