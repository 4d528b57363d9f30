use atlana::core::config::EngineConfig;
use atlana::core::error::EngineResult;
use atlana::core::types::{ErrorCategory, RunState};
use atlana::core::workflow::catalog::{builtin_templates, TemplateCatalog};
use atlana::core::workflow::executor::run_workflow;
use atlana::core::workflow::schema::{ParameterBinding, ResolvedStep, WorkflowTemplate};
use atlana::core::workflow::status::{write_status, STATUS_COMPLETED};
use atlana::core::workflow::store::{ExecutorLauncher, WorkflowStore};
use atlana::utils::files::is_workflow_id;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Launcher that leaves the queue untouched; tests drive execution directly.
struct NoopLauncher;

#[async_trait]
impl ExecutorLauncher for NoopLauncher {
    async fn launch(&self, _workflow_root: &Path) -> EngineResult<()> {
        Ok(())
    }
}

/// Launcher running the executor inline so submit returns on completion.
struct InlineLauncher {
    config: EngineConfig,
}

#[async_trait]
impl ExecutorLauncher for InlineLauncher {
    async fn launch(&self, workflow_root: &Path) -> EngineResult<()> {
        run_workflow(workflow_root, &self.config).await
    }
}

const STUB_ENGINE: &str = r#"#!/bin/sh
out=""
for a in "$@"; do
case "$a" in *:/output) out="${a%:/output}";; esac
done
echo "masking soil"
: > "$out/ortho_mask.tif"
printf '%s' '{"file": [{"path": "/output/ortho_mask.tif"}]}' > "$out/result.json"
exit 0
"#;

fn write_engine(dir: &Path) -> PathBuf {
    let path = dir.join("engine.sh");
    fs::write(&path, STUB_ENGINE).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn soilmask_template() -> WorkflowTemplate {
    let soilmask = builtin_templates().remove(0).steps.remove(0);
    WorkflowTemplate {
        name: "Soil mask only".to_string(),
        description: Some("Single-step soil masking".to_string()),
        id: json!(77),
        steps: vec![soilmask],
    }
}

fn image_binding(browse_path: &str) -> ParameterBinding {
    ParameterBinding {
        command: "soilmask".to_string(),
        field_name: "image".to_string(),
        value: Some(json!(browse_path)),
        data_type: Some("1".to_string()),
        auth: Some(json!({"user": "u", "password": "p"})),
    }
}

fn store_fixture() -> (tempfile::TempDir, WorkflowStore, EngineConfig) {
    let run_area = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::with_working_folder(run_area.path());
    config.file_start_path = run_area.path().join("browse");
    fs::create_dir_all(&config.file_start_path).unwrap();
    fs::write(config.file_start_path.join("ortho.tif"), "image bytes").unwrap();
    let store = WorkflowStore::new(config.clone());
    (run_area, store, config)
}

#[tokio::test]
async fn submit_persists_the_instance_state() {
    let (_run_area, store, config) = store_fixture();
    let outcome = store
        .submit(&soilmask_template(), &[image_binding("/ortho.tif")], &NoopLauncher)
        .await
        .unwrap();

    assert!(is_workflow_id(&outcome.id));
    let root = config.workflow_root(&outcome.id);
    assert!(root.join("_workflow").is_file());
    assert!(root.join("_params").is_file());
    assert!(root.join("queue").is_file());

    // The queue parses back into resolved steps.
    let queue: Vec<ResolvedStep> =
        serde_json::from_str(&fs::read_to_string(root.join("queue")).unwrap()).unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].command, "soilmask");

    // Credentials never reach disk in clear form.
    for raw in [
        fs::read_to_string(root.join("_params")).unwrap(),
        fs::read_to_string(root.join("queue")).unwrap(),
    ] {
        assert!(!raw.contains("\"password\""));
        assert!(!raw.contains("\"p\""));
    }
    let params: Vec<ParameterBinding> =
        serde_json::from_str(&fs::read_to_string(root.join("_params")).unwrap()).unwrap();
    assert!(params[0].auth.as_ref().unwrap().is_string());
}

#[tokio::test]
async fn missing_mandatory_parameter_fails_submit_without_a_directory() {
    let (run_area, store, _config) = store_fixture();
    let template = builtin_templates().remove(0);
    let bindings = vec![ParameterBinding {
        command: "soilmask".to_string(),
        field_name: "image".to_string(),
        value: Some(json!("/ortho.tif")),
        data_type: None,
        auth: None,
    }];

    let before: Vec<_> = fs::read_dir(run_area.path()).unwrap().flatten().collect();
    let err = store
        .submit(&template, &bindings, &NoopLauncher)
        .await
        .expect_err("geometries binding is missing");
    assert_eq!(err.category, ErrorCategory::ParameterError);
    let after: Vec<_> = fs::read_dir(run_area.path()).unwrap().flatten().collect();
    assert_eq!(before.len(), after.len(), "no workflow directory may appear");
}

#[tokio::test]
async fn recovery_is_idempotent_and_delete_is_final() {
    let (_run_area, store, config) = store_fixture();
    let outcome = store
        .submit(&soilmask_template(), &[image_binding("/ortho.tif")], &NoopLauncher)
        .await
        .unwrap();
    let root = config.workflow_root(&outcome.id);
    write_status(&root, STATUS_COMPLETED, json!({"message": "Completed"}))
        .await
        .unwrap();

    let first = store.list().await.unwrap();
    let second = store.list().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].id, outcome.id);
    assert_eq!(first[0].status.state, RunState::Finished);
    assert_eq!(first[0].workflow.name, "Soil mask only");

    store.delete(&outcome.id).await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
    let err = store.delete(&outcome.id).await.expect_err("already deleted");
    assert_eq!(err.category, ErrorCategory::NotFoundError);
}

#[tokio::test]
async fn recovery_forgets_roots_without_persistence_files() {
    let (_run_area, store, config) = store_fixture();
    let orphan = config.workflow_root("00000000000000000000000000000abc");
    fs::create_dir_all(&orphan).unwrap();
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn recover_relaunches_without_rewriting_the_queue() {
    let (_run_area, store, config) = store_fixture();
    let outcome = store
        .submit(&soilmask_template(), &[image_binding("/ortho.tif")], &NoopLauncher)
        .await
        .unwrap();
    let root = config.workflow_root(&outcome.id);
    let queue_before = fs::read_to_string(root.join("queue")).unwrap();

    store.recover(&outcome.id, &NoopLauncher).await.unwrap();
    assert_eq!(fs::read_to_string(root.join("queue")).unwrap(), queue_before);

    // A workflow without a queue file cannot be recovered.
    fs::remove_file(root.join("queue")).unwrap();
    let err = store
        .recover(&outcome.id, &NoopLauncher)
        .await
        .expect_err("queue is gone");
    assert_eq!(err.category, ErrorCategory::NotFoundError);
}

#[tokio::test]
async fn delete_refuses_unfinished_workflows() {
    let (_run_area, store, _config) = store_fixture();
    let outcome = store
        .submit(&soilmask_template(), &[image_binding("/ortho.tif")], &NoopLauncher)
        .await
        .unwrap();
    let err = store.delete(&outcome.id).await.expect_err("not finished");
    assert_eq!(err.category, ErrorCategory::ConflictError);
}

#[tokio::test]
async fn submit_with_inline_launcher_produces_artifacts() {
    let (run_area, store, config) = store_fixture();
    let engine = write_engine(run_area.path());
    let mut run_config = config.clone();
    run_config.container_engine = engine.to_string_lossy().into_owned();

    let outcome = store
        .submit(
            &soilmask_template(),
            &[image_binding("/ortho.tif")],
            &InlineLauncher { config: run_config },
        )
        .await
        .unwrap();

    let root = config.workflow_root(&outcome.id);
    assert!(root.join("soilmask/ortho_mask.tif").is_file());

    let artifact = store
        .artifact(&outcome.id, "soilmask", "Soil masked image")
        .await
        .unwrap();
    assert_eq!(artifact.file_name, "ortho_mask.tif");
    assert!(artifact.path.starts_with(&root));
    assert!(!artifact.restricted);
}

#[tokio::test]
async fn artifact_requests_are_validated_and_confined() {
    let (_run_area, store, config) = store_fixture();
    let outcome = store
        .submit(&soilmask_template(), &[image_binding("/ortho.tif")], &NoopLauncher)
        .await
        .unwrap();
    let root = config.workflow_root(&outcome.id);

    // Unknown step and unknown result are refused.
    let err = store
        .artifact(&outcome.id, "plotclip", "anything")
        .await
        .expect_err("no such step");
    assert_eq!(err.category, ErrorCategory::NotFoundError);
    let err = store
        .artifact(&outcome.id, "soilmask", "Not declared")
        .await
        .expect_err("no such result");
    assert_eq!(err.category, ErrorCategory::NotFoundError);

    // A declared filename that climbs out of the root is refused even if the
    // template itself was tampered with.
    let mut template: Value =
        serde_json::from_str(&fs::read_to_string(root.join("_workflow")).unwrap()).unwrap();
    template["steps"][0]["results"][0]["filename"] = json!("../../../etc/passwd");
    fs::write(
        root.join("_workflow"),
        serde_json::to_string_pretty(&template).unwrap(),
    )
    .unwrap();
    let err = store
        .artifact(&outcome.id, "soilmask", "Soil masked image")
        .await
        .expect_err("traversal must be refused");
    assert_eq!(err.category, ErrorCategory::ParameterError);
}

#[tokio::test]
async fn download_reseals_credentials_under_the_caller_passcode() {
    let (_run_area, store, _config) = store_fixture();
    let outcome = store
        .submit(&soilmask_template(), &[image_binding("/ortho.tif")], &NoopLauncher)
        .await
        .unwrap();

    let passcode = "s3cret12345678901";
    let document = store.download(&outcome.id, passcode).await.unwrap();
    assert_eq!(document.version, "1.0");
    assert_eq!(document.name, "Soil mask only");
    let sealed = document.parameters[0].auth.as_ref().unwrap();
    assert!(sealed.is_string());

    // Reopening with the same passcode recovers the original credentials.
    let (template, parameters) = store.upload(document.clone(), passcode).unwrap();
    assert_eq!(template.steps.len(), 1);
    assert_eq!(
        parameters[0].auth,
        Some(json!({"user": "u", "password": "p"}))
    );

    // A wrong passcode fails cleanly instead of yielding garbage.
    assert!(store.upload(document, "wrong-passcode-123").is_err());
}

#[tokio::test]
async fn download_all_serialises_the_catalogue() {
    let (_run_area, store, _config) = store_fixture();
    let catalog = TemplateCatalog::new();
    let export = store.download_all(&catalog);
    assert_eq!(export.kind, "workflow definition");
    assert_eq!(export.workflows.len(), 4);
    assert!(export
        .workflows
        .iter()
        .any(|workflow| workflow.name == "Canopy Cover"));
}
