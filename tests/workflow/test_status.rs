use atlana::core::types::RunState;
use atlana::core::workflow::logs::LogSink;
use atlana::core::workflow::status::{
    read_messages, read_status_raw, workflow_status, write_status, STATUS_COMPLETED,
    STATUS_RUNNING, STATUS_STARTING,
};
use serde_json::json;
use std::fs;

#[tokio::test]
async fn state_mapping_follows_the_outer_key() {
    let dir = tempfile::tempdir().unwrap();
    let report = workflow_status(dir.path()).await;
    assert_eq!(report.state, RunState::NotStarted);

    write_status(dir.path(), STATUS_STARTING, json!({"message": "Preparing workflow"}))
        .await
        .unwrap();
    assert_eq!(workflow_status(dir.path()).await.state, RunState::Running);

    write_status(dir.path(), STATUS_RUNNING, json!({"message": "Running soilmask"}))
        .await
        .unwrap();
    let report = workflow_status(dir.path()).await;
    assert_eq!(report.state, RunState::Running);
    assert_eq!(
        report.status,
        Some(json!({"running": {"message": "Running soilmask"}}))
    );

    write_status(dir.path(), STATUS_COMPLETED, json!({"error": "step failed"}))
        .await
        .unwrap();
    let report = workflow_status(dir.path()).await;
    assert_eq!(report.state, RunState::Finished);
    assert_eq!(report.status, Some(json!({"error": "step failed"})));
}

#[tokio::test]
async fn unparseable_snapshot_masks_as_pending() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("status.json"), "{\"running\": {\"mess").unwrap();
    let raw = read_status_raw(dir.path()).await.unwrap();
    assert_eq!(raw, json!({"status": "Pending..."}));
    // A pending mask still reads as running, never as finished.
    assert_eq!(workflow_status(dir.path()).await.state, RunState::Running);
}

#[tokio::test]
async fn status_report_serialises_numeric_result() {
    let dir = tempfile::tempdir().unwrap();
    write_status(dir.path(), STATUS_COMPLETED, json!({"message": "Completed"}))
        .await
        .unwrap();
    let report = workflow_status(dir.path()).await;
    let rendered = serde_json::to_value(&report).unwrap();
    assert_eq!(rendered["result"], json!(2));
    assert_eq!(rendered["status"]["message"], json!("Completed"));
}

#[tokio::test]
async fn snapshot_replacement_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    for index in 0..50 {
        write_status(
            dir.path(),
            STATUS_RUNNING,
            json!({"message": format!("Running step {}", index)}),
        )
        .await
        .unwrap();
        let raw = read_status_raw(dir.path()).await.unwrap();
        assert!(raw.get("running").is_some());
    }
}

#[tokio::test]
async fn logs_read_back_what_sinks_append() {
    let dir = tempfile::tempdir().unwrap();
    let messages = LogSink::messages(dir.path());
    let errors = LogSink::errors(dir.path());
    messages.append_lines(&["line one\n".into(), "line two\n".into()]).await;
    errors.append_message("boom").await;

    let (message_lines, error_lines) = read_messages(dir.path()).await;
    assert_eq!(message_lines, vec!["line one", "line two"]);
    assert_eq!(error_lines, vec!["boom"]);
}
