//! Status snapshot writing and the poll-and-retry reader surface.
//!
//! Status reads race with the executor's writes; each read retries a few
//! times with a fixed backoff and masks persistent failures as a generic
//! pending answer instead of erroring.

use crate::core::error::EngineResult;
use crate::core::types::RunState;
use crate::core::workflow::logs::{STDERR_FILE_NAME, STDOUT_FILE_NAME};
use crate::utils::files::write_json_atomic;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::time::{sleep, Duration};

/// Queue file consumed left-to-right by the executor.
pub const QUEUE_FILE_NAME: &str = "queue";
/// Status snapshot file; always a single complete JSON object.
pub const STATUS_FILE_NAME: &str = "status.json";

/// Outer key while the executor is preparing.
pub const STATUS_STARTING: &str = "starting";
/// Outer key while a step is running.
pub const STATUS_RUNNING: &str = "running";
/// Outer key once the workflow reached a terminal state.
pub const STATUS_COMPLETED: &str = "completion";

const STATUS_READ_RETRIES: usize = 3;
const STATUS_READ_BACKOFF_MS: [u64; 4] = [100, 200, 400, 700];
const MESSAGE_READ_RETRIES: usize = 3;
const MESSAGE_READ_BACKOFF_MS: [u64; 5] = [100, 200, 100, 200, 400];

pub fn queue_path(workflow_root: &Path) -> PathBuf {
    workflow_root.join(QUEUE_FILE_NAME)
}

pub fn status_path(workflow_root: &Path) -> PathBuf {
    workflow_root.join(STATUS_FILE_NAME)
}

/// Write `{key: payload}` as the new status snapshot, atomically.
pub async fn write_status(workflow_root: &Path, key: &str, payload: Value) -> EngineResult<()> {
    let snapshot = json!({ key: payload });
    tracing::info!(status = %snapshot, "current status");
    write_json_atomic(&status_path(workflow_root), &snapshot)
}

/// Remove leftovers of a previous run of the same workflow root.
pub async fn clear_run_files(workflow_root: &Path) {
    for name in [STATUS_FILE_NAME, STDOUT_FILE_NAME, STDERR_FILE_NAME] {
        let path = workflow_root.join(name);
        if path.exists() {
            tracing::debug!(path = %path.display(), "cleaning up previous logging file");
            if let Err(err) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %err, "cleanup failed");
            }
        }
    }
}

/// Read the raw status snapshot with retries.
///
/// `None` means the workflow has not started (no snapshot exists yet). A
/// snapshot that cannot be parsed after all attempts is masked as
/// `{"status": "Pending..."}`.
pub async fn read_status_raw(workflow_root: &Path) -> Option<Value> {
    let path = status_path(workflow_root);
    if !path.exists() {
        return None;
    }

    for attempt in 0..STATUS_READ_RETRIES {
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => return Some(value),
                Err(err) => {
                    tracing::debug!(error = %err, "status JSON mid-write; retrying");
                }
            },
            Err(err) => {
                tracing::debug!(error = %err, "status file unreadable; retrying");
            }
        }
        sleep(Duration::from_millis(
            STATUS_READ_BACKOFF_MS[attempt.min(STATUS_READ_BACKOFF_MS.len() - 1)],
        ))
        .await;
    }

    Some(json!({"status": "Pending..."}))
}

/// Coarse status for pollers: run state plus the latest snapshot detail.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state: RunState,
    pub status: Option<Value>,
}

impl Serialize for StatusReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("result", &self.state.as_code())?;
        if let Some(status) = &self.status {
            map.serialize_entry("status", status)?;
        }
        map.end()
    }
}

/// Map the raw snapshot onto the monotonic NotStarted/Running/Finished states.
///
/// A `completion` outer key is terminal and its inner object is surfaced as
/// the status detail; anything else still counts as running.
pub async fn workflow_status(workflow_root: &Path) -> StatusReport {
    match read_status_raw(workflow_root).await {
        None => StatusReport {
            state: RunState::NotStarted,
            status: None,
        },
        Some(raw) => match raw.get(STATUS_COMPLETED) {
            Some(completion) => StatusReport {
                state: RunState::Finished,
                status: Some(completion.clone()),
            },
            None => StatusReport {
                state: RunState::Running,
                status: Some(raw),
            },
        },
    }
}

/// Read the accumulated message and error logs, with per-file retries.
///
/// A missing file yields an empty list; the files' presence is authoritative
/// for whether the workflow produced output.
pub async fn read_messages(workflow_root: &Path) -> (Vec<String>, Vec<String>) {
    let messages = read_log_lines(&workflow_root.join(STDOUT_FILE_NAME)).await;
    let errors = read_log_lines(&workflow_root.join(STDERR_FILE_NAME)).await;
    (messages, errors)
}

async fn read_log_lines(path: &Path) -> Vec<String> {
    if !path.exists() {
        return Vec::new();
    }
    for attempt in 0..MESSAGE_READ_RETRIES {
        match std::fs::read_to_string(path) {
            Ok(raw) => return raw.lines().map(str::to_string).collect(),
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    attempt,
                    error = %err,
                    "log read failed; retrying"
                );
            }
        }
        sleep(Duration::from_millis(
            MESSAGE_READ_BACKOFF_MS[attempt.min(MESSAGE_READ_BACKOFF_MS.len() - 1)],
        ))
        .await;
    }
    Vec::new()
}
