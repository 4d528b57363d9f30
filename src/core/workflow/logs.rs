//! Retry-tolerant append writer for the workflow message and error logs.
//!
//! Readers poll these files while the executor and its stream consumers are
//! writing; opening the file can therefore fail transiently and is retried
//! with a fixed backoff schedule followed by randomised waits.

use rand::Rng;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::time::{sleep, Duration};

/// File receiving the child processes' stdout lines.
pub const STDOUT_FILE_NAME: &str = "messages.txt";
/// File receiving the child processes' stderr lines.
pub const STDERR_FILE_NAME: &str = "errors.txt";

const WRITE_RETRY_COUNT: usize = 30;
const WRITE_RETRY_BACKOFF_MS: [u64; 5] = [100, 200, 400, 600, 700];
const WRITE_RETRY_RAND_MIN_MS: u64 = 100;
const WRITE_RETRY_RAND_MAX_MS: u64 = 5_000;

/// A cloneable handle appending lines to one log file.
#[derive(Debug, Clone)]
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LogSink { path: path.into() }
    }

    /// The messages sink for a workflow root.
    pub fn messages(workflow_root: &Path) -> Self {
        LogSink::new(workflow_root.join(STDOUT_FILE_NAME))
    }

    /// The errors sink for a workflow root.
    pub fn errors(workflow_root: &Path) -> Self {
        LogSink::new(workflow_root.join(STDERR_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the given lines, retrying transient open failures.
    ///
    /// Returns whether every line was written; logging is best-effort and a
    /// false return never fails the workflow.
    pub async fn append_lines(&self, lines: &[String]) -> bool {
        if lines.is_empty() {
            return true;
        }
        let mut file = None;
        for attempt in 0..WRITE_RETRY_COUNT {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
            {
                Ok(opened) => {
                    file = Some(opened);
                    break;
                }
                Err(err) => {
                    tracing::debug!(
                        path = %self.path.display(),
                        attempt,
                        error = %err,
                        "log open failed; backing off"
                    );
                }
            }
            sleep(Duration::from_millis(backoff_ms(attempt))).await;
        }

        let Some(mut file) = file else {
            tracing::warn!(path = %self.path.display(), "unable to open log file for writing");
            return false;
        };

        for line in lines {
            if let Err(err) = file.write_all(line.as_bytes()) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed while writing log lines"
                );
                return false;
            }
        }
        true
    }

    /// Append a single line, adding the trailing newline.
    pub async fn append_message(&self, message: &str) -> bool {
        self.append_lines(&[format!("{}\n", message)]).await
    }
}

fn backoff_ms(attempt: usize) -> u64 {
    if attempt < WRITE_RETRY_BACKOFF_MS.len() {
        WRITE_RETRY_BACKOFF_MS[attempt]
    } else {
        rand::thread_rng().gen_range(WRITE_RETRY_RAND_MIN_MS..=WRITE_RETRY_RAND_MAX_MS)
    }
}
