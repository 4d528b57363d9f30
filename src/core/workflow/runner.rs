//! Container invocation and child-process supervision.
//!
//! Each step spawns one engine child with both output streams piped; two
//! consumer tasks drain the pipes line by line into the workflow logs while
//! the supervisor waits on the child. The exit code is returned verbatim.

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, EngineResult};
use crate::core::types::ErrorCategory;
use crate::core::workflow::logs::LogSink;
use async_trait::async_trait;
use futures::future::join;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{timeout, Duration};

/// Image providing the built-in algorithm steps.
pub const DEFAULT_CONTAINER_IMAGE: &str = "agdrone/drone-workflow:1.1";
/// Container-side mount target for the step argument JSON.
pub const ARGS_MOUNT_POINT: &str = "/scif/apps/src/jx-args.json";

/// Lines buffered per stream before flushing to the log file.
const MAX_CACHED_OUTPUT_LINES: usize = 40;
/// Bound on waiting for the consumers after the child has exited.
const READER_DRAIN_WAIT: Duration = Duration::from_secs(20);

/// An additional bind mount for one invocation.
#[derive(Debug, Clone)]
pub struct MountSpec {
    pub source: PathBuf,
    pub target: String,
}

impl MountSpec {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        MountSpec {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Everything one container invocation needs.
#[derive(Debug)]
pub struct RunRequest<'a> {
    pub command: &'a str,
    pub image: &'a str,
    pub input_folder: &'a Path,
    pub output_folder: &'a Path,
    pub args_file: &'a Path,
    pub extra_mounts: &'a [MountSpec],
}

/// Trait implemented by the container invocation backends.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Run the step to completion, streaming output into the sinks, and
    /// return the child's exit code.
    async fn run(
        &self,
        request: &RunRequest<'_>,
        messages: &LogSink,
        errors: &LogSink,
    ) -> EngineResult<i32>;
}

/// Select the configured runner implementation.
pub fn runner_for(config: &EngineConfig) -> Arc<dyn ContainerRunner> {
    if config.use_scif_runner {
        Arc::new(ScifRunner)
    } else {
        Arc::new(DockerRunner::new(config.container_engine.clone()))
    }
}

/// Default backend: a docker-compatible engine binary.
pub struct DockerRunner {
    engine: String,
}

impl DockerRunner {
    pub fn new(engine: impl Into<String>) -> Self {
        DockerRunner {
            engine: engine.into(),
        }
    }
}

pub(crate) fn build_engine_args(request: &RunRequest<'_>) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "-v".to_string(),
        format!("{}:{}", request.input_folder.display(), super::results::CONTAINER_INPUT_FOLDER),
        "-v".to_string(),
        format!(
            "{}:{}",
            request.output_folder.display(),
            super::results::CONTAINER_OUTPUT_FOLDER
        ),
        "-v".to_string(),
        format!("{}:{}", request.args_file.display(), ARGS_MOUNT_POINT),
    ];
    for mount in request.extra_mounts {
        args.push("-v".to_string());
        args.push(format!("{}:{}", mount.source.display(), mount.target));
    }
    args.push(request.image.to_string());
    args.push("run".to_string());
    args.push(request.command.to_string());
    args
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn run(
        &self,
        request: &RunRequest<'_>,
        messages: &LogSink,
        errors: &LogSink,
    ) -> EngineResult<i32> {
        let args = build_engine_args(request);
        tracing::debug!(engine = %self.engine, ?args, "running command");

        let child = Command::new(&self.engine)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                EngineError::with_source(
                    ErrorCategory::ContainerError,
                    format!("failed to start container engine \"{}\"", self.engine),
                    Box::new(err),
                )
                .with_code("WF-RUN-002")
            })?;

        supervise(child, request.command, messages, errors).await
    }
}

/// Alternate backend invoking the SCIF entry point directly on the host.
pub struct ScifRunner;

#[async_trait]
impl ContainerRunner for ScifRunner {
    async fn run(
        &self,
        request: &RunRequest<'_>,
        messages: &LogSink,
        errors: &LogSink,
    ) -> EngineResult<i32> {
        tracing::debug!(command = request.command, "running command via scif");
        let child = Command::new("scif")
            .args(["run", request.command])
            .env("ATLANA_INPUT_FOLDER", request.input_folder)
            .env("ATLANA_OUTPUT_FOLDER", request.output_folder)
            .env("ATLANA_JSON_ARGS", request.args_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                EngineError::with_source(
                    ErrorCategory::ContainerError,
                    "failed to start scif entry point",
                    Box::new(err),
                )
                .with_code("WF-RUN-002")
            })?;

        supervise(child, request.command, messages, errors).await
    }
}

async fn supervise(
    mut child: Child,
    command: &str,
    messages: &LogSink,
    errors: &LogSink,
) -> EngineResult<i32> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let message_task = tokio::spawn(consume_stream(stdout, messages.clone()));
    let error_task = tokio::spawn(consume_stream(stderr, errors.clone()));

    tracing::debug!("waiting for process to finish");
    let status = child.wait().await.map_err(|err| {
        EngineError::with_source(
            ErrorCategory::ContainerError,
            format!("failed waiting on command \"{}\"", command),
            Box::new(err),
        )
        .with_code("WF-RUN-003")
    })?;
    let exit_code = status.code().unwrap_or(-1);
    tracing::debug!(exit_code, "return code");

    // Let the consumers drain what the child wrote before it exited. An
    // incomplete drain is logged but never alters the exit code.
    tracing::debug!("checking on readers");
    if timeout(READER_DRAIN_WAIT, join(message_task, error_task))
        .await
        .is_err()
    {
        tracing::error!(command, "unable to retrieve messages and/or errors for command");
        tracing::warn!(command, "ignoring problems with fetching output for command");
    }

    Ok(exit_code)
}

async fn consume_stream<R>(reader: Option<R>, sink: LogSink)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut buffered = Vec::new();
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!("{}", line);
                buffered.push(format!("{}\n", line));
                if buffered.len() >= MAX_CACHED_OUTPUT_LINES {
                    sink.append_lines(&buffered).await;
                    buffered.clear();
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring exception while waiting on messages");
                break;
            }
        }
    }
    if !buffered.is_empty() {
        sink.append_lines(&buffered).await;
    }
}
