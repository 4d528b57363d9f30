//! Generic git-sourced step: checkout, build, then run under the standard
//! mount contract with the caller's parameter mapping.

use super::{ensure_success, run_image, write_args_json, StepContext, StepHandler};
use crate::core::error::{EngineError, EngineResult};
use crate::core::types::ErrorCategory;
use crate::core::workflow::logs::LogSink;
use crate::core::workflow::results::load_step_results;
use crate::core::workflow::schema::{ResolvedStep, ResolvedParameter};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub struct GitStep;

/// Build the step argument object from the caller's parameter mapping.
///
/// Field names become uppercased keys; parameters without a value are left
/// out so the checkout's own defaults apply.
pub(super) fn mapped_args(parameters: &[ResolvedParameter]) -> Value {
    let mut args = Map::new();
    for parameter in parameters {
        if let Some(value) = &parameter.value {
            if !value.is_null() {
                args.insert(parameter.field_name.to_uppercase(), value.clone());
            }
        }
    }
    Value::Object(args)
}

fn checkout_name(repo: &str, branch: &str) -> String {
    let slug: String = repo
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .unwrap_or("checkout")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(repo.as_bytes());
    hasher.update(branch.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", slug, &digest[..12])
}

async fn run_tool(
    program: &str,
    args: &[&str],
    messages: &LogSink,
    errors: &LogSink,
    what: &str,
) -> EngineResult<()> {
    let output = Command::new(program).args(args).output().await.map_err(|err| {
        EngineError::with_source(
            ErrorCategory::ContainerError,
            format!("failed to start {} while preparing git step", program),
            Box::new(err),
        )
        .with_code("WF-GIT-001")
    })?;
    if !output.stdout.is_empty() {
        messages
            .append_lines(&[String::from_utf8_lossy(&output.stdout).into_owned()])
            .await;
    }
    if !output.stderr.is_empty() {
        errors
            .append_lines(&[String::from_utf8_lossy(&output.stderr).into_owned()])
            .await;
    }
    if !output.status.success() {
        return Err(EngineError::new(
            ErrorCategory::ContainerError,
            format!("{} failed with exit code {}", what, output.status.code().unwrap_or(-1)),
        )
        .with_code("WF-GIT-001"));
    }
    Ok(())
}

async fn checkout(
    repo: &str,
    branch: &str,
    repository_folder: &Path,
    messages: &LogSink,
    errors: &LogSink,
) -> EngineResult<PathBuf> {
    std::fs::create_dir_all(repository_folder).map_err(|err| {
        EngineError::with_source(
            ErrorCategory::IoError,
            format!(
                "failed to create repository folder {}",
                repository_folder.display()
            ),
            Box::new(err),
        )
    })?;
    let target = repository_folder.join(checkout_name(repo, branch));
    if target.exists() {
        // Stale checkouts are replaced so the requested branch tip is built.
        std::fs::remove_dir_all(&target).map_err(|err| {
            EngineError::with_source(
                ErrorCategory::IoError,
                format!("failed to clear old checkout {}", target.display()),
                Box::new(err),
            )
        })?;
    }
    let target_text = target.display().to_string();
    run_tool(
        "git",
        &["clone", "--depth", "1", "--branch", branch, repo, &target_text],
        messages,
        errors,
        "git clone",
    )
    .await?;
    Ok(target)
}

#[async_trait]
impl StepHandler for GitStep {
    fn command(&self) -> &'static str {
        "git"
    }

    async fn execute(&self, step: &ResolvedStep, ctx: &StepContext<'_>) -> EngineResult<Value> {
        let (repo, branch) = match (&step.git_repo, &step.git_branch) {
            (Some(repo), Some(branch)) => (repo.as_str(), branch.as_str()),
            _ => {
                return Err(EngineError::new(
                    ErrorCategory::ParameterError,
                    format!(
                        "step \"{}\" is missing its git repository or branch",
                        step.step
                    ),
                )
                .with_code("WF-GIT-002"));
            }
        };

        let target = checkout(
            repo,
            branch,
            &ctx.config.code_repository_folder,
            ctx.messages,
            ctx.errors,
        )
        .await?;

        let image_tag = format!("atlana-{}", checkout_name(repo, branch));
        let target_text = target.display().to_string();
        run_tool(
            &ctx.config.container_engine,
            &["build", "-t", &image_tag, &target_text],
            ctx.messages,
            ctx.errors,
            "image build",
        )
        .await?;

        let args = mapped_args(&step.parameters);
        let args_file = write_args_json(ctx.working_folder, &args)?;

        let exit_code = run_image(ctx, &image_tag, &step.command, &args_file, &[]).await?;
        ensure_success(&step.command, exit_code)?;

        load_step_results(ctx.working_folder)
    }
}
