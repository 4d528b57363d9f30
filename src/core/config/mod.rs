//! Engine configuration sourced from the process environment.
//!
//! Every recognised variable has a usable default so the engine can run in a
//! bare environment; tests construct `EngineConfig` directly instead of going
//! through the environment.

use std::env;
use std::path::{Path, PathBuf};

pub const ENV_WORKING_FOLDER: &str = "WORKING_FOLDER";
pub const ENV_WORKFLOW_FOLDER: &str = "WORKFLOW_FOLDER";
pub const ENV_CODE_REPOSITORY_FOLDER: &str = "CODE_REPOSITORY_FOLDER";
pub const ENV_SALT_VALUE: &str = "SALT_VALUE";
pub const ENV_DEFAULT_PASSCODE: &str = "DEFAULT_PASSCODE";
pub const ENV_SECRET_KEY: &str = "SECRET_KEY";
pub const ENV_MORE_FOLDERS: &str = "MORE_FOLDERS";
pub const ENV_USE_SCIF_WORKFLOW: &str = "ATLANA_USE_SCIF_WORKFLOW";
pub const ENV_CONTAINER_ENGINE: &str = "CONTAINER_ENGINE";

const DEFAULT_SALT: &str = "atlana_workflows";
const DEFAULT_PASSCODE: &str = "atlana_default_passcode";
const DEFAULT_ENGINE: &str = "docker";

/// A named extra root the server-side file handler may stage from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseRoot {
    pub name: String,
    pub path: PathBuf,
}

/// Resolved engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Run area under which each workflow owns `<working_folder>/<id>`.
    pub working_folder: PathBuf,
    /// Directory of stored workflow template JSON files, if configured.
    pub workflow_folder: Option<PathBuf>,
    /// Checkout area for git-sourced steps.
    pub code_repository_folder: PathBuf,
    /// Process-wide IV text for credential encryption.
    pub salt_value: String,
    /// Passcode sealing credential blobs at rest.
    pub default_passcode: String,
    /// Collaborator cookie secret; held for the serving layer, unused here.
    pub secret_key: Option<String>,
    /// Root the server-side file handler resolves staging paths against.
    pub file_start_path: PathBuf,
    /// Extra named browsable roots (`MORE_FOLDERS`).
    pub more_folders: Vec<BrowseRoot>,
    /// Select the SCIF runner instead of the container engine.
    pub use_scif_runner: bool,
    /// Container engine binary.
    pub container_engine: String,
}

impl EngineConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        let working_folder = env::var(ENV_WORKING_FOLDER)
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("atlana"));
        let file_start_path = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        EngineConfig {
            working_folder,
            workflow_folder: env::var(ENV_WORKFLOW_FOLDER).ok().map(PathBuf::from),
            code_repository_folder: env::var(ENV_CODE_REPOSITORY_FOLDER)
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("atlana_repos")),
            salt_value: env::var(ENV_SALT_VALUE).unwrap_or_else(|_| DEFAULT_SALT.to_string()),
            default_passcode: env::var(ENV_DEFAULT_PASSCODE)
                .unwrap_or_else(|_| DEFAULT_PASSCODE.to_string()),
            secret_key: env::var(ENV_SECRET_KEY).ok(),
            file_start_path,
            more_folders: env::var(ENV_MORE_FOLDERS)
                .map(|raw| parse_more_folders(&raw))
                .unwrap_or_default(),
            use_scif_runner: env::var(ENV_USE_SCIF_WORKFLOW).is_ok(),
            container_engine: env::var(ENV_CONTAINER_ENGINE)
                .unwrap_or_else(|_| DEFAULT_ENGINE.to_string()),
        }
    }

    /// Configuration rooted at the given run area with defaults elsewhere.
    pub fn with_working_folder(working_folder: impl Into<PathBuf>) -> Self {
        let working_folder = working_folder.into();
        let file_start_path = working_folder.clone();
        EngineConfig {
            code_repository_folder: working_folder.join("repos"),
            working_folder,
            workflow_folder: None,
            salt_value: DEFAULT_SALT.to_string(),
            default_passcode: DEFAULT_PASSCODE.to_string(),
            secret_key: None,
            file_start_path,
            more_folders: Vec::new(),
            use_scif_runner: false,
            container_engine: DEFAULT_ENGINE.to_string(),
        }
    }

    /// Root directory owned by the given workflow instance.
    pub fn workflow_root(&self, workflow_id: &str) -> PathBuf {
        self.working_folder.join(workflow_id)
    }

    /// Look up an extra browsable root by name.
    pub fn browse_root(&self, name: &str) -> Option<&Path> {
        self.more_folders
            .iter()
            .find(|root| root.name == name)
            .map(|root| root.path.as_path())
    }
}

/// Parse the `MORE_FOLDERS` value: semicolon-separated `name:path` entries.
///
/// Malformed entries are skipped with a warning; the path may itself contain
/// colons only on the first split boundary (`name` may not).
pub fn parse_more_folders(raw: &str) -> Vec<BrowseRoot> {
    let mut roots = Vec::new();
    for entry in raw.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => {
                roots.push(BrowseRoot {
                    name: name.to_string(),
                    path: PathBuf::from(path),
                });
            }
            _ => {
                tracing::warn!(entry, "ignoring malformed MORE_FOLDERS entry");
            }
        }
    }
    roots
}
