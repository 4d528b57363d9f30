//! File handlers abstracting input staging from concrete storage backends.
//!
//! Handlers are looked up by the `data_type` tag carried on a parameter
//! binding; the tag is what gets persisted, never the handler itself.

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, EngineResult};
use crate::core::types::ErrorCategory;
use crate::utils::files::normalize_lexical;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tag of the server-side (local filesystem) handler.
pub const SERVER_SIDE_HANDLER: &str = "1";
/// Tag of the iRODS remote-storage handler.
pub const IRODS_HANDLER: &str = "2";

/// Staging abstraction over a concrete storage backend.
#[async_trait]
pub trait FileHandler: Send + Sync {
    /// Human-readable handler name.
    fn name(&self) -> &'static str;

    /// Stage `source` (a backend-namespace path) to the local `dest`.
    async fn get_file(&self, auth: Option<&Value>, source: &str, dest: &Path) -> EngineResult<()>;

    /// Publish the local `source` to `dest` in the backend namespace.
    async fn put_file(&self, auth: Option<&Value>, source: &Path, dest: &str) -> EngineResult<()>;
}

/// Registry of file handlers keyed by `data_type` tag.
#[derive(Clone)]
pub struct HandlerRegistry {
    inner: Arc<HashMap<String, Arc<dyn FileHandler>>>,
}

/// Builder used to register handlers before execution.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, Arc<dyn FileHandler>>,
}

impl HandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: FileHandler + 'static>(mut self, tag: &str, handler: T) -> Self {
        self.handlers.insert(tag.to_string(), Arc::new(handler));
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            inner: Arc::new(self.handlers),
        }
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::new()
    }

    /// The standard registry: server-side copy plus the iRODS entry.
    pub fn standard(config: &EngineConfig) -> Self {
        HandlerRegistry::builder()
            .register(
                SERVER_SIDE_HANDLER,
                ServerSideHandler::new(config.file_start_path.clone()),
            )
            .register(IRODS_HANDLER, IrodsHandler)
            .build()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.inner.contains_key(tag)
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn FileHandler>> {
        self.inner.get(tag).cloned()
    }
}

/// Normalize separators and collapse duplicate separators in a request path.
pub fn normalize_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let leading = replaced.starts_with('/');
    let joined = replaced
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if leading {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Copies files that already live under the configured browse root.
pub struct ServerSideHandler {
    start_path: PathBuf,
}

impl ServerSideHandler {
    pub fn new(start_path: PathBuf) -> Self {
        ServerSideHandler { start_path }
    }

    /// Resolve a request path under the browse root, refusing escapes.
    fn resolve(&self, requested: &str) -> EngineResult<PathBuf> {
        let working = normalize_path(requested);
        let relative = working.trim_start_matches('/');
        let root = normalize_lexical(&self.start_path);
        let resolved = normalize_lexical(&root.join(relative));
        if !resolved.starts_with(&root) {
            return Err(EngineError::new(
                ErrorCategory::ParameterError,
                format!("invalid source path for server side copy: {}", requested),
            )
            .with_code("WF-STAGE-001"));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl FileHandler for ServerSideHandler {
    fn name(&self) -> &'static str {
        "Server-side"
    }

    async fn get_file(&self, _auth: Option<&Value>, source: &str, dest: &Path) -> EngineResult<()> {
        let resolved = self.resolve(source)?;
        tokio::fs::copy(&resolved, dest).await.map_err(|err| {
            EngineError::with_source(
                ErrorCategory::StagingError,
                format!(
                    "failed to copy \"{}\" to \"{}\"",
                    resolved.display(),
                    dest.display()
                ),
                Box::new(err),
            )
            .with_code("WF-STAGE-003")
        })?;
        Ok(())
    }

    async fn put_file(&self, _auth: Option<&Value>, source: &Path, dest: &str) -> EngineResult<()> {
        let resolved = self.resolve(dest)?;
        tokio::fs::copy(source, &resolved).await.map_err(|err| {
            EngineError::with_source(
                ErrorCategory::StagingError,
                format!(
                    "failed to copy \"{}\" to \"{}\"",
                    source.display(),
                    resolved.display()
                ),
                Box::new(err),
            )
            .with_code("WF-STAGE-003")
        })?;
        Ok(())
    }
}

/// Registry entry for iRODS remote storage.
///
/// The wire client lives in the remote-storage collaborator; a binding that
/// reaches staging with this tag fails the workflow with a staging error
/// instead of a missing-handler panic.
pub struct IrodsHandler;

impl IrodsHandler {
    fn unsupported(&self, operation: &str) -> EngineError {
        EngineError::new(
            ErrorCategory::StagingError,
            format!(
                "iRODS {} requires the remote storage collaborator",
                operation
            ),
        )
        .with_code("WF-STAGE-002")
    }
}

#[async_trait]
impl FileHandler for IrodsHandler {
    fn name(&self) -> &'static str {
        "iRODS"
    }

    async fn get_file(
        &self,
        _auth: Option<&Value>,
        _source: &str,
        _dest: &Path,
    ) -> EngineResult<()> {
        Err(self.unsupported("download"))
    }

    async fn put_file(
        &self,
        _auth: Option<&Value>,
        _source: &Path,
        _dest: &str,
    ) -> EngineResult<()> {
        Err(self.unsupported("upload"))
    }
}
