//! Parameter resolution: binding caller values to template fields at submit
//! time (Phase A) and late-binding prior step results just before a step runs
//! (Phase B).

use crate::core::crypt::Crypt;
use crate::core::error::{EngineError, EngineResult};
use crate::core::types::{ErrorCategory, FieldVisibility};
use crate::core::workflow::handlers::HandlerRegistry;
use crate::core::workflow::schema::{
    ParameterBinding, ResolvedParameter, ResolvedStep, WorkflowTemplate,
};
use serde_json::Value;
use std::path::Path;

/// Resolve a template against the caller's bindings into the step queue.
///
/// Every mandatory field without a matching binding fails the whole workflow
/// here, before any directory is created or step runs; optional misses are
/// dropped silently. Credential blobs are sealed before they can reach disk.
pub fn resolve_template(
    template: &WorkflowTemplate,
    bindings: &[ParameterBinding],
    handlers: &HandlerRegistry,
    crypt: &Crypt,
    passcode: &str,
    working_folder: &Path,
) -> EngineResult<Vec<ResolvedStep>> {
    let mut queue = Vec::with_capacity(template.steps.len());

    for step in &template.steps {
        let mut parameters = Vec::new();
        for field in &step.fields {
            if field.visibility == FieldVisibility::Server {
                parameters.push(ResolvedParameter {
                    field_name: field.name.clone(),
                    field_type: field.field_type,
                    visibility: FieldVisibility::Server,
                    mandatory: field.mandatory,
                    value: None,
                    prev_command_path: field.prev_command_path.clone(),
                    data_type: None,
                    auth: None,
                });
                continue;
            }

            let binding = bindings
                .iter()
                .find(|binding| binding.command == step.command && binding.field_name == field.name)
                .filter(|binding| match binding.data_type.as_deref() {
                    Some(tag) if !handlers.contains(tag) => {
                        tracing::warn!(
                            field = %field.name,
                            data_type = tag,
                            "binding names an unknown file handler"
                        );
                        false
                    }
                    _ => true,
                });

            match binding {
                Some(binding) => {
                    let auth = match &binding.auth {
                        Some(raw) => Some(seal_auth(crypt, raw, passcode)?),
                        None => None,
                    };
                    parameters.push(ResolvedParameter {
                        field_name: field.name.clone(),
                        field_type: field.field_type,
                        visibility: field.visibility,
                        mandatory: field.mandatory,
                        value: binding.value.clone(),
                        prev_command_path: None,
                        data_type: binding.data_type.clone(),
                        auth,
                    });
                }
                None if field.mandatory => {
                    return Err(EngineError::new(
                        ErrorCategory::ParameterError,
                        format!(
                            "Missing mandatory value for {} on workflow step {}",
                            field.name, step.name
                        ),
                    )
                    .with_code("WF-PARAM-002"));
                }
                None => {
                    tracing::debug!(
                        field = %field.name,
                        step = %step.name,
                        "skipping unbound optional field"
                    );
                }
            }
        }

        queue.push(ResolvedStep {
            step: step.name.clone(),
            command: step.command.clone(),
            parameters,
            working_folder: working_folder.to_path_buf(),
            git_repo: step.git_repo.clone(),
            git_branch: step.git_branch.clone(),
        });
    }

    Ok(queue)
}

/// Fill deferred parameters from the previous step's result object.
///
/// Only parameters carrying a `prev_command_path` are touched; a missing path
/// segment leaves the value empty, and the step's own guards decide whether
/// that matters.
pub fn incorporate_previous_results(
    parameters: &[ResolvedParameter],
    previous: Option<&Value>,
) -> Vec<ResolvedParameter> {
    parameters
        .iter()
        .map(|parameter| {
            let mut adjusted = parameter.clone();
            if let Some(path) = &parameter.prev_command_path {
                let found = previous.and_then(|results| lookup_result_path(path, results));
                if found.is_none() {
                    tracing::error!(
                        path = %path,
                        "unable to find previous result value"
                    );
                }
                adjusted.value = found;
            }
            adjusted
        })
        .collect()
}

/// Evaluate a `:`-separated path expression against a result value.
///
/// String components index into mappings, numeric components into sequences;
/// any miss (absent key, bad index, scalar mid-path) yields `None`.
pub fn lookup_result_path(path: &str, results: &Value) -> Option<Value> {
    let mut current = results;
    for part in path.split(':') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            Value::Array(items) => {
                let index: usize = part.parse().ok()?;
                current = items.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current.clone())
}

/// Seal a credential blob for storage: serialise and encrypt to base64 text.
pub fn seal_auth(crypt: &Crypt, auth: &Value, passcode: &str) -> EngineResult<Value> {
    if let Value::String(_) = auth {
        // Already ciphertext; sealing twice would strand the credentials.
        return Ok(auth.clone());
    }
    let cipher = crypt.encrypt_value(auth, passcode)?;
    Ok(Value::String(cipher))
}

/// Recover a credential blob sealed by [`seal_auth`].
pub fn unseal_auth(crypt: &Crypt, auth: &Value, passcode: &str) -> EngineResult<Value> {
    match auth {
        Value::String(cipher) => Ok(crypt.decrypt_value(cipher, passcode)?),
        other => Ok(other.clone()),
    }
}
