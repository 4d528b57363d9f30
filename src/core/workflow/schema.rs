//! Workflow template, parameter binding, and resolved-step document types.

use crate::core::error::{EngineError, EngineResult};
use crate::core::types::{ErrorCategory, FieldType, FieldVisibility, ResultKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Version embedded in saved-workflow documents.
pub const SAVE_FORMAT_VERSION: &str = "1.0";
/// Document type marker for a workflow-definition export.
pub const DEFINITION_EXPORT_TYPE: &str = "workflow definition";

fn default_true() -> bool {
    true
}

/// A declared input field of a template step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub visibility: FieldVisibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub mandatory: bool,
    /// `:`-separated path into the previous step's result; server fields only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_command_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowerbound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upperbound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A declared output artifact of a template step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResultKind,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// One step of a workflow template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub results: Vec<ResultDef>,
}

/// An immutable, ordered workflow template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Catalogue identifier; numeric for built-ins, hash text for uploads.
    pub id: Value,
    pub steps: Vec<StepDef>,
}

/// A caller-supplied value for one `(command, field_name)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub command: String,
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Tag selecting a file handler for file-typed bindings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Credential blob; an object in flight, ciphertext at rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,
}

/// A field declaration merged with its bound value, ready for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedParameter {
    pub field_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub visibility: FieldVisibility,
    #[serde(default = "default_true")]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_command_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Sealed credential ciphertext; decrypted just-in-time when staging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,
}

/// One queue entry: a step with its resolved parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedStep {
    pub step: String,
    pub command: String,
    pub parameters: Vec<ResolvedParameter>,
    pub working_folder: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
}

/// Versioned document produced by the Download operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedWorkflow {
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepDef>,
    pub parameters: Vec<ParameterBinding>,
}

/// Versioned document produced by the Download-all operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinitionExport {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub workflows: Vec<ExportedDefinition>,
}

/// One catalogue entry inside a definition export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub id: Value,
    pub steps: Vec<StepDef>,
}

/// Validate a template before it enters the catalogue or a submit call.
pub fn validate_template(template: &WorkflowTemplate) -> EngineResult<()> {
    if template.steps.is_empty() {
        return Err(parameter_error(format!(
            "workflow \"{}\" declares no steps",
            template.name
        )));
    }
    for step in &template.steps {
        if step.command.trim().is_empty() {
            return Err(parameter_error(format!(
                "step \"{}\" declares an empty command",
                step.name
            )));
        }
        if step.git_repo.is_some() != step.git_branch.is_some() {
            return Err(parameter_error(format!(
                "step \"{}\" must declare git_repo and git_branch together",
                step.name
            )));
        }
        for field in &step.fields {
            if field.visibility == FieldVisibility::Server && field.prev_command_path.is_none() {
                return Err(parameter_error(format!(
                    "server field \"{}\" on step \"{}\" is missing prev_command_path",
                    field.name, step.name
                )));
            }
            if let (Some(lower), Some(upper)) = (field.lowerbound, field.upperbound) {
                if lower > upper {
                    return Err(parameter_error(format!(
                        "field \"{}\" on step \"{}\" has an inverted bound range",
                        field.name, step.name
                    )));
                }
            }
        }
        for result in &step.results {
            if result.name.trim().is_empty() {
                return Err(parameter_error(format!(
                    "step \"{}\" declares an unnamed result",
                    step.name
                )));
            }
        }
    }
    Ok(())
}

fn parameter_error(message: String) -> EngineError {
    EngineError::new(ErrorCategory::ParameterError, message).with_code("WF-PARAM-001")
}
