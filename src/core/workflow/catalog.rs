//! The workflow template catalogue: built-in definitions plus any templates
//! stored in the configured workflow folder, behind an append-only lock.

use crate::core::error::{EngineError, EngineResult};
use crate::core::types::{ErrorCategory, FieldType, FieldVisibility, ResultKind};
use crate::core::workflow::schema::{
    validate_template, FieldDef, ResultDef, StepDef, WorkflowTemplate,
};
use crate::utils::files::load_json_file;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::RwLock;

/// Process-wide template catalogue.
///
/// Existing entries are never rewritten; additions append under the lock and
/// reads hand out snapshots.
pub struct TemplateCatalog {
    templates: RwLock<Vec<WorkflowTemplate>>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        TemplateCatalog::new()
    }
}

impl TemplateCatalog {
    /// A catalogue seeded with the built-in definitions.
    pub fn new() -> Self {
        TemplateCatalog {
            templates: RwLock::new(builtin_templates()),
        }
    }

    /// Built-ins plus every parseable `*.json` template in `workflow_folder`.
    pub fn load(workflow_folder: Option<&Path>) -> Self {
        let catalog = TemplateCatalog::new();
        let Some(folder) = workflow_folder else {
            return catalog;
        };
        let Ok(entries) = std::fs::read_dir(folder) else {
            tracing::warn!(folder = %folder.display(), "workflow folder is not readable");
            return catalog;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match load_json_file(&path).and_then(|raw| {
                serde_json::from_value::<WorkflowTemplate>(raw).map_err(EngineError::from)
            }) {
                Ok(template) => {
                    if validate_template(&template).is_ok() {
                        let mut guard = catalog.templates.write().expect("catalog lock");
                        if !guard.iter().any(|existing| existing.id == template.id) {
                            guard.push(template);
                        }
                    } else {
                        tracing::warn!(file = %path.display(), "stored template failed validation");
                    }
                }
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping unreadable template");
                }
            }
        }
        catalog
    }

    /// Snapshot of every template.
    pub fn all(&self) -> Vec<WorkflowTemplate> {
        self.templates.read().expect("catalog lock").clone()
    }

    /// Find a template by its catalogue identifier.
    pub fn find(&self, id: &Value) -> Option<WorkflowTemplate> {
        self.templates
            .read()
            .expect("catalog lock")
            .iter()
            .find(|template| &template.id == id)
            .cloned()
    }

    /// Append a new template, assigning it a content-derived identifier.
    ///
    /// When a workflow folder is configured the template is also persisted
    /// there so it survives a restart.
    pub fn add(
        &self,
        mut template: WorkflowTemplate,
        workflow_folder: Option<&Path>,
    ) -> EngineResult<Value> {
        validate_template(&template)?;
        let id = Value::String(template_digest(&template));
        template.id = id.clone();

        {
            let mut guard = self.templates.write().map_err(|_| {
                EngineError::new(ErrorCategory::InternalError, "template catalogue lock poisoned")
            })?;
            if guard.iter().any(|existing| existing.id == id) {
                return Ok(id);
            }
            guard.push(template.clone());
        }

        if let Some(folder) = workflow_folder {
            let file = folder.join(format!("{}.json", id.as_str().unwrap_or("template")));
            if let Err(err) = std::fs::create_dir_all(folder)
                .map_err(EngineError::from)
                .and_then(|_| {
                    crate::utils::files::write_json_file(&file, &serde_json::to_value(&template)?)
                })
            {
                tracing::warn!(file = %file.display(), error = %err, "unable to persist template");
            }
        }
        Ok(id)
    }
}

fn template_digest(template: &WorkflowTemplate) -> String {
    let canonical = json!({"name": template.name, "steps": template.steps});
    let rendered = serde_json::to_string(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    hex::encode(hasher.finalize())
}

fn ui_file_field(name: &str, prompt: &str, description: &str, mandatory: bool) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        field_type: FieldType::File,
        visibility: FieldVisibility::Ui,
        prompt: Some(prompt.to_string()),
        description: Some(description.to_string()),
        mandatory,
        prev_command_path: None,
        lowerbound: None,
        upperbound: None,
        default: None,
    }
}

fn server_field(
    name: &str,
    field_type: FieldType,
    description: &str,
    prev_command_path: &str,
) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        field_type,
        visibility: FieldVisibility::Server,
        prompt: None,
        description: Some(description.to_string()),
        mandatory: true,
        prev_command_path: Some(prev_command_path.to_string()),
        lowerbound: None,
        upperbound: None,
        default: None,
    }
}

fn result_def(name: &str, kind: ResultKind, restricted: bool, filename: Option<&str>) -> ResultDef {
    ResultDef {
        name: name.to_string(),
        kind,
        restricted,
        filename: filename.map(str::to_string),
    }
}

fn soilmask_step() -> StepDef {
    StepDef {
        name: "Mask Soil on Image".to_string(),
        description: Some("Masks soil from a copy of an image".to_string()),
        algorithm: Some("RGBA File".to_string()),
        command: "soilmask".to_string(),
        git_repo: None,
        git_branch: None,
        fields: vec![ui_file_field(
            "image",
            "Image file",
            "Source image to process",
            true,
        )],
        results: vec![result_def("Soil masked image", ResultKind::File, false, None)],
    }
}

fn soilmask_ratio_step() -> StepDef {
    StepDef {
        name: "Mask Soil on Image".to_string(),
        description: Some(
            "Masks soil from a copy of an image using a green-to-red ratio".to_string(),
        ),
        algorithm: Some("RGBA File".to_string()),
        command: "soilmask_ratio".to_string(),
        git_repo: None,
        git_branch: None,
        fields: vec![
            ui_file_field("image", "Image", "Source image to process", true),
            FieldDef {
                name: "ratio".to_string(),
                field_type: FieldType::Float,
                visibility: FieldVisibility::Ui,
                prompt: Some("Ratio".to_string()),
                description: Some(
                    "Lower bound of green:red ratio for non-soil pixels".to_string(),
                ),
                mandatory: false,
                prev_command_path: None,
                lowerbound: Some(0.0),
                upperbound: Some(255.0),
                default: Some(json!(1.0)),
            },
        ],
        results: vec![result_def(
            "Ratio soil masked image",
            ResultKind::File,
            false,
            None,
        )],
    }
}

fn plotclip_step(image_prev_path: &str) -> StepDef {
    StepDef {
        name: "Plot Clip".to_string(),
        description: Some("Clips image to plot".to_string()),
        algorithm: Some("RGBA File".to_string()),
        command: "plotclip".to_string(),
        git_repo: None,
        git_branch: None,
        fields: vec![
            ui_file_field(
                "geometries",
                "GeoJSON file",
                "GeoJSON file containing plot geometries",
                true,
            ),
            server_field(
                "image",
                FieldType::File,
                "Source image to process",
                image_prev_path,
            ),
        ],
        results: vec![result_def(
            "Image clipped to plots",
            ResultKind::Folder,
            false,
            None,
        )],
    }
}

fn find_files_step() -> StepDef {
    StepDef {
        name: "Find files".to_string(),
        description: None,
        algorithm: None,
        command: "find_files2json".to_string(),
        git_repo: None,
        git_branch: None,
        fields: vec![
            server_field(
                "file_name",
                FieldType::String,
                "File name to find",
                "file_name",
            ),
            server_field(
                "top_path",
                FieldType::Folder,
                "Top level folder to search on",
                "top_path",
            ),
        ],
        results: vec![result_def(
            "Found files JSON file",
            ResultKind::File,
            true,
            Some("found_files.json"),
        )],
    }
}

fn plot_calculation_fields() -> Vec<FieldDef> {
    vec![
        ui_file_field(
            "experimentdata",
            "Experiment file",
            "YAML file containing experiment data",
            false,
        ),
        server_field(
            "found_json_file",
            FieldType::File,
            "JSON file containing information on files to process",
            "found_json_file",
        ),
        server_field(
            "results_search_folder",
            FieldType::String,
            "Search path as it appears in the results",
            "results_search_folder",
        ),
    ]
}

fn canopycover_step() -> StepDef {
    StepDef {
        name: "Canopy Cover".to_string(),
        description: Some("Calculate canopy cover on images".to_string()),
        algorithm: Some("RGBA Plot".to_string()),
        command: "canopycover".to_string(),
        git_repo: None,
        git_branch: None,
        fields: plot_calculation_fields(),
        results: vec![result_def(
            "Canopy cover calculation per plot",
            ResultKind::Folder,
            false,
            None,
        )],
    }
}

fn greenness_step() -> StepDef {
    StepDef {
        name: "Greenness Indices".to_string(),
        description: Some("Calculate greenness indices on images".to_string()),
        algorithm: Some("RGBA Plot".to_string()),
        command: "greenness_indices".to_string(),
        git_repo: None,
        git_branch: None,
        fields: plot_calculation_fields(),
        results: vec![result_def(
            "Greenness indices calculation per plot",
            ResultKind::Folder,
            false,
            None,
        )],
    }
}

fn merge_csv_step(result_name: &str, filename: Option<&str>) -> StepDef {
    StepDef {
        name: "Merge CSV".to_string(),
        description: None,
        algorithm: None,
        command: "merge_csv".to_string(),
        git_repo: None,
        git_branch: None,
        fields: vec![server_field(
            "top_path",
            FieldType::Folder,
            "Top level folder to search on",
            "top_path",
        )],
        results: vec![result_def(result_name, ResultKind::File, false, filename)],
    }
}

/// The four built-in workflow definitions.
pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate {
            name: "Canopy Cover".to_string(),
            description: Some("Plot level canopy cover calculation".to_string()),
            id: json!(1),
            steps: vec![
                soilmask_step(),
                plotclip_step("file:0:path"),
                find_files_step(),
                canopycover_step(),
                merge_csv_step("Canopy cover calculation file", Some("canopycover.csv")),
            ],
        },
        WorkflowTemplate {
            name: "Ratio Canopy Cover".to_string(),
            description: Some(
                "Plot level canopy cover calculation using a ratio-based soil mask".to_string(),
            ),
            id: json!(2),
            steps: vec![
                soilmask_ratio_step(),
                plotclip_step("file:0:path"),
                find_files_step(),
                canopycover_step(),
                merge_csv_step("Canopy cover calculation file", Some("canopycover.csv")),
            ],
        },
        WorkflowTemplate {
            name: "Greenness Levels".to_string(),
            description: Some("Plot level greenness level calculations".to_string()),
            id: json!(3),
            steps: vec![
                soilmask_step(),
                // The greenness definitions bind the clipped image without an
                // array index; the lookup misses at run time and plotclip
                // reports the image as a missing mandatory parameter.
                plotclip_step("file:path"),
                find_files_step(),
                greenness_step(),
                merge_csv_step("Calculated greenness indices file", None),
            ],
        },
        WorkflowTemplate {
            name: "Ratio Greenness Levels".to_string(),
            description: Some(
                "Plot level greenness levels calculation using a ratio-based soil mask".to_string(),
            ),
            id: json!(4),
            steps: vec![
                soilmask_ratio_step(),
                plotclip_step("file:path"),
                find_files_step(),
                greenness_step(),
                merge_csv_step("Calculated greenness indices file", None),
            ],
        },
    ]
}
