use atlana::core::config::EngineConfig;
use atlana::core::crypt::Crypt;
use atlana::core::types::{ErrorCategory, FieldVisibility};
use atlana::core::workflow::catalog::builtin_templates;
use atlana::core::workflow::handlers::HandlerRegistry;
use atlana::core::workflow::resolve::{
    incorporate_previous_results, lookup_result_path, resolve_template,
};
use atlana::core::workflow::schema::ParameterBinding;
use serde_json::{json, Value};
use std::path::Path;

fn binding(command: &str, field: &str, value: Value) -> ParameterBinding {
    ParameterBinding {
        command: command.to_string(),
        field_name: field.to_string(),
        value: Some(value),
        data_type: None,
        auth: None,
    }
}

fn fixtures() -> (Crypt, HandlerRegistry) {
    let config = EngineConfig::with_working_folder("/tmp/atlana-resolve-tests");
    (Crypt::new("salt"), HandlerRegistry::standard(&config))
}

#[test]
fn canopy_template_resolves_with_full_bindings() {
    let (crypt, handlers) = fixtures();
    let template = builtin_templates().remove(0);
    let bindings = vec![
        binding("soilmask", "image", json!("/plots/ortho.tif")),
        binding("plotclip", "geometries", json!("/plots/plots.json")),
    ];
    let queue = resolve_template(
        &template,
        &bindings,
        &handlers,
        &crypt,
        "passcode",
        Path::new("/run/atlana/id"),
    )
    .unwrap();

    assert_eq!(queue.len(), 5);
    assert_eq!(queue[0].command, "soilmask");
    assert_eq!(queue[0].parameters[0].value, Some(json!("/plots/ortho.tif")));
    // The plotclip image comes from the previous step, deferred to Phase B.
    let deferred = queue[1]
        .parameters
        .iter()
        .find(|parameter| parameter.field_name == "image")
        .unwrap();
    assert_eq!(deferred.visibility, FieldVisibility::Server);
    assert_eq!(deferred.prev_command_path.as_deref(), Some("file:0:path"));
    assert_eq!(deferred.value, None);
    // Optional experimentdata was not bound and is dropped silently.
    assert!(queue[3]
        .parameters
        .iter()
        .all(|parameter| parameter.field_name != "experimentdata"));
}

#[test]
fn missing_mandatory_binding_fails_resolution() {
    let (crypt, handlers) = fixtures();
    let template = builtin_templates().remove(0);
    let bindings = vec![binding("soilmask", "image", json!("/plots/ortho.tif"))];
    let err = resolve_template(
        &template,
        &bindings,
        &handlers,
        &crypt,
        "passcode",
        Path::new("/run/atlana/id"),
    )
    .expect_err("geometries is mandatory");
    assert_eq!(err.category, ErrorCategory::ParameterError);
    assert!(err.message.contains("geometries"));
}

#[test]
fn unknown_data_type_counts_as_missing() {
    let (crypt, handlers) = fixtures();
    let template = builtin_templates().remove(0);
    let mut image = binding("soilmask", "image", json!("/plots/ortho.tif"));
    image.data_type = Some("99".to_string());
    let err = resolve_template(
        &template,
        &[image],
        &handlers,
        &crypt,
        "passcode",
        Path::new("/run/atlana/id"),
    )
    .expect_err("handler tag is unknown");
    assert_eq!(err.category, ErrorCategory::ParameterError);
}

#[test]
fn auth_blobs_are_sealed_during_resolution() {
    let (crypt, handlers) = fixtures();
    let template = builtin_templates().remove(0);
    let mut image = binding("soilmask", "image", json!("/plots/ortho.tif"));
    image.data_type = Some("2".to_string());
    image.auth = Some(json!({"user": "u", "password": "p"}));
    let bindings = vec![
        image,
        binding("plotclip", "geometries", json!("/plots/plots.json")),
    ];
    let queue = resolve_template(
        &template,
        &bindings,
        &handlers,
        &crypt,
        "passcode",
        Path::new("/run/atlana/id"),
    )
    .unwrap();
    let sealed = queue[0].parameters[0].auth.as_ref().unwrap();
    assert!(sealed.is_string(), "auth must not be stored in clear");
    assert_ne!(sealed, &json!({"user": "u", "password": "p"}));
}

#[test]
fn late_binding_resolves_path_expressions() {
    let (crypt, handlers) = fixtures();
    let template = builtin_templates().remove(0);
    let bindings = vec![
        binding("soilmask", "image", json!("/plots/ortho.tif")),
        binding("plotclip", "geometries", json!("/plots/plots.json")),
    ];
    let queue = resolve_template(
        &template,
        &bindings,
        &handlers,
        &crypt,
        "passcode",
        Path::new("/run/atlana/id"),
    )
    .unwrap();

    let previous = json!({"file": [{"path": "/tmp/a.tif"}]});
    let adjusted = incorporate_previous_results(&queue[1].parameters, Some(&previous));
    let image = adjusted
        .iter()
        .find(|parameter| parameter.field_name == "image")
        .unwrap();
    assert_eq!(image.value, Some(json!("/tmp/a.tif")));
    // Untouched parameters keep their Phase A values.
    let geometries = adjusted
        .iter()
        .find(|parameter| parameter.field_name == "geometries")
        .unwrap();
    assert_eq!(geometries.value, Some(json!("/plots/plots.json")));
}

#[test]
fn late_binding_miss_leaves_value_empty() {
    let (crypt, handlers) = fixtures();
    let template = builtin_templates().remove(0);
    let bindings = vec![
        binding("soilmask", "image", json!("/plots/ortho.tif")),
        binding("plotclip", "geometries", json!("/plots/plots.json")),
    ];
    let queue = resolve_template(
        &template,
        &bindings,
        &handlers,
        &crypt,
        "passcode",
        Path::new("/run/atlana/id"),
    )
    .unwrap();

    let adjusted = incorporate_previous_results(&queue[1].parameters, Some(&json!({})));
    let image = adjusted
        .iter()
        .find(|parameter| parameter.field_name == "image")
        .unwrap();
    assert_eq!(image.value, None);

    let adjusted = incorporate_previous_results(&queue[1].parameters, None);
    let image = adjusted
        .iter()
        .find(|parameter| parameter.field_name == "image")
        .unwrap();
    assert_eq!(image.value, None);
}

#[test]
fn path_expressions_recurse_through_nested_arrays() {
    let results = json!({
        "results": [
            {"file": [{"path": "/tmp/plot1.csv"}]},
            {"file": [{"path": "/tmp/plot2.csv"}]}
        ]
    });
    assert_eq!(
        lookup_result_path("results:1:file:0:path", &results),
        Some(json!("/tmp/plot2.csv"))
    );
    assert_eq!(lookup_result_path("results:2:file", &results), None);
}
