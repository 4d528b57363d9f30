use atlana::core::error::EngineError;
use atlana::core::types::ErrorCategory;

#[test]
fn default_codes_track_the_category() {
    let parameter = EngineError::new(ErrorCategory::ParameterError, "missing");
    assert_eq!(parameter.code, "WF-PARAM-000");
    let conflict = EngineError::new(ErrorCategory::ConflictError, "still running");
    assert!(conflict.is_conflict());
    assert_eq!(conflict.code, "WF-CONFLICT-000");
}

#[test]
fn display_carries_code_category_and_context() {
    let error = EngineError::new(ErrorCategory::ContainerError, "exit code 2")
        .with_code("WF-RUN-001")
        .with_context("soilmask");
    let rendered = error.to_string();
    assert!(rendered.contains("WF-RUN-001"));
    assert!(rendered.contains("ContainerError"));
    assert!(rendered.contains("exit code 2"));
    assert!(rendered.contains("soilmask"));
}

#[test]
fn sources_are_preserved_through_conversions() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error: EngineError = io.into();
    assert_eq!(error.category, ErrorCategory::IoError);
    assert!(std::error::Error::source(&error).is_some());

    let parse = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
    let error: EngineError = parse.into();
    assert_eq!(error.category, ErrorCategory::SerializationError);
}
