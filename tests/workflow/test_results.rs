use atlana::core::workflow::results::{
    load_step_results, load_step_results_recursive, repoint_found_files, replace_folder_path,
};
use serde_json::json;
use std::fs;

#[test]
fn flat_manifest_paths_are_rewritten_to_host_paths() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("result.json"),
        json!({
            "file": [
                {"path": "/output/ortho_mask.tif", "key": "soilmask"},
                {"path": "/elsewhere/file.tif"}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let manifest = load_step_results(dir.path()).unwrap();
    let files = manifest["file"].as_array().unwrap();
    assert_eq!(
        files[0]["path"],
        json!(dir.path().join("ortho_mask.tif").to_string_lossy())
    );
    // Paths outside the container output namespace are dropped, not invented.
    assert_eq!(files[1]["path"], json!(null));
}

#[test]
fn container_entries_are_rewritten_too() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("result.json"),
        json!({
            "container": [
                {"name": "plot_1", "file": [{"path": "/output/plot_1/clip.tif"}]},
                {"name": "plot_2", "file": [{"path": "/output/plot_2/clip.tif"}]}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let manifest = load_step_results(dir.path()).unwrap();
    let second = &manifest["container"][1]["file"][0]["path"];
    assert_eq!(
        second,
        &json!(dir.path().join("plot_2/clip.tif").to_string_lossy())
    );
}

#[test]
fn missing_manifest_is_an_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(load_step_results(dir.path()).unwrap(), json!({}));
}

#[test]
fn malformed_manifest_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("result.json"), "{not json").unwrap();
    assert!(load_step_results(dir.path()).is_err());
}

#[test]
fn recursion_collects_per_plot_manifests() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("result.json"),
        json!({"file": [{"path": "/output/summary.json"}]}).to_string(),
    )
    .unwrap();
    for plot in ["plot_1", "plot_2"] {
        let plot_dir = dir.path().join(plot);
        fs::create_dir(&plot_dir).unwrap();
        fs::write(
            plot_dir.join("result.json"),
            json!({"file": [{"path": format!("/output/{}.csv", plot)}]}).to_string(),
        )
        .unwrap();
    }
    // A directory without a manifest contributes nothing.
    fs::create_dir(dir.path().join("empty")).unwrap();

    let manifests = load_step_results_recursive(dir.path()).unwrap();
    assert_eq!(manifests.len(), 3);
}

#[test]
fn found_files_json_is_repointed_at_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("found_files.json");
    fs::write(
        &source,
        json!({
            "FILE_LIST": [
                {"FILE": "clip.tif", "DIR": "/input/plotclip/plot_1"},
                {"FILE": "clip.tif", "DIR": "/input/plotclip/plot_2"},
                {"FILE": "other.tif", "DIR": "/unrelated/plot_3"}
            ]
        })
        .to_string(),
    )
    .unwrap();
    let working = dir.path().join("work");
    fs::create_dir(&working).unwrap();

    let repointed = repoint_found_files(&source, Some("/input/plotclip"), "/output", &working)
        .expect("repointing succeeds");
    assert_eq!(repointed, working.join("found_files.json"));

    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&repointed).unwrap()).unwrap();
    let entries = document["FILE_LIST"].as_array().unwrap();
    assert_eq!(entries[0]["DIR"], json!("/output/plot_1"));
    assert_eq!(entries[1]["DIR"], json!("/output/plot_2"));
    assert_eq!(entries[2]["DIR"], json!("/unrelated/plot_3"));
}

#[test]
fn repointing_guesses_the_source_folder_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("found_files.json");
    fs::write(
        &source,
        json!({
            "FILE_LIST": [{"FILE": "clip.tif", "DIR": "/data/plots/plot_1"}]
        })
        .to_string(),
    )
    .unwrap();
    let working = dir.path().join("work");
    fs::create_dir(&working).unwrap();

    let repointed = repoint_found_files(&source, None, "/output", &working).unwrap();
    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&repointed).unwrap()).unwrap();
    assert_eq!(document["FILE_LIST"][0]["DIR"], json!("/output/plot_1"));
}

#[test]
fn repointing_fails_soft_on_bad_documents() {
    let dir = tempfile::tempdir().unwrap();
    let working = dir.path().join("work");
    fs::create_dir(&working).unwrap();

    // Missing file.
    assert!(repoint_found_files(&dir.path().join("absent.json"), None, "/output", &working).is_none());

    // No FILE_LIST key.
    let bad = dir.path().join("bad.json");
    fs::write(&bad, json!({"files": []}).to_string()).unwrap();
    assert!(repoint_found_files(&bad, None, "/output", &working).is_none());
}

#[test]
fn prefix_replacement_needs_a_component_boundary() {
    assert_eq!(
        replace_folder_path("/output/sub/file.csv", "/output", "/host/dir"),
        Some("/host/dir/sub/file.csv".to_string())
    );
    assert_eq!(replace_folder_path("/output2/file.csv", "/output", "/host"), None);
}
