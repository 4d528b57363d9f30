use atlana::core::workflow::workdir::{confine, create_workflow_root, setup_step_folder};
use std::fs;
use std::path::Path;

#[test]
fn step_folder_is_created_under_the_root() {
    let run = tempfile::tempdir().unwrap();
    let root = create_workflow_root(run.path(), "0123456789abcdef0123456789abcdef").unwrap();
    let step = setup_step_folder(&root, "soilmask").unwrap();
    assert!(step.is_dir());
    assert!(step.starts_with(run.path().canonicalize().unwrap()));
    assert_eq!(step.file_name().unwrap(), "soilmask");
}

#[test]
fn reused_step_folder_is_emptied() {
    let run = tempfile::tempdir().unwrap();
    let root = create_workflow_root(run.path(), "0123456789abcdef0123456789abcdef").unwrap();
    let step = setup_step_folder(&root, "plotclip").unwrap();
    fs::write(step.join("stale.txt"), "old run").unwrap();
    fs::create_dir(step.join("plot_1")).unwrap();
    fs::write(step.join("plot_1/clip.tif"), "old").unwrap();

    let step = setup_step_folder(&root, "plotclip").unwrap();
    assert!(fs::read_dir(&step).unwrap().next().is_none());
}

#[test]
fn missing_root_is_refused() {
    let run = tempfile::tempdir().unwrap();
    let absent = run.path().join("not-created");
    assert!(setup_step_folder(&absent, "soilmask").is_err());
}

#[test]
fn traversal_commands_are_refused() {
    let run = tempfile::tempdir().unwrap();
    let root = create_workflow_root(run.path(), "0123456789abcdef0123456789abcdef").unwrap();
    assert!(setup_step_folder(&root, "../outside").is_err());
    assert!(setup_step_folder(&root, "a/b").is_err());
}

#[test]
fn confinement_normalises_before_checking() {
    let root = Path::new("/run/atlana/abc");
    assert!(confine(root, Path::new("soilmask/args.json")).is_ok());
    assert!(confine(root, Path::new("/run/atlana/abc/soilmask/../plotclip")).is_ok());
    assert!(confine(root, Path::new("../../etc")).is_err());
    assert!(confine(root, Path::new("/run/atlana/abc/../../../etc/passwd")).is_err());
    assert!(confine(root, Path::new("/run/atlana/abcdef")).is_err());
}
