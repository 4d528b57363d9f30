use atlana::core::config::{
    parse_more_folders, EngineConfig, ENV_CONTAINER_ENGINE, ENV_MORE_FOLDERS, ENV_SALT_VALUE,
    ENV_USE_SCIF_WORKFLOW, ENV_WORKING_FOLDER,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn clear_engine_env() {
    for key in [
        ENV_WORKING_FOLDER,
        ENV_MORE_FOLDERS,
        ENV_SALT_VALUE,
        ENV_USE_SCIF_WORKFLOW,
        ENV_CONTAINER_ENGINE,
    ] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn defaults_apply_without_environment() {
    clear_engine_env();
    let config = EngineConfig::from_env();
    assert!(config.working_folder.ends_with("atlana"));
    assert_eq!(config.container_engine, "docker");
    assert!(!config.use_scif_runner);
    assert!(config.more_folders.is_empty());
}

#[test]
#[serial]
fn environment_overrides_are_read() {
    clear_engine_env();
    env::set_var(ENV_WORKING_FOLDER, "/srv/runs");
    env::set_var(ENV_SALT_VALUE, "configured-salt");
    env::set_var(ENV_CONTAINER_ENGINE, "podman");
    env::set_var(ENV_USE_SCIF_WORKFLOW, "1");
    env::set_var(ENV_MORE_FOLDERS, "scans:/data/scans;plots:/data/plots");

    let config = EngineConfig::from_env();
    assert_eq!(config.working_folder, PathBuf::from("/srv/runs"));
    assert_eq!(config.salt_value, "configured-salt");
    assert_eq!(config.container_engine, "podman");
    assert!(config.use_scif_runner);
    assert_eq!(config.more_folders.len(), 2);
    assert_eq!(config.browse_root("plots"), Some(PathBuf::from("/data/plots").as_path()));
    assert_eq!(config.browse_root("missing"), None);

    clear_engine_env();
}

#[test]
fn more_folders_parsing_tolerates_noise() {
    let roots = parse_more_folders(" first:/a ;; :bad ; second:/b/c ");
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].name, "first");
    assert_eq!(roots[1].path, PathBuf::from("/b/c"));
}

#[test]
fn workflow_root_joins_run_area_and_id() {
    let config = EngineConfig::with_working_folder("/tmp/atlana-test");
    let root = config.workflow_root("00000000000000000000000000000001");
    assert_eq!(
        root,
        PathBuf::from("/tmp/atlana-test/00000000000000000000000000000001")
    );
}
