//! Layered configuration: workspace files, environment overrides and clamps.

use std::fs;

use notebook_refresh::config::ConfigLoader;
use tempfile::TempDir;

use crate::integration::test_utils::with_env;

const ISOLATED: [(&str, Option<&str>); 5] = [
    ("NOTEBOOK_REFRESH_ENV", None),
    ("AUTO_REFRESH_BATCH_SIZE", None),
    ("AUTO_REFRESH_LOOP_SECONDS", None),
    ("LLM_ENRICHMENT_ENABLED", None),
    ("GENERATION_JOB_STALE_MINUTES", None),
];

fn workspace_with(config_toml: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("config")).unwrap();
    fs::write(dir.path().join("config").join("config.toml"), config_toml).unwrap();
    dir
}

fn isolated_env<'a>(xdg: &'a str, extra: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, Option<&'a str>)> {
    let mut vars = vec![("XDG_CONFIG_HOME", Some(xdg))];
    vars.extend(ISOLATED);
    vars.extend_from_slice(extra);
    vars
}

#[test]
fn workspace_file_overrides_defaults() {
    let workspace = workspace_with(
        r#"
[auto_refresh]
batch_size = 7
min_interval_hours = 6

[enrichment]
max_attempts = 4
"#,
    );
    let xdg = TempDir::new().unwrap();
    let xdg_path = xdg.path().to_string_lossy().to_string();

    let config = with_env(&isolated_env(&xdg_path, &[]), || {
        ConfigLoader::load(workspace.path()).unwrap()
    });

    assert_eq!(config.auto_refresh.batch_size, 7);
    assert_eq!(config.auto_refresh.min_interval_hours, 6);
    assert_eq!(config.enrichment.max_attempts, 4);
    assert!(config.enrichment.enabled);
}

#[test]
fn environment_wins_over_files() {
    let workspace = workspace_with("[auto_refresh]\nbatch_size = 7\n");
    let xdg = TempDir::new().unwrap();
    let xdg_path = xdg.path().to_string_lossy().to_string();

    let config = with_env(
        &isolated_env(
            &xdg_path,
            &[
                ("AUTO_REFRESH_BATCH_SIZE", Some("2")),
                ("LLM_ENRICHMENT_ENABLED", Some("false")),
            ],
        ),
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(config.auto_refresh.batch_size, 2);
    assert!(!config.enrichment.enabled);
}

#[test]
fn out_of_range_values_are_clamped() {
    let workspace = workspace_with("[auto_refresh]\nloop_seconds = 5\n");
    let xdg = TempDir::new().unwrap();
    let xdg_path = xdg.path().to_string_lossy().to_string();

    let config = with_env(
        &isolated_env(&xdg_path, &[("GENERATION_JOB_STALE_MINUTES", Some("1"))]),
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(config.auto_refresh.loop_seconds, 30);
    assert_eq!(config.recovery.generation_job_stale_minutes, 10);
}

#[test]
fn environment_specific_file_layers_on_top() {
    let workspace = workspace_with("[auto_refresh]\nbatch_size = 7\nmin_interval_hours = 6\n");
    fs::write(
        workspace.path().join("config").join("staging.toml"),
        "[auto_refresh]\nbatch_size = 9\n",
    )
    .unwrap();
    let xdg = TempDir::new().unwrap();
    let xdg_path = xdg.path().to_string_lossy().to_string();

    let config = with_env(
        &isolated_env(&xdg_path, &[("NOTEBOOK_REFRESH_ENV", Some("staging"))]),
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(config.auto_refresh.batch_size, 9);
    assert_eq!(config.auto_refresh.min_interval_hours, 6);
}

#[test]
fn global_file_sits_below_workspace() {
    let workspace = workspace_with("[auto_refresh]\nbatch_size = 7\n");
    let xdg = TempDir::new().unwrap();
    fs::create_dir_all(xdg.path().join("notebook-refresh")).unwrap();
    fs::write(
        xdg.path().join("notebook-refresh").join("config.toml"),
        "[auto_refresh]\nbatch_size = 4\nmin_interval_hours = 12\n",
    )
    .unwrap();
    let xdg_path = xdg.path().to_string_lossy().to_string();

    let config = with_env(&isolated_env(&xdg_path, &[]), || {
        ConfigLoader::load(workspace.path()).unwrap()
    });

    assert_eq!(config.auto_refresh.batch_size, 7);
    assert_eq!(config.auto_refresh.min_interval_hours, 12);
}
