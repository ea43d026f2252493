//! Configuration layering across Composer home, project and environment.

use std::rc::Rc;

use foxy_core::{Action, AssetManager, Config, ConfigResolver, Error, ManagerKind, ProcessRunner};
use foxy_test_utils::{MockExecutor, TestProject};
use pretty_assertions::assert_eq;
use serde_json::json;

fn resolve(project: &TestProject, env: &[(&str, &str)]) -> foxy_core::Result<Config> {
    Ok(ConfigResolver::with_composer_home(
        project.path(),
        project.root().join("composer-home"),
    )
    .resolve()?
    .with_env_vars(env.iter().copied()))
}

#[test]
fn layers_override_key_by_key() {
    let project = TestProject::new();
    project
        .write_json(
            "composer-home/composer.json",
            &json!({"config": {"foxy": {
                "manager": "yarn",
                "manager-timeout": 10,
                "composer-asset-dir": "global-assets"
            }}}),
        )
        .write_json(
            "composer-home/config.json",
            &json!({"config": {"foxy": {"manager-timeout": 20, "fallback-asset": false}}}),
        )
        .composer_json(&json!({
            "name": "acme/app",
            "config": {"foxy": {"manager-timeout": 30}}
        }));

    let config = resolve(&project, &[]).unwrap();

    assert_eq!(config.get_string("manager").unwrap().as_deref(), Some("yarn"));
    assert_eq!(config.get_u64("manager-timeout").unwrap(), Some(30));
    assert_eq!(
        config.get_string("composer-asset-dir").unwrap().as_deref(),
        Some("global-assets")
    );
    assert!(!config.get_bool("fallback-asset").unwrap());
    assert!(config.get_bool("fallback-composer").unwrap());
}

#[test]
fn environment_wins_over_files() {
    let project = TestProject::new();
    project.composer_json(&json!({
        "config": {"foxy": {"enabled": true, "manager-timeout": 30}}
    }));

    let config = resolve(
        &project,
        &[
            ("FOXY__ENABLED", "No"),
            ("FOXY__MANAGER_TIMEOUT", "'45'"),
            ("FOXY__ENABLE_PACKAGES", r#"{"acme/*": true}"#),
        ],
    )
    .unwrap();

    assert!(!config.get_bool("enabled").unwrap());
    assert_eq!(config.get_u64("manager-timeout").unwrap(), Some(45));
    assert_eq!(
        config.get("enable-packages").unwrap(),
        Some(json!({"acme/*": true}))
    );
}

#[test]
fn invalid_json_in_project_file_is_an_error() {
    let project = TestProject::new();
    project.write_file("composer.json", "{\"config\": ");

    assert!(resolve(&project, &[]).is_err());
}

#[test]
fn invalid_json_environment_value_names_the_variable() {
    let project = TestProject::new();
    let config = resolve(&project, &[("FOXY__MANAGER_OPTIONS", "[oops")]).unwrap();

    let err = config.get("manager-options").unwrap_err();
    assert!(matches!(err, Error::Configuration { ref key, .. } if key == "FOXY__MANAGER_OPTIONS"));
}

#[test]
fn per_manager_maps_resolve_for_the_selected_manager() {
    let project = TestProject::new();
    project.composer_json(&json!({
        "config": {"foxy": {
            "manager-version": {"npm": ">=9.0.0"},
            "manager-install-options": {"npm": "--no-audit", "yarn": "--frozen-lockfile"}
        }}
    }));
    let config = resolve(&project, &[]).unwrap();

    let npm = config.for_manager("npm");
    assert_eq!(npm.get_string("manager-version").unwrap().as_deref(), Some(">=9.0.0"));
    assert_eq!(
        npm.get_string("manager-install-options").unwrap().as_deref(),
        Some("--no-audit")
    );

    // Missing entries fall back to the built-in map.
    let pnpm = config.for_manager("pnpm");
    assert_eq!(pnpm.get_string("manager-version").unwrap().as_deref(), Some(">=7.0.0"));
    assert_eq!(pnpm.get_string("manager-install-options").unwrap(), None);

    // Without a manager, maps have no value.
    assert_eq!(config.get("manager-version").unwrap(), None);
}

#[cfg(unix)]
#[test]
fn manager_commands_use_resolved_options() {
    let project = TestProject::new();
    project.composer_json(&json!({
        "config": {"foxy": {
            "manager-bin": {"npm": "/opt/node/bin/npm"},
            "manager-options": "--loglevel=error",
            "manager-install-options": {"npm": " --no-audit "}
        }}
    }));
    let config = resolve(&project, &[]).unwrap();
    let executor = Rc::new(MockExecutor::new());
    let runner = ProcessRunner::new(executor, project.path());

    let mut manager = AssetManager::new(ManagerKind::Npm, &config, runner).unwrap();
    manager.set_dev_mode(false);

    assert_eq!(
        manager.command(Action::Install).unwrap().command_line(),
        "/opt/node/bin/npm install --loglevel=error --no-audit --prod"
    );
    assert_eq!(
        manager.command(Action::Update).unwrap().command_line(),
        "/opt/node/bin/npm update --loglevel=error"
    );
}

#[test]
fn defaults_apply_without_any_file() {
    let project = TestProject::new();
    let config = resolve(&project, &[]).unwrap();

    assert!(config.get_bool("enabled").unwrap());
    assert!(config.get_bool("run-asset-manager").unwrap());
    assert_eq!(config.get("manager").unwrap(), None);
    assert_eq!(config.get("enable-packages").unwrap(), Some(json!({})));
    assert_eq!(config.get_u64("manager-timeout").unwrap(), None);
}
