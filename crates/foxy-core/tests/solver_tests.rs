//! End-to-end solve runs over an on-disk project, an in-memory host and a
//! scripted asset manager.

use std::cell::RefCell;
use std::rc::Rc;

use foxy_core::process::ProcessRunner;
use foxy_core::{
    AssetManager, AssetMap, Config, Error, HostPackage, InstallOptions, ManagerKind, RootPackage,
    SolveListener, Solver, default_config,
};
use foxy_test_utils::{MockExecutor, MockHost, TestProject};
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};

const STAGED_FOO: &str = "vendor/foxy/composer-asset/foo/bar/package.json";

fn config(values: Value) -> Config {
    let values = match values {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Config::new(values, default_config()).with_env_vars(Vec::<(String, String)>::new())
}

struct Fixture {
    project: TestProject,
    executor: Rc<MockExecutor>,
    runner: ProcessRunner,
}

impl Fixture {
    fn new() -> Self {
        let project = TestProject::new();
        let executor = Rc::new(MockExecutor::new());
        executor.respond("npm --version", 0, "10.2.4\n");
        let runner = ProcessRunner::new(executor.clone(), project.path());
        Self {
            project,
            executor,
            runner,
        }
    }

    fn solver(&self, values: Value) -> Solver {
        let config = config(values);
        let manager = AssetManager::new(ManagerKind::Npm, &config, self.runner.clone()).unwrap();
        Solver::new(config, manager).unwrap()
    }

    /// Host with `foo/bar` and `new/dep` carrying asset manifests.
    fn host(&self) -> MockHost {
        self.project
            .package_manifest("foo/bar", &json!({"name": "foo-bar", "dependencies": {"jquery": "^3.0"}}))
            .package_manifest("new/dep", &json!({"name": "new-dep", "version": "2.1.0"}));

        MockHost::new(self.project.path())
            .with_package(HostPackage::new("foo/bar", "1.2.x-dev").with_extra("foxy", json!(true)))
            .with_package(HostPackage::new("new/dep", "2.1.0").with_require("foxy/foxy", "^1.0"))
            .with_package(HostPackage::new("plain/lib", "1.0.0"))
    }
}

#[test]
fn merge_scenario_keeps_adds_and_removes() {
    let fx = Fixture::new();
    fx.project.asset_manifest(&json!({
        "name": "app",
        "dependencies": {
            "@composer-asset/foo--bar": "file:./path/foo/bar",
            "@composer-asset/baz--bar": "file:./path/baz/bar"
        }
    }));
    let mut host = fx.host();

    let code = fx
        .solver(json!({}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap();

    assert_eq!(code, 0);
    assert_eq!(
        fx.project.read_json("package.json"),
        json!({
            "name": "app",
            "dependencies": {
                "@composer-asset/foo--bar": "file:./path/foo/bar",
                "@composer-asset/new--dep": "file:./vendor/foxy/composer-asset/new/dep"
            }
        })
    );
    assert_eq!(
        fx.project.read_json(STAGED_FOO),
        json!({
            "name": "@composer-asset/foo--bar",
            "dependencies": {"jquery": "^3.0"},
            "version": "1.2.0"
        })
    );
    fx.project
        .assert_file_not_exists("vendor/foxy/composer-asset/plain/lib");
    assert_eq!(fx.executor.commands(), vec!["npm --version", "npm install"]);
}

#[test]
fn skipped_run_returns_zero_without_installing() {
    let fx = Fixture::new();
    let mut host = fx.host();

    let code = fx
        .solver(json!({"run-asset-manager": false}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap();

    assert_eq!(code, 0);
    assert!(!fx.executor.ran("npm install"));
    fx.project.assert_file_contains("package.json", "@composer-asset/new--dep");
}

#[test]
fn disabled_solver_does_nothing() {
    let fx = Fixture::new();
    let mut host = fx.host();

    let code = fx
        .solver(json!({"enabled": false}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap();

    assert_eq!(code, 0);
    assert!(fx.executor.commands().is_empty());
    fx.project.assert_file_not_exists("package.json");
    fx.project.assert_file_not_exists("vendor/foxy");
}

#[test]
fn failed_install_removes_manifest_that_was_absent() {
    let fx = Fixture::new();
    fx.executor.respond("npm install", 1, "");
    let mut host = fx.host();

    let err = fx
        .solver(json!({}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap_err();

    assert!(matches!(
        err,
        Error::InstallFailure {
            ref manager,
            exit_code: 1
        } if manager == "npm"
    ));
    fx.project.assert_file_not_exists("package.json");
    // no lock was captured, so the vendor directory goes too
    fx.project.assert_file_not_exists("vendor");
}

#[test]
fn failed_install_restores_manifest_bytes_and_lock() {
    let fx = Fixture::new();
    let original = "{\n  \"name\": \"app\",\n  \"private\": true\n}\n";
    fx.project.write_file("package.json", original);
    fx.executor.respond("npm install", 2, "");
    let lock = MockHost::locked_with(&["foo/bar", "new/dep"]);
    let mut host = fx.host().with_lock(lock.clone());

    let options = InstallOptions {
        no_dev: true,
        ..Default::default()
    };
    let err = fx.solver(json!({})).solve(&mut host, &options).unwrap_err();

    assert!(matches!(err, Error::InstallFailure { exit_code: 2, .. }));
    assert_eq!(fx.project.read_file("package.json"), original);
    assert_eq!(host.lock(), Some(&lock));
    assert_eq!(host.installs().len(), 1);
    assert!(!host.installs()[0].dev_mode);
    assert!(fx.executor.ran("npm install --prod"));
}

#[test]
fn composer_fallback_can_be_disabled() {
    let fx = Fixture::new();
    fx.executor.respond("npm install", 1, "");
    let mut host = fx.host().with_lock(MockHost::locked_with(&["foo/bar"]));

    let result = fx
        .solver(json!({"fallback-composer": false, "fallback-asset": false}))
        .solve(&mut host, &InstallOptions::default());

    assert!(result.is_err());
    assert!(host.installs().is_empty());
    fx.project.assert_file_exists("package.json");
    fx.project.assert_file_exists(STAGED_FOO);
}

#[test]
fn rollback_errors_are_not_masked() {
    let fx = Fixture::new();
    fx.executor.respond("npm install", 1, "");
    let mut host = fx
        .host()
        .with_lock(MockHost::locked_with(&["foo/bar"]))
        .failing_install("composer install failed");

    let err = fx
        .solver(json!({}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap_err();

    assert_eq!(err.to_string(), "Host error: composer install failed");
}

#[test]
fn spawn_failure_restores_then_propagates() {
    let fx = Fixture::new();
    fx.executor.fail_to_spawn("npm install", "npm: not found");
    let mut host = fx.host();

    let err = fx
        .solver(json!({}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    fx.project.assert_file_not_exists("package.json");
}

#[test]
fn version_mismatch_aborts_before_mutation() {
    let fx = Fixture::new();
    fx.executor.respond_once("npm --version", 0, "4.9.0\n");
    let mut host = fx.host();

    let err = fx
        .solver(json!({}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::VersionMismatch { .. }));
    fx.project.assert_file_not_exists("package.json");
    fx.project.assert_file_not_exists("vendor/foxy");
}

#[test]
fn stale_staging_directory_is_wiped() {
    let fx = Fixture::new();
    fx.project
        .write_file("vendor/foxy/composer-asset/old/pkg/package.json", "{}\n");
    let mut host = fx.host();

    fx.solver(json!({}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap();

    fx.project
        .assert_file_not_exists("vendor/foxy/composer-asset/old");
    fx.project.assert_file_exists(STAGED_FOO);
}

#[test]
fn custom_asset_dir_is_relative_to_root() {
    let fx = Fixture::new();
    let mut host = fx.host();

    fx.solver(json!({"composer-asset-dir": "build/assets"}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap();

    fx.project
        .assert_file_exists("build/assets/new/dep/package.json");
    assert_eq!(
        fx.project.read_json("package.json")["dependencies"]["@composer-asset/new--dep"],
        json!("file:./build/assets/new/dep")
    );
}

#[test]
fn activation_table_overrides_package_flags() {
    let fx = Fixture::new();
    let mut host = fx.host();

    fx.solver(json!({"enable-packages": {"foo/*": false, "plain/lib": true}}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap();

    let deps = fx.project.read_json("package.json")["dependencies"].clone();
    assert_eq!(
        deps,
        json!({"@composer-asset/new--dep": "file:./vendor/foxy/composer-asset/new/dep"})
    );
}

#[test]
fn root_license_is_written_to_new_manifest() {
    let fx = Fixture::new();
    let mut host = fx
        .host()
        .with_root_package(RootPackage::new("acme/app").with_license("proprietary"));

    fx.solver(json!({"run-asset-manager": false}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap();

    assert_eq!(fx.project.read_json("package.json")["private"], json!(true));
}

#[test]
fn npm_refreshes_already_installed_assets() {
    let fx = Fixture::new();
    fx.project
        .asset_manifest(&json!({
            "dependencies": {"@composer-asset/foo--bar": "file:./vendor/foxy/composer-asset/foo/bar"}
        }))
        .write_file("node_modules/@composer-asset/foo--bar/package.json", "{}");
    let mut host = fx.host();

    fx.solver(json!({}))
        .solve(&mut host, &InstallOptions::default())
        .unwrap();

    fx.project
        .assert_file_not_exists("node_modules/@composer-asset/foo--bar");
}

#[derive(Default)]
struct Recorded {
    events: Vec<String>,
}

struct RecordingListener(Rc<RefCell<Recorded>>);

impl SolveListener for RecordingListener {
    fn pre_solve(&mut self, packages: &[HostPackage]) -> foxy_core::Result<()> {
        self.0
            .borrow_mut()
            .events
            .push(format!("pre_solve:{}", packages.len()));
        Ok(())
    }

    fn get_assets(&mut self, _packages: &[HostPackage], assets: &mut AssetMap) -> foxy_core::Result<()> {
        assets.insert(
            "@composer-asset/extra--pkg".to_string(),
            "assets/extra/package.json".to_string(),
        );
        self.0.borrow_mut().events.push("get_assets".to_string());
        Ok(())
    }

    fn post_solve(&mut self, _packages: &[HostPackage], exit_code: i32) -> foxy_core::Result<()> {
        self.0
            .borrow_mut()
            .events
            .push(format!("post_solve:{exit_code}"));
        Ok(())
    }
}

#[test]
fn listeners_observe_the_run() {
    let fx = Fixture::new();
    let mut host = fx.host();
    let recorded = Rc::new(RefCell::new(Recorded::default()));

    let mut solver = fx.solver(json!({}));
    solver.add_listener(Box::new(RecordingListener(recorded.clone())));
    solver.solve(&mut host, &InstallOptions::default()).unwrap();

    assert_eq!(
        recorded.borrow().events,
        vec!["pre_solve:3", "get_assets", "post_solve:0"]
    );
    assert_eq!(
        fx.project.read_json("package.json")["dependencies"]["@composer-asset/extra--pkg"],
        json!("file:./assets/extra")
    );
}

#[test]
fn post_solve_is_skipped_on_failure() {
    let fx = Fixture::new();
    fx.executor.respond("npm install", 1, "");
    let mut host = fx.host();
    let recorded = Rc::new(RefCell::new(Recorded::default()));

    let mut solver = fx.solver(json!({}));
    solver.add_listener(Box::new(RecordingListener(recorded.clone())));
    assert!(solver.solve(&mut host, &InstallOptions::default()).is_err());

    assert_eq!(recorded.borrow().events, vec!["pre_solve:3", "get_assets"]);
}
