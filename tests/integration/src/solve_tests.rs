//! Full solve runs against an on-disk Composer project.
//!
//! The host is the real [`ComposerProject`] adapter; only process execution
//! is scripted, for both the asset manager and `composer install`.

use std::rc::Rc;

use foxy_core::process::DEFAULT_TIMEOUT;
use foxy_core::{
    ComposerProject, Config, ConfigResolver, Error, Host, InstallOptions, ManagerFinder,
    ManagerKind, ProcessExecutor, ProcessRunner, Solver,
};
use foxy_test_utils::{MockExecutor, TestProject};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Scenario {
    project: TestProject,
    executor: Rc<MockExecutor>,
}

impl Scenario {
    /// A project with one foxy-enabled package and one plain package.
    fn new(foxy_config: serde_json::Value) -> Self {
        let project = TestProject::new();
        project
            .composer_json(&json!({
                "name": "acme/app",
                "license": ["MIT"],
                "require": {"foo/bar": "^1.0", "plain/lib": "^2.0"},
                "config": {"foxy": foxy_config}
            }))
            .installed(&[
                json!({
                    "name": "foo/bar",
                    "version": "1.0.3",
                    "require": {"foxy/foxy": "^1.0"},
                    "install-path": "../foo/bar"
                }),
                json!({"name": "foxy/foxy", "version": "1.2.0", "require": {}, "extra": []}),
                json!({"name": "plain/lib", "version": "2.0.0"}),
            ])
            .package_manifest(
                "foo/bar",
                &json!({"name": "foo-bar", "dependencies": {"lodash": "^4.17.0"}}),
            )
            .package_manifest("plain/lib", &json!({"name": "plain"}));

        Self {
            project,
            executor: Rc::new(MockExecutor::new()),
        }
    }

    fn config(&self) -> Config {
        ConfigResolver::with_composer_home(
            self.project.path(),
            self.project.root().join("composer-home"),
        )
        .resolve()
        .unwrap()
        .with_env_vars(Vec::<(String, String)>::new())
    }

    fn host(&self) -> ComposerProject {
        ComposerProject::with_executor(self.project.path(), self.executor.clone())
    }

    fn solve(&self, update: bool, options: &InstallOptions) -> foxy_core::Result<i32> {
        let config = self.config();
        let runner = ProcessRunner::new(self.executor.clone(), self.project.path());
        let mut manager = ManagerFinder::select(&config, &runner)?;
        manager.set_updatable(update);
        Solver::new(config, manager)?.solve(&mut self.host(), options)
    }
}

#[test]
fn install_writes_manifest_for_plugin_dependents() {
    let scenario = Scenario::new(json!({}));
    scenario.executor.respond("yarn --version", 0, "1.22.19\n");

    let code = scenario.solve(false, &InstallOptions::default()).unwrap();

    assert_eq!(code, 0);
    assert_eq!(
        scenario.project.read_file("package.json"),
        concat!(
            "{\n",
            "    \"license\": \"MIT\",\n",
            "    \"dependencies\": {\n",
            "        \"@composer-asset/foo--bar\": \"file:./vendor/foxy/composer-asset/foo/bar\"\n",
            "    }\n",
            "}\n",
        )
    );
    assert_eq!(
        scenario
            .project
            .read_json("vendor/foxy/composer-asset/foo/bar/package.json"),
        json!({
            "name": "@composer-asset/foo--bar",
            "dependencies": {"lodash": "^4.17.0"},
            "version": "1.0.3"
        })
    );
    assert_eq!(
        scenario.executor.commands(),
        vec!["yarn --version", "yarn install --non-interactive"]
    );
}

#[test]
fn existing_manifest_keeps_its_formatting() {
    let scenario = Scenario::new(json!({"manager": "npm"}));
    scenario.project.write_file(
        "package.json",
        "{\n  \"name\": \"app\",\n  \"files\": [],\n  \"devDependencies\": {\"webpack\": \"^5.0.0\", \"babel-loader\": \"^9.0.0\"}\n}\n",
    );
    scenario.executor.respond("npm --version", 0, "10.2.4\n");

    scenario
        .solve(false, &InstallOptions::default())
        .unwrap();

    assert_eq!(
        scenario.project.read_file("package.json"),
        concat!(
            "{\n",
            "  \"name\": \"app\",\n",
            "  \"files\": [],\n",
            "  \"devDependencies\": {\n",
            "    \"babel-loader\": \"^9.0.0\",\n",
            "    \"webpack\": \"^5.0.0\"\n",
            "  },\n",
            "  \"license\": \"MIT\",\n",
            "  \"dependencies\": {\n",
            "    \"@composer-asset/foo--bar\": \"file:./vendor/foxy/composer-asset/foo/bar\"\n",
            "  }\n",
            "}\n",
        )
    );
}

#[test]
fn lock_file_selects_manager_and_update_runs_upgrade() {
    let scenario = Scenario::new(json!({}));
    scenario
        .project
        .asset_manifest(&json!({"name": "app"}))
        .write_file("pnpm-lock.yaml", "lockfileVersion: '6.0'\n")
        .mkdir("node_modules");
    scenario.executor.respond("pnpm --version", 0, "8.15.1\n");

    scenario.solve(true, &InstallOptions::default()).unwrap();

    assert!(scenario.executor.ran("pnpm update"));
    assert!(!scenario.executor.ran("yarn"));
}

#[test]
fn failed_install_reinstalls_composer_lock() {
    let scenario = Scenario::new(json!({"manager": "npm"}));
    let lock = json!({
        "content-hash": "abc",
        "packages": [{"name": "foo/bar", "version": "1.0.3"}]
    });
    scenario.project.composer_lock(&lock);
    scenario.executor.respond("npm --version", 0, "10.2.4\n");
    scenario.executor.respond("npm install", 1, "");

    let options = InstallOptions {
        no_dev: true,
        optimize_autoloader: true,
        ..Default::default()
    };
    let err = scenario.solve(false, &options).unwrap_err();

    assert!(matches!(err, Error::InstallFailure { exit_code: 1, .. }));
    scenario.project.assert_file_not_exists("package.json");
    assert_eq!(scenario.project.read_json("composer.lock"), lock);
    assert_eq!(
        scenario.executor.commands().last().unwrap(),
        "composer install --no-interaction --no-dev --optimize-autoloader --no-scripts"
    );
}

#[test]
fn failed_install_restores_composer_lock_bytes() {
    let scenario = Scenario::new(json!({"manager": "npm", "manager-timeout": 60}));
    let lock = concat!(
        "{\n",
        "  \"content-hash\": \"abc\",\n",
        "  \"packages\": [{\"name\": \"foo/bar\", \"version\": \"1.0.3\"}],\n",
        "  \"aliases\": [],\n",
        "  \"stability-flags\": []\n",
        "}"
    );
    scenario.project.write_file("composer.lock", lock);
    scenario.executor.respond("npm --version", 0, "10.2.4\n");
    scenario.executor.respond("npm install", 1, "");

    assert!(scenario.solve(false, &InstallOptions::default()).is_err());

    assert_eq!(scenario.project.read_file("composer.lock"), lock);
}

#[test]
fn composer_reinstall_runs_without_timeout() {
    let scenario = Scenario::new(json!({"manager": "npm", "manager-timeout": 60}));
    scenario
        .project
        .composer_lock(&json!({"packages": [{"name": "foo/bar", "version": "1.0.3"}]}));
    scenario.executor.respond("npm --version", 0, "10.2.4\n");
    scenario.executor.respond("npm install", 1, "");

    assert!(scenario.solve(false, &InstallOptions::default()).is_err());

    let calls = scenario.executor.calls();
    let install = calls
        .iter()
        .find(|call| call.command.starts_with("npm install"))
        .unwrap();
    assert_eq!(install.timeout, Some(std::time::Duration::from_secs(60)));
    let reinstall = calls
        .iter()
        .find(|call| call.command.starts_with("composer install"))
        .unwrap();
    assert_eq!(reinstall.timeout, None);
    assert_eq!(scenario.executor.timeout(), Some(DEFAULT_TIMEOUT));
}

#[test]
fn failed_composer_reinstall_surfaces_host_error() {
    let scenario = Scenario::new(json!({"manager": "npm"}));
    scenario
        .project
        .composer_lock(&json!({"packages": [{"name": "foo/bar", "version": "1.0.3"}]}));
    scenario.executor.respond("npm --version", 0, "10.2.4\n");
    scenario.executor.respond("npm install", 1, "");
    scenario.executor.respond("composer install", 2, "");

    let err = scenario
        .solve(false, &InstallOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::Host { .. }));
}

#[test]
fn failed_install_without_lock_removes_vendor() {
    let scenario = Scenario::new(json!({"manager": "npm"}));
    scenario.executor.respond("npm --version", 0, "10.2.4\n");
    scenario.executor.respond("npm install", 1, "");

    assert!(scenario.solve(false, &InstallOptions::default()).is_err());

    scenario.project.assert_file_not_exists("vendor");
    assert!(!scenario.executor.ran("composer"));
}

#[test]
fn explicit_activation_includes_plain_packages() {
    let scenario = Scenario::new(json!({
        "manager": "npm",
        "enable-packages": {"plain/*": true},
        "run-asset-manager": false
    }));
    scenario.executor.respond("npm --version", 0, "10.2.4\n");

    scenario.solve(false, &InstallOptions::default()).unwrap();

    let manifest = scenario.project.read_json("package.json");
    assert_eq!(
        manifest["dependencies"]["@composer-asset/plain--lib"],
        json!("file:./vendor/foxy/composer-asset/plain/lib")
    );
    assert!(!scenario.executor.ran("npm install"));
}

#[test]
fn host_adapter_reads_installed_packages() {
    let scenario = Scenario::new(json!({}));
    let host = scenario.host();

    let names: Vec<String> = host.packages().unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["foo/bar", "foxy/foxy", "plain/lib"]);

    let foo = &host.packages().unwrap()[0];
    assert_eq!(
        host.install_path(foo),
        scenario.project.path().join("vendor/foo/bar")
    );
    assert_eq!(
        host.root_package().unwrap().licenses,
        vec!["MIT".to_string()]
    );
    assert_eq!(ManagerKind::from_name("yarn"), Some(ManagerKind::Yarn));
}
