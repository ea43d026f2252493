//! [`TestProject`] builder for Composer project scenarios.

use std::fs;
use std::path::Path;

use foxy_fs::NormalizedPath;
use serde_json::Value;
use tempfile::TempDir;

/// A temporary Composer project with helpers for setup and assertion.
///
/// # Example
///
/// ```rust,no_run
/// use foxy_test_utils::TestProject;
/// use serde_json::json;
///
/// let project = TestProject::new();
/// project
///     .composer_json(&json!({"name": "acme/app"}))
///     .installed(&[json!({"name": "foo/bar", "version": "1.0.0"})])
///     .package_manifest("foo/bar", &json!({"name": "bar"}));
/// project.assert_file_exists("vendor/foo/bar/package.json");
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self) -> NormalizedPath {
        NormalizedPath::new(self.root())
    }

    /// Write `content` to `path` (relative to the root), creating parents.
    pub fn write_file(&self, path: &str, content: &str) -> &Self {
        let full_path = self.root().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
        self
    }

    /// Write `value` as 4-space indented JSON.
    pub fn write_json(&self, path: &str, value: &Value) -> &Self {
        let mut content = serde_json::to_string_pretty(value).unwrap();
        content.push('\n');
        self.write_file(path, &content)
    }

    pub fn composer_json(&self, value: &Value) -> &Self {
        self.write_json("composer.json", value)
    }

    pub fn composer_lock(&self, value: &Value) -> &Self {
        self.write_json("composer.lock", value)
    }

    /// Write `vendor/composer/installed.json` in the Composer 2 layout.
    pub fn installed(&self, packages: &[Value]) -> &Self {
        self.write_json(
            "vendor/composer/installed.json",
            &serde_json::json!({ "packages": packages, "dev": true }),
        )
    }

    /// Write `vendor/<name>/package.json`.
    pub fn package_manifest(&self, name: &str, value: &Value) -> &Self {
        self.write_json(&format!("vendor/{name}/package.json"), value)
    }

    /// Write the project `package.json`.
    pub fn asset_manifest(&self, value: &Value) -> &Self {
        self.write_json("package.json", value)
    }

    pub fn mkdir(&self, path: &str) -> &Self {
        fs::create_dir_all(self.root().join(path)).unwrap();
        self
    }

    pub fn read_file(&self, path: &str) -> String {
        let full_path = self.root().join(path);
        fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()))
    }

    pub fn read_json(&self, path: &str) -> Value {
        serde_json::from_str(&self.read_file(path)).unwrap()
    }

    /// Assert that `path` (relative to the root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the root) does **not** exist.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `path` contains `content`.
    pub fn assert_file_contains(&self, path: &str, content: &str) {
        let file_content = self.read_file(path);
        assert!(
            file_content.contains(content),
            "File {path} does not contain expected content.\nExpected: {content}\nActual: {file_content}"
        );
    }
}
