//! Discovery and staging of package asset manifests
//!
//! A resolved package takes part in the asset install when the project's
//! `enable-packages` table activates it, when it sets `extra.foxy` to `true`,
//! or when it depends on `foxy/foxy` directly or through other resolved
//! packages. Its `package.json` is then copied into the staging directory
//! under a name in the owned `@composer-asset/` namespace.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use foxy_fs::{JsonFile, NormalizedPath, io};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::host::{Host, HostPackage};

/// Namespace of the manifest entries managed by foxy.
pub const ASSET_PREFIX: &str = "@composer-asset/";

/// Name of the package whose requirement marks a package as asset-bearing.
pub const PLUGIN_NAME: &str = "foxy/foxy";

/// Asset manifest file name.
pub const MANIFEST_NAME: &str = "package.json";

/// Collected assets: manifest dependency name to the staged manifest path,
/// relative to the project root.
pub type AssetMap = BTreeMap<String, String>;

/// Manifest dependency name of a host package: `foo/bar` becomes
/// `@composer-asset/foo--bar`.
pub fn asset_name(package_name: &str) -> String {
    format!("{ASSET_PREFIX}{}", package_name.replace('/', "--"))
}

/// One package's contribution to the asset manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDependencyEntry {
    /// Name in the owned namespace
    pub name: String,
    /// Staged manifest, relative to the project root
    pub source_path: NormalizedPath,
    /// `version` of the staged manifest
    pub declared_version: String,
}

#[derive(Debug, Clone)]
enum Pattern {
    /// `/regex/flags`
    Regex(Regex),
    /// Exact name or shell glob
    Glob(Regex),
}

#[derive(Debug, Clone)]
struct Rule {
    raw: String,
    pattern: Pattern,
    enabled: bool,
}

impl Rule {
    fn matches(&self, name: &str) -> bool {
        if self.raw == name {
            return true;
        }
        match &self.pattern {
            Pattern::Regex(re) | Pattern::Glob(re) => re.is_match(name),
        }
    }
}

/// Ordered `enable-packages` table; the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct ActivationRules {
    rules: Vec<Rule>,
}

impl ActivationRules {
    /// Build rules from the `enable-packages` config value.
    ///
    /// Objects map patterns to booleans. A list entry, or an entry whose key
    /// is a number, uses its value as the pattern and activates it.
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        let mut rules = Self::default();
        match value {
            Some(Value::Object(map)) => {
                for (key, value) in map {
                    match value {
                        Value::String(pattern) if key.parse::<u64>().is_ok() => {
                            rules.push(pattern, true)?
                        }
                        other => rules.push(key, truthy(other))?,
                    }
                }
            }
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(pattern) = item {
                        rules.push(pattern, true)?;
                    }
                }
            }
            _ => {}
        }
        Ok(rules)
    }

    /// Append a rule.
    pub fn push(&mut self, pattern: &str, enabled: bool) -> Result<()> {
        let compiled = if pattern.starts_with('/') {
            Pattern::Regex(delimited_regex(pattern)?)
        } else {
            Pattern::Glob(glob_regex(pattern)?)
        };
        self.rules.push(Rule {
            raw: pattern.to_string(),
            pattern: compiled,
            enabled,
        });
        Ok(())
    }

    /// Activation of the first rule matching `name`, if any.
    pub fn activation(&self, name: &str) -> Option<bool> {
        self.rules
            .iter()
            .find(|rule| rule.matches(name))
            .map(|rule| rule.enabled)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

static DELIMITED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(.*)/([a-zA-Z]*)$").expect("valid delimiter regex"));

/// Compile `/body/flags`; only the `i`, `m`, `s` and `x` flags are kept.
fn delimited_regex(pattern: &str) -> Result<Regex> {
    let invalid = |message: String| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message,
    };

    let caps = DELIMITED_RE
        .captures(pattern)
        .ok_or_else(|| invalid("missing closing delimiter".to_string()))?;
    let body = caps[1].replace("\\/", "/");
    let flags: String = caps[2].chars().filter(|c| "imsx".contains(*c)).collect();

    let source = if flags.is_empty() {
        body
    } else {
        format!("(?{flags}){body}")
    };
    Regex::new(&source).map_err(|e| invalid(e.to_string()))
}

/// Compile a shell glob (`*`, `?`, `[...]`) into an anchored regex.
fn glob_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' || c == '[' {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if closed {
                    class.push(']');
                    source.push_str(&class);
                } else {
                    source.push_str(&regex::escape(&class));
                }
            }
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Decide whether `package` carries assets.
///
/// An explicit activation wins. Otherwise the package qualifies with
/// `extra.foxy == true` or a (possibly transitive) dependency on `foxy/foxy`
/// through `index`.
pub fn is_asset(package: &HostPackage, activation: Option<bool>, index: &PackageIndex<'_>) -> bool {
    match activation {
        Some(enabled) => enabled,
        None => {
            package.extra.get("foxy") == Some(&Value::Bool(true))
                || index.depends_on_plugin(&package.name)
        }
    }
}

/// Resolved packages by name, for transitive dependency lookups.
#[derive(Debug)]
pub struct PackageIndex<'a> {
    packages: HashMap<&'a str, &'a HostPackage>,
}

impl<'a> PackageIndex<'a> {
    pub fn new(packages: &'a [HostPackage]) -> Self {
        Self {
            packages: packages.iter().map(|p| (p.name.as_str(), p)).collect(),
        }
    }

    /// Whether `name` requires the plugin directly or through resolved packages.
    pub fn depends_on_plugin(&self, name: &str) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![name];

        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(package) = self.packages.get(current) else {
                continue;
            };
            for target in package.all_requires() {
                if target == PLUGIN_NAME {
                    return true;
                }
                pending.push(target);
            }
        }
        false
    }
}

/// Rewrite a staged manifest: set `name` and synthesize a missing `version`.
pub fn format_package(
    package: &HostPackage,
    asset_name: &str,
    mut manifest: Map<String, Value>,
) -> Map<String, Value> {
    manifest.insert("name".to_string(), Value::String(asset_name.to_string()));

    if !manifest.contains_key("version") {
        manifest.insert(
            "version".to_string(),
            Value::String(synthesize_version(package)),
        );
    }
    manifest
}

/// Three-component version derived from the package's pretty version.
///
/// `dev-*` versions go through `extra.branch-alias`; wildcards become `0` and
/// the `-dev` suffix is dropped: `1.x-dev` gives `1.0.0`.
pub fn synthesize_version(package: &HostPackage) -> String {
    let mut version = package.pretty_version.clone();

    if version.starts_with("dev-")
        && let Some(alias) = package
            .extra
            .get("branch-alias")
            .and_then(|aliases| aliases.get(&version))
            .and_then(Value::as_str)
    {
        version = alias.to_string();
    }

    let version = version
        .replace(['*', 'x', 'X'], "0")
        .replace("-dev", "")
        .replace("-DEV", "");

    let mut parts: Vec<&str> = version.split('.').collect();
    parts.resize(parts.len().max(3), "0");
    parts[..3].join(".")
}

/// Stages the asset manifests of resolved packages.
#[derive(Debug)]
pub struct DependencyCollector {
    rules: ActivationRules,
    project_root: NormalizedPath,
}

impl DependencyCollector {
    pub fn new(rules: ActivationRules, project_root: NormalizedPath) -> Self {
        Self {
            rules,
            project_root,
        }
    }

    /// Stage every asset-bearing package under `staging_dir`.
    ///
    /// The staging directory is expected to be empty; the caller wipes it.
    pub fn collect_entries(
        &self,
        host: &dyn Host,
        packages: &[HostPackage],
        staging_dir: &NormalizedPath,
    ) -> Result<Vec<AssetDependencyEntry>> {
        let index = PackageIndex::new(packages);
        let mut entries = Vec::new();

        for package in packages {
            let activation = self.rules.activation(&package.name);
            if !is_asset(package, activation, &index) {
                continue;
            }

            let source = host.install_path(package).join(MANIFEST_NAME);
            if !source.is_file() {
                tracing::debug!(package = %package.name, path = %source, "No asset manifest, skipping");
                continue;
            }

            entries.push(self.stage(package, &source, staging_dir)?);
        }

        Ok(entries)
    }

    /// Stage packages and return the name to relative path map.
    pub fn collect(
        &self,
        host: &dyn Host,
        packages: &[HostPackage],
        staging_dir: &NormalizedPath,
    ) -> Result<AssetMap> {
        Ok(self
            .collect_entries(host, packages, staging_dir)?
            .into_iter()
            .map(|entry| (entry.name, entry.source_path.as_str().to_string()))
            .collect())
    }

    fn stage(
        &self,
        package: &HostPackage,
        source: &NormalizedPath,
        staging_dir: &NormalizedPath,
    ) -> Result<AssetDependencyEntry> {
        let name = asset_name(&package.name);
        let target = staging_dir.join(&package.name).join(MANIFEST_NAME);

        io::copy_file(source, &target)?;
        let file = JsonFile::new(target.clone());
        let manifest = format_package(package, &name, file.read_object()?);
        file.write(&manifest)?;

        let declared_version = manifest
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let source_path = target.relative_to(&self.project_root);

        tracing::debug!(package = %package.name, %name, path = %source_path, "Staged asset manifest");
        Ok(AssetDependencyEntry {
            name,
            source_path,
            declared_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn rules() -> ActivationRules {
        let mut rules = ActivationRules::default();
        rules.push("test-string/*", true).unwrap();
        rules.push("foo/*", true).unwrap();
        rules.push("baz/foo", false).unwrap();
        rules.push("/^bar\\/*/", true).unwrap();
        rules.push("full/qualified", true).unwrap();
        rules.push("full-disable/qualified", false).unwrap();
        rules
    }

    #[rstest]
    #[case("full/qualified", Some(true))]
    #[case("full-disable/qualified", Some(false))]
    #[case("foo/bar", Some(true))]
    #[case("baz/foo", Some(false))]
    #[case("baz/foo-test", None)]
    #[case("bar/test", Some(true))]
    #[case("other/package", None)]
    #[case("test-string/package", Some(true))]
    fn activation_table(#[case] name: &str, #[case] expected: Option<bool>) {
        assert_eq!(rules().activation(name), expected);
    }

    #[test]
    fn catch_all_wildcard_activates_the_rest() {
        let value = json!({"baz/foo*": false, "full-disable/qualified": false, "*": true});
        let rules = ActivationRules::from_value(Some(&value)).unwrap();

        assert_eq!(rules.activation("other/package"), Some(true));
        assert_eq!(rules.activation("baz/foo-test"), Some(false));
        assert_eq!(rules.activation("full-disable/qualified"), Some(false));
    }

    #[test]
    fn numeric_keys_and_lists_activate_their_value() {
        let value = json!({"0": "test-string/*", "foo/*": true});
        let rules = ActivationRules::from_value(Some(&value)).unwrap();
        assert_eq!(rules.activation("test-string/package"), Some(true));

        let value = json!(["acme/*"]);
        let rules = ActivationRules::from_value(Some(&value)).unwrap();
        assert_eq!(rules.activation("acme/ui"), Some(true));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let mut rules = ActivationRules::default();
        let err = rules.push("/([a-z/", true).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }), "got: {err:?}");
    }

    #[test]
    fn glob_question_mark_and_class() {
        let mut rules = ActivationRules::default();
        rules.push("acme/ui-?", true).unwrap();
        rules.push("acme/[!u]*", false).unwrap();

        assert_eq!(rules.activation("acme/ui-1"), Some(true));
        assert_eq!(rules.activation("acme/core"), Some(false));
        assert_eq!(rules.activation("acme/ui-10"), None);
    }

    #[test]
    fn is_asset_precedence() {
        let plain = HostPackage::new("foo/plain", "1.0.0");
        let flagged = HostPackage::new("foo/flagged", "1.0.0").with_extra("foxy", json!(true));
        let direct = HostPackage::new("foo/direct", "1.0.0").with_require(PLUGIN_NAME, "^1.0");
        let dev = HostPackage::new("foo/dev", "1.0.0").with_dev_require(PLUGIN_NAME, "^1.0");
        let transitive = HostPackage::new("foo/transitive", "1.0.0").with_require("foo/direct", "^1.0");

        let packages = vec![
            plain.clone(),
            flagged.clone(),
            direct.clone(),
            dev.clone(),
            transitive.clone(),
        ];
        let index = PackageIndex::new(&packages);

        assert!(!is_asset(&plain, None, &index));
        assert!(is_asset(&plain, Some(true), &index));
        assert!(is_asset(&flagged, None, &index));
        assert!(!is_asset(&flagged, Some(false), &index));
        assert!(is_asset(&direct, None, &index));
        assert!(is_asset(&dev, None, &index));
        assert!(is_asset(&transitive, None, &index));
    }

    #[test]
    fn transitive_lookup_survives_cycles() {
        let packages = vec![
            HostPackage::new("a/a", "1.0.0").with_require("b/b", "*"),
            HostPackage::new("b/b", "1.0.0").with_require("a/a", "*"),
        ];
        let index = PackageIndex::new(&packages);
        assert!(!index.depends_on_plugin("a/a"));
    }

    #[test]
    fn asset_name_escapes_separator() {
        assert_eq!(asset_name("foo/bar"), "@composer-asset/foo--bar");
    }

    fn dev_master(alias: &str) -> HostPackage {
        HostPackage::new("foo/bar", "dev-master")
            .with_extra("branch-alias", json!({"dev-master": alias}))
    }

    #[rstest]
    #[case(HostPackage::new("foo/bar", "1.0.0"), "1.0.0")]
    #[case(HostPackage::new("foo/bar", "1.0.0.x-dev"), "1.0.0")]
    #[case(HostPackage::new("foo/bar", "1.0.0.1"), "1.0.0")]
    #[case(HostPackage::new("foo/bar", "2.3"), "2.3.0")]
    #[case(dev_master("1-dev"), "1.0.0")]
    #[case(dev_master("1.0-dev"), "1.0.0")]
    #[case(dev_master("1.x-dev"), "1.0.0")]
    #[case(dev_master("1.*-dev"), "1.0.0")]
    #[case(dev_master("1.0.*-dev"), "1.0.0")]
    fn synthesized_versions(#[case] package: HostPackage, #[case] expected: &str) {
        assert_eq!(synthesize_version(&package), expected);
    }

    #[test]
    fn format_package_keeps_explicit_version() {
        let package = HostPackage::new("foo/bar", "1.0.0");
        let manifest = json!({"name": "bar", "version": "2.0.0", "dependencies": {}});
        let formatted = format_package(
            &package,
            "@composer-asset/foo--bar",
            manifest.as_object().unwrap().clone(),
        );

        assert_eq!(
            Value::Object(formatted),
            json!({"name": "@composer-asset/foo--bar", "version": "2.0.0", "dependencies": {}})
        );
    }
}
