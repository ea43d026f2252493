//! Version conversion, constraint checking and tool version gating.
//!
//! Asset manager binaries report versions in their own dialect
//! (`1.3.0–rc30.79`, `20170124.1.0`, `v8.1.2`). [`SemverConverter`] rewrites
//! them into a comparable semver-like form, and [`VersionConstraint`] checks
//! that form against Composer-style range strings.
//!
//! # Examples
//!
//! ```
//! use foxy_core::version::{SemverConverter, VersionConstraint, VersionConverter};
//!
//! let converter = SemverConverter;
//! assert_eq!(converter.convert_version(Some("1.2.3rc1")), "1.2.3-RC1");
//!
//! let constraint = VersionConstraint::parse(">=5.0.0 <8 || ^10.2").unwrap();
//! assert!(constraint.satisfies("6.14.4"));
//! assert!(constraint.satisfies("10.9.0"));
//! assert!(!constraint.satisfies("9.0.0"));
//! ```

use std::cell::OnceCell;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Converts a tool-native version into a comparable version string.
pub trait VersionConverter {
    fn convert_version(&self, version: Option<&str>) -> String;
}

/// Semver flavoured [`VersionConverter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SemverConverter;

static METADATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    let num = r"([0-9]+|x|\*)";
    let pattern = format!(
        r"^({num}|({num}\.{num})|({num}\.{num}\.{num}))([a-zA-Z]+|(\-|\+)[a-zA-Z]+|(\-|\+)[0-9]+)"
    );
    Regex::new(&pattern).expect("valid metadata regex")
});

static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+").expect("valid stability regex"));

static END_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]+\.[0-9]+|[0-9]+|\.[0-9]+$").expect("valid patch number regex")
});

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{7,}\.").expect("valid date version regex"));

impl VersionConverter for SemverConverter {
    fn convert_version(&self, version: Option<&str>) -> String {
        let version = match version {
            None | Some("") => return "*".to_string(),
            Some("latest") => return "default || *".to_string(),
            Some(v) => v.replace('–', "-"),
        };

        let prefix_len = match version.chars().next() {
            Some(c) if c.is_ascii_lowercase() && !version.starts_with("dev-") => 1,
            _ => 0,
        };
        let (prefix, rest) = version.split_at(prefix_len);

        let converted = convert_date_version(&convert_metadata(rest));
        format!("{prefix}{converted}")
    }
}

/// Rewrite pre-release metadata: `1.2.3a` becomes `1.2.3-alpha1`.
fn convert_metadata(version: &str) -> String {
    let Some(number) = METADATA_RE
        .captures(version)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return clean_wildcard(version);
    };

    let lower = version.to_lowercase();
    let mut end = &lower[number.len()..];
    if end.starts_with(['-', '+']) {
        end = &end[1..];
    }

    let raw_type = TYPE_RE.find(end).map(|m| m.as_str()).unwrap_or("");
    end = &end[raw_type.len()..];

    let (label, numbered) = match raw_type {
        "dev" | "snapshot" => ("dev", false),
        "a" | "alpha" => ("alpha", true),
        "b" | "pre" | "beta" => ("beta", true),
        "rc" => ("RC", true),
        _ => ("patch", true),
    };

    let mut converted = format!("{number}-{label}");
    if numbered {
        let suffix = END_NUMBER_RE.find(end).map(|m| m.as_str()).unwrap_or("1");
        converted.push_str(suffix);
    }

    clean_wildcard(&converted)
}

/// Collapse `20170124.1.0` into `20170124.001000`.
fn convert_date_version(version: &str) -> String {
    if !DATE_RE.is_match(version) {
        return version.to_string();
    }
    let Some((major, minor)) = version.split_once('.') else {
        return version.to_string();
    };

    let mut parts = minor.split('.');
    let minor = parts.next().map(leading_int).unwrap_or(0);
    let revision = parts.next().map(leading_int).unwrap_or(0);
    format!("{major}.{minor:03}{revision:03}")
}

/// Integer prefix of a string, `0` when there is none.
fn leading_int(s: &str) -> u64 {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

fn clean_wildcard(version: &str) -> String {
    let mut version = version.to_string();
    while version.contains(".x.x") {
        version = version.replace(".x.x", ".x");
    }
    version
}

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `=` / `==`
    Eq,
    /// `!=`
    Ne,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone)]
struct Specifier {
    op: CompareOp,
    version: semver::Version,
}

impl Specifier {
    fn new(op: CompareOp, version: semver::Version) -> Self {
        Self { op, version }
    }

    fn matches(&self, candidate: &semver::Version) -> bool {
        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
        }
    }
}

static OPERATOR_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(>=|<=|!=|==|>|<|=|\^|~)\s+").expect("valid operator regex"));

static HYPHEN_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+-\s+(\S+)$").expect("valid hyphen range regex"));

/// A parsed version constraint that can be checked against concrete versions.
///
/// `||` (or `|`) separates alternatives; inside an alternative, comparators
/// separated by commas or spaces must all match. Supported comparators are
/// `>=`, `>`, `<=`, `<`, `=`, `==`, `!=`, `^`, `~`, bare versions, wildcard
/// versions (`1.x`, `2.*`) and hyphen ranges (`1.0 - 2.0`).
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    /// OR of AND groups; an empty group matches everything.
    groups: Vec<Vec<Specifier>>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.to_string();
        if constraint.trim().is_empty() {
            return Err(Error::InvalidConstraint {
                constraint: raw,
                reason: "empty constraint".to_string(),
            });
        }

        let groups = constraint
            .split("||")
            .flat_map(|g| g.split('|'))
            .map(|group| parse_group(group.trim(), constraint))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { groups, raw })
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        match parse_version(version) {
            Some(parsed) => self.satisfies_version(&parsed),
            None => false,
        }
    }

    /// Check if a `semver::Version` satisfies this constraint.
    pub fn satisfies_version(&self, version: &semver::Version) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|spec| spec.matches(version)))
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_group(group: &str, constraint: &str) -> Result<Vec<Specifier>> {
    let invalid = |reason: String| Error::InvalidConstraint {
        constraint: constraint.to_string(),
        reason,
    };

    if let Some(caps) = HYPHEN_RANGE_RE.captures(group) {
        let low = parse_version(&caps[1])
            .ok_or_else(|| invalid(format!("invalid version: {}", &caps[1])))?;
        let high = parse_version(&caps[2])
            .ok_or_else(|| invalid(format!("invalid version: {}", &caps[2])))?;
        return Ok(vec![
            Specifier::new(CompareOp::Gte, low),
            Specifier::new(CompareOp::Lte, high),
        ]);
    }

    let compact = OPERATOR_SPACE_RE.replace_all(group, "$1");
    let mut specifiers = Vec::new();
    for part in compact.split([',', ' ', '\t']).filter(|p| !p.is_empty()) {
        specifiers.extend(parse_specifier(part).map_err(invalid)?);
    }
    Ok(specifiers)
}

/// Parse a single comparator; ranges expand to several specifiers.
fn parse_specifier(s: &str) -> std::result::Result<Vec<Specifier>, String> {
    let (op, version_str) = if let Some(rest) = s.strip_prefix(">=") {
        (Some(CompareOp::Gte), rest)
    } else if let Some(rest) = s.strip_prefix("<=") {
        (Some(CompareOp::Lte), rest)
    } else if let Some(rest) = s.strip_prefix("!=") {
        (Some(CompareOp::Ne), rest)
    } else if let Some(rest) = s.strip_prefix("==") {
        (Some(CompareOp::Eq), rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (Some(CompareOp::Gt), rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (Some(CompareOp::Lt), rest)
    } else if let Some(rest) = s.strip_prefix('=') {
        (Some(CompareOp::Eq), rest)
    } else {
        (None, s)
    };

    if let Some(op) = op {
        let version =
            parse_version(version_str).ok_or_else(|| format!("invalid version: {version_str}"))?;
        return Ok(vec![Specifier::new(op, version)]);
    }

    if let Some(rest) = s.strip_prefix('^') {
        return caret_range(rest);
    }
    if let Some(rest) = s.strip_prefix('~') {
        return tilde_range(rest);
    }
    wildcard_or_exact(s)
}

/// Numeric components of a partial version, stopping at the first wildcard.
fn partial_components(s: &str) -> std::result::Result<Vec<u64>, String> {
    let numeric = s
        .trim_start_matches(['v', 'V'])
        .split(['-', '+'])
        .next()
        .unwrap_or("");
    let mut parts = Vec::new();
    for component in numeric.split('.') {
        if matches!(component, "x" | "X" | "*") {
            break;
        }
        parts.push(
            component
                .parse()
                .map_err(|_| format!("invalid version: {s}"))?,
        );
    }
    Ok(parts)
}

fn bound(major: u64, minor: u64, patch: u64) -> semver::Version {
    semver::Version::new(major, minor, patch)
}

/// `^1.2.3` allows changes that keep the left-most non-zero component.
fn caret_range(s: &str) -> std::result::Result<Vec<Specifier>, String> {
    let low = parse_version(s).ok_or_else(|| format!("invalid version: {s}"))?;
    let given = partial_components(s)?.len();
    let high = if low.major > 0 || given <= 1 {
        bound(low.major + 1, 0, 0)
    } else if low.minor > 0 || given == 2 {
        bound(0, low.minor + 1, 0)
    } else {
        bound(0, 0, low.patch + 1)
    };
    Ok(vec![
        Specifier::new(CompareOp::Gte, low),
        Specifier::new(CompareOp::Lt, high),
    ])
}

/// `~1.2` allows the last given component to grow; `~1.2.3` stays below `1.3`.
fn tilde_range(s: &str) -> std::result::Result<Vec<Specifier>, String> {
    let low = parse_version(s).ok_or_else(|| format!("invalid version: {s}"))?;
    let given = partial_components(s)?.len();
    let high = if given >= 3 {
        bound(low.major, low.minor + 1, 0)
    } else {
        bound(low.major + 1, 0, 0)
    };
    Ok(vec![
        Specifier::new(CompareOp::Gte, low),
        Specifier::new(CompareOp::Lt, high),
    ])
}

fn wildcard_or_exact(s: &str) -> std::result::Result<Vec<Specifier>, String> {
    if matches!(s, "*" | "x" | "X") {
        return Ok(Vec::new());
    }

    let has_wildcard = s.split('.').any(|c| matches!(c, "x" | "X" | "*"));
    if !has_wildcard {
        let version = parse_version(s).ok_or_else(|| format!("invalid version: {s}"))?;
        return Ok(vec![Specifier::new(CompareOp::Eq, version)]);
    }

    let parts = partial_components(s)?;
    let (low, high) = match parts.as_slice() {
        [] => return Ok(Vec::new()),
        [major] => (bound(*major, 0, 0), bound(major + 1, 0, 0)),
        [major, minor, ..] => (bound(*major, *minor, 0), bound(*major, minor + 1, 0)),
    };
    Ok(vec![
        Specifier::new(CompareOp::Gte, low),
        Specifier::new(CompareOp::Lt, high),
    ])
}

/// Parse a loose version into semver.
///
/// - `"3"` -> `3.0.0`, `"3.12"` -> `3.12.0`
/// - `"v1.2.3"` -> `1.2.3`
/// - `"1.x"` -> `1.0.0`
/// - `"1.2.3-RC1"` keeps its pre-release label
/// - components after the third are ignored
pub fn parse_version(s: &str) -> Option<semver::Version> {
    let s = s.trim().trim_start_matches('=').trim_start_matches(['v', 'V']);
    if s.is_empty() {
        return None;
    }

    // Build metadata never affects precedence
    let s = s.split('+').next().unwrap_or(s);
    let (numeric, pre) = match s.split_once('-') {
        Some((numeric, pre)) => (numeric, Some(pre)),
        None => (s, None),
    };

    let mut components = Vec::with_capacity(3);
    for component in numeric.split('.') {
        let value = match component {
            "x" | "X" | "*" => 0,
            digits => digits.parse::<u64>().ok()?,
        };
        components.push(value);
    }
    components.resize(components.len().max(3), 0);

    let mut version = semver::Version::new(components[0], components[1], components[2]);
    if let Some(pre) = pre.filter(|p| !p.is_empty()) {
        version.pre = semver::Prerelease::new(&sanitize_prerelease(pre)).ok()?;
    }
    Some(version)
}

/// Strip leading zeros from numeric pre-release identifiers.
fn sanitize_prerelease(pre: &str) -> String {
    pre.split('.')
        .map(|id| {
            if id.len() > 1 && id.bytes().all(|b| b.is_ascii_digit()) {
                let trimmed = id.trim_start_matches('0');
                if trimmed.is_empty() { "0" } else { trimmed }.to_string()
            } else {
                id.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Validates the presence and version of an external tool.
///
/// The version probe runs at most once per gate; later calls reuse the cached
/// output.
#[derive(Debug)]
pub struct VersionGate {
    tool: String,
    constraint: Option<String>,
    detected: OnceCell<String>,
}

impl VersionGate {
    pub fn new(tool: impl Into<String>, constraint: Option<String>) -> Self {
        Self {
            tool: tool.into(),
            constraint: constraint.filter(|c| !c.trim().is_empty()),
            detected: OnceCell::new(),
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    /// Trimmed probe output, running `probe` on first use only.
    pub fn detected_version<F>(&self, probe: F) -> Result<&str>
    where
        F: FnOnce() -> Result<String>,
    {
        if let Some(version) = self.detected.get() {
            return Ok(version.as_str());
        }
        let version = probe()?.trim().to_string();
        tracing::debug!(tool = %self.tool, %version, "Probed tool version");
        Ok(self.detected.get_or_init(|| version).as_str())
    }

    /// Fail with `ToolMissing` when the probe output is empty and with
    /// `VersionMismatch` when the normalized version misses the constraint.
    pub fn validate<F>(&self, probe: F) -> Result<()>
    where
        F: FnOnce() -> Result<String>,
    {
        let version = self.detected_version(probe)?;
        if version.is_empty() {
            return Err(Error::ToolMissing {
                manager: self.tool.clone(),
            });
        }

        let Some(constraint) = self.constraint.as_deref() else {
            return Ok(());
        };

        let normalized = SemverConverter.convert_version(Some(version));
        if !VersionConstraint::parse(constraint)?.satisfies(&normalized) {
            return Err(Error::VersionMismatch {
                manager: self.tool.clone(),
                version: version.to_string(),
                constraint: constraint.to_string(),
            });
        }
        Ok(())
    }
}
