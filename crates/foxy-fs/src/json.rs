//! JSON manifest store
//!
//! Reads and writes JSON documents while keeping the two formatting traits
//! that matter for hand-maintained manifests: the indentation width of the
//! existing file, and whether an empty value was written as `[]` or `{}`.
//!
//! The formatting hints are explicit values ([`FormatHints`]) handed to
//! [`format`]; nothing is threaded through shared state.

use std::cell::OnceCell;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Error, NormalizedPath, Result, io};

/// Indentation used when no existing file dictates otherwise.
pub const DEFAULT_INDENT: usize = 4;

static INDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[\{\[]\r?\n( +)["']"#).expect("valid indent regex"));

static ARRAY_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([\w\-.]+)":\s*\[\]"#).expect("valid array key regex"));

static EMPTY_ARRAY_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)": \[\]"#).expect("valid empty array regex"));

/// Formatting hints recovered from an existing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatHints {
    /// Number of spaces per indentation level.
    pub indent: usize,
    /// Keys whose empty value was written with array syntax.
    pub array_keys: Vec<String>,
}

impl Default for FormatHints {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            array_keys: Vec::new(),
        }
    }
}

impl FormatHints {
    /// Detect the hints from raw document content.
    pub fn detect(content: &str) -> Self {
        Self {
            indent: detect_indent(content),
            array_keys: array_keys(content),
        }
    }
}

/// Detect the indentation of a JSON document, defaulting to 4 spaces.
pub fn detect_indent(content: &str) -> usize {
    INDENT_RE
        .captures(content.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().len())
        .unwrap_or(DEFAULT_INDENT)
}

/// List the keys whose value is an empty array literal.
pub fn array_keys(content: &str) -> Vec<String> {
    ARRAY_KEY_RE
        .captures_iter(content.trim())
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Pretty-print `value` with the given hints.
///
/// Empty arrays are rendered as `{}` unless their key is listed in
/// `hints.array_keys`. The output ends with a newline.
pub fn format<T: Serialize + ?Sized>(value: &T, hints: &FormatHints) -> serde_json::Result<String> {
    let indent = " ".repeat(hints.indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;

    // serde_json only ever emits valid UTF-8
    let json = String::from_utf8_lossy(&buf);
    let json = EMPTY_ARRAY_VALUE_RE.replace_all(&json, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        if hints.array_keys.iter().any(|k| k == key) {
            caps[0].to_string()
        } else {
            format!("\"{key}\": {{}}")
        }
    });

    Ok(format!("{json}\n"))
}

/// A JSON file on disk.
///
/// The formatting hints are detected once, on the first read or write, from
/// the file content at that moment.
#[derive(Debug)]
pub struct JsonFile {
    path: NormalizedPath,
    hints: OnceCell<FormatHints>,
}

impl JsonFile {
    pub fn new(path: impl Into<NormalizedPath>) -> Self {
        Self {
            path: path.into(),
            hints: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Formatting hints of the file, or the defaults if it does not exist.
    pub fn hints(&self) -> &FormatHints {
        self.hints.get_or_init(|| match io::read_text(&self.path) {
            Ok(content) => FormatHints::detect(&content),
            Err(_) => FormatHints::default(),
        })
    }

    /// Indentation width of the file.
    pub fn indent(&self) -> usize {
        self.hints().indent
    }

    /// Keys written as `[]` in the file.
    pub fn array_keys(&self) -> &[String] {
        &self.hints().array_keys
    }

    /// Parse the file.
    pub fn read(&self) -> Result<Value> {
        let content = io::read_text(&self.path)?;
        let _ = self.hints.set(FormatHints::detect(&content));

        serde_json::from_str(&content).map_err(|e| Error::JsonParse {
            path: self.path.to_native(),
            message: e.to_string(),
        })
    }

    /// Parse the file, requiring the root to be an object.
    pub fn read_object(&self) -> Result<Map<String, Value>> {
        match self.read()? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::NotAnObject {
                path: self.path.to_native(),
            }),
        }
    }

    /// Serialize `value` with the file's hints and write it atomically.
    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let content = format(value, self.hints()).map_err(|e| Error::JsonSerialize {
            path: self.path.to_native(),
            message: e.to_string(),
        })?;
        io::write_text(&self.path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn detect_indent_two_spaces() {
        let content = "{\n  \"name\": \"test\",\n  \"dependencies\": {}\n}";
        assert_eq!(detect_indent(content), 2);
    }

    #[test]
    fn detect_indent_defaults_to_four() {
        assert_eq!(detect_indent(""), 4);
        assert_eq!(detect_indent("{\"name\": \"test\"}"), 4);
    }

    #[test]
    fn array_keys_finds_empty_arrays() {
        let content = "{\n  \"name\": \"test\",\n  \"contributors\": [],\n  \"dependencies\": {}\n}";
        assert_eq!(array_keys(content), vec!["contributors".to_string()]);
    }

    #[test]
    fn format_keeps_declared_array_keys() {
        let data = json!({
            "name": "test",
            "contributors": [],
            "dependencies": {"@foo/bar": "^1.0.0"},
            "devDependencies": []
        });
        let hints = FormatHints {
            indent: 2,
            array_keys: vec!["contributors".to_string()],
        };

        let expected = "{\n  \"name\": \"test\",\n  \"contributors\": [],\n  \"dependencies\": {\n    \"@foo/bar\": \"^1.0.0\"\n  },\n  \"devDependencies\": {}\n}\n";
        assert_eq!(format(&data, &hints).unwrap(), expected);
    }
}
