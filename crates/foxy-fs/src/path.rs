//! Normalized path handling for cross-platform compatibility

use std::path::{Path, PathBuf};

/// A path normalized to use forward slashes internally.
///
/// Manifest values (`file:./vendor/...`) and staging paths are always written
/// with forward slashes, so paths are kept in that form and converted to the
/// platform-native format only at I/O boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Backslashes are stored as forward slashes.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            inner: path.as_ref().to_string_lossy().replace('\\', "/"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Path for `std::fs` calls.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Append `segment`, which may hold several `/`-separated parts.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.replace('\\', "/");
        let inner = match self.inner.as_str() {
            "" => segment,
            base if base.ends_with('/') => format!("{base}{segment}"),
            base => format!("{base}/{segment}"),
        };
        Self { inner }
    }

    /// Parent directory; `None` for a bare file name.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) if idx > 0 => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            Some(0) => Some(Self {
                inner: "/".to_string(),
            }),
            _ => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Whether the path is rooted (`/...`, `//server/...` or `C:/...`).
    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/') || has_drive_prefix(&self.inner)
    }

    /// Resolve `.` and `..` segments lexically.
    ///
    /// `..` above a rooted path is dropped; above a relative path it is kept.
    pub fn clean(&self) -> Self {
        let absolute = self.is_absolute();
        let mut parts: Vec<&str> = Vec::new();

        for segment in self.inner.split('/') {
            match segment {
                "" | "." => {}
                ".." => match parts.last() {
                    Some(&last) if last != ".." && !has_drive_prefix(last) => {
                        parts.pop();
                    }
                    _ if absolute => {}
                    _ => parts.push(".."),
                },
                other => parts.push(other),
            }
        }

        let joined = parts.join("/");
        let inner = if self.inner.starts_with('/') {
            format!("/{joined}")
        } else if joined.is_empty() {
            ".".to_string()
        } else {
            joined
        };
        Self { inner }
    }

    /// Compute the shortest path leading from the directory `base` to `self`.
    ///
    /// Both paths are cleaned first. When they share no common root (for
    /// example two different drives) the cleaned target is returned as-is.
    pub fn relative_to(&self, base: &NormalizedPath) -> NormalizedPath {
        let target = self.clean();
        let base = base.clean();

        if target.is_absolute() != base.is_absolute() {
            return target;
        }

        let target_parts = segments(&target.inner);
        let base_parts = segments(&base.inner);

        let common = target_parts
            .iter()
            .zip(base_parts.iter())
            .take_while(|(a, b)| segment_eq(a, b))
            .count();

        if common == 0 && target.is_absolute() && has_drive_prefix(&target.inner) {
            return target;
        }

        let mut parts: Vec<&str> = Vec::new();
        parts.extend(std::iter::repeat_n("..", base_parts.len() - common));
        parts.extend(target_parts[common..].iter().copied());

        if parts.is_empty() {
            return NormalizedPath::new(".");
        }
        NormalizedPath::new(parts.join("/"))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

fn segment_eq(a: &str, b: &str) -> bool {
    if cfg!(windows) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}
