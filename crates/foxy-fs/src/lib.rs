//! Filesystem abstraction for foxy
//!
//! Provides normalized path handling, atomic writes, and the JSON manifest
//! store used to read and rewrite `package.json` style documents without
//! disturbing their formatting.

pub mod error;
pub mod io;
pub mod json;
pub mod path;

pub use error::{Error, Result};
pub use json::{FormatHints, JsonFile};
pub use path::NormalizedPath;
