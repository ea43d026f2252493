//! Configuration resolution
//!
//! Foxy settings live under the `config.foxy` key of Composer files and can be
//! overridden per key through `FOXY__<KEY>` environment variables.
//!
//! # Configuration Hierarchy
//!
//! Sources are merged in this order (later sources override earlier):
//!
//! 1. **Built-in defaults** - see [`default_config`]
//! 2. **Global composer.json** - `$COMPOSER_HOME/composer.json`
//! 3. **Global config.json** - `$COMPOSER_HOME/config.json`
//! 4. **Project composer.json** - `<root>/composer.json`
//! 5. **Environment** - `FOXY__MANAGER_TIMEOUT=600`, read lazily per key
//!
//! # Example
//!
//! ```ignore
//! use foxy_core::config::ConfigResolver;
//! use foxy_fs::NormalizedPath;
//!
//! let config = ConfigResolver::new(NormalizedPath::new("/path/to/project")).resolve()?;
//! let enabled = config.get_bool("enabled")?;
//! ```

mod defaults;
mod env;
mod resolver;
mod values;

pub use defaults::default_config;
pub use env::{ENV_PREFIX, coerce_env_value, env_key};
pub use resolver::ConfigResolver;
pub use values::Config;
