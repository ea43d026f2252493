//! Environment variable overrides

use serde_json::Value;

use crate::{Error, Result};

/// Prefix of every foxy environment variable.
pub const ENV_PREFIX: &str = "FOXY__";

const BOOL_TOKENS: [&str; 8] = ["true", "false", "1", "0", "yes", "no", "y", "n"];
const TRUE_TOKENS: [&str; 4] = ["true", "1", "yes", "y"];

/// Name of the environment variable overriding `key`.
///
/// `manager-timeout` becomes `FOXY__MANAGER_TIMEOUT`.
pub fn env_key(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('-', "_").to_uppercase())
}

/// Convert a raw environment value into a typed config value.
///
/// Surrounding quotes are dropped, then the first matching rule applies:
/// boolean tokens, optionally signed integers, JSON objects or arrays, and
/// finally plain strings.
pub fn coerce_env_value(raw: &str, variable: &str) -> Result<Value> {
    let value = raw.trim_matches('\'').trim_matches('"').trim();
    let lower = value.to_lowercase();

    if BOOL_TOKENS.contains(&lower.as_str()) {
        return Ok(Value::Bool(TRUE_TOKENS.contains(&lower.as_str())));
    }

    let digits = value.trim_matches('-');
    if !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && let Ok(number) = value.trim_end_matches('-').parse::<i64>()
    {
        return Ok(Value::from(number));
    }

    if value.starts_with('{') || value.starts_with('[') {
        return serde_json::from_str(value).map_err(|e| Error::Configuration {
            key: variable.to_string(),
            message: format!("The \"{variable}\" environment variable isn't a valid JSON ({e})"),
        });
    }

    Ok(Value::String(value.to_string()))
}
