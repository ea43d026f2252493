//! Resolved configuration values

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{Map, Value};

use super::env::{coerce_env_value, env_key};
use crate::Result;

/// Where environment overrides are read from.
#[derive(Debug, Clone)]
enum EnvSource {
    Process,
    Vars(HashMap<String, String>),
}

impl EnvSource {
    fn var(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Vars(vars) => vars.get(name).cloned(),
        }
    }
}

/// Foxy configuration after merging every file layer.
///
/// Lookups check the environment first, then the merged file values, then the
/// defaults. Environment values are converted once and cached for the
/// lifetime of the instance.
///
/// Keys starting with `manager-` may hold a map keyed by manager name
/// (`{"npm": ">=5.0.0", "yarn": ">=1.0.0"}`); such maps resolve to the entry
/// of the manager set with [`Config::for_manager`].
#[derive(Debug, Clone)]
pub struct Config {
    values: Map<String, Value>,
    defaults: Map<String, Value>,
    env: EnvSource,
    env_cache: RefCell<HashMap<String, Option<Value>>>,
    manager: Option<String>,
}

impl Config {
    /// Create a config reading overrides from the process environment.
    pub fn new(values: Map<String, Value>, defaults: Map<String, Value>) -> Self {
        Self {
            values,
            defaults,
            env: EnvSource::Process,
            env_cache: RefCell::new(HashMap::new()),
            manager: None,
        }
    }

    /// Replace the process environment with a fixed set of variables.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = EnvSource::Vars(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self.env_cache.borrow_mut().clear();
        self
    }

    /// Copy of this config resolving per-manager maps for `manager`.
    pub fn for_manager(&self, manager: &str) -> Self {
        let mut config = self.clone();
        config.manager = Some(manager.to_string());
        config
    }

    /// Manager whose entries are picked from per-manager maps.
    pub fn manager(&self) -> Option<&str> {
        self.manager.as_deref()
    }

    /// Look up a value. `null` is reported as absent.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(value) = self.env_value(key)? {
            return Ok(self.by_manager(key, value).filter(|v| !v.is_null()));
        }

        let default = self
            .defaults
            .get(key)
            .cloned()
            .and_then(|v| self.by_manager(key, v));

        let value = match self.values.get(key) {
            Some(value) => self.by_manager(key, value.clone()).or(default),
            None => default,
        };

        Ok(value.filter(|v| !v.is_null()))
    }

    /// Truthiness of a value; absent values are false.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        Ok(match self.get(key)? {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty() && s != "0",
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
        })
    }

    /// String form of a scalar value.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.get(key)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Non-negative integer value; strings holding digits are accepted.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        Ok(match self.get(key)? {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    fn env_value(&self, key: &str) -> Result<Option<Value>> {
        if let Some(cached) = self.env_cache.borrow().get(key) {
            return Ok(cached.clone());
        }

        let variable = env_key(key);
        let value = match self.env.var(&variable) {
            Some(raw) => Some(coerce_env_value(&raw, &variable)?),
            None => None,
        };

        self.env_cache
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(value)
    }

    fn by_manager(&self, key: &str, value: Value) -> Option<Value> {
        if !key.starts_with("manager-") {
            return Some(value);
        }
        match value {
            Value::Object(mut map) => self.manager.as_deref().and_then(|m| map.remove(m)),
            other => Some(other),
        }
    }
}
