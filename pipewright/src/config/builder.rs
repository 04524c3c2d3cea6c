//! Layering of configuration overrides over defaults.

use crate::errors::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A flat configuration map.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Resolves `overrides` over `defaults`.
///
/// With no `nested_key` every key takes the override when present and the
/// default otherwise; override keys without a default are kept. With a
/// `nested_key` the same rule is applied to `overrides[nested_key]` instead.
///
/// # Errors
///
/// Returns `MissingSection` if `nested_key` is given but absent from
/// `overrides`, and `InvalidConfig` if it is present but not an object.
pub fn build(defaults: &ConfigMap, overrides: &ConfigMap, nested_key: Option<&str>) -> Result<ConfigMap> {
    let scope = match nested_key {
        None => overrides,
        Some(section) => overrides
            .get(section)
            .ok_or_else(|| PipelineError::missing_section(section))?
            .as_object()
            .ok_or_else(|| PipelineError::invalid_config(section, "expected an object"))?,
    };

    let mut resolved = defaults.clone();
    for (key, value) in scope {
        resolved.insert(key.clone(), value.clone());
    }
    Ok(resolved)
}

/// Returns a required key from a resolved map.
///
/// # Errors
///
/// Returns `MissingKey` if the key is absent or null.
pub fn require<'a>(resolved: &'a ConfigMap, key: &str) -> Result<&'a Value> {
    resolved
        .get(key)
        .filter(|value| !value.is_null())
        .ok_or_else(|| PipelineError::missing_key(key))
}

/// Resolves a stage configuration with one optional nested section.
///
/// The flat keys and the nested section are resolved separately and the
/// section's result is stored back under its key.
#[derive(Debug, Clone, Default)]
pub struct StageConfigBuilder {
    defaults: ConfigMap,
    section: Option<(String, ConfigMap)>,
    required: Vec<String>,
}

impl StageConfigBuilder {
    /// Creates a builder over flat defaults.
    #[must_use]
    pub fn new(defaults: ConfigMap) -> Self {
        Self {
            defaults,
            section: None,
            required: Vec::new(),
        }
    }

    /// Adds a nested section that overrides must provide.
    #[must_use]
    pub fn with_section(mut self, key: impl Into<String>, defaults: ConfigMap) -> Self {
        self.section = Some((key.into(), defaults));
        self
    }

    /// Marks a flat key as required.
    #[must_use]
    pub fn require(mut self, key: impl Into<String>) -> Self {
        self.required.push(key.into());
        self
    }

    /// Resolves `overrides` into a map.
    ///
    /// # Errors
    ///
    /// See [`build`] and [`require`].
    pub fn resolve(&self, overrides: &ConfigMap) -> Result<ConfigMap> {
        let mut resolved = build(&self.defaults, overrides, None)?;

        if let Some((key, defaults)) = &self.section {
            let nested = build(defaults, overrides, Some(key))?;
            resolved.insert(key.clone(), Value::Object(nested));
        }

        for key in &self.required {
            require(&resolved, key)?;
        }
        Ok(resolved)
    }

    /// Resolves `overrides` and deserializes the result.
    ///
    /// # Errors
    ///
    /// As [`resolve`](Self::resolve), plus `InvalidConfig` if the resolved
    /// map does not fit `T`.
    pub fn resolve_into<T: DeserializeOwned>(&self, overrides: &ConfigMap) -> Result<T> {
        let resolved = self.resolve(overrides)?;
        serde_json::from_value(Value::Object(resolved))
            .map_err(|e| PipelineError::invalid_config(self.label(), e.to_string()))
    }

    fn label(&self) -> String {
        self.section
            .as_ref()
            .map_or_else(|| "config".to_string(), |(key, _)| format!("config.{key}"))
    }
}

/// Converts a JSON literal into a [`ConfigMap`], or an empty map if it is not an object.
#[must_use]
pub fn config_map(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        _ => ConfigMap::new(),
    }
}
