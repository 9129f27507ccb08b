//! Construct environments by name.
//!
//! ```yaml
//! env: VariantTableEnv
//! config:
//!   name: hook_reach_variants
//!   variants: [configs/hook_reach.yaml, configs/hook_reach_rack.yaml]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{load_yaml, TableEnvConfig, VariantTableEnvConfig};
use crate::env::{Env, TableEnv};
use crate::error::{ConfigError, Result};
use crate::variant::VariantTableEnv;

/// Builds an environment from its YAML config.
pub type EnvConstructor = Box<dyn Fn(&serde_yaml::Value) -> Result<Box<dyn Env>>>;

/// Environment id plus its config document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvSpec {
    pub env: String,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

/// Registry of environment constructors keyed by id.
pub struct EnvFactory {
    constructors: BTreeMap<String, EnvConstructor>,
}

impl Default for EnvFactory {
    /// Registers "TableEnv" and "VariantTableEnv".
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register("TableEnv", |value| {
            let config: TableEnvConfig = serde_yaml::from_value(value.clone()).map_err(ConfigError::from)?;
            Ok(Box::new(config.build()?) as Box<dyn Env>)
        });
        factory.register("VariantTableEnv", |value| {
            let config: VariantTableEnvConfig =
                serde_yaml::from_value(value.clone()).map_err(ConfigError::from)?;
            Ok(Box::new(VariantTableEnv::from_config(config)?) as Box<dyn Env>)
        });
        factory
    }
}

impl EnvFactory {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Add or replace the constructor for `id`.
    pub fn register<F>(&mut self, id: impl Into<String>, constructor: F)
    where
        F: Fn(&serde_yaml::Value) -> Result<Box<dyn Env>> + 'static,
    {
        self.constructors.insert(id.into(), Box::new(constructor));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Look up a constructor. Unknown ids are a configuration error.
    pub fn resolve(&self, id: &str) -> std::result::Result<&EnvConstructor, ConfigError> {
        self.constructors
            .get(id)
            .ok_or_else(|| ConfigError::UnknownEnv(id.to_string()))
    }

    pub fn create(&self, id: &str, config: &serde_yaml::Value) -> Result<Box<dyn Env>> {
        let constructor = self.resolve(id)?;
        constructor(config)
    }

    pub fn create_from_spec(&self, spec: &EnvSpec) -> Result<Box<dyn Env>> {
        self.create(&spec.env, &spec.config)
    }

    /// Parse an [`EnvSpec`] document and build it.
    pub fn create_from_yaml_str(&self, yaml: &str) -> Result<Box<dyn Env>> {
        let spec: EnvSpec = serde_yaml::from_str(yaml).map_err(ConfigError::from)?;
        self.create_from_spec(&spec)
    }

    pub fn create_from_yaml_file(&self, path: impl AsRef<Path>) -> Result<Box<dyn Env>> {
        let spec: EnvSpec = load_yaml(path)?;
        self.create_from_spec(&spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ids() {
        let factory = EnvFactory::default();
        assert_eq!(factory.ids().collect::<Vec<_>>(), vec!["TableEnv", "VariantTableEnv"]);
        assert!(matches!(factory.resolve("PushLeft2D"), Err(ConfigError::UnknownEnv(_))));
    }
}
