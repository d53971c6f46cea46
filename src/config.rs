use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};

use crate::NormgraphError;

/// Safety cutoff for entity nesting during normalization and denormalization.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// What the normalizer does when an entity's ident cannot be resolved or the depth cutoff
/// is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Record a diagnostic, pass the offending subtree through, keep going.
    #[default]
    BestEffort,
    /// Return the first error.
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub max_depth: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            error_policy: ErrorPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Make merged to-many reference lists reflect the new result exactly, dropping
    /// references that are absent from it. Off by default: merges are usually incremental.
    pub remove_missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormgraphConfig {
    pub normalize: NormalizeConfig,
    pub merge: MergeOptions,
}

impl NormgraphConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, NormgraphError> {
        let config: NormgraphConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, NormgraphError> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), NormgraphError> {
        if self.normalize.max_depth == 0 {
            return Err(NormgraphError::Config(
                "normalize.max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<NormgraphConfig, NormgraphError>;
    fn set_config(&self, config: &NormgraphConfig) -> Result<(), NormgraphError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<NormgraphConfig, NormgraphError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(NormgraphConfig::default());
        }
        let content = read_to_string(&self.path)?;
        NormgraphConfig::from_toml_str(&content)
    }

    fn set_config(&self, config: &NormgraphConfig) -> Result<(), NormgraphError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        config.validate()?;
        write(&self.path, config.to_toml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = NormgraphConfig::from_toml_str(
            r#"
[merge]
remove_missing = true
"#,
        )
        .unwrap();
        assert!(config.merge.remove_missing);
        assert_eq!(config.normalize, NormalizeConfig::default());
    }

    #[test]
    fn test_error_policy_names() {
        let config = NormgraphConfig::from_toml_str(
            r#"
[normalize]
max_depth = 8
error_policy = "fail_fast"
"#,
        )
        .unwrap();
        assert_eq!(config.normalize.max_depth, 8);
        assert_eq!(config.normalize.error_policy, ErrorPolicy::FailFast);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = NormgraphConfig::from_toml_str("[normalize]\nmax_depth = 0\n");
        assert!(matches!(err, Err(NormgraphError::Config(_))));
        let err = NormgraphConfig::from_toml_str("[normalize]\nmax_depth = \"deep\"\n");
        assert!(matches!(err, Err(NormgraphError::Serialization(_))));
    }
}
