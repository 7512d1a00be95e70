//! Engine settings loaded from TOML.
use crate::error::{EngineError, Result};
use crate::utils::is_valid_prefix;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Human readable part of request ids.
    pub request_prefix: String,
    /// Human readable part of purchase ids.
    pub purchase_prefix: String,
    /// sled database directory. Absent means the engine keeps state in memory only.
    pub storage_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_prefix: "req_".to_string(),
            purchase_prefix: "po_".to_string(),
            storage_path: None,
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
        let contents = fs::read_to_string(path_ref).map_err(|e| {
            EngineError::Config(format!("Failed to read config file {:?}: {}", path_ref, e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, prefix) in [
            ("request_prefix", &self.request_prefix),
            ("purchase_prefix", &self.purchase_prefix),
        ] {
            if !is_valid_prefix(prefix) {
                return Err(EngineError::Config(format!(
                    "{field} {prefix:?} is not a valid id prefix"
                )));
            }
        }
        if self.request_prefix == self.purchase_prefix {
            return Err(EngineError::Config(
                "request_prefix and purchase_prefix must differ".to_string(),
            ));
        }
        Ok(())
    }
}
