//! Null-engine configuration, read from `null.toml` in the config
//! directory the driver passes to session initialization.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const CONFIG_FILE: &str = "null.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("bad TOML in {0}: {1}")]
    Parse(String, toml::de::Error),
}

/// Tuning knobs for the null engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Payload every successful extraction emits as its template.
    pub template_text: String,
    /// When set, every Nth extraction fails with an empty template.
    /// Used to exercise the driver's failure paths deterministically.
    pub fail_every: Option<u32>,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            template_text: "lineup null template payload\n".to_string(),
            fail_every: None,
        }
    }
}

impl NullConfig {
    /// Load `null.toml` from `config_dir`. A missing file yields the
    /// defaults; an unreadable or malformed file is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(display.clone(), e))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(display, e))
    }
}
