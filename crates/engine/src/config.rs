use serde::Deserialize;

use crate::error::ConfigError;

fn default_max_history() -> usize {
    100
}

/// Limits for one editing session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditorConfig {
    /// Maximum retained undo entries. The oldest entry is evicted beyond this.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

impl EditorConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history == 0 {
            return Err(ConfigError::Validation(
                "max_history must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
