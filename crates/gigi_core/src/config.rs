use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::error::{GigiError, Result};

pub const DEFAULT_KB_THRESHOLD: f32 = 0.7;
pub const DEFAULT_INTENT_FLOOR: f32 = 0.5;
pub const DEFAULT_INTENT_CEILING: f32 = 0.7;
pub const DEFAULT_INTENT_LENGTH_SCALE: f32 = 50.0;
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Tunables for the matching engine and the shell around it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A knowledge-base key must score strictly above this to be used.
    pub kb_threshold: f32,
    /// Intent threshold for short questions.
    pub intent_floor: f32,
    /// Intent threshold for long questions.
    pub intent_ceiling: f32,
    /// Characters per unit of intent threshold, before clamping.
    pub intent_length_scale: f32,
    /// Transcript messages shown by the chat shell.
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kb_threshold: DEFAULT_KB_THRESHOLD,
            intent_floor: DEFAULT_INTENT_FLOOR,
            intent_ceiling: DEFAULT_INTENT_CEILING,
            intent_length_scale: DEFAULT_INTENT_LENGTH_SCALE,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the config file, or returns the defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("kb_threshold", self.kb_threshold),
            ("intent_floor", self.intent_floor),
            ("intent_ceiling", self.intent_ceiling),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(GigiError::InvalidConfig(format!(
                    "{name} must be within [-1, 1], got {value}"
                )));
            }
        }

        if self.intent_floor > self.intent_ceiling {
            return Err(GigiError::InvalidConfig(format!(
                "intent_floor ({}) is above intent_ceiling ({})",
                self.intent_floor, self.intent_ceiling
            )));
        }

        if self.intent_length_scale.is_nan() || self.intent_length_scale <= 0.0 {
            return Err(GigiError::InvalidConfig(
                "intent_length_scale must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
