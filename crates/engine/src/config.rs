use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LoopError, Result};
use crate::time::TimePosition;

/// Longest confirmable selection when no config overrides it: 15 s.
pub const DEFAULT_MAX_SELECTION_TL: i64 = 15_000_000;
/// One display frame at 60 Hz.
pub const DEFAULT_TICK_INTERVAL_TL: i64 = 16_667;
pub const DEFAULT_EPSILON_TL: i64 = 1_000;

/// Controller tuning, in timeline ticks.
///
/// # Example
/// ```
/// use loop_engine::{LoopConfig, TimePosition};
///
/// let config = LoopConfig::from_json(r#"{ "max_selection_tl": 30000000 }"#).expect("valid");
/// assert_eq!(config.max_selection(), TimePosition::from_seconds(30.0));
/// assert_eq!(config.tick_interval_tl, 16_667);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    pub max_selection_tl: i64,
    /// Clock cadence. Also the boundary lead and the free-run end window.
    pub tick_interval_tl: i64,
    /// Tolerance for handle-motion detection.
    pub epsilon_tl: i64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_selection_tl: DEFAULT_MAX_SELECTION_TL,
            tick_interval_tl: DEFAULT_TICK_INTERVAL_TL,
            epsilon_tl: DEFAULT_EPSILON_TL,
        }
    }
}

impl LoopConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoopError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| LoopError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "loop config loaded");
        Ok(config)
    }

    /// Parses and validates config JSON held in memory.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|err| LoopError::InvalidConfig {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_selection_tl <= 0 {
            return Err(invalid("max_selection_tl must be positive"));
        }
        if self.tick_interval_tl <= 0 {
            return Err(invalid("tick_interval_tl must be positive"));
        }
        if self.epsilon_tl < 0 {
            return Err(invalid("epsilon_tl must not be negative"));
        }
        if self.epsilon_tl >= self.tick_interval_tl {
            return Err(invalid("epsilon_tl must be smaller than tick_interval_tl"));
        }
        Ok(())
    }

    pub fn max_selection(&self) -> TimePosition {
        TimePosition::from_ticks(self.max_selection_tl)
    }

    pub fn tick_interval(&self) -> TimePosition {
        TimePosition::from_ticks(self.tick_interval_tl)
    }

    pub fn epsilon(&self) -> TimePosition {
        TimePosition::from_ticks(self.epsilon_tl)
    }
}

fn invalid(reason: &str) -> LoopError {
    LoopError::InvalidConfig {
        reason: reason.to_string(),
    }
}
