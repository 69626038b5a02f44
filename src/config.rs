//! Configuration management with validation and defaults

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the wagering core.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct FairstakeConfig {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
}

/// Game-engine tunables
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum stake, minor units.
    pub min_bet: f64,
    /// Maximum stake, minor units.
    pub max_bet: f64,
    /// House edge applied to the crash curve.
    pub house_edge: f64,
    /// Crash tick period in milliseconds.
    pub crash_tick_ms: u64,
    /// Multiplier increment per crash tick.
    pub crash_tick_increment: f64,
    /// Mines per minefield.
    pub mine_count: usize,
    /// Minefield cell count.
    pub grid_size: usize,
    /// Bets (and dice plays) allowed per user per minute.
    pub bet_rate_per_min: u32,
    /// Cashouts allowed per user per minute.
    pub cashout_rate_per_min: u32,
    /// Mine reveals allowed per user per minute.
    pub reveal_rate_per_min: u32,
    /// How often the stale-game reaper runs, seconds.
    pub reaper_interval_secs: u64,
    /// Age after which an untouched live game is force-crashed, seconds.
    pub stale_game_max_age_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_bet: 1.0,
            max_bet: 10_000.0,
            house_edge: 0.01,
            crash_tick_ms: 100,
            crash_tick_increment: 0.01,
            mine_count: 3,
            grid_size: 25,
            bet_rate_per_min: 30,
            cashout_rate_per_min: 60,
            reveal_rate_per_min: 120,
            reaper_interval_secs: 300,
            stale_game_max_age_secs: 600,
        }
    }
}

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    pub max_write_buffer_number: usize,
    pub compression_type: CompressionType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    Snappy,
    Lz4,
    Zstd,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/fairstake_data".to_string(),
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            compression_type: CompressionType::Lz4,
        }
    }
}

/// Monitoring and logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enable_logging: bool,
    pub log_level: LogLevel,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
            log_level: LogLevel::Info,
        }
    }
}

impl FairstakeConfig {
    /// Production preset: conservative buffers, persistent data directory.
    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                data_directory: "./DB/fairstake_data".to_string(),
                write_buffer_size_mb: 128,
                max_write_buffer_number: 6,
                compression_type: CompressionType::Lz4,
            },
            ..Default::default()
        }
    }

    /// Validate for logical consistency.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.engine.min_bet < 1.0 {
            return Err(ConfigValidationError::InvalidValue(
                "min_bet must be >= 1".to_string(),
            ));
        }

        if self.engine.max_bet < self.engine.min_bet {
            return Err(ConfigValidationError::LogicalInconsistency(
                "max_bet must be >= min_bet".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.engine.house_edge) {
            return Err(ConfigValidationError::InvalidValue(
                "house_edge must be in [0, 1)".to_string(),
            ));
        }

        if self.engine.crash_tick_ms == 0 || self.engine.crash_tick_increment <= 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "crash tick period and increment must be > 0".to_string(),
            ));
        }

        if self.engine.mine_count == 0 || self.engine.mine_count >= self.engine.grid_size {
            return Err(ConfigValidationError::LogicalInconsistency(
                "mine_count must be > 0 and < grid_size".to_string(),
            ));
        }

        // A reaper slower than the stale cutoff leaves dead games ticking.
        if self.engine.reaper_interval_secs > self.engine.stale_game_max_age_secs {
            return Err(ConfigValidationError::LogicalInconsistency(
                "reaper interval must not exceed the stale-game cutoff".to_string(),
            ));
        }

        Ok(())
    }

    pub fn crash_tick(&self) -> Duration {
        Duration::from_millis(self.engine.crash_tick_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.engine.reaper_interval_secs)
    }

    pub fn stale_game_max_age(&self) -> Duration {
        Duration::from_secs(self.engine.stale_game_max_age_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidValue(String),
    LogicalInconsistency(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidValue(msg) => {
                write!(f, "Invalid configuration value: {}", msg)
            }
            ConfigValidationError::LogicalInconsistency(msg) => {
                write!(f, "Configuration logical inconsistency: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FairstakeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_production_config_is_valid() {
        assert!(FairstakeConfig::production().validate().is_ok());
    }

    #[test]
    fn test_bet_range_validation() {
        let mut config = FairstakeConfig::default();
        config.engine.max_bet = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reaper_timing_validation() {
        let mut config = FairstakeConfig::default();
        config.engine.reaper_interval_secs = 1_200;
        config.engine.stale_game_max_age_secs = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversions() {
        let config = FairstakeConfig::default();
        assert_eq!(config.crash_tick(), Duration::from_millis(100));
        assert_eq!(config.reaper_interval(), Duration::from_secs(300));
        assert_eq!(config.stale_game_max_age(), Duration::from_secs(600));
    }
}
