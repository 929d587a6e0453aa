//! Process-wide monitor configuration.
//!
//! Everything here is fixed at start-up. Values come from [`MonitorConfig::default`],
//! optionally overlaid by a TOML file, then by command-line flags in the daemon.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TRANSPORT_ADDRESS: &str = "127.0.0.1:7000";
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_WARNING_THRESHOLD_C: f32 = 40.0;
pub const DEFAULT_CRITICAL_THRESHOLD_C: f32 = 50.0;
pub const DEFAULT_COUNTDOWN_START_S: u32 = 20;
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 50;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Hard ceiling on the event log; `max_log_entries` may only shrink it.
pub const LOG_CAPACITY_LIMIT: usize = 256;

// Simulated plant: oscillates roughly between -5°C and +55°C
const SIM_BASE_C: f32 = 25.0;
const SIM_AMPLITUDE_C: f32 = 30.0;
const SIM_ANGULAR_RATE_RAD_S: f32 = 0.1;
const SIM_JITTER_C: f32 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub base_c: f32,
    pub amplitude_c: f32,
    pub frequency_hz: f32,
    /// Upper bound of the uniform noise added to every sample.
    pub jitter_c: f32,
    /// Fixed seed for reproducible runs; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_c: SIM_BASE_C,
            amplitude_c: SIM_AMPLITUDE_C,
            frequency_hz: SIM_ANGULAR_RATE_RAD_S / (2.0 * core::f32::consts::PI),
            jitter_c: SIM_JITTER_C,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub transport_address: String,
    pub baud_rate: u32,
    pub warning_threshold_c: f32,
    pub critical_threshold_c: f32,
    pub countdown_start_s: u32,
    pub max_log_entries: usize,
    /// Advisory: skip the live transport entirely. A failed live open
    /// forces simulation regardless of this flag.
    pub prefer_simulation: bool,
    pub poll_interval_ms: u64,
    pub simulation: SimulationConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            transport_address: DEFAULT_TRANSPORT_ADDRESS.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            warning_threshold_c: DEFAULT_WARNING_THRESHOLD_C,
            critical_threshold_c: DEFAULT_CRITICAL_THRESHOLD_C,
            countdown_start_s: DEFAULT_COUNTDOWN_START_S,
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
            prefer_simulation: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            simulation: SimulationConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Parse a TOML document. Keys that are absent keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.warning_threshold_c.is_finite() {
            return Err(ConfigError::NonFiniteThreshold("warning_threshold_c"));
        }
        if !self.critical_threshold_c.is_finite() {
            return Err(ConfigError::NonFiniteThreshold("critical_threshold_c"));
        }
        if self.warning_threshold_c >= self.critical_threshold_c {
            return Err(ConfigError::ThresholdOrder {
                warning: self.warning_threshold_c,
                critical: self.critical_threshold_c,
            });
        }
        if self.countdown_start_s == 0 {
            return Err(ConfigError::ZeroCountdown);
        }
        if self.max_log_entries == 0 || self.max_log_entries > LOG_CAPACITY_LIMIT {
            return Err(ConfigError::LogCapacity {
                requested: self.max_log_entries,
                limit: LOG_CAPACITY_LIMIT,
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        let sim = &self.simulation;
        if !sim.base_c.is_finite() {
            return Err(ConfigError::Simulation("base_c"));
        }
        if !sim.amplitude_c.is_finite() || sim.amplitude_c < 0.0 {
            return Err(ConfigError::Simulation("amplitude_c"));
        }
        if !sim.frequency_hz.is_finite() || sim.frequency_hz <= 0.0 {
            return Err(ConfigError::Simulation("frequency_hz"));
        }
        if !sim.jitter_c.is_finite() || sim.jitter_c < 0.0 {
            return Err(ConfigError::Simulation("jitter_c"));
        }
        Ok(())
    }
}
