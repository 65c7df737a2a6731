//! Engine configuration
//!
//! Serializable configuration for the audio engine: activation timeouts,
//! retry policy, pool sizing, transport tempo, and analysis settings.
//! Loaded from YAML with defaults as fallback.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Timeout for platform audio activation (ms)
pub const DEFAULT_ACTIVATION_TIMEOUT_MS: u64 = 3_000;

/// Timeout for master effect bus construction (ms)
pub const DEFAULT_BUS_TIMEOUT_MS: u64 = 2_000;

/// Retry policy defaults: `min(ceiling, base * 2^(attempt-1))`, capped attempts
pub const DEFAULT_MAX_INIT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;
pub const DEFAULT_RETRY_CEILING_MS: u64 = 5_000;

/// Frame interval for the analysis feed (~60 fps)
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Retry/backoff policy for engine activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum activation attempts before the engine goes terminal
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds
    pub base_ms: u64,
    /// Backoff ceiling in milliseconds
    pub ceiling_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_INIT_ATTEMPTS,
            base_ms: DEFAULT_RETRY_BASE_MS,
            ceiling_ms: DEFAULT_RETRY_CEILING_MS,
        }
    }
}

impl RetryConfig {
    /// Backoff delay before retry number `attempt` (1-based):
    /// `min(ceiling, base * 2^(attempt-1))`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let raw = self.base_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(raw.min(self.ceiling_ms))
    }
}

/// Voice pool sizing and eviction policy
///
/// Single global policy for all voice types: idle entries older than
/// `max_age` are disposed by a sweep every `sweep_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum tracked entries per voice type
    pub max_size: usize,
    /// Maximum idle age before eviction (seconds)
    pub max_age_secs: u64,
    /// Sweep interval (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            max_age_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl PoolConfig {
    /// Maximum idle age as a `Duration`
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Sweep interval as a `Duration`
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Platform activation timeout (ms)
    pub activation_timeout_ms: u64,
    /// Master bus construction timeout (ms)
    pub bus_timeout_ms: u64,
    /// Retry/backoff policy
    pub retry: RetryConfig,
    /// Voice pool policy
    pub pool: PoolConfig,
    /// Shared transport tempo (beats per minute)
    pub bpm: f64,
    /// Musical key for note transposition ("C", "F#", "Bb", ...)
    pub key: String,
    /// FFT size for the analysis feed (must be a power of two)
    pub fft_size: usize,
    /// Analysis frame interval (ms)
    pub frame_interval_ms: u64,
    /// Initial master volume (0..1, perceptual curve)
    pub master_volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            activation_timeout_ms: DEFAULT_ACTIVATION_TIMEOUT_MS,
            bus_timeout_ms: DEFAULT_BUS_TIMEOUT_MS,
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
            bpm: 120.0,
            key: "C".to_string(),
            fft_size: 2048,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            master_volume: 0.8,
        }
    }
}

impl EngineConfig {
    /// Activation timeout as a `Duration`
    pub fn activation_timeout(&self) -> Duration {
        Duration::from_millis(self.activation_timeout_ms)
    }

    /// Bus construction timeout as a `Duration`
    pub fn bus_timeout(&self) -> Duration {
        Duration::from_millis(self.bus_timeout_ms)
    }

    /// Analysis frame interval as a `Duration`
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns defaults.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("load_config: failed to parse {:?}: {}, using defaults", path, e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    let yaml = serde_yaml::to_string(config).context("serializing config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {:?}", parent))?;
    }
    std::fs::write(path, yaml).with_context(|| format!("writing config to {:?}", path))
}
