//! Profiler configuration: defaults, TOML file round-trip, and validation.
//!
//! `load` fills missing keys with defaults and does not validate; callers
//! validate at the point of use (`TelemetryHub::initialize` and
//! `update_config` refuse invalid configurations outright, they never
//! clamp).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sonde_types::{
    Category, UpdateMode, DEFAULT_MAX_CLIENTS, DEFAULT_MESSAGE_BUFFER_SIZE, DEFAULT_SERVER_PORT,
};

/// Log verbosity requested in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Mapping onto the `log` facade's filter levels.
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => log::LevelFilter::Error,
        }
    }
}

/// Errors produced by configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("could not write config file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid server port 0 (networking is enabled)")]
    InvalidPort,
    #[error("invalid max clients {0} (must be 1-{DEFAULT_MAX_CLIENTS})")]
    InvalidMaxClients(u32),
    #[error("bind address cannot be empty when networking is enabled")]
    EmptyBindAddress,
    #[error("invalid update frequency {0} Hz (must be 0.1-1000)")]
    InvalidUpdateFrequency(f32),
    #[error("invalid max messages per frame {0} (must be 1-10000)")]
    InvalidMaxMessagesPerFrame(u32),
    #[error("message buffer size {0} too small (minimum 1024 bytes)")]
    MessageBufferTooSmall(u32),
    #[error("invalid max queued messages {0} (must be 1-100000)")]
    InvalidMaxQueuedMessages(u32),
    #[error("invalid position change threshold {0} (must be 0-1000)")]
    InvalidPositionThreshold(f32),
    #[error("invalid orientation change threshold {0} (must be 0-\u{3c0} radians)")]
    InvalidOrientationThreshold(f32),
    #[error("invalid parameter change threshold {0} (must be 0-1)")]
    InvalidParameterThreshold(f32),
    #[error("log file path cannot be empty when logging is enabled")]
    EmptyLogFilePath,
}

/// Full configuration surface of the telemetry subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    // Network settings
    pub enable_networking: bool,
    pub server_port: u16,
    pub max_clients: u32,
    pub bind_address: String,

    // Update settings
    pub update_mode: UpdateMode,
    pub update_frequency_hz: f32,
    /// Upper bound on messages distributed per scheduling-loop iteration.
    pub max_messages_per_frame: u32,

    // Data capture settings
    pub category_mask: Category,
    pub capture_engine_state: bool,
    pub capture_entity_states: bool,
    pub capture_channel_states: bool,
    pub capture_listener_states: bool,
    pub capture_performance_metrics: bool,
    pub capture_events: bool,

    // Performance settings
    pub message_buffer_size: u32,
    pub max_queued_messages: u32,
    pub use_compression_for_network: bool,

    // Change-detection thresholds (on_change mode)
    /// Minimum position delta (world units) considered a change.
    pub position_change_threshold: f32,
    /// Minimum orientation delta (radians) considered a change.
    pub orientation_change_threshold: f32,
    /// Minimum relative parameter delta considered a change.
    pub parameter_change_threshold: f32,

    // Debug settings
    pub enable_logging: bool,
    pub logging_level: LogLevel,
    pub log_file_path: String,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enable_networking: true,
            server_port: DEFAULT_SERVER_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            bind_address: String::from("127.0.0.1"),
            update_mode: UpdateMode::Timed,
            update_frequency_hz: 30.0,
            max_messages_per_frame: 100,
            category_mask: Category::ALL,
            capture_engine_state: true,
            capture_entity_states: true,
            capture_channel_states: true,
            capture_listener_states: true,
            capture_performance_metrics: true,
            capture_events: true,
            message_buffer_size: DEFAULT_MESSAGE_BUFFER_SIZE,
            max_queued_messages: 1000,
            use_compression_for_network: false,
            position_change_threshold: 0.01,     // 1 cm
            orientation_change_threshold: 0.017453, // ~1 degree
            parameter_change_threshold: 0.01,    // 1%
            enable_logging: false,
            logging_level: LogLevel::Debug,
            log_file_path: String::from("sonde_profiler.log"),
        }
    }
}

impl ProfilerConfig {
    /// Load a configuration from a TOML file. Missing keys fall back to
    /// their defaults; unknown keys are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<ProfilerConfig, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: ProfilerConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        log::info!("configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save this configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).expect("config serializes");
        std::fs::write(path, contents).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
        log::info!("configuration saved to {}", path.display());
        Ok(())
    }

    /// Check every bound. Returns the first violation; never clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enable_networking {
            if self.server_port == 0 {
                return Err(ConfigError::InvalidPort);
            }
            if self.max_clients == 0 || self.max_clients > DEFAULT_MAX_CLIENTS {
                return Err(ConfigError::InvalidMaxClients(self.max_clients));
            }
            if self.bind_address.is_empty() {
                return Err(ConfigError::EmptyBindAddress);
            }
        }

        if !(0.1..=1000.0).contains(&self.update_frequency_hz) {
            return Err(ConfigError::InvalidUpdateFrequency(self.update_frequency_hz));
        }
        if self.max_messages_per_frame == 0 || self.max_messages_per_frame > 10_000 {
            return Err(ConfigError::InvalidMaxMessagesPerFrame(
                self.max_messages_per_frame,
            ));
        }

        if self.message_buffer_size < 1024 {
            return Err(ConfigError::MessageBufferTooSmall(self.message_buffer_size));
        }
        if self.max_queued_messages == 0 || self.max_queued_messages > 100_000 {
            return Err(ConfigError::InvalidMaxQueuedMessages(
                self.max_queued_messages,
            ));
        }

        if !(0.0..=1000.0).contains(&self.position_change_threshold) {
            return Err(ConfigError::InvalidPositionThreshold(
                self.position_change_threshold,
            ));
        }
        if !(0.0..=std::f32::consts::PI).contains(&self.orientation_change_threshold) {
            return Err(ConfigError::InvalidOrientationThreshold(
                self.orientation_change_threshold,
            ));
        }
        if !(0.0..=1.0).contains(&self.parameter_change_threshold) {
            return Err(ConfigError::InvalidParameterThreshold(
                self.parameter_change_threshold,
            ));
        }

        if self.enable_logging && self.log_file_path.is_empty() {
            return Err(ConfigError::EmptyLogFilePath);
        }

        Ok(())
    }
}
