//! Optional file logging, driven by the profiler configuration.
//!
//! Library code only emits through the `log` facade; hosts that want the
//! profiler's own log file call [`init_from_config`] once at startup.

use std::fs::File;

use log::warn;
use simplelog::WriteLogger;

use crate::config::{ConfigError, ProfilerConfig};

/// Install a file logger according to the configuration's debug settings.
///
/// Returns `Ok(true)` when a logger was installed, `Ok(false)` when
/// logging is disabled in the configuration or another logger is already
/// installed (the existing logger wins).
pub fn init_from_config(config: &ProfilerConfig) -> Result<bool, ConfigError> {
    if !config.enable_logging {
        return Ok(false);
    }

    let file = File::create(&config.log_file_path).map_err(|e| ConfigError::Write {
        path: config.log_file_path.clone(),
        source: e,
    })?;

    match WriteLogger::init(
        config.logging_level.to_level_filter(),
        simplelog::Config::default(),
        file,
    ) {
        Ok(()) => {
            log::info!(
                "profiler logging to {} (level: {:?})",
                config.log_file_path,
                config.logging_level
            );
            Ok(true)
        }
        Err(_) => {
            warn!("a logger is already installed, keeping it");
            Ok(false)
        }
    }
}
