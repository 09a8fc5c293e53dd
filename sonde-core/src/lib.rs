//! # sonde-core
//!
//! Orchestration layer of the Sonde telemetry pipeline: configuration,
//! the bounded message queue, data collection, and the process-wide
//! [`TelemetryHub`] that captures, schedules, and distributes snapshots.

pub mod collector;
pub mod config;
pub mod hub;
pub mod logging;
pub mod pool;
pub mod queue;

pub use collector::{DataCollector, NullCollector};
pub use config::{ConfigError, LogLevel, ProfilerConfig};
pub use hub::{HubError, HubStats, TelemetryHub};
pub use pool::{MessagePool, PoolStats};
pub use queue::MessageQueue;
