//! # sonde-types
//!
//! Shared type definitions for the Sonde telemetry ecosystem.
//! This crate contains the snapshot data model used across sonde-core and
//! sonde-net, plus the small value types (ids, categories, vectors) that
//! travel with it.

mod category;
mod math;
pub mod snapshot;

pub use category::{Category, Priority, UpdateMode};
pub use math::Vec3;
pub use snapshot::{
    ChannelPlaybackState, ChannelSnapshot, EngineSnapshot, EntitySnapshot, EventSnapshot,
    ListenerSnapshot, PerformanceSnapshot, Snapshot, SnapshotMeta,
};

/// Unique identifier for a sound-emitting entity in the host engine.
pub type EntityId = u64;

/// Unique identifier for a playback channel in the host engine.
pub type ChannelId = u64;

/// Unique identifier for a listener in the host engine.
pub type ListenerId = u64;

/// Unique identifier for a connected observer client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(u32);

impl ClientId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default TCP port the telemetry server binds to.
pub const DEFAULT_SERVER_PORT: u16 = 27002;

/// Default maximum number of concurrently connected observer clients.
pub const DEFAULT_MAX_CLIENTS: u32 = 8;

/// Default size of the outgoing message buffer, in bytes (1 MiB).
pub const DEFAULT_MESSAGE_BUFFER_SIZE: u32 = 1024 * 1024;
