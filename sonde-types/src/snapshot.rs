//! Snapshot records: one immutable value per captured slice of engine state.
//!
//! Every snapshot carries a [`SnapshotMeta`] assigned at construction time.
//! Message ids come from a process-wide counter, so ordering by id is the
//! authoritative creation order across all categories and threads.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{Category, ChannelId, EntityId, ListenerId, Priority, Vec3};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Metadata shared by every snapshot kind.
///
/// The message id and timestamp are fixed when the value is built, not when
/// it is enqueued or sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub timestamp: SystemTime,
    pub message_id: u64,
    pub category: Category,
    pub priority: Priority,
}

impl SnapshotMeta {
    /// Stamp a new metadata record: fresh timestamp, next process-wide id.
    pub fn new(category: Category) -> Self {
        Self {
            timestamp: SystemTime::now(),
            message_id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            category,
            priority: Priority::Normal,
        }
    }

    /// Microseconds since the Unix epoch, for the wire encoding.
    pub fn timestamp_micros(&self) -> u64 {
        self.timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// Playback state of a channel at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPlaybackState {
    #[default]
    Stopped,
    Playing,
    FadingIn,
    FadingOut,
    Paused,
}

impl ChannelPlaybackState {
    /// Numeric wire form.
    pub fn as_u8(self) -> u8 {
        match self {
            ChannelPlaybackState::Stopped => 0,
            ChannelPlaybackState::Playing => 1,
            ChannelPlaybackState::FadingIn => 2,
            ChannelPlaybackState::FadingOut => 3,
            ChannelPlaybackState::Paused => 4,
        }
    }
}

/// Engine-wide state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub meta: SnapshotMeta,

    // Engine state
    pub is_initialized: bool,
    pub engine_uptime: f64,
    pub config_file: String,

    // Object counts
    pub total_entity_count: u32,
    pub active_entity_count: u32,
    pub total_channel_count: u32,
    pub active_channel_count: u32,
    pub total_listener_count: u32,
    pub active_listener_count: u32,
    pub total_environment_count: u32,
    pub active_environment_count: u32,
    pub total_room_count: u32,
    pub active_room_count: u32,

    // Performance
    pub cpu_usage_percent: f32,
    pub memory_usage_bytes: u64,
    pub memory_peak_bytes: u64,
    pub active_voice_count: u32,
    pub max_voice_count: u32,

    // Audio device state
    pub sample_rate: u32,
    pub channel_count: u16,
    pub frame_count: u16,
    pub master_gain: f32,

    // Loaded assets
    pub loaded_sound_banks: Vec<String>,
    pub loaded_plugins: Vec<String>,
    pub asset_counts: HashMap<String, u32>,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            meta: SnapshotMeta::new(Category::ENGINE),
            is_initialized: false,
            engine_uptime: 0.0,
            config_file: String::new(),
            total_entity_count: 0,
            active_entity_count: 0,
            total_channel_count: 0,
            active_channel_count: 0,
            total_listener_count: 0,
            active_listener_count: 0,
            total_environment_count: 0,
            active_environment_count: 0,
            total_room_count: 0,
            active_room_count: 0,
            cpu_usage_percent: 0.0,
            memory_usage_bytes: 0,
            memory_peak_bytes: 0,
            active_voice_count: 0,
            max_voice_count: 0,
            sample_rate: 0,
            channel_count: 0,
            frame_count: 0,
            master_gain: 0.0,
            loaded_sound_banks: Vec::new(),
            loaded_plugins: Vec::new(),
            asset_counts: HashMap::new(),
        }
    }
}

/// Per-entity state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub meta: SnapshotMeta,

    pub entity_id: EntityId,
    pub position: Vec3,
    pub last_position: Vec3,
    pub velocity: Vec3,
    pub forward: Vec3,
    pub up: Vec3,

    // Entity audio state
    pub active_channel_count: u32,
    pub distance_to_listener: f32,
    pub obstruction: f32,
    pub occlusion: f32,
    pub directivity: f32,
    pub directivity_sharpness: f32,

    // Spatialization
    pub azimuth: f32,
    pub elevation: f32,
    pub attenuation_factor: f32,

    /// Channels currently fed by this entity.
    pub channel_ids: Vec<ChannelId>,
    /// Environment id -> effect amount.
    pub environment_effects: BTreeMap<u64, f32>,
}

impl EntitySnapshot {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            meta: SnapshotMeta::new(Category::ENTITY),
            entity_id,
            position: Vec3::ZERO,
            last_position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward: Vec3::ZERO,
            up: Vec3::ZERO,
            active_channel_count: 0,
            distance_to_listener: 0.0,
            obstruction: 0.0,
            occlusion: 0.0,
            directivity: 0.0,
            directivity_sharpness: 0.0,
            azimuth: 0.0,
            elevation: 0.0,
            attenuation_factor: 0.0,
            channel_ids: Vec::new(),
            environment_effects: BTreeMap::new(),
        }
    }
}

/// Per-channel state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub meta: SnapshotMeta,

    pub channel_id: ChannelId,
    pub playback_state: ChannelPlaybackState,
    pub source_entity_id: EntityId,

    // Playback
    pub sound_name: String,
    pub sound_bank_name: String,
    pub collection_name: String,
    /// Playback position in milliseconds.
    pub playback_position: f64,
    /// Total sound duration in milliseconds.
    pub total_duration: f64,
    pub loop_count: u32,
    pub current_loop: u32,

    pub gain: f32,

    // 3D state
    pub position: Vec3,
    pub distance_to_listener: f32,
    pub doppler_factor: f32,
    pub occlusion_factor: f32,
    pub obstruction_factor: f32,

    // Effects chain
    pub active_effects: Vec<String>,
    pub effect_parameters: HashMap<String, f32>,
}

impl ChannelSnapshot {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            meta: SnapshotMeta::new(Category::CHANNEL),
            channel_id,
            playback_state: ChannelPlaybackState::Stopped,
            source_entity_id: 0,
            sound_name: String::new(),
            sound_bank_name: String::new(),
            collection_name: String::new(),
            playback_position: 0.0,
            total_duration: 0.0,
            loop_count: 0,
            current_loop: 0,
            gain: 0.0,
            position: Vec3::ZERO,
            distance_to_listener: 0.0,
            doppler_factor: 0.0,
            occlusion_factor: 0.0,
            obstruction_factor: 0.0,
            active_effects: Vec::new(),
            effect_parameters: HashMap::new(),
        }
    }
}

/// Per-listener state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerSnapshot {
    pub meta: SnapshotMeta,

    pub listener_id: ListenerId,
    pub position: Vec3,
    pub last_position: Vec3,
    pub velocity: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub gain: f32,

    pub current_environment: String,
    pub environment_parameters: HashMap<String, f32>,
}

impl ListenerSnapshot {
    pub fn new(listener_id: ListenerId) -> Self {
        Self {
            meta: SnapshotMeta::new(Category::LISTENER),
            listener_id,
            position: Vec3::ZERO,
            last_position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward: Vec3::ZERO,
            up: Vec3::ZERO,
            gain: 0.0,
            current_environment: String::new(),
            environment_parameters: HashMap::new(),
        }
    }
}

/// Performance counters snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub meta: SnapshotMeta,

    // CPU
    pub total_cpu_usage: f32,
    pub mixer_cpu_usage: f32,
    pub dsp_cpu_usage: f32,
    pub streaming_cpu_usage: f32,

    // Memory
    pub total_allocated_memory: u64,
    pub engine_memory: u64,
    pub audio_buffer_memory: u64,
    pub asset_memory: u64,

    // Pipeline
    pub processed_samples: u32,
    pub underruns: u32,
    pub overruns: u32,
    pub latency_ms: f32,

    // Threading
    pub active_thread_count: u32,
    pub thread_cpu_usage: HashMap<String, f32>,
}

impl Default for PerformanceSnapshot {
    fn default() -> Self {
        Self {
            meta: SnapshotMeta::new(Category::PERFORMANCE),
            total_cpu_usage: 0.0,
            mixer_cpu_usage: 0.0,
            dsp_cpu_usage: 0.0,
            streaming_cpu_usage: 0.0,
            total_allocated_memory: 0,
            engine_memory: 0,
            audio_buffer_memory: 0,
            asset_memory: 0,
            processed_samples: 0,
            underruns: 0,
            overruns: 0,
            latency_ms: 0.0,
            active_thread_count: 0,
            thread_cpu_usage: HashMap::new(),
        }
    }
}

/// A discrete, named occurrence (sound triggered, bank loaded, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub meta: SnapshotMeta,

    pub event_name: String,
    pub description: String,
    pub parameters: HashMap<String, String>,
}

impl EventSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_description(name, "")
    }

    pub fn with_description(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            meta: SnapshotMeta::new(Category::EVENTS),
            event_name: name.into(),
            description: description.into(),
            parameters: HashMap::new(),
        }
    }
}

/// The closed set of snapshot kinds flowing through the pipeline.
///
/// The pipeline treats the payloads as opaque; only the wire encoder looks
/// inside, through an exhaustive match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Snapshot {
    Engine(EngineSnapshot),
    Entity(EntitySnapshot),
    Channel(ChannelSnapshot),
    Listener(ListenerSnapshot),
    Performance(PerformanceSnapshot),
    Event(EventSnapshot),
}

impl Snapshot {
    pub fn meta(&self) -> &SnapshotMeta {
        match self {
            Snapshot::Engine(s) => &s.meta,
            Snapshot::Entity(s) => &s.meta,
            Snapshot::Channel(s) => &s.meta,
            Snapshot::Listener(s) => &s.meta,
            Snapshot::Performance(s) => &s.meta,
            Snapshot::Event(s) => &s.meta,
        }
    }

    pub fn message_id(&self) -> u64 {
        self.meta().message_id
    }

    pub fn category(&self) -> Category {
        self.meta().category
    }

    pub fn priority(&self) -> Priority {
        self.meta().priority
    }

    /// Wire discriminator for this kind.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Snapshot::Engine(_) => "engine",
            Snapshot::Entity(_) => "entity",
            Snapshot::Channel(_) => "channel",
            Snapshot::Listener(_) => "listener",
            Snapshot::Performance(_) => "performance",
            Snapshot::Event(_) => "event",
        }
    }
}

impl From<EngineSnapshot> for Snapshot {
    fn from(s: EngineSnapshot) -> Self {
        Snapshot::Engine(s)
    }
}

impl From<EntitySnapshot> for Snapshot {
    fn from(s: EntitySnapshot) -> Self {
        Snapshot::Entity(s)
    }
}

impl From<ChannelSnapshot> for Snapshot {
    fn from(s: ChannelSnapshot) -> Self {
        Snapshot::Channel(s)
    }
}

impl From<ListenerSnapshot> for Snapshot {
    fn from(s: ListenerSnapshot) -> Self {
        Snapshot::Listener(s)
    }
}

impl From<PerformanceSnapshot> for Snapshot {
    fn from(s: PerformanceSnapshot) -> Self {
        Snapshot::Performance(s)
    }
}

impl From<EventSnapshot> for Snapshot {
    fn from(s: EventSnapshot) -> Self {
        Snapshot::Event(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn message_ids_are_unique_and_increasing() {
        let a = EngineSnapshot::default();
        let b = EntitySnapshot::new(1);
        let c = EventSnapshot::new("test");
        assert!(a.meta.message_id < b.meta.message_id);
        assert!(b.meta.message_id < c.meta.message_id);
    }

    #[test]
    fn message_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(|| {
                    (0..200)
                        .map(|_| EventSnapshot::new("concurrent").meta.message_id)
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            // Per-thread order is strictly increasing.
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(seen.insert(id), "duplicate message id {}", id);
            }
        }
        assert_eq!(seen.len(), 8 * 200);
    }

    #[test]
    fn kinds_carry_their_category() {
        assert_eq!(
            Snapshot::from(EngineSnapshot::default()).category(),
            Category::ENGINE
        );
        assert_eq!(
            Snapshot::from(EntitySnapshot::new(7)).category(),
            Category::ENTITY
        );
        assert_eq!(
            Snapshot::from(ChannelSnapshot::new(3)).category(),
            Category::CHANNEL
        );
        assert_eq!(
            Snapshot::from(ListenerSnapshot::new(1)).category(),
            Category::LISTENER
        );
        assert_eq!(
            Snapshot::from(PerformanceSnapshot::default()).category(),
            Category::PERFORMANCE
        );
        assert_eq!(
            Snapshot::from(EventSnapshot::new("e")).category(),
            Category::EVENTS
        );
    }

    #[test]
    fn timestamp_micros_is_nonzero() {
        let s = EngineSnapshot::default();
        assert!(s.meta.timestamp_micros() > 0);
    }
}
