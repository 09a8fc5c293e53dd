//! Data collection from the host engine.
//!
//! The hub depends on the [`DataCollector`] trait, not on any concrete
//! engine. Hosts implement it against their engine internals; the
//! [`NullCollector`] stands in when no engine is attached and degrades to
//! default-valued snapshots, so a capture can always produce something.

use log::warn;

use sonde_types::{
    ChannelId, ChannelSnapshot, EngineSnapshot, EntityId, EntitySnapshot, ListenerId,
    ListenerSnapshot, PerformanceSnapshot,
};

/// Produces fresh snapshots of host-engine state.
///
/// Implementations must tolerate an unavailable backing engine by
/// returning default-valued snapshots rather than failing; a capture is
/// never rejected for missing data.
pub trait DataCollector: Send {
    fn collect_engine_data(&mut self) -> EngineSnapshot;
    fn collect_entity_data(&mut self, entity_id: EntityId) -> EntitySnapshot;
    fn collect_channel_data(&mut self, channel_id: ChannelId) -> ChannelSnapshot;
    fn collect_listener_data(&mut self, listener_id: ListenerId) -> ListenerSnapshot;
    fn collect_performance_data(&mut self) -> PerformanceSnapshot;

    /// Every entity id currently known to the host.
    fn entity_ids(&self) -> Vec<EntityId>;
    /// Every channel id currently known to the host.
    fn channel_ids(&self) -> Vec<ChannelId>;
    /// Every listener id currently known to the host.
    fn listener_ids(&self) -> Vec<ListenerId>;
}

/// Collector used when no engine is attached. Every snapshot comes back
/// default-valued and the id enumerations are empty.
pub struct NullCollector;

impl NullCollector {
    pub fn new() -> Self {
        warn!("no engine attached, telemetry will carry default-valued snapshots");
        Self
    }
}

impl Default for NullCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DataCollector for NullCollector {
    fn collect_engine_data(&mut self) -> EngineSnapshot {
        EngineSnapshot::default()
    }

    fn collect_entity_data(&mut self, entity_id: EntityId) -> EntitySnapshot {
        EntitySnapshot::new(entity_id)
    }

    fn collect_channel_data(&mut self, channel_id: ChannelId) -> ChannelSnapshot {
        ChannelSnapshot::new(channel_id)
    }

    fn collect_listener_data(&mut self, listener_id: ListenerId) -> ListenerSnapshot {
        ListenerSnapshot::new(listener_id)
    }

    fn collect_performance_data(&mut self) -> PerformanceSnapshot {
        PerformanceSnapshot::default()
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn channel_ids(&self) -> Vec<ChannelId> {
        Vec::new()
    }

    fn listener_ids(&self) -> Vec<ListenerId> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_collector_always_produces_snapshots() {
        let mut collector = NullCollector;
        let engine = collector.collect_engine_data();
        assert!(!engine.is_initialized);

        let entity = collector.collect_entity_data(42);
        assert_eq!(entity.entity_id, 42);

        assert!(collector.entity_ids().is_empty());
        assert!(collector.channel_ids().is_empty());
        assert!(collector.listener_ids().is_empty());
    }
}
