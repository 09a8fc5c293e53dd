//! Wire protocol: snapshot encoding and observer commands.
//!
//! Server to client: one self-describing JSON record per snapshot, tagged
//! with a `type` discriminator. Client to server: small JSON command
//! objects. Both directions travel as text frames (see [`crate::framing`]).

use serde_json::{json, Map, Value};

use sonde_types::{Snapshot, UpdateMode};

/// Encode one snapshot as a single-line, self-describing JSON record.
///
/// Pure and infallible: every snapshot kind has a fixed field set, handled
/// exhaustively below. The common header is `timestamp` (microseconds since
/// the Unix epoch), `messageId`, `category` (raw bit flags), `priority`,
/// and the `type` discriminator.
pub fn encode_snapshot(snapshot: &Snapshot) -> String {
    let meta = snapshot.meta();
    let mut root = json!({
        "timestamp": meta.timestamp_micros(),
        "messageId": meta.message_id,
        "category": meta.category.bits(),
        "priority": meta.priority.as_u8(),
        "type": snapshot.kind_str(),
    });
    let fields = root.as_object_mut().expect("header is an object");

    match snapshot {
        Snapshot::Engine(s) => {
            fields.insert("isInitialized".into(), json!(s.is_initialized));
            fields.insert("engineUptime".into(), json!(s.engine_uptime));
            fields.insert("configFile".into(), json!(s.config_file));
            fields.insert("totalEntityCount".into(), json!(s.total_entity_count));
            fields.insert("activeEntityCount".into(), json!(s.active_entity_count));
            fields.insert("totalChannelCount".into(), json!(s.total_channel_count));
            fields.insert("activeChannelCount".into(), json!(s.active_channel_count));
            fields.insert("totalListenerCount".into(), json!(s.total_listener_count));
            fields.insert("activeListenerCount".into(), json!(s.active_listener_count));
            fields.insert("cpuUsagePercent".into(), json!(s.cpu_usage_percent));
            fields.insert("memoryUsageBytes".into(), json!(s.memory_usage_bytes));
            fields.insert("activeVoiceCount".into(), json!(s.active_voice_count));
            fields.insert("maxVoiceCount".into(), json!(s.max_voice_count));
            fields.insert("sampleRate".into(), json!(s.sample_rate));
            fields.insert("masterGain".into(), json!(s.master_gain));
        }
        Snapshot::Entity(s) => {
            fields.insert("entityId".into(), json!(s.entity_id));
            fields.insert("position".into(), json!(s.position.to_array()));
            fields.insert("velocity".into(), json!(s.velocity.to_array()));
            fields.insert("activeChannelCount".into(), json!(s.active_channel_count));
            fields.insert("distanceToListener".into(), json!(s.distance_to_listener));
            fields.insert("obstruction".into(), json!(s.obstruction));
            fields.insert("occlusion".into(), json!(s.occlusion));
        }
        Snapshot::Channel(s) => {
            fields.insert("channelId".into(), json!(s.channel_id));
            fields.insert("playbackState".into(), json!(s.playback_state.as_u8()));
            fields.insert("sourceEntityId".into(), json!(s.source_entity_id));
            fields.insert("soundName".into(), json!(s.sound_name));
            fields.insert("gain".into(), json!(s.gain));
            fields.insert("distanceToListener".into(), json!(s.distance_to_listener));
        }
        Snapshot::Listener(s) => {
            fields.insert("listenerId".into(), json!(s.listener_id));
            fields.insert("position".into(), json!(s.position.to_array()));
            fields.insert("gain".into(), json!(s.gain));
            fields.insert("currentEnvironment".into(), json!(s.current_environment));
        }
        Snapshot::Performance(s) => {
            fields.insert("totalCpuUsage".into(), json!(s.total_cpu_usage));
            fields.insert("mixerCpuUsage".into(), json!(s.mixer_cpu_usage));
            fields.insert("dspCpuUsage".into(), json!(s.dsp_cpu_usage));
            fields.insert("totalAllocatedMemory".into(), json!(s.total_allocated_memory));
            fields.insert("engineMemory".into(), json!(s.engine_memory));
            fields.insert("processedSamples".into(), json!(s.processed_samples));
            fields.insert("latencyMs".into(), json!(s.latency_ms));
        }
        Snapshot::Event(s) => {
            fields.insert("eventName".into(), json!(s.event_name));
            fields.insert("description".into(), json!(s.description));
            fields.insert("parameters".into(), json!(s.parameters));
        }
    }

    root.to_string()
}

/// A decoded telemetry record, as seen by an observer.
///
/// Observers receive the common header typed and the kind-specific fields
/// as raw JSON (the wire format is a projection of the snapshot, so a full
/// typed reconstruction is not possible on this side).
#[derive(Debug, Clone)]
pub struct WireRecord {
    pub kind: String,
    pub timestamp_micros: u64,
    pub message_id: u64,
    pub category_bits: u32,
    pub priority: u8,
    pub fields: Map<String, Value>,
}

/// Decode a received record. Returns `None` if the text is not a telemetry
/// record (bad JSON or missing header fields).
pub fn decode_record(text: &str) -> Option<WireRecord> {
    let value: Value = serde_json::from_str(text).ok()?;
    let obj = value.as_object()?;

    let kind = obj.get("type")?.as_str()?.to_string();
    let timestamp_micros = obj.get("timestamp")?.as_u64()?;
    let message_id = obj.get("messageId")?.as_u64()?;
    let category_bits = obj.get("category")?.as_u64()? as u32;
    let priority = obj.get("priority")?.as_u64()? as u8;

    Some(WireRecord {
        kind,
        timestamp_micros,
        message_id,
        category_bits,
        priority,
        fields: obj.clone(),
    })
}

/// Data an observer can request from the instrumented process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRequest {
    Engine,
    Entities,
    Channels,
    Listeners,
    Performance,
    FullState,
}

impl DataRequest {
    pub fn as_str(self) -> &'static str {
        match self {
            DataRequest::Engine => "engine",
            DataRequest::Entities => "entities",
            DataRequest::Channels => "channels",
            DataRequest::Listeners => "listeners",
            DataRequest::Performance => "performance",
            DataRequest::FullState => "full_state",
        }
    }

    pub fn parse(s: &str) -> Option<DataRequest> {
        match s {
            "engine" => Some(DataRequest::Engine),
            "entities" => Some(DataRequest::Entities),
            "channels" => Some(DataRequest::Channels),
            "listeners" => Some(DataRequest::Listeners),
            "performance" => Some(DataRequest::Performance),
            "full_state" => Some(DataRequest::FullState),
            _ => None,
        }
    }
}

/// Commands observers send to the server.
///
/// The connection layer passes inbound payloads through as opaque text;
/// this typed view is for the collaborator layer that chooses to interpret
/// them. Unrecognized payloads parse to [`ClientCommand::Unknown`] rather
/// than failing, so a misbehaving observer can never break the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// `{"command": "request", "data": "<data type>"}`
    Request(DataRequest),
    /// `{"command": "set_update_mode", "mode": "<mode>"}`
    SetUpdateMode(UpdateMode),
    /// `{"command": "ping"}`
    Ping,
    /// Anything else, carried verbatim.
    Unknown(String),
}

impl ClientCommand {
    /// Parse an inbound command payload.
    pub fn parse(text: &str) -> ClientCommand {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return ClientCommand::Unknown(text.to_string());
        };

        match value.get("command").and_then(Value::as_str) {
            Some("request") => value
                .get("data")
                .and_then(Value::as_str)
                .and_then(DataRequest::parse)
                .map(ClientCommand::Request)
                .unwrap_or_else(|| ClientCommand::Unknown(text.to_string())),
            Some("set_update_mode") => value
                .get("mode")
                .and_then(Value::as_str)
                .and_then(UpdateMode::parse)
                .map(ClientCommand::SetUpdateMode)
                .unwrap_or_else(|| ClientCommand::Unknown(text.to_string())),
            Some("ping") => ClientCommand::Ping,
            _ => ClientCommand::Unknown(text.to_string()),
        }
    }

    /// Wire form of this command.
    pub fn encode(&self) -> String {
        match self {
            ClientCommand::Request(data) => {
                json!({"command": "request", "data": data.as_str()}).to_string()
            }
            ClientCommand::SetUpdateMode(mode) => {
                json!({"command": "set_update_mode", "mode": mode.as_str()}).to_string()
            }
            ClientCommand::Ping => json!({"command": "ping"}).to_string(),
            ClientCommand::Unknown(text) => text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonde_types::{
        ChannelSnapshot, EngineSnapshot, EntitySnapshot, EventSnapshot, ListenerSnapshot,
        PerformanceSnapshot,
    };

    #[test]
    fn discriminator_roundtrip_for_all_kinds() {
        let snapshots: Vec<Snapshot> = vec![
            EngineSnapshot::default().into(),
            EntitySnapshot::new(42).into(),
            ChannelSnapshot::new(7).into(),
            ListenerSnapshot::new(1).into(),
            PerformanceSnapshot::default().into(),
            EventSnapshot::new("bank_loaded").into(),
        ];

        for snapshot in &snapshots {
            let text = encode_snapshot(snapshot);
            let record = decode_record(&text).expect("record decodes");
            assert_eq!(record.kind, snapshot.kind_str());
            assert_eq!(record.message_id, snapshot.message_id());
            assert_eq!(record.category_bits, snapshot.category().bits());
        }
    }

    #[test]
    fn encoded_record_is_single_line() {
        let text = encode_snapshot(&EngineSnapshot::default().into());
        assert!(!text.contains('\n'));
    }

    #[test]
    fn entity_fields_survive_encoding() {
        let mut entity = EntitySnapshot::new(9);
        entity.position = sonde_types::Vec3::new(1.0, 2.0, 3.0);
        entity.occlusion = 0.5;

        let record = decode_record(&encode_snapshot(&entity.into())).unwrap();
        assert_eq!(record.fields["entityId"].as_u64(), Some(9));
        assert_eq!(record.fields["position"][1].as_f64(), Some(2.0));
        assert_eq!(record.fields["occlusion"].as_f64(), Some(0.5));
    }

    #[test]
    fn command_parse_roundtrip() {
        let cmd = ClientCommand::Request(DataRequest::FullState);
        assert_eq!(ClientCommand::parse(&cmd.encode()), cmd);

        let cmd = ClientCommand::SetUpdateMode(UpdateMode::Manual);
        assert_eq!(ClientCommand::parse(&cmd.encode()), cmd);

        assert_eq!(ClientCommand::parse(r#"{"command":"ping"}"#), ClientCommand::Ping);
    }

    #[test]
    fn malformed_commands_are_unknown_not_errors() {
        assert!(matches!(
            ClientCommand::parse("not json at all"),
            ClientCommand::Unknown(_)
        ));
        assert!(matches!(
            ClientCommand::parse(r#"{"command":"request","data":"everything"}"#),
            ClientCommand::Unknown(_)
        ));
    }

    #[test]
    fn decode_rejects_non_records() {
        assert!(decode_record("junk").is_none());
        assert!(decode_record(r#"{"type":"engine"}"#).is_none());
    }
}
