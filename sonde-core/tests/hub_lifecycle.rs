//! Lifecycle and capture-gating tests for the telemetry hub.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sonde_core::hub::{HubError, TelemetryHub};
use sonde_core::ProfilerConfig;
use sonde_types::{Category, EventSnapshot, Snapshot, UpdateMode};

/// Config for a hub that runs without a network server.
fn local_config(mode: UpdateMode) -> ProfilerConfig {
    ProfilerConfig {
        enable_networking: false,
        update_mode: mode,
        ..Default::default()
    }
}

/// Register a callback that collects distributed snapshot kinds.
fn collect_kinds(hub: &TelemetryHub) -> Arc<Mutex<Vec<&'static str>>> {
    let kinds: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kinds);
    hub.register_message_callback(move |snapshot: &Snapshot| {
        sink.lock().unwrap().push(snapshot.kind_str());
    });
    kinds
}

#[test]
fn test_invalid_config_is_rejected_without_starting() {
    let hub = TelemetryHub::new();
    let config = ProfilerConfig {
        enable_networking: true,
        server_port: 0,
        ..Default::default()
    };

    assert!(matches!(hub.initialize(config), Err(HubError::Config(_))));
    assert!(!hub.is_initialized());
    assert!(!hub.is_network_server_running());
}

#[test]
fn test_initialize_and_deinitialize_are_idempotent() {
    let hub = TelemetryHub::new();
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();
    assert!(hub.is_initialized());
    assert!(hub.is_enabled());

    // Second initialize is idempotent success.
    assert!(hub.initialize(local_config(UpdateMode::Manual)).is_ok());

    hub.deinitialize();
    assert!(!hub.is_initialized());

    // Second deinitialize is a no-op, same end state.
    hub.deinitialize();
    assert!(!hub.is_initialized());

    // The hub is restartable after teardown.
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();
    assert!(hub.is_initialized());
    hub.deinitialize();
}

#[test]
fn test_masked_category_capture_is_a_noop() {
    let hub = TelemetryHub::new();
    let mut config = local_config(UpdateMode::Manual);
    config.category_mask =
        Category::from_bits(Category::ALL.bits() & !Category::CHANNEL.bits());
    hub.initialize(config).unwrap();

    let kinds = collect_kinds(&hub);

    hub.capture_channel_state(1);
    assert_eq!(hub.queued_messages(), 0);
    std::thread::sleep(Duration::from_millis(50));
    assert!(kinds.lock().unwrap().is_empty());

    // Unmasked categories still flow.
    hub.capture_event(EventSnapshot::new("still_alive"));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(kinds.lock().unwrap().as_slice(), &["event"]);

    hub.deinitialize();
}

#[test]
fn test_disabled_hub_captures_nothing() {
    let hub = TelemetryHub::new();
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();
    let kinds = collect_kinds(&hub);

    hub.set_enabled(false);
    hub.capture_event(EventSnapshot::new("dropped"));
    hub.capture_engine_state();
    std::thread::sleep(Duration::from_millis(50));
    assert!(kinds.lock().unwrap().is_empty());

    hub.set_enabled(true);
    hub.capture_event(EventSnapshot::new("kept"));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(kinds.lock().unwrap().len(), 1);

    hub.deinitialize();
}

#[test]
fn test_manual_mode_only_explicit_captures() {
    let hub = TelemetryHub::new();
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();
    let kinds = collect_kinds(&hub);

    // The loop runs but captures nothing on its own.
    std::thread::sleep(Duration::from_millis(100));
    assert!(kinds.lock().unwrap().is_empty());

    hub.capture_event(EventSnapshot::new("manual"));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(kinds.lock().unwrap().as_slice(), &["event"]);

    hub.deinitialize();
}

#[test]
fn test_timed_mode_captures_automatically() {
    let hub = TelemetryHub::new();
    let mut config = local_config(UpdateMode::Timed);
    config.update_frequency_hz = 100.0;
    hub.initialize(config).unwrap();
    let kinds = collect_kinds(&hub);

    std::thread::sleep(Duration::from_millis(300));
    hub.deinitialize();

    let kinds = kinds.lock().unwrap();
    // With no engine attached, a full capture is engine + performance.
    let engines = kinds.iter().filter(|k| **k == "engine").count();
    let perfs = kinds.iter().filter(|k| **k == "performance").count();
    assert!(engines >= 5, "expected several engine captures, got {}", engines);
    assert_eq!(engines, perfs);
}

#[test]
fn test_update_config_rejects_invalid_and_keeps_old() {
    let hub = TelemetryHub::new();
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();

    let bad = ProfilerConfig {
        update_frequency_hz: 0.0,
        ..local_config(UpdateMode::Timed)
    };
    assert!(matches!(hub.update_config(bad), Err(HubError::Config(_))));
    assert_eq!(hub.config().update_mode, UpdateMode::Manual);
    assert_eq!(hub.config().update_frequency_hz, 30.0);

    hub.deinitialize();
}

#[test]
fn test_set_update_frequency_refuses_out_of_range() {
    let hub = TelemetryHub::new();
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();

    hub.set_update_frequency(0.0);
    assert_eq!(hub.config().update_frequency_hz, 30.0);
    hub.set_update_frequency(60.0);
    assert_eq!(hub.config().update_frequency_hz, 60.0);

    hub.deinitialize();
}

#[test]
fn test_stats_track_distribution() {
    let hub = TelemetryHub::new();
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();

    hub.capture_event(EventSnapshot::new("one"));
    hub.capture_event(EventSnapshot::new("two"));
    std::thread::sleep(Duration::from_millis(100));

    let stats = hub.stats();
    assert_eq!(stats.messages_sent, 2);
    // Networking is off, so nothing was transmitted.
    assert_eq!(stats.bytes_transmitted, 0);
    assert_eq!(stats.active_clients, 0);

    hub.reset_stats();
    assert_eq!(hub.stats().messages_sent, 0);

    hub.deinitialize();
}

#[test]
fn test_pool_stats_return_to_zero_after_distribution() {
    let hub = TelemetryHub::new();
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();

    hub.capture_event(EventSnapshot::new("tracked"));
    std::thread::sleep(Duration::from_millis(100));

    let pool = hub.pool_stats();
    assert_eq!(pool.live, 0);
    assert_eq!(pool.total_allocations, 1);
    assert!(pool.peak >= 1);

    hub.deinitialize();
}

#[test]
fn test_unregister_message_callback_stops_delivery() {
    let hub = TelemetryHub::new();
    hub.initialize(local_config(UpdateMode::Manual)).unwrap();
    let kinds = collect_kinds(&hub);

    hub.capture_event(EventSnapshot::new("seen"));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(kinds.lock().unwrap().len(), 1);

    hub.unregister_message_callback();
    hub.capture_event(EventSnapshot::new("unseen"));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(kinds.lock().unwrap().len(), 1);

    hub.deinitialize();
}
