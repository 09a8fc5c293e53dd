//! The telemetry hub: process-wide orchestrator of the capture pipeline.
//!
//! Owns the configuration, the bounded message queue, the data collector,
//! and the network server, and runs the background scheduling loop that
//! drains the queue and fans messages out to the local subscriber and to
//! connected observers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use thiserror::Error;

use sonde_net::protocol::{encode_snapshot, ClientCommand, DataRequest};
use sonde_net::server::{ServerError, TelemetryServer};
use sonde_types::{
    Category, ChannelId, ChannelSnapshot, EntityId, EntitySnapshot, EventSnapshot, ListenerId,
    ListenerSnapshot, Snapshot, UpdateMode,
};

use crate::collector::{DataCollector, NullCollector};
use crate::config::{ConfigError, ProfilerConfig};
use crate::pool::MessagePool;
use crate::queue::MessageQueue;

/// How long the scheduling loop yields between iterations.
const LOOP_TICK: Duration = Duration::from_millis(1);

/// Errors surfaced by hub lifecycle operations.
#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start network server: {0}")]
    Network(#[from] ServerError),
}

/// Aggregate distribution statistics.
#[derive(Debug, Clone, Default)]
pub struct HubStats {
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub bytes_transmitted: u64,
    pub average_message_size: f32,
    /// Messages distributed per second over the last measuring window.
    pub current_update_rate: f32,
    pub active_clients: u32,
}

type MessageCallback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Last-known states for on_change diffing, keyed per id.
#[derive(Default)]
struct ChangeCaches {
    entities: HashMap<EntityId, EntitySnapshot>,
    channels: HashMap<ChannelId, ChannelSnapshot>,
    listeners: HashMap<ListenerId, ListenerSnapshot>,
}

/// Change thresholds copied out of the configuration for one diff pass.
#[derive(Clone, Copy)]
struct Thresholds {
    position: f32,
    orientation: f32,
    parameter: f32,
}

/// Relative delta with a floor on the denominator, so parameters near
/// zero still compare sanely.
fn rel_delta(old: f32, new: f32) -> f32 {
    (new - old).abs() / old.abs().max(1e-3)
}

fn entity_changed(old: &EntitySnapshot, new: &EntitySnapshot, t: Thresholds) -> bool {
    old.position.distance(new.position) > t.position
        || old.forward.angle_between(new.forward) > t.orientation
        || rel_delta(old.occlusion, new.occlusion) > t.parameter
        || rel_delta(old.obstruction, new.obstruction) > t.parameter
}

fn channel_changed(old: &ChannelSnapshot, new: &ChannelSnapshot, t: Thresholds) -> bool {
    old.playback_state != new.playback_state
        || rel_delta(old.gain, new.gain) > t.parameter
        || rel_delta(
            old.playback_position as f32,
            new.playback_position as f32,
        ) > t.parameter
}

fn listener_changed(old: &ListenerSnapshot, new: &ListenerSnapshot, t: Thresholds) -> bool {
    old.position.distance(new.position) > t.position
        || old.forward.angle_between(new.forward) > t.orientation
        || rel_delta(old.gain, new.gain) > t.parameter
}

struct HubInner {
    initialized: AtomicBool,
    enabled: AtomicBool,
    running: AtomicBool,
    config: Mutex<ProfilerConfig>,
    queue: Mutex<Arc<MessageQueue>>,
    pool: MessagePool,
    collector: Mutex<Option<Box<dyn DataCollector>>>,
    server: Mutex<Option<Arc<TelemetryServer>>>,
    stats: Mutex<HubStats>,
    callback: Mutex<Option<MessageCallback>>,
    caches: Mutex<ChangeCaches>,
    loop_thread: Mutex<Option<JoinHandle<()>>>,
}

impl HubInner {
    fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            running: AtomicBool::new(false),
            config: Mutex::new(ProfilerConfig::default()),
            queue: Mutex::new(Arc::new(MessageQueue::new(1000))),
            pool: MessagePool::new(),
            collector: Mutex::new(None),
            server: Mutex::new(None),
            stats: Mutex::new(HubStats::default()),
            callback: Mutex::new(None),
            caches: Mutex::new(ChangeCaches::default()),
            loop_thread: Mutex::new(None),
        }
    }

    fn should_capture(&self, category: Category) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }
        self.config.lock().unwrap().category_mask.contains(category)
    }

    fn current_queue(&self) -> Arc<MessageQueue> {
        self.queue.lock().unwrap().clone()
    }

    fn current_server(&self) -> Option<Arc<TelemetryServer>> {
        self.server.lock().unwrap().clone()
    }

    fn enqueue(&self, snapshot: Snapshot) {
        self.pool.note_allocated();
        if !self.current_queue().push(snapshot) {
            self.pool.note_released();
            self.stats.lock().unwrap().messages_dropped += 1;
            warn!("message queue full, dropping message");
        }
    }

    // Capture operations. Each is a no-op when capture is disabled or the
    // category is masked out; collection failures cannot happen (the
    // collector degrades to default-valued snapshots).

    fn capture_engine_state(&self) {
        if !self.should_capture(Category::ENGINE) {
            return;
        }
        let snapshot = {
            let mut collector = self.collector.lock().unwrap();
            match collector.as_mut() {
                Some(c) => c.collect_engine_data(),
                None => return,
            }
        };
        self.enqueue(snapshot.into());
    }

    fn capture_entity_state(&self, entity_id: EntityId) {
        if !self.should_capture(Category::ENTITY) {
            return;
        }
        let snapshot = {
            let mut collector = self.collector.lock().unwrap();
            match collector.as_mut() {
                Some(c) => c.collect_entity_data(entity_id),
                None => return,
            }
        };
        self.enqueue(snapshot.into());
    }

    fn capture_channel_state(&self, channel_id: ChannelId) {
        if !self.should_capture(Category::CHANNEL) {
            return;
        }
        let snapshot = {
            let mut collector = self.collector.lock().unwrap();
            match collector.as_mut() {
                Some(c) => c.collect_channel_data(channel_id),
                None => return,
            }
        };
        self.enqueue(snapshot.into());
    }

    fn capture_listener_state(&self, listener_id: ListenerId) {
        if !self.should_capture(Category::LISTENER) {
            return;
        }
        let snapshot = {
            let mut collector = self.collector.lock().unwrap();
            match collector.as_mut() {
                Some(c) => c.collect_listener_data(listener_id),
                None => return,
            }
        };
        self.enqueue(snapshot.into());
    }

    fn capture_performance_metrics(&self) {
        if !self.should_capture(Category::PERFORMANCE) {
            return;
        }
        let snapshot = {
            let mut collector = self.collector.lock().unwrap();
            match collector.as_mut() {
                Some(c) => c.collect_performance_data(),
                None => return,
            }
        };
        self.enqueue(snapshot.into());
    }

    fn capture_event(&self, event: EventSnapshot) {
        if !self.should_capture(Category::EVENTS) {
            return;
        }
        self.enqueue(event.into());
    }

    fn capture_all_entities(&self) {
        if !self.should_capture(Category::ENTITY) {
            return;
        }
        let ids = {
            let collector = self.collector.lock().unwrap();
            match collector.as_ref() {
                Some(c) => c.entity_ids(),
                None => return,
            }
        };
        for id in ids {
            self.capture_entity_state(id);
        }
    }

    fn capture_all_channels(&self) {
        if !self.should_capture(Category::CHANNEL) {
            return;
        }
        let ids = {
            let collector = self.collector.lock().unwrap();
            match collector.as_ref() {
                Some(c) => c.channel_ids(),
                None => return,
            }
        };
        for id in ids {
            self.capture_channel_state(id);
        }
    }

    fn capture_all_listeners(&self) {
        if !self.should_capture(Category::LISTENER) {
            return;
        }
        let ids = {
            let collector = self.collector.lock().unwrap();
            match collector.as_ref() {
                Some(c) => c.listener_ids(),
                None => return,
            }
        };
        for id in ids {
            self.capture_listener_state(id);
        }
    }

    fn capture_full_state(&self) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        self.capture_engine_state();
        self.capture_all_entities();
        self.capture_all_channels();
        self.capture_all_listeners();
        self.capture_performance_metrics();
    }

    /// Full capture honoring the per-category configuration toggles, used
    /// by the timed and per_frame modes.
    fn collect_timed_updates(&self) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }

        let (engine, entities, channels, listeners, performance) = {
            let cfg = self.config.lock().unwrap();
            (
                cfg.capture_engine_state,
                cfg.capture_entity_states,
                cfg.capture_channel_states,
                cfg.capture_listener_states,
                cfg.capture_performance_metrics,
            )
        };

        if engine {
            self.capture_engine_state();
        }
        if entities {
            self.capture_all_entities();
        }
        if channels {
            self.capture_all_channels();
        }
        if listeners {
            self.capture_all_listeners();
        }
        if performance {
            self.capture_performance_metrics();
        }
    }

    /// Diff entities/channels/listeners against the last-known caches and
    /// enqueue only the ones that moved beyond the thresholds. Engine and
    /// performance data have no per-id diff; they follow the timed
    /// interval (`interval_elapsed`).
    fn collect_on_change_updates(&self, interval_elapsed: bool) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }

        let (thresholds, entities, channels, listeners, engine, performance) = {
            let cfg = self.config.lock().unwrap();
            (
                Thresholds {
                    position: cfg.position_change_threshold,
                    orientation: cfg.orientation_change_threshold,
                    parameter: cfg.parameter_change_threshold,
                },
                cfg.capture_entity_states,
                cfg.capture_channel_states,
                cfg.capture_listener_states,
                cfg.capture_engine_state,
                cfg.capture_performance_metrics,
            )
        };

        if entities && self.should_capture(Category::ENTITY) {
            let ids = {
                let collector = self.collector.lock().unwrap();
                collector.as_ref().map(|c| c.entity_ids()).unwrap_or_default()
            };
            for id in ids {
                let snapshot = {
                    let mut collector = self.collector.lock().unwrap();
                    match collector.as_mut() {
                        Some(c) => c.collect_entity_data(id),
                        None => return,
                    }
                };
                let significant = {
                    let caches = self.caches.lock().unwrap();
                    caches
                        .entities
                        .get(&id)
                        .map(|old| entity_changed(old, &snapshot, thresholds))
                        .unwrap_or(true)
                };
                if significant {
                    self.caches
                        .lock()
                        .unwrap()
                        .entities
                        .insert(id, snapshot.clone());
                    self.enqueue(snapshot.into());
                }
            }
        }

        if channels && self.should_capture(Category::CHANNEL) {
            let ids = {
                let collector = self.collector.lock().unwrap();
                collector.as_ref().map(|c| c.channel_ids()).unwrap_or_default()
            };
            for id in ids {
                let snapshot = {
                    let mut collector = self.collector.lock().unwrap();
                    match collector.as_mut() {
                        Some(c) => c.collect_channel_data(id),
                        None => return,
                    }
                };
                let significant = {
                    let caches = self.caches.lock().unwrap();
                    caches
                        .channels
                        .get(&id)
                        .map(|old| channel_changed(old, &snapshot, thresholds))
                        .unwrap_or(true)
                };
                if significant {
                    self.caches
                        .lock()
                        .unwrap()
                        .channels
                        .insert(id, snapshot.clone());
                    self.enqueue(snapshot.into());
                }
            }
        }

        if listeners && self.should_capture(Category::LISTENER) {
            let ids = {
                let collector = self.collector.lock().unwrap();
                collector.as_ref().map(|c| c.listener_ids()).unwrap_or_default()
            };
            for id in ids {
                let snapshot = {
                    let mut collector = self.collector.lock().unwrap();
                    match collector.as_mut() {
                        Some(c) => c.collect_listener_data(id),
                        None => return,
                    }
                };
                let significant = {
                    let caches = self.caches.lock().unwrap();
                    caches
                        .listeners
                        .get(&id)
                        .map(|old| listener_changed(old, &snapshot, thresholds))
                        .unwrap_or(true)
                };
                if significant {
                    self.caches
                        .lock()
                        .unwrap()
                        .listeners
                        .insert(id, snapshot.clone());
                    self.enqueue(snapshot.into());
                }
            }
        }

        if interval_elapsed {
            if engine {
                self.capture_engine_state();
            }
            if performance {
                self.capture_performance_metrics();
            }
        }
    }

    /// Drain up to `max` queued messages and distribute each. Returns the
    /// number distributed.
    fn process_queued(&self, max: usize) -> u64 {
        let batch = self.current_queue().pop_batch(max);
        let count = batch.len() as u64;
        for snapshot in &batch {
            self.distribute(snapshot);
        }
        count
    }

    /// Deliver one snapshot: local callback first (raw value), then the
    /// encoded broadcast to connected observers.
    fn distribute(&self, snapshot: &Snapshot) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(snapshot);
        }

        let mut sent_bytes = 0u64;
        if let Some(server) = self.current_server() {
            let text = encode_snapshot(snapshot);
            let sent = server.broadcast(&text);
            sent_bytes = sent as u64 * text.len() as u64;
        }

        {
            let mut stats = self.stats.lock().unwrap();
            stats.messages_sent += 1;
            stats.bytes_transmitted += sent_bytes;
            if stats.messages_sent > 0 {
                stats.average_message_size =
                    stats.bytes_transmitted as f32 / stats.messages_sent as f32;
            }
        }
        self.pool.note_released();
    }

    fn start_network_server(self: &Arc<Self>) -> Result<(), ServerError> {
        {
            let server = self.server.lock().unwrap();
            if let Some(server) = server.as_ref() {
                if server.is_running() {
                    warn!("network server already running");
                    return Ok(());
                }
            }
        }

        let (port, bind_address, max_clients) = {
            let cfg = self.config.lock().unwrap();
            (cfg.server_port, cfg.bind_address.clone(), cfg.max_clients)
        };

        let server = Arc::new(TelemetryServer::new());
        server.set_on_client_connected(|id, info| {
            info!("observer {} connected from {}:{}", id, info.address, info.port);
        });
        server.set_on_client_disconnected(|id, _info| {
            info!("observer {} disconnected", id);
        });
        server.set_on_error(|message| {
            error!("network server error: {}", message);
        });

        // Inbound commands are interpreted here, above the pass-through
        // connection layer.
        let weak: Weak<HubInner> = Arc::downgrade(self);
        server.set_on_message_received(move |client_id, payload| {
            let Some(inner) = weak.upgrade() else { return };
            match ClientCommand::parse(payload) {
                ClientCommand::Request(DataRequest::Engine) => inner.capture_engine_state(),
                ClientCommand::Request(DataRequest::Entities) => inner.capture_all_entities(),
                ClientCommand::Request(DataRequest::Channels) => inner.capture_all_channels(),
                ClientCommand::Request(DataRequest::Listeners) => inner.capture_all_listeners(),
                ClientCommand::Request(DataRequest::Performance) => {
                    inner.capture_performance_metrics()
                }
                ClientCommand::Request(DataRequest::FullState) => inner.capture_full_state(),
                ClientCommand::SetUpdateMode(mode) => inner.set_update_mode(mode),
                ClientCommand::Ping => {
                    if let Some(server) = inner.current_server() {
                        server.send_to(client_id, r#"{"type":"pong"}"#);
                    }
                }
                ClientCommand::Unknown(text) => {
                    debug!("unhandled command from observer {}: {}", client_id, text);
                }
            }
        });

        server.start(port, &bind_address, max_clients)?;
        *self.server.lock().unwrap() = Some(server);
        info!("network server started on {}:{}", bind_address, port);
        Ok(())
    }

    fn stop_network_server(&self) {
        let server = self.server.lock().unwrap().take();
        if let Some(server) = server {
            server.stop();
            info!("network server stopped");
        }
    }

    fn set_update_mode(&self, mode: UpdateMode) {
        self.config.lock().unwrap().update_mode = mode;
    }
}

/// Background scheduling loop: capture per the active mode, then drain a
/// bounded batch and distribute it. Exits when the running flag clears.
fn run_loop(inner: Arc<HubInner>) {
    debug!("update loop started");

    let mut last_update = Instant::now();
    let mut window_start = Instant::now();
    let mut window_count: u64 = 0;

    while inner.running.load(Ordering::Acquire) {
        let (mode, interval, max_per_frame) = {
            let cfg = inner.config.lock().unwrap();
            (
                cfg.update_mode,
                Duration::from_secs_f32(1.0 / cfg.update_frequency_hz),
                cfg.max_messages_per_frame as usize,
            )
        };

        let due = last_update.elapsed() >= interval;
        match mode {
            UpdateMode::Timed => {
                if due {
                    inner.collect_timed_updates();
                    last_update = Instant::now();
                }
            }
            UpdateMode::PerFrame => {
                inner.collect_timed_updates();
                last_update = Instant::now();
            }
            UpdateMode::OnChange => {
                inner.collect_on_change_updates(due);
                if due {
                    last_update = Instant::now();
                }
            }
            UpdateMode::Manual => {}
        }

        window_count += inner.process_queued(max_per_frame);

        let elapsed = window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let rate = window_count as f32 / elapsed.as_secs_f32();
            inner.stats.lock().unwrap().current_update_rate = rate;
            window_start = Instant::now();
            window_count = 0;
        }

        thread::sleep(LOOP_TICK);
    }

    debug!("update loop stopped");
}

/// Orchestrator of the telemetry pipeline.
///
/// One hub exists per process, reachable through [`TelemetryHub::instance`];
/// `new` is public so embedders and tests can run an isolated pipeline.
pub struct TelemetryHub {
    inner: Arc<HubInner>,
}

static INSTANCE: OnceLock<TelemetryHub> = OnceLock::new();

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner::new()),
        }
    }

    /// The process-wide hub, created lazily on first access.
    pub fn instance() -> &'static TelemetryHub {
        INSTANCE.get_or_init(TelemetryHub::new)
    }

    /// Validate the configuration and bring the pipeline up: collector,
    /// network server (when enabled), and the scheduling loop.
    ///
    /// Idempotent success when already initialized. Nothing is started if
    /// validation fails; a network start failure leaves the hub
    /// uninitialized and restartable.
    pub fn initialize(&self, config: ProfilerConfig) -> Result<(), HubError> {
        self.initialize_with_collector(config, Box::new(NullCollector::new()))
    }

    /// Initialize with a host-provided collector.
    pub fn initialize_with_collector(
        &self,
        config: ProfilerConfig,
        collector: Box<dyn DataCollector>,
    ) -> Result<(), HubError> {
        if self.inner.initialized.load(Ordering::Acquire) {
            warn!("telemetry hub already initialized");
            return Ok(());
        }

        config.validate()?;

        let enable_networking = config.enable_networking;
        let max_queued = config.max_queued_messages as usize;
        *self.inner.config.lock().unwrap() = config;
        *self.inner.queue.lock().unwrap() = Arc::new(MessageQueue::new(max_queued));
        *self.inner.collector.lock().unwrap() = Some(collector);

        if enable_networking {
            if let Err(e) = self.inner.start_network_server() {
                error!("failed to start network server: {}", e);
                *self.inner.collector.lock().unwrap() = None;
                return Err(e.into());
            }
        }

        self.inner.running.store(true, Ordering::Release);
        let loop_inner = Arc::clone(&self.inner);
        *self.inner.loop_thread.lock().unwrap() = Some(thread::spawn(move || run_loop(loop_inner)));

        self.inner.initialized.store(true, Ordering::Release);
        self.inner.enabled.store(true, Ordering::Release);

        info!("telemetry hub initialized");
        Ok(())
    }

    /// Initialize from a TOML configuration file.
    pub fn initialize_from_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), HubError> {
        let config = ProfilerConfig::load(path)?;
        self.initialize(config)
    }

    /// Tear the pipeline down: stop the loop, stop the server, drain the
    /// queue, drop the collector and the diff caches. A no-op when not
    /// initialized; safe to call repeatedly.
    pub fn deinitialize(&self) {
        if !self.inner.initialized.load(Ordering::Acquire) {
            return;
        }

        self.inner.enabled.store(false, Ordering::Release);

        // Signal first, join second.
        self.inner.running.store(false, Ordering::Release);
        if let Some(handle) = self.inner.loop_thread.lock().unwrap().take() {
            let _ = handle.join();
        }

        self.inner.stop_network_server();
        self.inner.current_queue().clear();
        *self.inner.collector.lock().unwrap() = None;
        *self.inner.caches.lock().unwrap() = ChangeCaches::default();

        self.inner.initialized.store(false, Ordering::Release);
        info!("telemetry hub deinitialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    pub fn config(&self) -> ProfilerConfig {
        self.inner.config.lock().unwrap().clone()
    }

    /// Apply a new configuration. Refused (prior state untouched) if the
    /// new configuration fails validation. The network server restarts
    /// when its settings changed.
    pub fn update_config(&self, new_config: ProfilerConfig) -> Result<(), HubError> {
        new_config.validate()?;

        let network_changed = {
            let mut cfg = self.inner.config.lock().unwrap();
            let changed = cfg.enable_networking != new_config.enable_networking
                || cfg.server_port != new_config.server_port
                || cfg.bind_address != new_config.bind_address
                || cfg.max_clients != new_config.max_clients;
            *cfg = new_config;
            changed
        };

        if network_changed && self.is_initialized() {
            self.inner.stop_network_server();
            if self.inner.config.lock().unwrap().enable_networking {
                if let Err(e) = self.inner.start_network_server() {
                    // Capture and the local callback path stay usable.
                    error!("failed to restart network server: {}", e);
                }
            }
        }

        info!("configuration updated");
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
        info!("telemetry capture {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn set_category_mask(&self, mask: Category) {
        self.inner.config.lock().unwrap().category_mask = mask;
    }

    pub fn set_update_mode(&self, mode: UpdateMode) {
        self.inner.set_update_mode(mode);
    }

    /// Change the update frequency. Out-of-range values are refused, not
    /// clamped.
    pub fn set_update_frequency(&self, frequency_hz: f32) {
        if !(0.1..=1000.0).contains(&frequency_hz) {
            warn!("ignoring invalid update frequency {} Hz", frequency_hz);
            return;
        }
        self.inner.config.lock().unwrap().update_frequency_hz = frequency_hz;
    }

    // Capture operations, fire-and-forget from any thread.

    pub fn capture_engine_state(&self) {
        self.inner.capture_engine_state();
    }

    pub fn capture_entity_state(&self, entity_id: EntityId) {
        self.inner.capture_entity_state(entity_id);
    }

    pub fn capture_channel_state(&self, channel_id: ChannelId) {
        self.inner.capture_channel_state(channel_id);
    }

    pub fn capture_listener_state(&self, listener_id: ListenerId) {
        self.inner.capture_listener_state(listener_id);
    }

    pub fn capture_performance_metrics(&self) {
        self.inner.capture_performance_metrics();
    }

    pub fn capture_event(&self, event: EventSnapshot) {
        self.inner.capture_event(event);
    }

    pub fn capture_all_entities(&self) {
        self.inner.capture_all_entities();
    }

    pub fn capture_all_channels(&self) {
        self.inner.capture_all_channels();
    }

    pub fn capture_all_listeners(&self) {
        self.inner.capture_all_listeners();
    }

    pub fn capture_full_state(&self) {
        self.inner.capture_full_state();
    }

    // Network control.

    pub fn start_network_server(&self) -> Result<(), HubError> {
        self.inner.start_network_server().map_err(HubError::from)
    }

    pub fn stop_network_server(&self) {
        self.inner.stop_network_server();
    }

    pub fn is_network_server_running(&self) -> bool {
        self.inner
            .current_server()
            .map(|s| s.is_running())
            .unwrap_or(false)
    }

    pub fn connected_client_count(&self) -> u32 {
        self.inner
            .current_server()
            .map(|s| s.client_count())
            .unwrap_or(0)
    }

    /// Snapshots currently waiting in the queue.
    pub fn queued_messages(&self) -> usize {
        self.inner.current_queue().len()
    }

    /// Allocation statistics for the snapshot pipeline.
    pub fn pool_stats(&self) -> crate::pool::PoolStats {
        self.inner.pool.stats()
    }

    pub fn stats(&self) -> HubStats {
        let mut stats = self.inner.stats.lock().unwrap().clone();
        stats.active_clients = self
            .inner
            .current_server()
            .map(|s| s.client_count())
            .unwrap_or(0);
        stats
    }

    pub fn reset_stats(&self) {
        *self.inner.stats.lock().unwrap() = HubStats::default();
        info!("statistics reset");
    }

    /// Register the single local subscriber. Receives every distributed
    /// snapshot synchronously on the scheduling-loop thread.
    pub fn register_message_callback<F>(&self, callback: F)
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        *self.inner.callback.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn unregister_message_callback(&self) {
        *self.inner.callback.lock().unwrap() = None;
    }
}

impl Drop for TelemetryHub {
    fn drop(&mut self) {
        self.deinitialize();
    }
}
