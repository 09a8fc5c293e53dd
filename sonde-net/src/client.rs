//! Observer client: connects to a telemetry server and consumes records.
//!
//! Standard client plumbing around the wire protocol: a background reader
//! thread, heartbeat pings, and bounded auto-reconnect.

use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};

use sonde_types::DEFAULT_SERVER_PORT;

use crate::framing::{read_frame, write_frame};
use crate::protocol::{decode_record, ClientCommand, DataRequest, WireRecord};

/// How often the reader wakes to check heartbeats and the stop flag.
const POLL_TICK: Duration = Duration::from_secs(1);

/// Observer client configuration. Changes take effect on the next connect.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_address: String,
    pub server_port: u16,
    /// Name reported in log messages.
    pub client_name: String,
    pub client_version: String,
    pub connect_timeout: Duration,
    /// Silence longer than this (with a heartbeat outstanding) drops the
    /// connection and triggers reconnect handling.
    pub receive_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: String::from("127.0.0.1"),
            server_port: DEFAULT_SERVER_PORT,
            client_name: String::from("sonde-observer"),
            client_version: String::from("1.0.0"),
            connect_timeout: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

/// Connection state of the observer client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

impl ClientState {
    fn from_u8(v: u8) -> ClientState {
        match v {
            1 => ClientState::Connecting,
            2 => ClientState::Connected,
            3 => ClientState::Disconnecting,
            4 => ClientState::Error,
            _ => ClientState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ClientState::Disconnected => 0,
            ClientState::Connecting => 1,
            ClientState::Connected => 2,
            ClientState::Disconnecting => 3,
            ClientState::Error => 4,
        }
    }
}

/// Receive-side statistics.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    pub messages_received: u64,
    pub bytes_received: u64,
    pub parse_errors: u64,
    pub reconnect_attempts: u32,
    pub average_message_size: f32,
    pub last_message_at: Option<SystemTime>,
}

type RecordFn = Arc<dyn Fn(&WireRecord) + Send + Sync>;
type RawFn = Arc<dyn Fn(&str) + Send + Sync>;
type StateFn = Arc<dyn Fn(ClientState) + Send + Sync>;

struct ClientShared {
    state: AtomicU8,
    stop: AtomicBool,
    writer: Mutex<Option<BufWriter<TcpStream>>>,
    stats: Mutex<ClientStats>,
    on_record: Mutex<Option<RecordFn>>,
    on_raw: Mutex<Option<RawFn>>,
    on_state: Mutex<Option<StateFn>>,
}

impl ClientShared {
    fn set_state(&self, state: ClientState) {
        let prev = ClientState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel));
        if prev != state {
            let cb = self.on_state.lock().unwrap().clone();
            if let Some(cb) = cb {
                cb(state);
            }
        }
    }

    fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn deliver(&self, payload: &str) {
        {
            let mut stats = self.stats.lock().unwrap();
            stats.messages_received += 1;
            stats.bytes_received += payload.len() as u64;
            stats.average_message_size =
                stats.bytes_received as f32 / stats.messages_received as f32;
            stats.last_message_at = Some(SystemTime::now());
        }

        let raw = self.on_raw.lock().unwrap().clone();
        if let Some(cb) = raw {
            cb(payload);
        }

        let record_cb = self.on_record.lock().unwrap().clone();
        if let Some(cb) = record_cb {
            match decode_record(payload) {
                Some(record) => cb(&record),
                None => {
                    // Control payloads (e.g. pong) are valid JSON without
                    // the record header; anything else is a parse error.
                    if serde_json::from_str::<serde_json::Value>(payload).is_err() {
                        self.stats.lock().unwrap().parse_errors += 1;
                    }
                }
            }
        }
    }

    fn send(&self, payload: &str) -> bool {
        let mut writer = self.writer.lock().unwrap();
        match writer.as_mut() {
            Some(w) => match write_frame(w, payload) {
                Ok(()) => true,
                Err(e) => {
                    debug!("client send failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    fn drop_connection(&self) {
        let mut writer = self.writer.lock().unwrap();
        if let Some(w) = writer.take() {
            let _ = w.get_ref().shutdown(Shutdown::Both);
        }
    }
}

/// Client for consuming the telemetry stream of a remote process.
pub struct ObserverClient {
    config: ClientConfig,
    shared: Arc<ClientShared>,
    worker: Option<JoinHandle<()>>,
}

impl ObserverClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            shared: Arc::new(ClientShared {
                state: AtomicU8::new(ClientState::Disconnected.as_u8()),
                stop: AtomicBool::new(false),
                writer: Mutex::new(None),
                stats: Mutex::new(ClientStats::default()),
                on_record: Mutex::new(None),
                on_raw: Mutex::new(None),
                on_state: Mutex::new(None),
            }),
            worker: None,
        }
    }

    /// Start the connection worker. Asynchronous: watch the state callback
    /// for progress. Returns false if the client is already active.
    pub fn connect(&mut self) -> bool {
        if self.worker.is_some() {
            warn!("observer client already connecting or connected");
            return false;
        }

        self.shared.stop.store(false, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        self.worker = Some(thread::spawn(move || connection_worker(shared, config)));
        true
    }

    /// Disconnect and join the worker. Safe to call when not connected.
    pub fn disconnect(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            self.shared.set_state(ClientState::Disconnecting);
            self.shared.drop_connection();
            let _ = handle.join();
        }
        self.shared.set_state(ClientState::Disconnected);
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state() == ClientState::Connected
    }

    pub fn connection_state(&self) -> ClientState {
        self.shared.state()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next connect.
    pub fn set_config(&mut self, config: ClientConfig) {
        self.config = config;
    }

    /// Send a typed command to the server.
    pub fn send_command(&self, command: &ClientCommand) -> bool {
        self.shared.send(&command.encode())
    }

    /// Ask the server for a specific slice of state.
    pub fn request_data(&self, request: DataRequest) -> bool {
        self.send_command(&ClientCommand::Request(request))
    }

    /// Send a raw payload (must already be wire-format text).
    pub fn send_raw(&self, payload: &str) -> bool {
        self.shared.send(payload)
    }

    pub fn stats(&self) -> ClientStats {
        self.shared.stats.lock().unwrap().clone()
    }

    pub fn reset_stats(&self) {
        *self.shared.stats.lock().unwrap() = ClientStats::default();
    }

    /// Called with every decoded telemetry record.
    pub fn set_on_record<F>(&self, callback: F)
    where
        F: Fn(&WireRecord) + Send + Sync + 'static,
    {
        *self.shared.on_record.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Called with every received payload, decoded or not.
    pub fn set_on_raw_message<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.shared.on_raw.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Called on every connection state change.
    pub fn set_on_state_change<F>(&self, callback: F)
    where
        F: Fn(ClientState) + Send + Sync + 'static,
    {
        *self.shared.on_state.lock().unwrap() = Some(Arc::new(callback));
    }
}

impl Drop for ObserverClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Connection worker: connect, read until the stream dies, reconnect while
/// attempts remain.
fn connection_worker(shared: Arc<ClientShared>, config: ClientConfig) {
    let mut attempts: u32 = 0;

    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        shared.set_state(ClientState::Connecting);
        info!(
            "{} connecting to {}:{}",
            config.client_name, config.server_address, config.server_port
        );

        match open_stream(&config) {
            Ok(stream) => {
                attempts = 0;
                run_connection(&shared, &config, stream);
                shared.drop_connection();
                if shared.stop.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(e) => {
                warn!(
                    "connection to {}:{} failed: {}",
                    config.server_address, config.server_port, e
                );
            }
        }

        if !config.auto_reconnect || attempts >= config.max_reconnect_attempts {
            shared.set_state(ClientState::Error);
            return;
        }
        attempts += 1;
        shared.stats.lock().unwrap().reconnect_attempts += 1;
        shared.set_state(ClientState::Disconnected);
        thread::sleep(config.reconnect_delay);
    }

    shared.set_state(ClientState::Disconnected);
}

fn open_stream(config: &ClientConfig) -> io::Result<TcpStream> {
    let target = format!("{}:{}", config.server_address, config.server_port);
    let addr = target
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "address did not resolve"))?;
    TcpStream::connect_timeout(&addr, config.connect_timeout)
}

/// Drive one established connection until it drops or stop is requested.
fn run_connection(shared: &Arc<ClientShared>, config: &ClientConfig, stream: TcpStream) {
    let read_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to clone stream: {}", e);
            return;
        }
    };
    if read_stream.set_read_timeout(Some(POLL_TICK)).is_err() {
        return;
    }

    *shared.writer.lock().unwrap() = Some(BufWriter::new(stream));
    shared.set_state(ClientState::Connected);
    info!("connected to telemetry server");

    let mut reader = BufReader::new(read_stream);
    let mut last_received = Instant::now();
    let mut last_ping = Instant::now();
    let mut ping_outstanding = false;

    loop {
        if shared.stop.load(Ordering::Acquire) {
            return;
        }

        match read_frame(&mut reader) {
            Ok(payload) => {
                last_received = Instant::now();
                ping_outstanding = false;
                shared.deliver(&payload);
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                // Quiet tick. Heartbeat, then liveness check.
                if last_ping.elapsed() >= config.heartbeat_interval {
                    if shared.send(&ClientCommand::Ping.encode()) {
                        last_ping = Instant::now();
                        ping_outstanding = true;
                    }
                }
                if ping_outstanding && last_received.elapsed() > config.receive_timeout {
                    warn!("server silent for {:?}, dropping connection", config.receive_timeout);
                    return;
                }
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    debug!("read error: {}", e);
                }
                return;
            }
        }
    }
}
