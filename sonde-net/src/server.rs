//! Multi-client TCP server for telemetry distribution.
//!
//! Accepts observer connections, tracks them in a client table, and fans
//! encoded telemetry records out to every connected observer. Inbound
//! payloads are passed through to a message callback without
//! interpretation.

use std::collections::HashMap;
use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use log::{debug, error, info, warn};
use thiserror::Error;

use sonde_types::{ClientId, Snapshot};

use crate::framing::{read_frame, write_frame};
use crate::protocol::encode_snapshot;

/// How often the accept loop polls the non-blocking listener.
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// How long `start` waits for a concurrent `stop` to finish before giving up.
const STOP_WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Lifecycle state of the listening endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerState {
    fn from_u8(v: u8) -> ServerState {
        match v {
            1 => ServerState::Starting,
            2 => ServerState::Running,
            3 => ServerState::Stopping,
            _ => ServerState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ServerState::Stopped => 0,
            ServerState::Starting => 1,
            ServerState::Running => 2,
            ServerState::Stopping => 3,
        }
    }
}

/// Errors surfaced by [`TelemetryServer::start`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("max_clients must be at least 1")]
    NoClientCapacity,
    #[error("server did not finish stopping in time")]
    StillStopping,
}

/// Bookkeeping for one connected observer, as exposed to callers.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub address: String,
    pub port: u16,
    pub connected_at: SystemTime,
    pub messages_sent: u64,
    pub bytes_transmitted: u64,
    pub connected: bool,
}

/// Aggregate server statistics.
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub total_connections: u32,
    pub active_connections: u32,
    pub total_disconnections: u32,
    pub total_messages_sent: u64,
    pub total_bytes_transmitted: u64,
    pub failed_sends: u32,
    pub average_message_size: f32,
    pub started_at: SystemTime,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self {
            total_connections: 0,
            active_connections: 0,
            total_disconnections: 0,
            total_messages_sent: 0,
            total_bytes_transmitted: 0,
            failed_sends: 0,
            average_message_size: 0.0,
            started_at: SystemTime::now(),
        }
    }
}

type ClientEventFn = Arc<dyn Fn(ClientId, &ClientInfo) + Send + Sync>;
type MessageEventFn = Arc<dyn Fn(ClientId, &str) + Send + Sync>;
type ErrorEventFn = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_connected: Mutex<Option<ClientEventFn>>,
    on_disconnected: Mutex<Option<ClientEventFn>>,
    on_message: Mutex<Option<MessageEventFn>>,
    on_error: Mutex<Option<ErrorEventFn>>,
}

/// A connected observer: the write half plus its public info record.
struct ClientSession {
    writer: BufWriter<TcpStream>,
    info: ClientInfo,
}

impl ClientSession {
    fn send(&mut self, payload: &str) -> io::Result<()> {
        write_frame(&mut self.writer, payload)
    }

    fn shutdown(&self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

struct Shared {
    state: AtomicU8,
    next_client_id: AtomicU32,
    max_clients: AtomicU32,
    /// Client table. Its lock is a domain of its own: never held while
    /// invoking callbacks or while taking the stats lock.
    clients: Mutex<HashMap<ClientId, ClientSession>>,
    /// Reader thread handles, joined on stop.
    readers: Mutex<HashMap<ClientId, JoinHandle<()>>>,
    stats: Mutex<ServerStats>,
    callbacks: Callbacks,
}

impl Shared {
    fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ServerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn transition(&self, from: ServerState, to: ServerState) -> bool {
        self.state
            .compare_exchange(
                from.as_u8(),
                to.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    // Callback slots are cloned out under their lock and invoked after it
    // is released, so a callback can re-enter the server.
    fn fire_connected(&self, id: ClientId, info: &ClientInfo) {
        let cb = self.callbacks.on_connected.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(id, info);
        }
    }

    fn fire_disconnected(&self, id: ClientId, info: &ClientInfo) {
        let cb = self.callbacks.on_disconnected.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(id, info);
        }
    }

    fn fire_message(&self, id: ClientId, payload: &str) {
        let cb = self.callbacks.on_message.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(id, payload);
        }
    }

    fn fire_error(&self, message: &str) {
        let cb = self.callbacks.on_error.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(message);
        }
    }

    fn active_count(&self) -> u32 {
        self.clients.lock().unwrap().len() as u32
    }

    fn record_sends(&self, sent: u32, failed: u32, payload_len: usize) {
        let mut stats = self.stats.lock().unwrap();
        stats.total_messages_sent += sent as u64;
        stats.total_bytes_transmitted += sent as u64 * payload_len as u64;
        stats.failed_sends += failed;
        if stats.total_messages_sent > 0 {
            stats.average_message_size =
                stats.total_bytes_transmitted as f32 / stats.total_messages_sent as f32;
        }
    }

    fn handle_connect(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let max = self.max_clients.load(Ordering::Relaxed);

        let read_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                error!("failed to clone stream for {}: {}", addr, e);
                return;
            }
        };

        let info;
        {
            let mut clients = self.clients.lock().unwrap();
            // Re-checked under the table lock: stop() moves to Stopping
            // before draining, so a session inserted here is always seen
            // by the drain.
            if self.state() != ServerState::Running {
                drop(clients);
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
            if clients.len() as u32 >= max {
                drop(clients);
                warn!("client table full ({} clients), rejecting {}", max, addr);
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }

            let id = ClientId::new(self.next_client_id.fetch_add(1, Ordering::Relaxed));
            info = ClientInfo {
                client_id: id,
                address: addr.ip().to_string(),
                port: addr.port(),
                connected_at: SystemTime::now(),
                messages_sent: 0,
                bytes_transmitted: 0,
                connected: true,
            };
            clients.insert(
                id,
                ClientSession {
                    writer: BufWriter::new(stream),
                    info: info.clone(),
                },
            );
        }

        let id = info.client_id;
        let reader_shared = Arc::clone(self);
        let handle = thread::spawn(move || client_reader_loop(reader_shared, id, read_stream));
        self.readers.lock().unwrap().insert(id, handle);

        let active = self.active_count();
        {
            let mut stats = self.stats.lock().unwrap();
            stats.total_connections += 1;
            stats.active_connections = active;
        }

        self.fire_connected(id, &info);
        info!("client {} connected from {}", id, addr);
    }

    /// Remove a client that went away on its own. No-op if the session was
    /// already removed by `stop` or an explicit kick.
    fn handle_disconnect(&self, id: ClientId) {
        let removed = self.clients.lock().unwrap().remove(&id);
        let Some(session) = removed else { return };
        session.shutdown();

        let active = self.active_count();
        {
            let mut stats = self.stats.lock().unwrap();
            stats.total_disconnections += 1;
            stats.active_connections = active;
        }

        let mut info = session.info.clone();
        info.connected = false;
        self.fire_disconnected(id, &info);
        info!("client {} disconnected", id);
    }
}

/// Reader thread: forwards inbound frames until the connection drops.
fn client_reader_loop(shared: Arc<Shared>, id: ClientId, stream: TcpStream) {
    let mut reader = BufReader::new(stream);

    loop {
        match read_frame(&mut reader) {
            Ok(payload) => {
                debug!("received {} bytes from client {}", payload.len(), id);
                shared.fire_message(id, &payload);
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    debug!("client {} read error: {}", id, e);
                }
                break;
            }
        }
    }

    shared.handle_disconnect(id);
    shared.readers.lock().unwrap().remove(&id);
    debug!("client {} reader thread exiting", id);
}

/// Accept loop, run on a dedicated thread. Owns the listener; dropping out
/// of the loop closes it.
fn accept_loop(shared: Arc<Shared>, listener: TcpListener) {
    debug!("accept loop started");

    while shared.state() == ServerState::Running {
        match listener.accept() {
            Ok((stream, addr)) => shared.handle_connect(stream, addr),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                warn!("accept error: {}", e);
                shared.fire_error(&format!("accept error: {}", e));
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    debug!("accept loop exiting");
}

/// TCP server that broadcasts telemetry records to connected observers.
///
/// Sends are best-effort: a failed send to one client never aborts delivery
/// to the others and never removes that client (removal happens only when
/// its connection actually drops or it is explicitly disconnected).
pub struct TelemetryServer {
    shared: Arc<Shared>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
    bound: Mutex<(String, u16)>,
}

impl Default for TelemetryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryServer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(ServerState::Stopped.as_u8()),
                next_client_id: AtomicU32::new(1),
                max_clients: AtomicU32::new(sonde_types::DEFAULT_MAX_CLIENTS),
                clients: Mutex::new(HashMap::new()),
                readers: Mutex::new(HashMap::new()),
                stats: Mutex::new(ServerStats::default()),
                callbacks: Callbacks::default(),
            }),
            accept_thread: Mutex::new(None),
            bound: Mutex::new((String::from("127.0.0.1"), 0)),
        }
    }

    /// Bind and start accepting connections.
    ///
    /// Idempotent success when already running. Port 0 binds an ephemeral
    /// port; the actual port is available from [`port`](Self::port)
    /// afterwards. A bind failure is reported through the error callback
    /// and the server returns to `Stopped`.
    pub fn start(
        &self,
        port: u16,
        bind_address: &str,
        max_clients: u32,
    ) -> Result<(), ServerError> {
        if max_clients == 0 {
            return Err(ServerError::NoClientCapacity);
        }

        // Wait out a concurrent stop so Stopping -> Starting is valid.
        let wait_start = Instant::now();
        loop {
            match self.shared.state() {
                ServerState::Running | ServerState::Starting => {
                    warn!("telemetry server already running");
                    return Ok(());
                }
                ServerState::Stopped => {
                    if self.shared.transition(ServerState::Stopped, ServerState::Starting) {
                        break;
                    }
                }
                ServerState::Stopping => {
                    if wait_start.elapsed() > STOP_WAIT_LIMIT {
                        return Err(ServerError::StillStopping);
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                error!("failed to bind {}: {}", addr, e);
                self.shared.fire_error(&format!("failed to bind {}: {}", addr, e));
                self.shared.set_state(ServerState::Stopped);
                return Err(ServerError::Bind { addr, source: e });
            }
        };

        let actual_port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
        if let Err(e) = listener.set_nonblocking(true) {
            error!("failed to configure listener: {}", e);
            self.shared.set_state(ServerState::Stopped);
            return Err(ServerError::Bind { addr, source: e });
        }

        *self.bound.lock().unwrap() = (bind_address.to_string(), actual_port);
        self.shared.max_clients.store(max_clients, Ordering::Relaxed);

        self.shared.set_state(ServerState::Running);

        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || accept_loop(shared, listener));
        *self.accept_thread.lock().unwrap() = Some(handle);

        info!(
            "telemetry server listening on {}:{} (max clients: {})",
            bind_address, actual_port, max_clients
        );
        Ok(())
    }

    /// Stop accepting, close every client connection, and join the
    /// background threads. Safe to call repeatedly and from `Drop`.
    pub fn stop(&self) {
        if !self.shared.transition(ServerState::Running, ServerState::Stopping) {
            return;
        }

        info!("stopping telemetry server");

        // Close and drop every session. Forced teardown does not emit
        // per-client disconnect callbacks, matching an operator-initiated
        // stop rather than a client-initiated disconnect.
        let sessions: Vec<ClientSession> = {
            let mut clients = self.shared.clients.lock().unwrap();
            clients.drain().map(|(_, s)| s).collect()
        };
        let dropped = sessions.len() as u32;
        for session in &sessions {
            session.shutdown();
        }
        drop(sessions);

        {
            let mut stats = self.shared.stats.lock().unwrap();
            stats.active_connections = 0;
            stats.total_disconnections += dropped;
        }

        // Reader threads observe the shutdown as EOF and exit.
        let readers: Vec<JoinHandle<()>> = {
            let mut readers = self.shared.readers.lock().unwrap();
            readers.drain().map(|(_, h)| h).collect()
        };
        for handle in readers {
            let _ = handle.join();
        }

        // The accept loop exits once the state leaves Running.
        if let Some(handle) = self.accept_thread.lock().unwrap().take() {
            let _ = handle.join();
        }

        self.shared.set_state(ServerState::Stopped);
        info!("telemetry server stopped");
    }

    pub fn state(&self) -> ServerState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state() == ServerState::Running
    }

    /// Port actually bound, or 0 if never started.
    pub fn port(&self) -> u16 {
        self.bound.lock().unwrap().1
    }

    pub fn bind_address(&self) -> String {
        self.bound.lock().unwrap().0.clone()
    }

    pub fn client_count(&self) -> u32 {
        self.shared.active_count()
    }

    pub fn max_clients(&self) -> u32 {
        self.shared.max_clients.load(Ordering::Relaxed)
    }

    /// Broadcast a payload to every connected client. Returns the number of
    /// clients the payload was written to.
    pub fn broadcast(&self, payload: &str) -> u32 {
        let mut sent = 0u32;
        let mut failed = 0u32;

        {
            let mut clients = self.shared.clients.lock().unwrap();
            for session in clients.values_mut() {
                if !session.info.connected {
                    continue;
                }
                match session.send(payload) {
                    Ok(()) => {
                        sent += 1;
                        session.info.messages_sent += 1;
                        session.info.bytes_transmitted += payload.len() as u64;
                    }
                    Err(e) => {
                        failed += 1;
                        debug!("send to client {} failed: {}", session.info.client_id, e);
                    }
                }
            }
        }

        if sent > 0 || failed > 0 {
            self.shared.record_sends(sent, failed, payload.len());
        }
        if sent > 0 {
            debug!("broadcast {} bytes to {} clients", payload.len(), sent);
        }
        sent
    }

    /// Send a payload to one client. Returns false if the client is not in
    /// the table or the write failed.
    pub fn send_to(&self, client_id: ClientId, payload: &str) -> bool {
        let result = {
            let mut clients = self.shared.clients.lock().unwrap();
            match clients.get_mut(&client_id) {
                Some(session) if session.info.connected => match session.send(payload) {
                    Ok(()) => {
                        session.info.messages_sent += 1;
                        session.info.bytes_transmitted += payload.len() as u64;
                        true
                    }
                    Err(e) => {
                        debug!("send to client {} failed: {}", client_id, e);
                        false
                    }
                },
                _ => return false,
            }
        };

        if result {
            self.shared.record_sends(1, 0, payload.len());
        } else {
            self.shared.record_sends(0, 1, payload.len());
        }
        result
    }

    /// Encode a snapshot and broadcast it.
    pub fn broadcast_snapshot(&self, snapshot: &Snapshot) -> u32 {
        self.broadcast(&encode_snapshot(snapshot))
    }

    /// Forcibly disconnect one client. Returns false if it was not found.
    pub fn disconnect_client(&self, client_id: ClientId) -> bool {
        let removed = self.shared.clients.lock().unwrap().remove(&client_id);
        let Some(session) = removed else {
            return false;
        };
        session.shutdown();

        let active = self.shared.active_count();
        {
            let mut stats = self.shared.stats.lock().unwrap();
            stats.total_disconnections += 1;
            stats.active_connections = active;
        }

        let mut info = session.info.clone();
        info.connected = false;
        self.shared.fire_disconnected(client_id, &info);
        info!("client {} removed", client_id);
        true
    }

    pub fn client_info(&self, client_id: ClientId) -> Option<ClientInfo> {
        self.shared
            .clients
            .lock()
            .unwrap()
            .get(&client_id)
            .map(|s| s.info.clone())
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.shared
            .clients
            .lock()
            .unwrap()
            .values()
            .map(|s| s.info.clone())
            .collect()
    }

    pub fn stats(&self) -> ServerStats {
        self.shared.stats.lock().unwrap().clone()
    }

    pub fn reset_stats(&self) {
        let active = self.shared.active_count();
        let mut stats = self.shared.stats.lock().unwrap();
        *stats = ServerStats::default();
        stats.active_connections = active;
        info!("server statistics reset");
    }

    pub fn set_on_client_connected<F>(&self, callback: F)
    where
        F: Fn(ClientId, &ClientInfo) + Send + Sync + 'static,
    {
        *self.shared.callbacks.on_connected.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn set_on_client_disconnected<F>(&self, callback: F)
    where
        F: Fn(ClientId, &ClientInfo) + Send + Sync + 'static,
    {
        *self.shared.callbacks.on_disconnected.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn set_on_message_received<F>(&self, callback: F)
    where
        F: Fn(ClientId, &str) + Send + Sync + 'static,
    {
        *self.shared.callbacks.on_message.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn set_on_error<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.shared.callbacks.on_error.lock().unwrap() = Some(Arc::new(callback));
    }
}

impl Drop for TelemetryServer {
    fn drop(&mut self) {
        self.stop();
    }
}
