#![allow(dead_code)]
//! Test harness utilities for sonde-net integration tests.

use std::io::{self, BufReader, BufWriter};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use sonde_net::framing::{read_frame, write_frame};
use sonde_net::server::TelemetryServer;

/// Start a server on an ephemeral loopback port.
pub fn start_server(max_clients: u32) -> TelemetryServer {
    let server = TelemetryServer::new();
    server
        .start(0, "127.0.0.1", max_clients)
        .expect("server starts");
    server
}

pub fn server_addr(server: &TelemetryServer) -> String {
    format!("127.0.0.1:{}", server.port())
}

/// Block until the server sees the expected number of clients, or panic.
pub fn wait_for_clients(server: &TelemetryServer, expected: u32, timeout: Duration) {
    let start = Instant::now();
    while Instant::now().duration_since(start) < timeout {
        if server.client_count() == expected {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!(
        "timed out waiting for {} clients (have {})",
        expected,
        server.client_count()
    );
}

/// Block until a condition holds, or return false on timeout.
pub fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let start = Instant::now();
    while Instant::now().duration_since(start) < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

/// A raw TCP observer for protocol-level tests.
pub struct RawObserver {
    pub reader: BufReader<TcpStream>,
    pub writer: BufWriter<TcpStream>,
}

impl RawObserver {
    pub fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    pub fn send(&mut self, payload: &str) -> io::Result<()> {
        write_frame(&mut self.writer, payload)
    }

    pub fn recv(&mut self) -> io::Result<String> {
        read_frame(&mut self.reader)
    }
}
