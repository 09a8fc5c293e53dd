//! Network layer for Sonde telemetry distribution.
//!
//! This crate provides the wire protocol (self-describing JSON records over
//! length-prefixed frames), the multi-client telemetry server, and the
//! observer client that consumes the stream.

pub mod client;
pub mod framing;
pub mod protocol;
pub mod server;

pub use client::{ClientConfig, ClientState, ClientStats, ObserverClient};
pub use protocol::{decode_record, encode_snapshot, ClientCommand, DataRequest, WireRecord};
pub use server::{ClientInfo, ServerError, ServerState, ServerStats, TelemetryServer};
