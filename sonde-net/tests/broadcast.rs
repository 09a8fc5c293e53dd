mod common;

use std::time::Duration;

use sonde_net::protocol::decode_record;
use sonde_types::{EngineSnapshot, EventSnapshot, Snapshot};

#[test]
fn test_snapshot_broadcast_reaches_all_clients() {
    let server = common::start_server(8);
    let addr = common::server_addr(&server);

    let mut alice = common::RawObserver::connect(&addr).unwrap();
    let mut bob = common::RawObserver::connect(&addr).unwrap();
    common::wait_for_clients(&server, 2, Duration::from_secs(2));

    let snapshot: Snapshot = EngineSnapshot::default().into();
    let sent = server.broadcast_snapshot(&snapshot);
    assert_eq!(sent, 2);

    for observer in [&mut alice, &mut bob] {
        let text = observer.recv().unwrap();
        let record = decode_record(&text).expect("record decodes");
        assert_eq!(record.kind, "engine");
        assert_eq!(record.message_id, snapshot.message_id());
    }
}

#[test]
fn test_broadcast_with_no_clients_sends_nothing() {
    let server = common::start_server(8);
    let sent = server.broadcast("orphan message");
    assert_eq!(sent, 0);
    assert_eq!(server.stats().total_messages_sent, 0);
}

#[test]
fn test_broadcast_updates_statistics() {
    let server = common::start_server(8);
    let addr = common::server_addr(&server);

    let mut observer = common::RawObserver::connect(&addr).unwrap();
    common::wait_for_clients(&server, 1, Duration::from_secs(2));

    let payload = "0123456789";
    assert_eq!(server.broadcast(payload), 1);
    assert_eq!(server.broadcast(payload), 1);

    let stats = server.stats();
    assert_eq!(stats.total_messages_sent, 2);
    assert_eq!(stats.total_bytes_transmitted, 20);
    assert!((stats.average_message_size - 10.0).abs() < f32::EPSILON);

    // Per-client counters track the same sends.
    let clients = server.clients();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].messages_sent, 2);
    assert_eq!(clients[0].bytes_transmitted, 20);

    assert_eq!(observer.recv().unwrap(), payload);
    assert_eq!(observer.recv().unwrap(), payload);
}

#[test]
fn test_unicast_to_one_client() {
    let server = common::start_server(8);
    let addr = common::server_addr(&server);

    let mut alice = common::RawObserver::connect(&addr).unwrap();
    common::wait_for_clients(&server, 1, Duration::from_secs(2));
    let alice_id = server.clients()[0].client_id;

    let mut bob = common::RawObserver::connect(&addr).unwrap();
    common::wait_for_clients(&server, 2, Duration::from_secs(2));

    assert!(server.send_to(alice_id, "for alice only"));
    assert_eq!(alice.recv().unwrap(), "for alice only");

    // Bob gets nothing; a broadcast afterwards is the next thing he sees.
    let event: Snapshot = EventSnapshot::new("after_unicast").into();
    assert_eq!(server.broadcast_snapshot(&event), 2);
    let bob_text = bob.recv().unwrap();
    assert_eq!(decode_record(&bob_text).unwrap().kind, "event");
}

#[test]
fn test_unicast_to_unknown_client_fails() {
    let server = common::start_server(8);
    assert!(!server.send_to(sonde_types::ClientId::new(999), "nobody home"));
}

#[test]
fn test_inbound_payloads_reach_message_callback() {
    use std::sync::{Arc, Mutex};

    let server = common::start_server(8);
    let received: Arc<Mutex<Vec<(u32, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    server.set_on_message_received(move |id, payload| {
        sink.lock().unwrap().push((id.get(), payload.to_string()));
    });

    let addr = common::server_addr(&server);
    let mut observer = common::RawObserver::connect(&addr).unwrap();
    common::wait_for_clients(&server, 1, Duration::from_secs(2));

    observer
        .send(r#"{"command":"request","data":"engine"}"#)
        .unwrap();

    assert!(common::wait_until(
        || !received.lock().unwrap().is_empty(),
        Duration::from_secs(2)
    ));
    let got = received.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert!(got[0].1.contains("request"));
}
