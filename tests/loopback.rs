//! End-to-end scenarios: a hub and an edge node wired back to back over an
//! in-memory transport pair.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use xslot_rs::manager::{Config, Manager, RunMode};
use xslot_rs::object::{BacnetObject, ObjectType};
use xslot_rs::transport::{ReceiveCallback, Transport};
use xslot_rs::{XSlotError, ADDR_HMI, ADDR_HUB};

const EDGE_ADDR: u16 = 0xFFBE;

#[derive(Default)]
struct Wire {
    callback: Mutex<Option<ReceiveCallback>>,
}

impl Wire {
    fn deliver(&self, bytes: &[u8]) {
        let mut callback = self.callback.lock().unwrap();
        if let Some(callback) = callback.as_mut() {
            callback(bytes);
        }
    }
}

/// One end of a point-to-point in-memory link. Sending on one end invokes
/// the peer's receive callback on the sender's thread.
struct PairTransport {
    local: Arc<Wire>,
    peer: Arc<Wire>,
}

fn transport_pair() -> (PairTransport, PairTransport) {
    let a = Arc::new(Wire::default());
    let b = Arc::new(Wire::default());
    (
        PairTransport {
            local: Arc::clone(&a),
            peer: Arc::clone(&b),
        },
        PairTransport { local: b, peer: a },
    )
}

impl Transport for PairTransport {
    fn start(&self) -> xslot_rs::Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn send(&self, frame: &[u8]) -> xslot_rs::Result<()> {
        self.peer.deliver(frame);
        Ok(())
    }

    fn probe(&self) -> xslot_rs::Result<()> {
        Ok(())
    }

    fn configure(&self, _cell_id: u8, _power_dbm: i8) -> xslot_rs::Result<()> {
        Ok(())
    }

    fn set_receive_callback(&self, callback: ReceiveCallback) {
        *self.local.callback.lock().unwrap() = Some(callback);
    }

    fn is_running(&self) -> bool {
        true
    }
}

fn start_pair(hub_config: Config, edge_config: Config) -> (Manager, Manager) {
    let (hub_end, edge_end) = transport_pair();

    let hub = Manager::new(hub_config);
    hub.start_with_transport(Box::new(hub_end), RunMode::Wireless)
        .unwrap();

    let edge = Manager::new(edge_config);
    edge.start_with_transport(Box::new(edge_end), RunMode::Wireless)
        .unwrap();

    (hub, edge)
}

fn hub_config() -> Config {
    Config {
        local_addr: ADDR_HUB,
        // Keep the background heartbeat quiet during scenario tests
        heartbeat_interval_ms: 60_000,
        ..Config::default()
    }
}

fn edge_config() -> Config {
    Config {
        local_addr: EDGE_ADDR,
        heartbeat_interval_ms: 60_000,
        ..Config::default()
    }
}

#[test]
fn edge_report_reaches_hub_callback() {
    let (hub, edge) = start_pair(hub_config(), edge_config());

    let (tx, rx) = mpsc::channel();
    hub.set_report_callback(Box::new(move |from, objects| {
        tx.send((from, objects.to_vec())).unwrap();
    }));

    edge.report(&[
        BacnetObject::analog_input(7, 23.5),
        BacnetObject::analog_input(8, 24.0),
    ])
    .unwrap();

    let (from, objects) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(from, EDGE_ADDR);
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].object_id, 7);
    assert_eq!(objects[0].object_type, ObjectType::AnalogInput);
    assert_eq!(objects[0].flags, 0);
    assert_eq!(objects[0].value.as_analog(), Some(23.5));
    assert_eq!(objects[1].value.as_analog(), Some(24.0));

    // Telemetry doubles as a liveness signal
    assert!(hub.is_node_online(EDGE_ADDR));

    edge.stop();
    hub.stop();
}

#[test]
fn ping_is_answered_and_both_tables_update() {
    let (hub, edge) = start_pair(hub_config(), edge_config());

    hub.ping(EDGE_ADDR).unwrap();

    // The edge saw the ping, the hub saw the pong
    assert!(edge.is_node_online(ADDR_HUB));
    assert!(hub.is_node_online(EDGE_ADDR));

    edge.stop();
    hub.stop();
}

#[test]
fn hub_write_fires_edge_callback_and_is_acked() {
    let (hub, edge) = start_pair(hub_config(), edge_config());

    let (tx, rx) = mpsc::channel();
    edge.set_write_callback(Box::new(move |from, obj| {
        tx.send((from, obj.clone())).unwrap();
    }));

    hub.write(EDGE_ADDR, &BacnetObject::binary_output(3, true))
        .unwrap();

    let (from, obj) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(from, ADDR_HUB);
    assert_eq!(obj.object_id, 3);
    assert_eq!(obj.object_type, ObjectType::BinaryOutput);
    assert_eq!(obj.value.as_binary(), Some(1));

    // The ack refreshed the hub's view of the edge
    assert!(hub.is_node_online(EDGE_ADDR));

    edge.stop();
    hub.stop();
}

#[test]
fn hmi_query_reaches_hub_data_callback() {
    let (hub, hmi) = start_pair(
        hub_config(),
        Config {
            local_addr: ADDR_HMI,
            heartbeat_interval_ms: 60_000,
            ..Config::default()
        },
    );

    let (tx, rx) = mpsc::channel();
    hub.set_data_callback(Box::new(move |from, data| {
        tx.send((from, data.to_vec())).unwrap();
    }));

    hmi.query(ADDR_HUB, &[7, 8]).unwrap();

    let (from, data) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(from, ADDR_HMI);
    assert_eq!(data, [0x02, 0x07, 0x00, 0x08, 0x00]);

    hmi.stop();
    hub.stop();
}

#[test]
fn edge_heartbeat_pings_hub_automatically() {
    let (hub, edge) = start_pair(
        hub_config(),
        Config {
            local_addr: EDGE_ADDR,
            heartbeat_interval_ms: 100,
            ..Config::default()
        },
    );

    // The edge's heartbeat thread pings the hub without any explicit send
    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    while !hub.is_node_online(EDGE_ADDR) {
        assert!(
            std::time::Instant::now() < deadline,
            "hub never saw the edge heartbeat"
        );
        std::thread::sleep(Duration::from_millis(20));
    }

    edge.stop();
    hub.stop();
}

#[test]
fn send_fails_after_stop() {
    let (hub, edge) = start_pair(hub_config(), edge_config());

    edge.stop();
    assert_eq!(
        edge.report(&[BacnetObject::analog_input(1, 0.0)]),
        Err(XSlotError::NotInitialized)
    );

    hub.stop();
}
