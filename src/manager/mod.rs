//! Protocol Manager
//!
//! The orchestration layer of the X-Slot stack. A [`Manager`] owns one
//! transport, the node table, the outbound sequence counter and the user
//! callbacks, and wires them together:
//!
//! - **Outbound**: the public API builds a frame, encodes it and hands the
//!   bytes to the transport.
//! - **Inbound**: the transport's receiver thread delivers validated frame
//!   bytes; the manager decodes, refreshes the node table, dispatches by
//!   command and fires the matching callback or automatic reply (Pong for
//!   Ping, WriteAck for Write).
//!
//! # Startup
//!
//! [`Manager::start`] detects the slot hardware by probing the mesh module
//! first, then a direct HMI link. When neither answers, a null transport is
//! installed and `NoDevice` is returned; the manager stays in a clean,
//! re-startable state.
//!
//! # Liveness
//!
//! Every inbound frame refreshes the sender's node-table entry. A
//! heartbeat thread periodically sweeps the table for timeouts and, on an
//! edge node, pings the hub. Online transitions fire the node callback in
//! both directions, each exactly once.
//!
//! # Callback contract
//!
//! Callbacks are invoked from the stack's background threads. They may
//! send through the manager (answering a query from the data callback is
//! fine) but must not re-enter it to change callbacks or stop the stack
//! from within the dispatching thread.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use crate::at::PowerMode;
use crate::error::{Result, XSlotError};
use crate::frame::{Command, Frame, MAX_FRAME_SIZE};
use crate::message;
use crate::node::{NodeInfo, NodeTable};
use crate::object::BacnetObject;
use crate::transport::{DirectTransport, MeshTransport, NullTransport, Transport};
use crate::{ADDR_BROADCAST, ADDR_HUB};

/// Largest object batch handed to the report callback.
const MAX_REPORT_OBJECTS: usize = 16;

/// Granularity at which background threads observe the stop flag.
const STOP_POLL_MS: u64 = 100;

/// Stack configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Local node address.
    pub local_addr: u16,
    /// Mesh cell id, 0 leaves the modem default untouched.
    pub cell_id: u8,
    /// Transmit power in dBm, 0 leaves the modem default untouched.
    pub power_dbm: i8,
    /// UART device name, for example `/dev/ttyUSB0` or `COM3`.
    pub uart_port: String,
    /// UART baud rate.
    pub uart_baudrate: u32,
    /// Heartbeat cadence of the background thread.
    pub heartbeat_interval_ms: u32,
    /// Age at which a silent node is swept offline.
    pub heartbeat_timeout_ms: u32,
    /// Modem power mode applied at startup.
    pub power_mode: PowerMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_addr: 0,
            cell_id: 0,
            power_dbm: 0,
            uart_port: String::new(),
            uart_baudrate: 115_200,
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 15_000,
            power_mode: PowerMode::Normal,
        }
    }
}

/// Detected slot mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RunMode {
    /// No device detected.
    None = 0,
    /// Mesh-radio module.
    Wireless = 1,
    /// Directly connected HMI.
    Hmi = 2,
}

/// Raw payload callback for Query and Response frames.
pub type DataCallback = Box<dyn FnMut(u16, &[u8]) + Send>;

/// Node online/offline transition callback.
pub type NodeCallback = Box<dyn FnMut(u16, bool) + Send>;

/// Inbound write-request callback.
pub type WriteCallback = Box<dyn FnMut(u16, &BacnetObject) + Send>;

/// Inbound telemetry callback.
pub type ReportCallback = Box<dyn FnMut(u16, &[BacnetObject]) + Send>;

#[derive(Default)]
struct Callbacks {
    data: Mutex<Option<DataCallback>>,
    node: Mutex<Option<NodeCallback>>,
    write: Mutex<Option<WriteCallback>>,
    report: Mutex<Option<ReportCallback>>,
}

struct ManagerInner {
    config: Mutex<Config>,
    mode: Mutex<RunMode>,
    node_table: Mutex<NodeTable>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    callbacks: Callbacks,
    seq: AtomicU8,
    running: AtomicBool,
}

/// The X-Slot protocol stack.
pub struct Manager {
    inner: Arc<ManagerInner>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl Manager {
    /// Create a stopped manager from a configuration.
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config: Mutex::new(config),
                mode: Mutex::new(RunMode::None),
                node_table: Mutex::new(NodeTable::default()),
                transport: RwLock::new(None),
                callbacks: Callbacks::default(),
                seq: AtomicU8::new(0),
                running: AtomicBool::new(false),
            }),
            heartbeat: Mutex::new(None),
        }
    }

    /// Detect the slot hardware and start the stack.
    ///
    /// Probes the mesh module first, then a direct HMI link. When neither
    /// responds, a null transport is installed, the mode stays
    /// [`RunMode::None`] and `NoDevice` is returned; a later `start` may
    /// try again.
    pub fn start(&self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let config = self.inner.config.lock().unwrap().clone();

        let mesh = MeshTransport::new(&config);
        if mesh.probe().is_ok() {
            log::info!("mesh module detected");
            return self.attach(Arc::new(mesh), RunMode::Wireless);
        }

        let direct = DirectTransport::new(&config);
        if direct.probe().is_ok() {
            log::info!("HMI link detected");
            return self.attach(Arc::new(direct), RunMode::Hmi);
        }

        log::warn!("no device detected on {}", config.uart_port);
        *self.inner.transport.write().unwrap() = Some(Arc::new(NullTransport::new()));
        *self.inner.mode.lock().unwrap() = RunMode::None;
        Err(XSlotError::NoDevice)
    }

    /// Start the stack over a caller-supplied transport.
    ///
    /// Skips probing; useful for custom links and for tests.
    pub fn start_with_transport(
        &self,
        transport: Box<dyn Transport>,
        mode: RunMode,
    ) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.attach(Arc::from(transport), mode)
    }

    fn attach(&self, transport: Arc<dyn Transport>, mode: RunMode) -> Result<()> {
        let weak = Arc::downgrade(&self.inner);
        transport.set_receive_callback(Box::new(move |bytes| {
            if let Some(inner) = weak.upgrade() {
                inner.on_frame_bytes(bytes);
            }
        }));

        if let Err(e) = transport.start() {
            log::error!("transport start failed: {}", e);
            *self.inner.transport.write().unwrap() = Some(Arc::new(NullTransport::new()));
            *self.inner.mode.lock().unwrap() = RunMode::None;
            return Err(e);
        }

        *self.inner.transport.write().unwrap() = Some(transport);
        *self.inner.mode.lock().unwrap() = mode;
        self.inner.running.store(true, Ordering::SeqCst);
        self.spawn_heartbeat();

        let local_addr = self.inner.config.lock().unwrap().local_addr;
        log::info!("manager started, addr {:04X}, mode {:?}", local_addr, mode);
        Ok(())
    }

    /// Stop the stack: halt the heartbeat, tear down the transport.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let heartbeat = self.heartbeat.lock().unwrap().take();
        if let Some(handle) = heartbeat {
            let _ = handle.join();
        }

        let transport = self.inner.transport.write().unwrap().take();
        if let Some(transport) = transport {
            transport.stop();
        }
        *self.inner.mode.lock().unwrap() = RunMode::None;
        log::info!("manager stopped");
    }

    /// The detected slot mode.
    pub fn run_mode(&self) -> RunMode {
        *self.inner.mode.lock().unwrap()
    }

    /// True between a successful start and the next stop.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Report objects to the hub in the incremental dialect.
    pub fn report(&self, objects: &[BacnetObject]) -> Result<()> {
        if objects.is_empty() {
            return Err(XSlotError::InvalidParam);
        }
        let local = self.inner.config.lock().unwrap().local_addr;
        let frame = message::build_report(local, ADDR_HUB, self.inner.next_seq(), objects, true)?;
        self.inner.send_frame(&frame)
    }

    /// Write one object on a remote node.
    pub fn write(&self, target: u16, obj: &BacnetObject) -> Result<()> {
        let local = self.inner.config.lock().unwrap().local_addr;
        let frame = message::build_write(local, target, self.inner.next_seq(), obj)?;
        self.inner.send_frame(&frame)
    }

    /// Query objects on a remote node.
    pub fn query(&self, target: u16, object_ids: &[u16]) -> Result<()> {
        let local = self.inner.config.lock().unwrap().local_addr;
        let frame = message::build_query(local, target, self.inner.next_seq(), object_ids)?;
        self.inner.send_frame(&frame)
    }

    /// Send a heartbeat ping.
    pub fn ping(&self, target: u16) -> Result<()> {
        let local = self.inner.config.lock().unwrap().local_addr;
        let frame = message::build_ping(local, target, self.inner.next_seq());
        self.inner.send_frame(&frame)
    }

    /// Snapshot of the node table.
    pub fn get_nodes(&self) -> Vec<NodeInfo> {
        self.inner.node_table.lock().unwrap().get_all()
    }

    /// Look up one node.
    pub fn get_node(&self, addr: u16) -> Option<NodeInfo> {
        self.inner.node_table.lock().unwrap().get(addr)
    }

    /// Online state of a node; unknown addresses are offline.
    pub fn is_node_online(&self, addr: u16) -> bool {
        self.inner.node_table.lock().unwrap().is_online(addr)
    }

    /// Number of online nodes.
    pub fn online_count(&self) -> usize {
        self.inner.node_table.lock().unwrap().online_count()
    }

    /// Install the raw data callback (Query and Response frames).
    pub fn set_data_callback(&self, callback: DataCallback) {
        *self.inner.callbacks.data.lock().unwrap() = Some(callback);
    }

    /// Install the node online/offline callback.
    pub fn set_node_callback(&self, callback: NodeCallback) {
        *self.inner.callbacks.node.lock().unwrap() = Some(callback);
    }

    /// Install the write-request callback.
    pub fn set_write_callback(&self, callback: WriteCallback) {
        *self.inner.callbacks.write.lock().unwrap() = Some(callback);
    }

    /// Install the telemetry callback.
    pub fn set_report_callback(&self, callback: ReportCallback) {
        *self.inner.callbacks.report.lock().unwrap() = Some(callback);
    }

    /// Update the wireless parameters, pushing them to the modem when the
    /// stack runs in wireless mode.
    pub fn update_wireless_config(&self, cell_id: u8, power_dbm: i8) -> Result<()> {
        {
            let mut config = self.inner.config.lock().unwrap();
            config.cell_id = cell_id;
            config.power_dbm = power_dbm;
        }

        if self.run_mode() == RunMode::Wireless {
            let transport = self.inner.transport.read().unwrap().clone();
            if let Some(transport) = transport {
                return transport.configure(cell_id, power_dbm);
            }
        }
        Ok(())
    }

    /// Library version string.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn spawn_heartbeat(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = std::thread::Builder::new()
            .name("xslot-heartbeat".to_owned())
            .spawn(move || heartbeat_loop(inner));

        match handle {
            Ok(handle) => *self.heartbeat.lock().unwrap() = Some(handle),
            Err(e) => log::error!("failed to spawn heartbeat thread: {}", e),
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ManagerInner {
    fn next_seq(&self) -> u8 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn send_frame(&self, frame: &Frame) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(XSlotError::NotInitialized);
        }

        let transport = self
            .transport
            .read()
            .unwrap()
            .clone()
            .ok_or(XSlotError::NotInitialized)?;

        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = frame.encode(&mut buffer)?;
        transport.send(&buffer[..len])
    }

    /// Inbound path, called from the transport's receiver thread with one
    /// validated frame per invocation.
    fn on_frame_bytes(&self, bytes: &[u8]) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("dropping undecodable frame: {}", e);
                return;
            }
        };

        let local_addr = self.config.lock().unwrap().local_addr;
        if frame.to != local_addr && frame.to != ADDR_BROADCAST {
            return;
        }

        // Every inbound frame is proof of life
        let newly_online = {
            let mut table = self.node_table.lock().unwrap();
            table.update(frame.from, 0, crate::pal::monotonic_ms())
        };
        if newly_online {
            self.fire_node_callback(frame.from, true);
        }

        match frame.command() {
            Some(Command::Ping) => {
                let pong = message::build_pong(local_addr, frame.from, frame.seq);
                if let Err(e) = self.send_frame(&pong) {
                    log::warn!("failed to answer ping from {:04X}: {}", frame.from, e);
                }
            }
            Some(Command::Pong) => {
                // Node table already refreshed
            }
            Some(Command::Report) => match message::parse_report(&frame, MAX_REPORT_OBJECTS) {
                Ok(objects) => {
                    let mut callback = self.callbacks.report.lock().unwrap();
                    if let Some(callback) = callback.as_mut() {
                        callback(frame.from, &objects);
                    }
                }
                Err(e) => log::warn!("malformed report from {:04X}: {}", frame.from, e),
            },
            Some(Command::Query) | Some(Command::Response) => {
                let mut callback = self.callbacks.data.lock().unwrap();
                if let Some(callback) = callback.as_mut() {
                    callback(frame.from, &frame.data);
                }
            }
            Some(Command::Write) => {
                match message::parse_write(&frame) {
                    Ok(obj) => {
                        let mut callback = self.callbacks.write.lock().unwrap();
                        if let Some(callback) = callback.as_mut() {
                            callback(frame.from, &obj);
                        }
                    }
                    Err(e) => log::warn!("malformed write from {:04X}: {}", frame.from, e),
                }

                let ack = message::build_write_ack(local_addr, frame.from, frame.seq, 0x00);
                if let Err(e) = self.send_frame(&ack) {
                    log::warn!("failed to ack write from {:04X}: {}", frame.from, e);
                }
            }
            Some(Command::WriteAck) => {
                // Tracked by the sender if it cares; nothing to do here
            }
            None => {
                log::debug!("unknown command {:#04X} from {:04X}", frame.cmd, frame.from);
            }
        }
    }

    fn fire_node_callback(&self, addr: u16, online: bool) {
        let mut callback = self.callbacks.node.lock().unwrap();
        if let Some(callback) = callback.as_mut() {
            callback(addr, online);
        }
    }
}

/// Heartbeat thread: edge nodes ping the hub, every role sweeps the node
/// table for timeouts.
fn heartbeat_loop(inner: Arc<ManagerInner>) {
    loop {
        let (interval_ms, timeout_ms, local_addr) = {
            let config = inner.config.lock().unwrap();
            (
                config.heartbeat_interval_ms as u64,
                config.heartbeat_timeout_ms as u64,
                config.local_addr,
            )
        };

        // Sleep in short steps so stop() is observed promptly
        let mut slept = 0;
        while slept < interval_ms {
            if !inner.running.load(Ordering::SeqCst) {
                return;
            }
            let step = STOP_POLL_MS.min(interval_ms - slept);
            crate::pal::sleep_ms(step);
            slept += step;
        }
        if !inner.running.load(Ordering::SeqCst) {
            return;
        }

        if crate::is_edge_addr(local_addr) {
            let ping = message::build_ping(local_addr, ADDR_HUB, inner.next_seq());
            if let Err(e) = inner.send_frame(&ping) {
                log::debug!("heartbeat ping failed: {}", e);
            }
        }

        let newly_offline = {
            let mut table = inner.node_table.lock().unwrap();
            table.check_timeout(timeout_ms, crate::pal::monotonic_ms())
        };
        for addr in newly_offline {
            log::info!("node {:04X} timed out", addr);
            inner.fire_node_callback(addr, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectType;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::time::Duration;

    /// In-memory transport capturing sends and allowing frame injection.
    #[derive(Clone, Default)]
    struct TestTransport {
        sent: Arc<Mutex<VecDeque<Vec<u8>>>>,
        callback: Arc<Mutex<Option<crate::transport::ReceiveCallback>>>,
    }

    impl TestTransport {
        fn inject(&self, bytes: &[u8]) {
            let mut callback = self.callback.lock().unwrap();
            if let Some(callback) = callback.as_mut() {
                callback(bytes);
            }
        }

        fn take_sent(&self) -> Option<Vec<u8>> {
            self.sent.lock().unwrap().pop_front()
        }
    }

    impl Transport for TestTransport {
        fn start(&self) -> Result<()> {
            Ok(())
        }
        fn stop(&self) {}
        fn send(&self, frame: &[u8]) -> Result<()> {
            self.sent.lock().unwrap().push_back(frame.to_vec());
            Ok(())
        }
        fn probe(&self) -> Result<()> {
            Ok(())
        }
        fn configure(&self, _cell_id: u8, _power_dbm: i8) -> Result<()> {
            Ok(())
        }
        fn set_receive_callback(&self, callback: crate::transport::ReceiveCallback) {
            *self.callback.lock().unwrap() = Some(callback);
        }
        fn is_running(&self) -> bool {
            true
        }
    }

    fn hub_manager(transport: &TestTransport) -> Manager {
        let manager = Manager::new(Config {
            local_addr: ADDR_HUB,
            ..Config::default()
        });
        manager
            .start_with_transport(Box::new(transport.clone()), RunMode::Wireless)
            .unwrap();
        manager
    }

    #[test]
    fn test_ping_answered_with_pong_same_seq() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);

        let ping = message::build_ping(0xFFBE, ADDR_HUB, 0x2A)
            .encode_vec()
            .unwrap();
        transport.inject(&ping);

        let sent = transport.take_sent().expect("no pong emitted");
        assert_eq!(&sent[..8], &[0xAA, 0xFE, 0xFF, 0xBE, 0xFF, 0x2A, 0x02, 0x00]);

        let pong = Frame::decode(&sent).unwrap();
        assert_eq!(pong.command(), Some(Command::Pong));
        assert_eq!(pong.from, ADDR_HUB);
        assert_eq!(pong.to, 0xFFBE);
        assert_eq!(pong.seq, 0x2A);
        assert!(pong.data.is_empty());

        manager.stop();
    }

    #[test]
    fn test_frames_for_other_nodes_ignored() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);

        let ping = message::build_ping(0xFFBE, 0xFFC0, 1).encode_vec().unwrap();
        transport.inject(&ping);
        assert!(transport.take_sent().is_none());
        assert!(manager.get_nodes().is_empty());

        manager.stop();
    }

    #[test]
    fn test_broadcast_frames_dispatched() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);

        let ping = message::build_ping(0xFFBE, ADDR_BROADCAST, 1)
            .encode_vec()
            .unwrap();
        transport.inject(&ping);
        assert!(transport.take_sent().is_some());

        manager.stop();
    }

    #[test]
    fn test_report_parsed_and_node_marked_online() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);

        let (report_tx, report_rx) = mpsc::channel();
        manager.set_report_callback(Box::new(move |from, objects| {
            report_tx.send((from, objects.to_vec())).unwrap();
        }));
        let (node_tx, node_rx) = mpsc::channel();
        manager.set_node_callback(Box::new(move |addr, online| {
            node_tx.send((addr, online)).unwrap();
        }));

        let objects = vec![
            BacnetObject::analog_input(7, 23.5),
            BacnetObject::analog_input(8, 24.0),
        ];
        let report = message::build_report(0xFFBE, ADDR_HUB, 1, &objects, true)
            .unwrap()
            .encode_vec()
            .unwrap();
        transport.inject(&report);

        let (addr, online) = node_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!((addr, online), (0xFFBE, true));

        let (from, parsed) = report_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(from, 0xFFBE);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].object_type, ObjectType::AnalogInput);
        assert_eq!(parsed[0].value.as_analog(), Some(23.5));
        assert_eq!(parsed[1].value.as_analog(), Some(24.0));

        assert!(manager.is_node_online(0xFFBE));
        assert_eq!(manager.online_count(), 1);

        manager.stop();
    }

    #[test]
    fn test_write_invokes_callback_then_acks() {
        let transport = TestTransport::default();
        let manager = Manager::new(Config {
            local_addr: 0xFFBE,
            ..Config::default()
        });
        manager
            .start_with_transport(Box::new(transport.clone()), RunMode::Wireless)
            .unwrap();

        let (tx, rx) = mpsc::channel();
        manager.set_write_callback(Box::new(move |from, obj| {
            tx.send((from, obj.clone())).unwrap();
        }));

        let obj = BacnetObject::binary_output(3, true);
        let write = message::build_write(ADDR_HUB, 0xFFBE, 0x42, &obj)
            .unwrap()
            .encode_vec()
            .unwrap();
        transport.inject(&write);

        let (from, received) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(from, ADDR_HUB);
        assert_eq!(received, obj);

        let sent = transport.take_sent().expect("no ack emitted");
        let ack = Frame::decode(&sent).unwrap();
        assert_eq!(ack.command(), Some(Command::WriteAck));
        assert_eq!(ack.from, 0xFFBE);
        assert_eq!(ack.to, ADDR_HUB);
        assert_eq!(ack.seq, 0x42);
        assert_eq!(ack.data, [0x00]);

        manager.stop();
    }

    #[test]
    fn test_query_and_response_hit_data_callback() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);

        let (tx, rx) = mpsc::channel();
        manager.set_data_callback(Box::new(move |from, data| {
            tx.send((from, data.to_vec())).unwrap();
        }));

        let query = message::build_query(0xFF00, ADDR_HUB, 1, &[7, 8])
            .unwrap()
            .encode_vec()
            .unwrap();
        transport.inject(&query);

        let (from, data) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(from, 0xFF00);
        assert_eq!(data, [0x02, 0x07, 0x00, 0x08, 0x00]);

        manager.stop();
    }

    #[test]
    fn test_outbound_report_targets_hub_incremental() {
        let transport = TestTransport::default();
        let manager = Manager::new(Config {
            local_addr: 0xFFBE,
            ..Config::default()
        });
        manager
            .start_with_transport(Box::new(transport.clone()), RunMode::Wireless)
            .unwrap();

        manager
            .report(&[BacnetObject::analog_input(7, 23.5)])
            .unwrap();

        let sent = transport.take_sent().unwrap();
        let frame = Frame::decode(&sent).unwrap();
        assert_eq!(frame.command(), Some(Command::Report));
        assert_eq!(frame.to, ADDR_HUB);
        assert_eq!(frame.from, 0xFFBE);
        // Incremental dialect: bit 7 of the first type byte
        assert_eq!(frame.data[3] & 0x80, 0x80);

        manager.stop();
    }

    #[test]
    fn test_sequence_numbers_increment_and_wrap() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);

        manager.ping(0xFFBE).unwrap();
        manager.ping(0xFFBE).unwrap();

        let first = Frame::decode(&transport.take_sent().unwrap()).unwrap();
        let second = Frame::decode(&transport.take_sent().unwrap()).unwrap();
        assert_eq!(second.seq, first.seq.wrapping_add(1));

        manager.stop();
    }

    #[test]
    fn test_send_when_stopped_fails() {
        let manager = Manager::new(Config::default());
        assert_eq!(manager.ping(0xFFBE), Err(XSlotError::NotInitialized));
    }

    #[test]
    fn test_write_ack_is_noop() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);

        let ack = message::build_write_ack(0xFFBE, ADDR_HUB, 0x42, 0)
            .encode_vec()
            .unwrap();
        transport.inject(&ack);
        assert!(transport.take_sent().is_none());
        // But the sender still counts as alive
        assert!(manager.is_node_online(0xFFBE));

        manager.stop();
    }

    #[test]
    fn test_corrupt_frame_ignored() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);

        let mut ping = message::build_ping(0xFFBE, ADDR_HUB, 1).encode_vec().unwrap();
        ping[6] ^= 0xFF;
        transport.inject(&ping);
        assert!(transport.take_sent().is_none());

        manager.stop();
    }

    #[test]
    fn test_restart_after_stop() {
        let transport = TestTransport::default();
        let manager = hub_manager(&transport);
        manager.stop();
        assert_eq!(manager.run_mode(), RunMode::None);

        manager
            .start_with_transport(Box::new(transport.clone()), RunMode::Hmi)
            .unwrap();
        assert_eq!(manager.run_mode(), RunMode::Hmi);
        assert!(manager.is_running());
        manager.stop();
    }
}
