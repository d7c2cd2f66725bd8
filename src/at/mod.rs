//! AT Modem Driver
//!
//! A concurrent engine over one UART to the mesh-radio module. The driver
//! multiplexes two traffic kinds on a single byte stream:
//!
//! - **Synchronous AT commands** (`AT+ADDR=...`, `AT+CELL=...`): the caller
//!   blocks until the modem answers with a terminal `OK` or `ERROR`, or a
//!   timeout elapses. At most one synchronous command is in flight.
//! - **Unsolicited response codes** (URCs): `+`-prefixed lines the modem
//!   emits at any time, including while a command is awaiting its terminal
//!   line. URCs are dispatched to a registered handler in arrival order and
//!   are never swallowed by an in-flight command.
//!
//! A dedicated receiver thread is the only reader of the UART. It frames
//! bytes into CR/LF-terminated lines and feeds a two-state engine:
//!
//! - `Idle`: `+` lines are parsed as URCs and dispatched; other lines are
//!   noise.
//! - `AwaitingResponse`: `OK`/`ERROR` terminate the pending command, `+`
//!   lines are still dispatched as URCs, command echo is skipped, anything
//!   else accumulates as an intermediate response line.
//!
//! Data sends (`AT+SEND=...`) go through a fire-and-forget queue drained by
//! the receiver thread whenever the engine is idle; their outcome arrives
//! asynchronously as a `+SEND` URC. This keeps the send path free of
//! blocking waits, so it is safe to call from a URC dispatch context. URC
//! handlers must not issue synchronous commands: the terminal line could
//! only be processed by the thread that is blocked waiting for it.
//!
//! The command state lives under one mutex with a condition variable for
//! terminal-arrival signaling; the URC handler is protected by its own
//! mutex, acquired only after the command mutex has been released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{Result, XSlotError};
use crate::pal::SerialPort;
use crate::util::bytes_to_hex;

pub mod urc;

pub use urc::Urc;

/// Default timeout for synchronous commands.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Per-iteration read timeout of the receiver thread; bounds how long a
/// stop request can go unnoticed.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Time the modem needs to reboot after a power-mode change.
const REBOOT_DELAY_MS: u64 = 3000;

/// How many probe attempts to make while the modem comes back up.
const REBOOT_PROBE_ATTEMPTS: u32 = 10;

/// Timeout for each reboot probe; attempts times this bounds the wait to
/// about five seconds.
const REBOOT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Maximum accepted line length; longer lines are truncated.
const MAX_LINE_LEN: usize = 512;

/// Modem power mode, the argument of `AT+LP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PowerMode {
    /// Duty-cycled low-power reception.
    Low = 2,
    /// Always-on reception.
    Normal = 3,
}

impl PowerMode {
    /// Convert from the AT argument value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(Self::Low),
            3 => Some(Self::Normal),
            _ => None,
        }
    }
}

/// Handler invoked for every URC, in arrival order, from the receiver
/// thread.
pub type UrcHandler = Box<dyn FnMut(Urc) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    AwaitingResponse,
}

struct CmdState {
    state: State,
    response: Vec<String>,
    done: bool,
    success: bool,
}

struct Shared {
    // Lock order: cmd, then async_queue, then writer. The URC handler
    // mutex is only ever taken with none of the others held.
    cmd: Mutex<CmdState>,
    cmd_done: Condvar,
    async_queue: Mutex<VecDeque<String>>,
    writer: Mutex<Box<dyn SerialPort>>,
    urc_handler: Mutex<Option<UrcHandler>>,
    running: AtomicBool,
}

/// Driver for an AT-command mesh modem on a dedicated UART.
pub struct AtDriver {
    shared: Arc<Shared>,
    rx_thread: Mutex<Option<JoinHandle<()>>>,
}

impl AtDriver {
    /// Take ownership of an open serial port and start the receiver
    /// thread.
    pub fn start(port: Box<dyn SerialPort>) -> Result<Self> {
        let writer = port.try_clone()?;

        let shared = Arc::new(Shared {
            cmd: Mutex::new(CmdState {
                state: State::Idle,
                response: Vec::new(),
                done: false,
                success: false,
            }),
            cmd_done: Condvar::new(),
            async_queue: Mutex::new(VecDeque::new()),
            writer: Mutex::new(writer),
            urc_handler: Mutex::new(None),
            running: AtomicBool::new(true),
        });

        let thread_shared = Arc::clone(&shared);
        let rx_thread = std::thread::Builder::new()
            .name("xslot-at-rx".to_owned())
            .spawn(move || receiver_loop(thread_shared, port))
            .map_err(|_| XSlotError::NoDevice)?;

        Ok(Self {
            shared,
            rx_thread: Mutex::new(Some(rx_thread)),
        })
    }

    /// Stop the receiver thread and release the port.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let handle = self.rx_thread.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// True while the receiver thread is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Register the URC handler, replacing any previous one.
    pub fn set_urc_handler(&self, handler: UrcHandler) {
        *self.shared.urc_handler.lock().unwrap() = Some(handler);
    }

    /// Execute one synchronous AT command.
    ///
    /// `cmd` is the part after the `AT` prefix (`""` probes with a bare
    /// `AT`). Blocks until the terminal line arrives or `timeout` elapses.
    /// Returns the intermediate response lines on `OK`; `ERROR` maps to
    /// `InvalidParam`, a missed deadline to `Timeout` (resetting the
    /// engine to idle), and a concurrent synchronous command to `Busy`.
    pub fn send_command(&self, cmd: &str, timeout: Duration) -> Result<Vec<String>> {
        if !self.is_running() {
            return Err(XSlotError::NotInitialized);
        }

        let mut guard = self.shared.cmd.lock().unwrap();
        if guard.state != State::Idle {
            return Err(XSlotError::Busy);
        }

        guard.state = State::AwaitingResponse;
        guard.response.clear();
        guard.done = false;
        guard.success = false;

        log::debug!("AT TX: AT{}", cmd);
        if let Err(e) = write_command(&self.shared, cmd) {
            guard.state = State::Idle;
            return Err(e);
        }

        let deadline = Instant::now() + timeout;
        while !guard.done {
            let now = Instant::now();
            if now >= deadline {
                guard.state = State::Idle;
                log::warn!("AT command timeout: AT{}", cmd);
                return Err(XSlotError::Timeout);
            }
            let (next, _) = self
                .shared
                .cmd_done
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = next;
        }

        if guard.success {
            Ok(std::mem::take(&mut guard.response))
        } else {
            Err(XSlotError::InvalidParam)
        }
    }

    /// Queue a fire-and-forget command.
    ///
    /// The receiver thread transmits it the next time the engine is idle;
    /// no response is collected. Used for `AT+SEND`, whose outcome arrives
    /// as a `+SEND` URC.
    pub fn send_command_async(&self, cmd: String) -> Result<()> {
        if !self.is_running() {
            return Err(XSlotError::NotInitialized);
        }
        self.shared.async_queue.lock().unwrap().push_back(cmd);
        Ok(())
    }

    /// Probe the modem with a bare `AT`.
    pub fn probe(&self, timeout: Duration) -> Result<()> {
        self.send_command("", timeout).map(|_| ())
    }

    /// Configure the modem's mesh address.
    pub fn set_addr(&self, addr: u16) -> Result<()> {
        self.send_command(&format!("+ADDR={:04X}", addr), DEFAULT_TIMEOUT)
            .map(|_| ())
    }

    /// Configure the mesh cell id.
    pub fn set_cell(&self, cell_id: u8) -> Result<()> {
        self.send_command(&format!("+CELL={}", cell_id), DEFAULT_TIMEOUT)
            .map(|_| ())
    }

    /// Configure the transmit power.
    pub fn set_power(&self, power_dbm: i8) -> Result<()> {
        self.send_command(&format!("+PWR={}", power_dbm), DEFAULT_TIMEOUT)
            .map(|_| ())
    }

    /// Configure the wakeup period for duty-cycled reception.
    pub fn set_wakeup_period(&self, period_ms: u16) -> Result<()> {
        self.send_command(&format!("+WOR={}", period_ms), DEFAULT_TIMEOUT)
            .map(|_| ())
    }

    /// Query the modem firmware version string.
    pub fn query_version(&self) -> Result<String> {
        let lines = self.send_command("+VER?", DEFAULT_TIMEOUT)?;
        Ok(lines.join("\n"))
    }

    /// Switch the modem power mode, waiting out the reboot this causes.
    ///
    /// Queries `AT+LP?` first and returns immediately when the active mode
    /// already matches. Otherwise issues `AT+LP=<mode>`, waits for the
    /// modem to reboot and probes with bare `AT` until it answers again.
    pub fn set_power_mode(&self, mode: PowerMode) -> Result<()> {
        if let Ok(current) = self.query_power_mode() {
            if current == mode {
                log::debug!("power mode already {:?}", mode);
                return Ok(());
            }
        }

        self.send_command(&format!("+LP={}", mode as u8), DEFAULT_TIMEOUT)?;

        log::info!("power mode set to {:?}, waiting for modem reboot", mode);
        crate::pal::sleep_ms(REBOOT_DELAY_MS);

        for _ in 0..REBOOT_PROBE_ATTEMPTS {
            if self.probe(REBOOT_PROBE_TIMEOUT).is_ok() {
                return Ok(());
            }
        }

        Err(XSlotError::Timeout)
    }

    /// Query the active power mode (`AT+LP?`), parsing the modem's
    /// `LP[<mode>]` reply line.
    pub fn query_power_mode(&self) -> Result<PowerMode> {
        let lines = self.send_command("+LP?", DEFAULT_TIMEOUT)?;

        for line in &lines {
            if let Some(start) = line.find("LP[") {
                let rest = &line[start + 3..];
                if let Some(end) = rest.find(']') {
                    if let Ok(value) = rest[..end].parse::<u8>() {
                        return PowerMode::from_u8(value).ok_or(XSlotError::InvalidParam);
                    }
                }
            }
        }

        Err(XSlotError::InvalidParam)
    }

    /// Queue a mesh datagram for transmission.
    ///
    /// Formats `AT+SEND=<DST_HEX>,<LEN_DEC>,<PAYLOAD_HEX>,<TYPE_DEC>` and
    /// hands it to the async queue. Message type 0 is unacknowledged mode.
    pub fn send_data(&self, dest: u16, payload: &[u8], msg_type: u8) -> Result<()> {
        if payload.is_empty() {
            return Err(XSlotError::InvalidParam);
        }

        let cmd = format!(
            "+SEND={:04X},{},{},{}",
            dest,
            payload.len(),
            bytes_to_hex(payload),
            msg_type
        );
        self.send_command_async(cmd)
    }
}

impl Drop for AtDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn write_command(shared: &Shared, cmd: &str) -> Result<()> {
    let mut writer = shared.writer.lock().unwrap();
    writer.write_all(format!("AT{}\r\n", cmd).as_bytes())
}

/// Receiver thread body: the only reader of the UART.
fn receiver_loop(shared: Arc<Shared>, mut port: Box<dyn SerialPort>) {
    let mut chunk = [0u8; 64];
    let mut line = String::new();

    while shared.running.load(Ordering::SeqCst) {
        let n = match port.read(&mut chunk, POLL_TIMEOUT) {
            Ok(n) => n,
            Err(_) => {
                log::error!("AT receiver: serial port lost");
                shared.running.store(false, Ordering::SeqCst);
                break;
            }
        };

        for &byte in &chunk[..n] {
            match byte {
                b'\n' => {
                    if !line.is_empty() {
                        log::trace!("AT RX: {}", line);
                        process_line(&shared, &line);
                        line.clear();
                    }
                }
                b'\r' => {}
                _ => {
                    if line.len() < MAX_LINE_LEN {
                        line.push(byte as char);
                    }
                }
            }
        }

        drain_async_queue(&shared);
    }
}

/// Feed one complete line into the command engine.
///
/// The command mutex is released before any URC handler runs.
fn process_line(shared: &Shared, line: &str) {
    let urc_line = {
        let mut cmd = shared.cmd.lock().unwrap();
        match cmd.state {
            State::AwaitingResponse => {
                if line == "OK" {
                    cmd.success = true;
                    cmd.done = true;
                    cmd.state = State::Idle;
                    shared.cmd_done.notify_all();
                    None
                } else if line.starts_with("ERROR") {
                    cmd.success = false;
                    cmd.done = true;
                    cmd.state = State::Idle;
                    shared.cmd_done.notify_all();
                    None
                } else if line.starts_with('+') {
                    // URCs are dispatched even mid-command
                    Some(line.to_owned())
                } else if line.starts_with("AT") {
                    // Command echo
                    None
                } else {
                    cmd.response.push(line.to_owned());
                    None
                }
            }
            State::Idle => {
                if line.starts_with('+') {
                    Some(line.to_owned())
                } else {
                    None
                }
            }
        }
    };

    if let Some(urc_line) = urc_line {
        if let Some(parsed) = urc::parse_urc(&urc_line) {
            let mut handler = shared.urc_handler.lock().unwrap();
            if let Some(handler) = handler.as_mut() {
                handler(parsed);
            }
        } else {
            log::debug!("ignoring unrecognized URC: {}", urc_line);
        }
    }
}

/// Transmit one queued fire-and-forget command when the engine is idle.
fn drain_async_queue(shared: &Shared) {
    let cmd_guard = shared.cmd.lock().unwrap();
    if cmd_guard.state != State::Idle {
        return;
    }

    let next = shared.async_queue.lock().unwrap().pop_front();
    if let Some(cmd) = next {
        log::trace!("AT TX (async): AT{}", cmd);
        let mut writer = shared.writer.lock().unwrap();
        if writer.write_all(format!("AT{}\r\n", cmd).as_bytes()).is_err() {
            log::warn!("async AT command write failed");
        }
    }
    drop(cmd_guard);
}
