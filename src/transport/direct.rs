//! Direct (HMI) Transport
//!
//! Raw UART passthrough for an HMI console plugged straight into the slot.
//! Outbound frames go to the port verbatim; a receiver thread accumulates
//! inbound bytes, resynchronizes on the frame sync byte and delivers every
//! CRC-valid frame to the receive callback.
//!
//! Resynchronization never stalls the stream: garbage before a sync byte
//! is discarded, and a candidate frame with a bad length or CRC costs
//! exactly one byte (the false sync) before scanning resumes. Corrupted
//! input therefore delays, but never loses, the frames behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{Result, XSlotError};
use crate::frame::{self, Frame};
use crate::manager::Config;
use crate::pal::{self, SerialPort};
use crate::transport::{ReceiveCallback, Transport};

/// How long `probe` watches the line for a sync byte.
const PROBE_WINDOW: Duration = Duration::from_millis(500);

/// Per-iteration read timeout of the receiver thread.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

type Opener = Box<dyn Fn() -> Result<Box<dyn SerialPort>> + Send + Sync>;

/// Transport for a directly connected HMI.
pub struct DirectTransport {
    opener: Opener,
    running: Arc<AtomicBool>,
    writer: Mutex<Option<Box<dyn SerialPort>>>,
    callback: Arc<Mutex<Option<ReceiveCallback>>>,
    rx_thread: Mutex<Option<JoinHandle<()>>>,
}

impl DirectTransport {
    /// Create a transport for the UART named in the configuration.
    pub fn new(config: &Config) -> Self {
        let port = config.uart_port.clone();
        let baudrate = config.uart_baudrate;
        Self::with_opener(Box::new(move || pal::open_serial(&port, baudrate)))
    }

    /// Create a transport over a caller-supplied port factory.
    pub(crate) fn with_opener(opener: Opener) -> Self {
        Self {
            opener,
            running: Arc::new(AtomicBool::new(false)),
            writer: Mutex::new(None),
            callback: Arc::new(Mutex::new(None)),
            rx_thread: Mutex::new(None),
        }
    }
}

impl Transport for DirectTransport {
    fn start(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut reader = (self.opener)()?;
        *self.writer.lock().unwrap() = Some(reader.try_clone()?);

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let callback = Arc::clone(&self.callback);

        let handle = std::thread::Builder::new()
            .name("xslot-direct-rx".to_owned())
            .spawn(move || {
                let mut chunk = [0u8; 64];
                let mut buffer: Vec<u8> = Vec::with_capacity(frame::MAX_FRAME_SIZE * 2);

                while running.load(Ordering::SeqCst) {
                    let n = match reader.read(&mut chunk, POLL_TIMEOUT) {
                        Ok(n) => n,
                        Err(_) => {
                            log::error!("direct transport: serial port lost");
                            running.store(false, Ordering::SeqCst);
                            break;
                        }
                    };

                    if n == 0 {
                        continue;
                    }

                    buffer.extend_from_slice(&chunk[..n]);
                    drain_frames(&mut buffer, &mut |frame_bytes| {
                        let mut callback = callback.lock().unwrap();
                        if let Some(callback) = callback.as_mut() {
                            callback(frame_bytes);
                        }
                    });
                }
            })
            .map_err(|_| XSlotError::NoDevice)?;

        *self.rx_thread.lock().unwrap() = Some(handle);
        log::info!("direct transport started");
        Ok(())
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let handle = self.rx_thread.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        *self.writer.lock().unwrap() = None;
        log::info!("direct transport stopped");
    }

    fn send(&self, frame: &[u8]) -> Result<()> {
        if frame.is_empty() {
            return Err(XSlotError::InvalidParam);
        }

        let mut writer = self.writer.lock().unwrap();
        match writer.as_mut() {
            Some(writer) => writer.write_all(frame),
            None => Err(XSlotError::NotInitialized),
        }
    }

    fn probe(&self) -> Result<()> {
        let mut port = (self.opener)()?;
        let deadline = Instant::now() + PROBE_WINDOW;
        let mut chunk = [0u8; 32];

        while Instant::now() < deadline {
            let n = port.read(&mut chunk, POLL_TIMEOUT)?;
            if chunk[..n].contains(&frame::SYNC_BYTE) {
                log::debug!("direct probe: sync byte observed");
                return Ok(());
            }
        }

        Err(XSlotError::NoDevice)
    }

    fn configure(&self, _cell_id: u8, _power_dbm: i8) -> Result<()> {
        // No radio behind a direct link
        Ok(())
    }

    fn set_receive_callback(&self, callback: ReceiveCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for DirectTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Extract every complete, CRC-valid frame from the front of `buffer`.
///
/// Bytes before the first sync byte are discarded. A frame candidate with
/// an invalid length or a CRC mismatch advances the scan past its sync
/// byte only, so a corrupted frame cannot swallow the valid frame that
/// follows it. Trailing incomplete data is kept for the next read.
fn drain_frames(buffer: &mut Vec<u8>, deliver: &mut dyn FnMut(&[u8])) {
    loop {
        let sync_pos = match buffer.iter().position(|&b| b == frame::SYNC_BYTE) {
            Some(pos) => pos,
            None => {
                buffer.clear();
                return;
            }
        };
        if sync_pos > 0 {
            buffer.drain(..sync_pos);
        }

        if buffer.len() < frame::MIN_FRAME_SIZE {
            return;
        }

        let data_len = buffer[frame::OFFSET_LEN];
        if data_len as usize > frame::MAX_DATA_LEN {
            buffer.drain(..1);
            continue;
        }

        let total = Frame::total_size_for(data_len);
        if buffer.len() < total {
            return;
        }

        if Frame::verify_crc(&buffer[..total]) {
            deliver(&buffer[..total]);
            buffer.drain(..total);
        } else {
            log::warn!("direct transport: dropping frame with bad CRC");
            buffer.drain(..1);
        }
    }
}
