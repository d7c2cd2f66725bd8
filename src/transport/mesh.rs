//! Mesh Transport
//!
//! Frame transport over the mesh-radio module, layered on the AT driver.
//! Outbound frames become `AT+SEND` commands addressed to the destination
//! extracted from the frame header; inbound frames arrive inside `+NNMI`
//! URCs, are CRC-checked and forwarded to the receive callback.
//!
//! Sends are fire-and-forget through the driver's async queue. The modem
//! reports the radio outcome later in a `+SEND` URC, which this transport
//! logs but does not propagate; there is no retry.

use std::sync::{Arc, Mutex, RwLock};

use crate::at::{AtDriver, PowerMode, Urc, DEFAULT_TIMEOUT};
use crate::error::{Result, XSlotError};
use crate::frame::{self, Frame};
use crate::manager::Config;
use crate::pal::{self, SerialPort};
use crate::transport::{ReceiveCallback, Transport};

/// Message type passed to `AT+SEND`: unacknowledged mode.
const SEND_TYPE_UM: u8 = 0;

type Opener = Box<dyn Fn() -> Result<Box<dyn SerialPort>> + Send + Sync>;

/// Transport for the mesh-radio module.
pub struct MeshTransport {
    opener: Opener,
    local_addr: u16,
    cell_id: u8,
    power_dbm: i8,
    power_mode: PowerMode,
    driver: RwLock<Option<Arc<AtDriver>>>,
    callback: Arc<Mutex<Option<ReceiveCallback>>>,
}

impl MeshTransport {
    /// Create a transport for the UART named in the configuration.
    pub fn new(config: &Config) -> Self {
        let port = config.uart_port.clone();
        let baudrate = config.uart_baudrate;
        Self::with_opener(config, Box::new(move || pal::open_serial(&port, baudrate)))
    }

    pub(crate) fn with_opener(config: &Config, opener: Opener) -> Self {
        Self {
            opener,
            local_addr: config.local_addr,
            cell_id: config.cell_id,
            power_dbm: config.power_dbm,
            power_mode: config.power_mode,
            driver: RwLock::new(None),
            callback: Arc::new(Mutex::new(None)),
        }
    }

    fn driver(&self) -> Result<Arc<AtDriver>> {
        self.driver
            .read()
            .unwrap()
            .clone()
            .ok_or(XSlotError::NotInitialized)
    }
}

impl Transport for MeshTransport {
    fn start(&self) -> Result<()> {
        if self.driver.read().unwrap().is_some() {
            return Ok(());
        }

        let port = (self.opener)()?;
        let driver = Arc::new(AtDriver::start(port)?);

        let callback = Arc::clone(&self.callback);
        driver.set_urc_handler(Box::new(move |urc| match urc {
            Urc::Nnmi { src, payload, .. } => {
                if Frame::verify_crc(&payload) {
                    let mut callback = callback.lock().unwrap();
                    if let Some(callback) = callback.as_mut() {
                        callback(&payload);
                    }
                } else {
                    log::warn!("mesh: dropping +NNMI frame with bad CRC from {:04X}", src);
                }
            }
            Urc::Send { sn, result } => {
                log::debug!("mesh: send sn={} result={:?}", sn, result);
            }
            Urc::Route { created, addr } => {
                log::debug!(
                    "mesh: route {} for {:04X}",
                    if created { "created" } else { "deleted" },
                    addr
                );
            }
            Urc::Ack { src, sn, .. } => {
                log::debug!("mesh: delivery ack from {:04X} sn={}", src, sn);
            }
            Urc::Boot => log::warn!("mesh: modem rebooted"),
            Urc::Ready => log::info!("mesh: modem ready"),
        }));

        // Configure the radio before traffic flows
        let configure = || -> Result<()> {
            driver.set_addr(self.local_addr)?;
            if self.cell_id > 0 {
                driver.set_cell(self.cell_id)?;
            }
            if self.power_dbm != 0 {
                driver.set_power(self.power_dbm)?;
            }
            driver.set_power_mode(self.power_mode)
        };
        if let Err(e) = configure() {
            log::error!("mesh: modem configuration failed: {}", e);
            driver.stop();
            return Err(e);
        }

        *self.driver.write().unwrap() = Some(driver);
        log::info!("mesh transport started, local addr {:04X}", self.local_addr);
        Ok(())
    }

    fn stop(&self) {
        let driver = self.driver.write().unwrap().take();
        if let Some(driver) = driver {
            driver.stop();
            log::info!("mesh transport stopped");
        }
    }

    fn send(&self, frame: &[u8]) -> Result<()> {
        // Destination address sits in the frame header
        if frame.len() < frame::MIN_FRAME_SIZE || frame.len() > frame::MAX_FRAME_SIZE {
            return Err(XSlotError::InvalidParam);
        }

        let dest = u16::from_le_bytes([frame[frame::OFFSET_TO], frame[frame::OFFSET_TO + 1]]);
        self.driver()?.send_data(dest, frame, SEND_TYPE_UM)
    }

    fn probe(&self) -> Result<()> {
        let port = (self.opener)()?;
        let driver = AtDriver::start(port)?;
        let result = driver.probe(DEFAULT_TIMEOUT);
        driver.stop();
        result
    }

    fn configure(&self, cell_id: u8, power_dbm: i8) -> Result<()> {
        let driver = self.driver()?;
        if cell_id > 0 {
            driver.set_cell(cell_id)?;
        }
        if power_dbm != 0 {
            driver.set_power(power_dbm)?;
        }
        Ok(())
    }

    fn set_receive_callback(&self, callback: ReceiveCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn is_running(&self) -> bool {
        self.driver.read().unwrap().is_some()
    }
}

impl Drop for MeshTransport {
    fn drop(&mut self) {
        self.stop();
    }
}
