//! System Serial Port
//!
//! [`SerialPort`] implementation over the `serialport` crate, 8N1 framing.
//! Read timeouts are adjusted lazily because the underlying handle carries
//! its timeout as state.

use std::time::Duration;

use crate::error::{Result, XSlotError};
use crate::pal::SerialPort;

struct SystemSerialPort {
    port: Box<dyn serialport::SerialPort>,
    timeout: Duration,
}

/// Open a serial device in 8N1 framing at the given baud rate.
///
/// Fails with `NoDevice` when the port cannot be opened.
pub fn open_serial(path: &str, baudrate: u32) -> Result<Box<dyn SerialPort>> {
    let initial_timeout = Duration::from_millis(100);
    let port = serialport::new(path, baudrate)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .timeout(initial_timeout)
        .open()
        .map_err(|e| {
            log::debug!("failed to open serial port {}: {}", path, e);
            XSlotError::NoDevice
        })?;

    Ok(Box::new(SystemSerialPort {
        port,
        timeout: initial_timeout,
    }))
}

impl SerialPort for SystemSerialPort {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if timeout != self.timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|_| XSlotError::NoDevice)?;
            self.timeout = timeout;
        }

        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                log::debug!("serial read error: {}", e);
                Err(XSlotError::NoDevice)
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data).map_err(|e| {
            log::debug!("serial write error: {}", e);
            XSlotError::SendFailed
        })
    }

    fn try_clone(&self) -> Result<Box<dyn SerialPort>> {
        let port = self.port.try_clone().map_err(|_| XSlotError::NoDevice)?;
        Ok(Box::new(SystemSerialPort {
            port,
            timeout: self.timeout,
        }))
    }
}
