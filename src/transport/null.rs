//! Null Transport
//!
//! Stand-in installed when neither the mesh module nor an HMI console is
//! detected. Keeps the manager operational (the public API stays callable)
//! while reporting `NoDevice` for anything that would touch hardware.

use crate::error::{Result, XSlotError};
use crate::transport::{ReceiveCallback, Transport};

/// Transport used when no device is present.
#[derive(Debug, Default)]
pub struct NullTransport;

impl NullTransport {
    /// Create a null transport.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for NullTransport {
    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn send(&self, _frame: &[u8]) -> Result<()> {
        Err(XSlotError::NoDevice)
    }

    fn probe(&self) -> Result<()> {
        Err(XSlotError::NoDevice)
    }

    fn configure(&self, _cell_id: u8, _power_dbm: i8) -> Result<()> {
        Err(XSlotError::NoDevice)
    }

    fn set_receive_callback(&self, _callback: ReceiveCallback) {}

    fn is_running(&self) -> bool {
        false
    }
}
