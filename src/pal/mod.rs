//! Platform Abstraction Layer
//!
//! The thin seam between the protocol stack and the host platform. The
//! stack consumes three capabilities through this module: a serial port, a
//! monotonic millisecond clock and a sleep primitive. Threads and locks
//! come straight from `std`.
//!
//! The [`SerialPort`] trait is object-safe and cloneable so a receiver
//! thread can own one handle while senders write through another. The
//! default implementation in [`serial`] wraps the `serialport` crate; an
//! in-memory scripted port for tests lives in the crate's test builds.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::error::Result;

pub mod serial;

#[cfg(test)]
pub(crate) mod mock;

pub use serial::open_serial;

/// A bidirectional byte stream to a UART device.
///
/// Reads are bounded by a caller-supplied timeout so receiver loops can
/// poll a shutdown flag; a timeout is reported as `Ok(0)`, not as an
/// error. Implementations must allow one handle to sit in a blocking read
/// while a clone writes.
pub trait SerialPort: Send {
    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// Returns the number of bytes read; `0` means the timeout elapsed
    /// without data.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Write the whole buffer. Short writes are an error.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Create a second, independently usable handle to the same device.
    fn try_clone(&self) -> Result<Box<dyn SerialPort>>;
}

/// Milliseconds elapsed since the process first asked for the time.
///
/// Monotonic and wrap-free for the lifetime of the process; this is the
/// clock behind node-table timestamps and driver timeouts.
pub fn monotonic_ms() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Block the calling thread for `ms` milliseconds.
pub fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}
