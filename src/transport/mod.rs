//! Transport Layer Abstraction
//!
//! The manager speaks to the outside world through one [`Transport`]. A
//! transport moves whole encoded frames: outbound via [`Transport::send`],
//! inbound via a receive callback that delivers validated frame bytes from
//! the transport's receiver thread.
//!
//! Three implementations cover the hardware situations a DDC slot can be
//! in:
//!
//! - [`NullTransport`]: nothing plugged in; every operation reports
//!   `NoDevice`.
//! - [`DirectTransport`]: an HMI console wired straight to the UART. Raw
//!   frame passthrough with byte-level resynchronization on the sync byte.
//! - [`MeshTransport`]: the mesh-radio module, driven over the same UART
//!   with AT commands through [`crate::at::AtDriver`].
//!
//! All methods take `&self`: a transport is shared between the caller's
//! thread and its own receiver thread, and synchronizes internally. The
//! receive callback may call back into the stack (to answer a ping, for
//! example), so implementations never invoke it while holding a lock that
//! `send` needs.

use crate::error::Result;

pub mod direct;
pub mod mesh;
pub mod null;

pub use direct::DirectTransport;
pub use mesh::MeshTransport;
pub use null::NullTransport;

/// Callback receiving one validated, encoded frame per invocation.
pub type ReceiveCallback = Box<dyn FnMut(&[u8]) + Send>;

/// A frame-level link to the network.
pub trait Transport: Send + Sync {
    /// Bring the link up (open the device, start the receiver thread).
    fn start(&self) -> Result<()>;

    /// Tear the link down and join the receiver thread.
    fn stop(&self);

    /// Transmit one encoded frame. Atomic at frame granularity: bytes of
    /// two frames are never interleaved on the wire.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Check whether this transport's hardware is present, without
    /// starting the link.
    fn probe(&self) -> Result<()>;

    /// Apply wireless parameters. Transports without radio hardware
    /// accept and ignore the call.
    fn configure(&self, cell_id: u8, power_dbm: i8) -> Result<()>;

    /// Install the inbound frame callback. Must be set before `start`.
    fn set_receive_callback(&self, callback: ReceiveCallback);

    /// True between a successful `start` and the next `stop`.
    fn is_running(&self) -> bool;
}
