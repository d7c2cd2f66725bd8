//! # XSlot-RS: A Wireless Interconnect Protocol Stack for DDC Devices
//!
//! XSlot-RS implements the X-Slot protocol, a lightweight wireless
//! interconnect for building-automation DDC (Direct Digital Controller)
//! devices. A network consists of a single **hub** (aggregator/gateway),
//! up to 64 **edge** nodes hosting BACnet input/output objects, and
//! optionally an **HMI** operator console. The stack carries object
//! telemetry upward, control writes downward and maintains liveness, over
//! either a mesh-radio module (driven with AT commands) or a direct UART.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xslot_rs::manager::{Config, Manager};
//! use xslot_rs::object::BacnetObject;
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = Manager::new(Config {
//!         local_addr: 0xFFBE,
//!         uart_port: "/dev/ttyUSB0".to_owned(),
//!         ..Config::default()
//!     });
//!
//!     // Detects the mesh module or HMI link on the UART
//!     manager.start()?;
//!
//!     // Report a temperature reading to the hub
//!     manager.report(&[BacnetObject::analog_input(7, 23.5)])?;
//!
//!     manager.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into one module per protocol layer:
//!
//! - [`frame`]: on-wire framing with CRC-16/CCITT-FALSE protection
//! - [`object`]: BACnet object model and the full/incremental wire dialects
//! - [`message`]: build/parse helpers for the seven protocol commands
//! - [`node`]: fixed-capacity node table with liveness tracking
//! - [`pal`]: platform abstraction (serial port, clock)
//! - [`transport`]: transport trait with Null, Direct (HMI) and Mesh impls
//! - [`at`]: AT modem driver with synchronous commands and URC dispatch
//! - [`manager`]: orchestration, dispatch, heartbeats and user callbacks
//! - [`ffi`]: C ABI facade over the manager
//! - [`util`]: CRC and hex helpers
//! - [`error`]: unified error type and the stable C error-code surface
//!
//! ## Node Roles and Addresses
//!
//! | Role | Address |
//! |------|---------|
//! | Hub | `0xFFFE` |
//! | HMI | `0xFF00` |
//! | Edge | `0xFFBE..=0xFFFD` |
//! | Broadcast | `0x0000` |

#![doc = include_str!("../README.md")]

/// AT modem driver: synchronous command engine and URC dispatch
pub mod at;

/// Unified error type and the stable C error-code surface
pub mod error;

/// C ABI facade over the manager
pub mod ffi;

/// On-wire frame format, encoding, decoding and CRC verification
pub mod frame;

/// Protocol orchestration: dispatch, heartbeats, callbacks
pub mod manager;

/// Frame payload builders and parsers for every protocol command
pub mod message;

/// Node table with liveness tracking and timeout sweeps
pub mod node;

/// BACnet object model and the two wire serialization dialects
pub mod object;

/// Platform abstraction: serial port trait and monotonic clock
pub mod pal;

/// Transport abstraction with Null, Direct and Mesh implementations
pub mod transport;

/// CRC-16 and hex conversion helpers
pub mod util;

// Re-export main types for convenient access
pub use error::{Result, XSlotError};
pub use frame::{Command, Frame};
pub use manager::{Config, Manager, RunMode};
pub use node::NodeInfo;
pub use object::{BacnetObject, ObjectType, ObjectValue};
pub use transport::Transport;

/// Hub (aggregator/gateway) address.
pub const ADDR_HUB: u16 = 0xFFFE;

/// HMI console address.
pub const ADDR_HMI: u16 = 0xFF00;

/// Broadcast address.
pub const ADDR_BROADCAST: u16 = 0x0000;

/// First edge node address.
pub const ADDR_EDGE_MIN: u16 = 0xFFBE;

/// Last edge node address.
pub const ADDR_EDGE_MAX: u16 = 0xFFFD;

/// True when `addr` lies in the edge node range.
pub fn is_edge_addr(addr: u16) -> bool {
    (ADDR_EDGE_MIN..=ADDR_EDGE_MAX).contains(&addr)
}
