//! X-Slot Frame Codec
//!
//! This module implements the on-wire frame format shared by every X-Slot
//! transport. All traffic between hub, edge nodes and the HMI travels in
//! these frames, whether over the mesh radio or a direct UART.
//!
//! # Frame Format
//!
//! ```text
//! +------+--------+--------+-----+-----+-----+----------+--------+
//! | SYNC |  FROM  |   TO   | SEQ | CMD | LEN |   DATA   |  CRC   |
//! | 0xAA | u16 LE | u16 LE | u8  | u8  | u8  | LEN bytes| u16 LE |
//! +------+--------+--------+-----+-----+-----+----------+--------+
//! ```
//!
//! - `LEN` is 0..=128; the total frame size is `8 + LEN + 2` bytes.
//! - The CRC is CRC-16/CCITT-FALSE computed over the 8-byte header plus the
//!   payload, emitted little-endian like every other multi-byte field.
//! - Floats inside payloads travel as their IEEE-754 bit pattern, never as
//!   text.
//!
//! # Examples
//!
//! ```
//! use xslot_rs::frame::{Command, Frame};
//!
//! let frame = Frame::new(0xFFBE, 0xFFFE, 0x2A, Command::Ping);
//! let bytes = frame.encode_vec().unwrap();
//! let decoded = Frame::decode(&bytes).unwrap();
//! assert_eq!(decoded.from, 0xFFBE);
//! assert_eq!(decoded.command(), Some(Command::Ping));
//! ```

use crate::error::{Result, XSlotError};
use crate::util::crc16_ccitt;

/// Frame sync byte, the first byte of every frame on the wire.
pub const SYNC_BYTE: u8 = 0xAA;

/// Header size: SYNC(1) + FROM(2) + TO(2) + SEQ(1) + CMD(1) + LEN(1).
pub const HEADER_SIZE: usize = 8;

/// CRC trailer size.
pub const CRC_SIZE: usize = 2;

/// Maximum payload length.
pub const MAX_DATA_LEN: usize = 128;

/// Smallest possible frame (empty payload).
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CRC_SIZE;

/// Largest possible frame (full payload).
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_DATA_LEN + CRC_SIZE;

/// Byte offset of the destination address field.
pub const OFFSET_TO: usize = 3;

/// Byte offset of the payload length field.
pub const OFFSET_LEN: usize = 7;

/// X-Slot command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Heartbeat request.
    Ping = 0x01,
    /// Heartbeat response.
    Pong = 0x02,
    /// Object telemetry, edge to hub.
    Report = 0x10,
    /// Object query, HMI to hub.
    Query = 0x11,
    /// Query response, hub to HMI.
    Response = 0x12,
    /// Remote object write, hub to edge.
    Write = 0x20,
    /// Write confirmation, edge to hub.
    WriteAck = 0x21,
}

impl Command {
    /// Convert from the raw command byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Ping),
            0x02 => Some(Self::Pong),
            0x10 => Some(Self::Report),
            0x11 => Some(Self::Query),
            0x12 => Some(Self::Response),
            0x20 => Some(Self::Write),
            0x21 => Some(Self::WriteAck),
            _ => None,
        }
    }
}

/// A decoded X-Slot protocol frame.
///
/// Frames are short-lived: one is produced per send or per decoded receive
/// and dropped once dispatch completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Source address.
    pub from: u16,
    /// Destination address.
    pub to: u16,
    /// Sequence number, monotonic per sender, wraps at 255.
    pub seq: u8,
    /// Raw command byte.
    pub cmd: u8,
    /// Payload bytes, at most [`MAX_DATA_LEN`].
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame with an empty payload.
    pub fn new(from: u16, to: u16, seq: u8, cmd: Command) -> Self {
        Self {
            from,
            to,
            seq,
            cmd: cmd as u8,
            data: Vec::new(),
        }
    }

    /// Typed view of the command byte; `None` for unknown commands.
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.cmd)
    }

    /// Replace the payload. Fails with `NoMemory` if it exceeds
    /// [`MAX_DATA_LEN`].
    pub fn set_data(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_DATA_LEN {
            return Err(XSlotError::NoMemory);
        }
        self.data.clear();
        self.data.extend_from_slice(payload);
        Ok(())
    }

    /// Total on-wire size of this frame.
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.data.len() + CRC_SIZE
    }

    /// Encode the frame into `buffer`, returning the number of bytes
    /// written.
    ///
    /// Fails with `NoMemory` if the buffer is too small, or with
    /// `InvalidParam` if the payload exceeds [`MAX_DATA_LEN`].
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize> {
        if self.data.len() > MAX_DATA_LEN {
            return Err(XSlotError::InvalidParam);
        }
        let total = self.total_size();
        if buffer.len() < total {
            return Err(XSlotError::NoMemory);
        }

        buffer[0] = SYNC_BYTE;
        buffer[1..3].copy_from_slice(&self.from.to_le_bytes());
        buffer[3..5].copy_from_slice(&self.to.to_le_bytes());
        buffer[5] = self.seq;
        buffer[6] = self.cmd;
        buffer[7] = self.data.len() as u8;
        buffer[HEADER_SIZE..HEADER_SIZE + self.data.len()].copy_from_slice(&self.data);

        let crc = crc16_ccitt(&buffer[..HEADER_SIZE + self.data.len()]);
        buffer[HEADER_SIZE + self.data.len()..total].copy_from_slice(&crc.to_le_bytes());

        Ok(total)
    }

    /// Encode the frame into a freshly allocated buffer.
    pub fn encode_vec(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.total_size()];
        let len = self.encode(&mut buffer)?;
        buffer.truncate(len);
        Ok(buffer)
    }

    /// Decode a frame from `buffer`.
    ///
    /// Requires at least [`MIN_FRAME_SIZE`] bytes, a valid sync byte, a
    /// length field within bounds and a buffer long enough for the declared
    /// payload. The CRC is recomputed and checked last; a mismatch yields
    /// `CrcError`, every structural problem yields `InvalidParam`.
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < MIN_FRAME_SIZE {
            return Err(XSlotError::InvalidParam);
        }
        if buffer[0] != SYNC_BYTE {
            return Err(XSlotError::InvalidParam);
        }

        let len = buffer[OFFSET_LEN] as usize;
        if len > MAX_DATA_LEN {
            return Err(XSlotError::InvalidParam);
        }

        let total = HEADER_SIZE + len + CRC_SIZE;
        if buffer.len() < total {
            return Err(XSlotError::InvalidParam);
        }

        let crc_received =
            u16::from_le_bytes([buffer[HEADER_SIZE + len], buffer[HEADER_SIZE + len + 1]]);
        let crc_calculated = crc16_ccitt(&buffer[..HEADER_SIZE + len]);
        if crc_received != crc_calculated {
            return Err(XSlotError::CrcError);
        }

        Ok(Self {
            from: u16::from_le_bytes([buffer[1], buffer[2]]),
            to: u16::from_le_bytes([buffer[3], buffer[4]]),
            seq: buffer[5],
            cmd: buffer[6],
            data: buffer[HEADER_SIZE..HEADER_SIZE + len].to_vec(),
        })
    }

    /// Check the CRC of an encoded frame without building a [`Frame`].
    ///
    /// Used by the byte-stream transports to validate a candidate frame
    /// before delivering it upward.
    pub fn verify_crc(buffer: &[u8]) -> bool {
        if buffer.len() < MIN_FRAME_SIZE {
            return false;
        }

        let len = buffer[OFFSET_LEN] as usize;
        if len > MAX_DATA_LEN {
            return false;
        }

        let total = HEADER_SIZE + len + CRC_SIZE;
        if buffer.len() < total {
            return false;
        }

        let crc_received =
            u16::from_le_bytes([buffer[HEADER_SIZE + len], buffer[HEADER_SIZE + len + 1]]);
        crc16_ccitt(&buffer[..HEADER_SIZE + len]) == crc_received
    }

    /// Total frame size implied by a payload length byte.
    pub fn total_size_for(data_len: u8) -> usize {
        HEADER_SIZE + data_len as usize + CRC_SIZE
    }
}
