//! Message Building and Parsing
//!
//! Helpers that map between protocol commands and frame payloads. The
//! builders produce ready-to-encode [`Frame`]s; the parsers accept a typed
//! frame and extract the structured payload.
//!
//! | Command  | Payload |
//! |----------|---------|
//! | Ping     | empty |
//! | Pong     | empty |
//! | Report   | object batch, incremental or full |
//! | Query    | `count (1B)` then `count` object ids (2B LE each) |
//! | Response | object batch, full |
//! | Write    | single object, full |
//! | WriteAck | `result (1B)`, 0 = ok |
//!
//! Builders enforce the 128-byte payload limit and fail with `NoMemory`
//! when a batch does not fit.

use crate::error::{Result, XSlotError};
use crate::frame::{Command, Frame, MAX_DATA_LEN};
use crate::object::{full, incremental, BacnetObject};

/// Build a Ping frame (empty payload).
pub fn build_ping(from: u16, to: u16, seq: u8) -> Frame {
    Frame::new(from, to, seq, Command::Ping)
}

/// Build a Pong frame answering a Ping; the sequence number is echoed.
pub fn build_pong(from: u16, to: u16, seq: u8) -> Frame {
    Frame::new(from, to, seq, Command::Pong)
}

/// Build a Report frame carrying an object batch.
///
/// `incremental` selects the wire dialect; edge-to-hub telemetry normally
/// uses the incremental one.
pub fn build_report(
    from: u16,
    to: u16,
    seq: u8,
    objects: &[BacnetObject],
    use_incremental: bool,
) -> Result<Frame> {
    if objects.is_empty() {
        return Err(XSlotError::InvalidParam);
    }

    let mut payload = [0u8; MAX_DATA_LEN];
    let len = if use_incremental {
        incremental::serialize_batch(objects, &mut payload)?
    } else {
        full::serialize_objects(objects, &mut payload)?
    };

    let mut frame = Frame::new(from, to, seq, Command::Report);
    frame.set_data(&payload[..len])?;
    Ok(frame)
}

/// Build a Query frame for a list of object ids.
pub fn build_query(from: u16, to: u16, seq: u8, object_ids: &[u16]) -> Result<Frame> {
    if object_ids.is_empty() || object_ids.len() > u8::MAX as usize {
        return Err(XSlotError::InvalidParam);
    }
    if 1 + object_ids.len() * 2 > MAX_DATA_LEN {
        return Err(XSlotError::NoMemory);
    }

    let mut payload = Vec::with_capacity(1 + object_ids.len() * 2);
    payload.push(object_ids.len() as u8);
    for id in object_ids {
        payload.extend_from_slice(&id.to_le_bytes());
    }

    let mut frame = Frame::new(from, to, seq, Command::Query);
    frame.set_data(&payload)?;
    Ok(frame)
}

/// Build a Response frame carrying an object batch in the full dialect.
pub fn build_response(from: u16, to: u16, seq: u8, objects: &[BacnetObject]) -> Result<Frame> {
    if objects.is_empty() {
        return Err(XSlotError::InvalidParam);
    }

    let mut payload = [0u8; MAX_DATA_LEN];
    let len = full::serialize_objects(objects, &mut payload)?;

    let mut frame = Frame::new(from, to, seq, Command::Response);
    frame.set_data(&payload[..len])?;
    Ok(frame)
}

/// Build a Write frame carrying a single object in the full dialect.
pub fn build_write(from: u16, to: u16, seq: u8, obj: &BacnetObject) -> Result<Frame> {
    let mut payload = [0u8; MAX_DATA_LEN];
    let len = full::serialize_object(obj, &mut payload)?;

    let mut frame = Frame::new(from, to, seq, Command::Write);
    frame.set_data(&payload[..len])?;
    Ok(frame)
}

/// Build a WriteAck frame; the sequence number of the Write is echoed and
/// `result` 0 means success.
pub fn build_write_ack(from: u16, to: u16, seq: u8, result: u8) -> Frame {
    let mut frame = Frame::new(from, to, seq, Command::WriteAck);
    frame.data.push(result);
    frame
}

/// Parse a Report frame into an object batch, auto-detecting the dialect
/// from the first object's type byte.
pub fn parse_report(frame: &Frame, max_count: usize) -> Result<Vec<BacnetObject>> {
    if frame.command() != Some(Command::Report) {
        return Err(XSlotError::InvalidParam);
    }
    crate::object::deserialize_objects(&frame.data, max_count)
}

/// Parse a Query frame into the requested object ids.
///
/// A declared count larger than `max_count` is clamped.
pub fn parse_query(frame: &Frame, max_count: usize) -> Result<Vec<u16>> {
    if frame.command() != Some(Command::Query) {
        return Err(XSlotError::InvalidParam);
    }
    if frame.data.is_empty() {
        return Err(XSlotError::InvalidParam);
    }

    let count = (frame.data[0] as usize).min(max_count);
    if frame.data.len() < 1 + count * 2 {
        return Err(XSlotError::InvalidParam);
    }

    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let offset = 1 + i * 2;
        ids.push(u16::from_le_bytes([
            frame.data[offset],
            frame.data[offset + 1],
        ]));
    }
    Ok(ids)
}

/// Parse a Response frame into an object batch (full dialect).
pub fn parse_response(frame: &Frame, max_count: usize) -> Result<Vec<BacnetObject>> {
    if frame.command() != Some(Command::Response) {
        return Err(XSlotError::InvalidParam);
    }
    full::deserialize_objects(&frame.data, max_count)
}

/// Parse a Write frame into the single object it carries.
pub fn parse_write(frame: &Frame) -> Result<BacnetObject> {
    if frame.command() != Some(Command::Write) {
        return Err(XSlotError::InvalidParam);
    }
    let (obj, _) = full::deserialize_object(&frame.data)?;
    Ok(obj)
}

/// Parse a WriteAck frame into its result byte.
pub fn parse_write_ack(frame: &Frame) -> Result<u8> {
    if frame.command() != Some(Command::WriteAck) {
        return Err(XSlotError::InvalidParam);
    }
    if frame.data.is_empty() {
        return Err(XSlotError::InvalidParam);
    }
    Ok(frame.data[0])
}
