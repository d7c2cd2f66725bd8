//! Incremental Object Wire Format
//!
//! The narrow telemetry serialization used for change-of-value reports from
//! edge nodes to the hub. Each object carries only its instance number, a
//! one-byte type hint and the present value:
//!
//! `object_id (2B LE) | type_hint (1B) | value`
//!
//! The type hint has bit 7 set (the dialect sentinel) and encodes the value
//! class in its low four bits: 0 analog, 1 binary, 2 other. The exact
//! object sub-type and the status flags are dropped on the wire, which is
//! what buys the bandwidth saving. The decoder reconstructs a canonical
//! type for each class (AI for analog, BI for binary, AV for other) and
//! zeroed flags; applications that need the exact sub-type must use the
//! full format.

use crate::error::{Result, XSlotError};
use crate::object::{BacnetObject, ObjectType, ObjectValue, RAW_VALUE_SIZE};

/// Bit 7 of the type hint, marking a payload as incremental.
pub const INCREMENTAL_FLAG: u8 = 0x80;

/// Fixed part of a serialized object: id + type hint.
const OBJECT_HEADER_SIZE: usize = 3;

/// Value class carried in the low four bits of the type hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueClass {
    /// Four-byte IEEE-754 value.
    Analog = 0,
    /// One-byte 0/1 value.
    Binary = 1,
    /// Sixteen raw bytes.
    Other = 2,
}

impl ValueClass {
    /// Classify an object type.
    pub fn of(object_type: ObjectType) -> Self {
        if object_type.is_analog() {
            Self::Analog
        } else if object_type.is_binary() {
            Self::Binary
        } else {
            Self::Other
        }
    }

    /// Extract the class from a type hint byte.
    pub fn from_hint(hint: u8) -> Self {
        match hint & 0x0F {
            0 => Self::Analog,
            1 => Self::Binary,
            _ => Self::Other,
        }
    }

    /// The canonical object type reconstructed by the decoder.
    pub fn canonical_type(self) -> ObjectType {
        match self {
            Self::Analog => ObjectType::AnalogInput,
            Self::Binary => ObjectType::BinaryInput,
            Self::Other => ObjectType::AnalogValue,
        }
    }

    /// Serialized value size for this class.
    pub fn value_size(self) -> usize {
        match self {
            Self::Analog => 4,
            Self::Binary => 1,
            Self::Other => RAW_VALUE_SIZE,
        }
    }
}

/// Build the type hint byte for an object type.
pub fn type_hint(object_type: ObjectType) -> u8 {
    INCREMENTAL_FLAG | ValueClass::of(object_type) as u8
}

/// Serialized size of a single object in the incremental format.
pub fn serialized_size(obj: &BacnetObject) -> usize {
    OBJECT_HEADER_SIZE + ValueClass::of(obj.object_type).value_size()
}

/// Serialize one object into `buffer`, returning the bytes written.
pub fn serialize_object(obj: &BacnetObject, buffer: &mut [u8]) -> Result<usize> {
    let size = serialized_size(obj);
    if buffer.len() < size {
        return Err(XSlotError::NoMemory);
    }

    buffer[0..2].copy_from_slice(&obj.object_id.to_le_bytes());
    buffer[2] = type_hint(obj.object_type);

    match (&obj.value, ValueClass::of(obj.object_type)) {
        (ObjectValue::Analog(v), ValueClass::Analog) => {
            buffer[3..7].copy_from_slice(&v.to_le_bytes());
        }
        (ObjectValue::Binary(v), ValueClass::Binary) => {
            buffer[3] = *v;
        }
        (ObjectValue::Raw(raw), ValueClass::Other) => {
            buffer[3..3 + RAW_VALUE_SIZE].copy_from_slice(raw);
        }
        _ => return Err(XSlotError::InvalidParam),
    }

    Ok(size)
}

/// Serialize a batch of objects (count byte first), returning the bytes
/// written.
pub fn serialize_batch(objects: &[BacnetObject], buffer: &mut [u8]) -> Result<usize> {
    if objects.is_empty() || objects.len() > u8::MAX as usize {
        return Err(XSlotError::InvalidParam);
    }
    if buffer.is_empty() {
        return Err(XSlotError::NoMemory);
    }

    buffer[0] = objects.len() as u8;
    let mut offset = 1;

    for obj in objects {
        offset += serialize_object(obj, &mut buffer[offset..])?;
    }

    Ok(offset)
}

/// Deserialize one object from the start of `buffer`.
///
/// Returns the object and the number of bytes consumed. The object type
/// collapses to the canonical type of its value class and the flags come
/// back zeroed.
pub fn deserialize_object(buffer: &[u8]) -> Result<(BacnetObject, usize)> {
    if buffer.len() < OBJECT_HEADER_SIZE {
        return Err(XSlotError::InvalidParam);
    }

    let object_id = u16::from_le_bytes([buffer[0], buffer[1]]);
    let hint = buffer[2];
    if hint & INCREMENTAL_FLAG == 0 {
        return Err(XSlotError::InvalidParam);
    }

    let class = ValueClass::from_hint(hint);
    let value_bytes = &buffer[OBJECT_HEADER_SIZE..];
    if value_bytes.len() < class.value_size() {
        return Err(XSlotError::InvalidParam);
    }

    let value = match class {
        ValueClass::Analog => {
            let bits = [value_bytes[0], value_bytes[1], value_bytes[2], value_bytes[3]];
            ObjectValue::Analog(f32::from_le_bytes(bits))
        }
        ValueClass::Binary => ObjectValue::Binary(value_bytes[0]),
        ValueClass::Other => {
            let mut raw = [0u8; RAW_VALUE_SIZE];
            raw.copy_from_slice(&value_bytes[..RAW_VALUE_SIZE]);
            ObjectValue::Raw(raw)
        }
    };

    Ok((
        BacnetObject {
            object_id,
            object_type: class.canonical_type(),
            flags: 0,
            value,
        },
        OBJECT_HEADER_SIZE + class.value_size(),
    ))
}

/// Deserialize a batch of objects.
///
/// The declared count is clamped to `max_count`; truncation inside an
/// object fails with `InvalidParam`.
pub fn deserialize_batch(buffer: &[u8], max_count: usize) -> Result<Vec<BacnetObject>> {
    if buffer.is_empty() {
        return Err(XSlotError::InvalidParam);
    }

    let count = (buffer[0] as usize).min(max_count);
    let mut objects = Vec::with_capacity(count);
    let mut offset = 1;

    for _ in 0..count {
        let (obj, consumed) = deserialize_object(&buffer[offset..])?;
        objects.push(obj);
        offset += consumed;
    }

    Ok(objects)
}
