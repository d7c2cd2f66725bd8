//! Full Object Wire Format
//!
//! The lossless object serialization: every field of a [`BacnetObject`]
//! survives a round trip. Used for Write frames (single object) and for
//! Response and full Report batches.
//!
//! Per object: `object_id (2B LE) | object_type (1B) | flags (1B) | value`.
//! A batch prepends a one-byte count.

use crate::error::{Result, XSlotError};
use crate::object::{BacnetObject, ObjectType, ObjectValue, RAW_VALUE_SIZE};

/// Fixed part of a serialized object: id + type + flags.
const OBJECT_HEADER_SIZE: usize = 4;

/// Serialized size of a single object in the full format.
pub fn serialized_size(obj: &BacnetObject) -> usize {
    OBJECT_HEADER_SIZE + obj.object_type.value_size()
}

/// Serialize one object into `buffer`, returning the bytes written.
///
/// Fails with `NoMemory` when the buffer is too small and with
/// `InvalidParam` when the value variant does not match the object type's
/// class, or when a custom type byte collides with the incremental
/// sentinel (bit 7).
pub fn serialize_object(obj: &BacnetObject, buffer: &mut [u8]) -> Result<usize> {
    // Type bytes with bit 7 set would masquerade as incremental payloads.
    if obj.object_type.as_u8() & 0x80 != 0 {
        return Err(XSlotError::InvalidParam);
    }

    let size = serialized_size(obj);
    if buffer.len() < size {
        return Err(XSlotError::NoMemory);
    }

    buffer[0..2].copy_from_slice(&obj.object_id.to_le_bytes());
    buffer[2] = obj.object_type.as_u8();
    buffer[3] = obj.flags;
    write_value(obj, &mut buffer[OBJECT_HEADER_SIZE..])?;

    Ok(size)
}

/// Serialize a batch of objects (count byte first), returning the bytes
/// written.
pub fn serialize_objects(objects: &[BacnetObject], buffer: &mut [u8]) -> Result<usize> {
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
/// Returns the object together with the number of bytes consumed, so batch
/// decoding can walk the buffer. Truncation fails with `InvalidParam`.
pub fn deserialize_object(buffer: &[u8]) -> Result<(BacnetObject, usize)> {
    if buffer.len() < OBJECT_HEADER_SIZE {
        return Err(XSlotError::InvalidParam);
    }

    let object_id = u16::from_le_bytes([buffer[0], buffer[1]]);
    let object_type = ObjectType::from_u8(buffer[2]);
    let flags = buffer[3];

    let value_bytes = &buffer[OBJECT_HEADER_SIZE..];
    let (value, value_size) = read_value(object_type, value_bytes)?;

    Ok((
        BacnetObject {
            object_id,
            object_type,
            flags,
            value,
        },
        OBJECT_HEADER_SIZE + value_size,
    ))
}

/// Deserialize a batch of objects.
///
/// The declared count is clamped to `max_count`; objects beyond the clamp
/// are left unread. Truncation inside a decoded object fails with
/// `InvalidParam`.
pub fn deserialize_objects(buffer: &[u8], max_count: usize) -> Result<Vec<BacnetObject>> {
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

fn write_value(obj: &BacnetObject, buffer: &mut [u8]) -> Result<()> {
    match (&obj.value, obj.object_type) {
        (ObjectValue::Analog(v), t) if t.is_analog() => {
            buffer[0..4].copy_from_slice(&v.to_le_bytes());
            Ok(())
        }
        (ObjectValue::Binary(v), t) if t.is_binary() => {
            buffer[0] = *v;
            Ok(())
        }
        (ObjectValue::Raw(raw), t) if !t.is_analog() && !t.is_binary() => {
            buffer[0..RAW_VALUE_SIZE].copy_from_slice(raw);
            Ok(())
        }
        _ => Err(XSlotError::InvalidParam),
    }
}

fn read_value(object_type: ObjectType, buffer: &[u8]) -> Result<(ObjectValue, usize)> {
    if object_type.is_analog() {
        if buffer.len() < 4 {
            return Err(XSlotError::InvalidParam);
        }
        let bits = [buffer[0], buffer[1], buffer[2], buffer[3]];
        Ok((ObjectValue::Analog(f32::from_le_bytes(bits)), 4))
    } else if object_type.is_binary() {
        if buffer.is_empty() {
            return Err(XSlotError::InvalidParam);
        }
        Ok((ObjectValue::Binary(buffer[0]), 1))
    } else {
        if buffer.len() < RAW_VALUE_SIZE {
            return Err(XSlotError::InvalidParam);
        }
        let mut raw = [0u8; RAW_VALUE_SIZE];
        raw.copy_from_slice(&buffer[..RAW_VALUE_SIZE]);
        Ok((ObjectValue::Raw(raw), RAW_VALUE_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_object_round_trip() {
        let obj = BacnetObject::analog_input(7, 23.5).with_flags(true, false);
        let mut buffer = [0u8; 32];

        let len = serialize_object(&obj, &mut buffer).unwrap();
        assert_eq!(len, 8);

        let (decoded, consumed) = deserialize_object(&buffer[..len]).unwrap();
        assert_eq!(consumed, len);
        assert_eq!(decoded, obj);
    }

    #[test]
    fn test_wire_layout() {
        // BO #3 with value 1: id LE, type 4, flags 0, one value byte
        let obj = BacnetObject::binary_output(3, true);
        let mut buffer = [0u8; 8];
        let len = serialize_object(&obj, &mut buffer).unwrap();
        assert_eq!(&buffer[..len], &[0x03, 0x00, 0x04, 0x00, 0x01]);
    }

    #[test]
    fn test_batch_round_trip_all_classes() {
        let objects = vec![
            BacnetObject::analog_input(1, -12.25),
            BacnetObject::analog_output(2, 55.0).with_flags(true, true),
            BacnetObject::binary_input(3, false),
            BacnetObject::binary_value(4, true),
            BacnetObject::custom(5, 0x10, [0xA5; RAW_VALUE_SIZE]),
        ];

        let mut buffer = [0u8; 128];
        let len = serialize_objects(&objects, &mut buffer).unwrap();
        assert_eq!(len, 1 + 8 + 8 + 5 + 5 + 20);

        let decoded = deserialize_objects(&buffer[..len], 16).unwrap();
        assert_eq!(decoded, objects);
    }

    #[test]
    fn test_count_clamped_to_capacity() {
        let objects = vec![
            BacnetObject::binary_input(1, true),
            BacnetObject::binary_input(2, false),
            BacnetObject::binary_input(3, true),
        ];

        let mut buffer = [0u8; 64];
        let len = serialize_objects(&objects, &mut buffer).unwrap();

        let decoded = deserialize_objects(&buffer[..len], 2).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].object_id, 1);
        assert_eq!(decoded[1].object_id, 2);
    }

    #[test]
    fn test_truncated_input_rejected() {
        let obj = BacnetObject::analog_value(9, 1.0);
        let mut buffer = [0u8; 16];
        let len = serialize_object(&obj, &mut buffer).unwrap();

        for cut in 1..len {
            assert_eq!(
                deserialize_object(&buffer[..len - cut]),
                Err(XSlotError::InvalidParam)
            );
        }
    }

    #[test]
    fn test_serialize_no_memory() {
        let obj = BacnetObject::analog_input(1, 2.0);
        let mut buffer = [0u8; 7];
        assert_eq!(
            serialize_object(&obj, &mut buffer),
            Err(XSlotError::NoMemory)
        );
    }

    #[test]
    fn test_mismatched_value_class_rejected() {
        let obj = BacnetObject {
            object_id: 1,
            object_type: ObjectType::AnalogInput,
            flags: 0,
            value: ObjectValue::Binary(1),
        };
        let mut buffer = [0u8; 16];
        assert_eq!(
            serialize_object(&obj, &mut buffer),
            Err(XSlotError::InvalidParam)
        );
    }

    #[test]
    fn test_sentinel_type_byte_rejected() {
        let obj = BacnetObject::custom(1, 0x80, [0u8; RAW_VALUE_SIZE]);
        let mut buffer = [0u8; 32];
        assert_eq!(
            serialize_object(&obj, &mut buffer),
            Err(XSlotError::InvalidParam)
        );
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut buffer = [0u8; 16];
        assert_eq!(
            serialize_objects(&[], &mut buffer),
            Err(XSlotError::InvalidParam)
        );
    }
}
