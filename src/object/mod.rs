//! BACnet Object Types and Wire Serialization
//!
//! This module defines the BACnet object subset carried by the X-Slot
//! protocol and the two wire dialects used to move objects between nodes.
//! Objects model DDC points: analog and binary inputs, outputs and values.
//!
//! # Overview
//!
//! An object on the wire consists of an instance number, a type, status
//! flags and a present value. The value encoding depends only on the type's
//! value class:
//!
//! - **Analog** (AI/AO/AV): IEEE-754 binary32, little-endian, 4 bytes
//! - **Binary** (BI/BO/BV): one byte, 0 or 1
//! - **Other** (vendor types): 16 raw bytes
//!
//! # Wire Dialects
//!
//! Two serializations share the value encoding:
//!
//! - [`full`]: `object_id (2B) | object_type (1B) | flags (1B) | value`.
//!   Lossless; used for Write, Response and full Reports.
//! - [`incremental`]: `object_id (2B) | type_hint (1B) | value`. The type
//!   hint has bit 7 set and carries only the value class, so the exact
//!   sub-type and the flags are dropped. Preferred for edge-to-hub
//!   telemetry where every byte of airtime counts.
//!
//! A batch in either dialect prepends a one-byte object count. The dialects
//! are distinguishable at parse time: the first object's type byte sits at
//! payload offset 3, and only the incremental hint ever has bit 7 set
//! (full-format type bytes stay below 0x80). [`deserialize_objects`]
//! performs that detection.

use crate::error::{Result, XSlotError};

pub mod full;
pub mod incremental;

/// Object flag: present value changed since the last report.
pub const FLAG_CHANGED: u8 = 0x01;

/// Object flag: the point is out of service.
pub const FLAG_OUT_OF_SERVICE: u8 = 0x02;

/// Size in bytes of a raw (non-analog, non-binary) present value.
pub const RAW_VALUE_SIZE: usize = 16;

/// BACnet object types carried by the protocol.
///
/// The six standard DDC point types are modeled explicitly; any other type
/// byte travels as [`ObjectType::Custom`] with a 16-byte raw value. Custom
/// type bytes must stay below 0x80, which is reserved as the incremental
/// dialect sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// Analog input (sensor reading), type byte 0.
    AnalogInput,
    /// Analog output (actuator command), type byte 1.
    AnalogOutput,
    /// Analog value (software point), type byte 2.
    AnalogValue,
    /// Binary input (contact state), type byte 3.
    BinaryInput,
    /// Binary output (relay command), type byte 4.
    BinaryOutput,
    /// Binary value (software flag), type byte 5.
    BinaryValue,
    /// Vendor-specific type; the value is carried as 16 raw bytes.
    Custom(u8),
}

impl ObjectType {
    /// Convert from the raw type byte.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::AnalogInput,
            1 => Self::AnalogOutput,
            2 => Self::AnalogValue,
            3 => Self::BinaryInput,
            4 => Self::BinaryOutput,
            5 => Self::BinaryValue,
            other => Self::Custom(other),
        }
    }

    /// The on-wire type byte.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::AnalogInput => 0,
            Self::AnalogOutput => 1,
            Self::AnalogValue => 2,
            Self::BinaryInput => 3,
            Self::BinaryOutput => 4,
            Self::BinaryValue => 5,
            Self::Custom(v) => v,
        }
    }

    /// True for AI, AO and AV.
    pub fn is_analog(self) -> bool {
        matches!(
            self,
            Self::AnalogInput | Self::AnalogOutput | Self::AnalogValue
        )
    }

    /// True for BI, BO and BV.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Self::BinaryInput | Self::BinaryOutput | Self::BinaryValue
        )
    }

    /// Serialized size of this type's present value.
    pub fn value_size(self) -> usize {
        if self.is_analog() {
            4
        } else if self.is_binary() {
            1
        } else {
            RAW_VALUE_SIZE
        }
    }
}

/// Present value of an object, tagged by value class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectValue {
    /// Analog value for AI/AO/AV.
    Analog(f32),
    /// Binary value for BI/BO/BV, 0 or 1.
    Binary(u8),
    /// Raw bytes for custom types.
    Raw([u8; RAW_VALUE_SIZE]),
}

impl ObjectValue {
    /// The analog value, if this is an analog variant.
    pub fn as_analog(&self) -> Option<f32> {
        match self {
            ObjectValue::Analog(v) => Some(*v),
            _ => None,
        }
    }

    /// The binary value, if this is a binary variant.
    pub fn as_binary(&self) -> Option<u8> {
        match self {
            ObjectValue::Binary(v) => Some(*v),
            _ => None,
        }
    }
}

/// A BACnet object as carried on the X-Slot wire.
#[derive(Debug, Clone, PartialEq)]
pub struct BacnetObject {
    /// Object instance number.
    pub object_id: u16,
    /// Object type.
    pub object_type: ObjectType,
    /// Status flags ([`FLAG_CHANGED`], [`FLAG_OUT_OF_SERVICE`]).
    pub flags: u8,
    /// Present value. Must match the type's value class when serialized.
    pub value: ObjectValue,
}

impl BacnetObject {
    /// Create an analog input object.
    pub fn analog_input(object_id: u16, value: f32) -> Self {
        Self::analog(object_id, ObjectType::AnalogInput, value)
    }

    /// Create an analog output object.
    pub fn analog_output(object_id: u16, value: f32) -> Self {
        Self::analog(object_id, ObjectType::AnalogOutput, value)
    }

    /// Create an analog value object.
    pub fn analog_value(object_id: u16, value: f32) -> Self {
        Self::analog(object_id, ObjectType::AnalogValue, value)
    }

    /// Create a binary input object.
    pub fn binary_input(object_id: u16, state: bool) -> Self {
        Self::binary(object_id, ObjectType::BinaryInput, state)
    }

    /// Create a binary output object.
    pub fn binary_output(object_id: u16, state: bool) -> Self {
        Self::binary(object_id, ObjectType::BinaryOutput, state)
    }

    /// Create a binary value object.
    pub fn binary_value(object_id: u16, state: bool) -> Self {
        Self::binary(object_id, ObjectType::BinaryValue, state)
    }

    /// Create a custom-typed object carrying 16 raw bytes.
    pub fn custom(object_id: u16, type_byte: u8, raw: [u8; RAW_VALUE_SIZE]) -> Self {
        Self {
            object_id,
            object_type: ObjectType::from_u8(type_byte),
            flags: 0,
            value: ObjectValue::Raw(raw),
        }
    }

    fn analog(object_id: u16, object_type: ObjectType, value: f32) -> Self {
        Self {
            object_id,
            object_type,
            flags: 0,
            value: ObjectValue::Analog(value),
        }
    }

    fn binary(object_id: u16, object_type: ObjectType, state: bool) -> Self {
        Self {
            object_id,
            object_type,
            flags: 0,
            value: ObjectValue::Binary(state as u8),
        }
    }

    /// Set or clear the status flags, consuming and returning the object.
    pub fn with_flags(mut self, changed: bool, out_of_service: bool) -> Self {
        self.flags = 0;
        if changed {
            self.flags |= FLAG_CHANGED;
        }
        if out_of_service {
            self.flags |= FLAG_OUT_OF_SERVICE;
        }
        self
    }

    /// True when the changed flag is set.
    pub fn is_changed(&self) -> bool {
        self.flags & FLAG_CHANGED != 0
    }

    /// True when the out-of-service flag is set.
    pub fn is_out_of_service(&self) -> bool {
        self.flags & FLAG_OUT_OF_SERVICE != 0
    }
}

/// Deserialize an object batch, auto-detecting the wire dialect.
///
/// Inspects bit 7 of the first object's type byte (payload offset 3): set
/// means incremental, clear means full. At most `max_count` objects are
/// returned; a larger declared count is clamped and trailing objects are
/// ignored.
pub fn deserialize_objects(payload: &[u8], max_count: usize) -> Result<Vec<BacnetObject>> {
    if payload.is_empty() {
        return Err(XSlotError::InvalidParam);
    }

    if payload.len() >= 4 && payload[3] & incremental::INCREMENTAL_FLAG != 0 {
        incremental::deserialize_batch(payload, max_count)
    } else {
        full::deserialize_objects(payload, max_count)
    }
}
