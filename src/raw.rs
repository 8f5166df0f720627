//! Transport-level value representation.
//!
//! Native registry bindings do not hand back bare bytes for every type: a
//! `REG_DWORD` arrives as a signed 32-bit integer, strings arrive decoded, and
//! multi-strings arrive as a list. [`RawValue`] models exactly that shape.
//! [`RawValue::to_wire`] and [`RawValue::from_wire`] convert between it and the
//! byte layout the registry stores on disk.

use crate::utils::{read_multi_string, read_utf16_string, write_multi_string, write_utf16_string};
use crate::value_type::ValueType;

/// A value as exchanged with the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Opaque bytes.
    Bytes(Vec<u8>),

    /// Signed 32-bit integer (the only integer form the transport accepts).
    Dword(i32),

    /// Decoded text, without terminator.
    Text(String),

    /// Decoded list of strings.
    TextList(Vec<String>),
}

impl RawValue {
    /// Flattens the value into the byte layout stored by the registry.
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            RawValue::Bytes(b) => b.clone(),
            RawValue::Dword(d) => d.to_le_bytes().to_vec(),
            RawValue::Text(s) => write_utf16_string(s),
            RawValue::TextList(items) => write_multi_string(items),
        }
    }

    /// Reconstructs the transport shape of stored bytes for the given tag.
    ///
    /// Data that does not fit the shape its tag implies (a 3-byte `REG_DWORD`,
    /// malformed UTF-16) is returned as [`RawValue::Bytes`].
    pub fn from_wire(tag: u32, data: &[u8]) -> Self {
        match ValueType::from_u32(tag) {
            ValueType::Dword if data.len() == 4 => {
                RawValue::Dword(i32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            ValueType::String | ValueType::ExpandString => match read_utf16_string(data) {
                Ok(s) => RawValue::Text(s),
                Err(_) => RawValue::Bytes(data.to_vec()),
            },
            ValueType::MultiString => match read_multi_string(data) {
                Ok(items) => RawValue::TextList(items),
                Err(_) => RawValue::Bytes(data.to_vec()),
            },
            _ => RawValue::Bytes(data.to_vec()),
        }
    }

    /// Consumes the value, returning its wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            RawValue::Bytes(b) => b,
            other => other.to_wire(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dword_wire_is_little_endian() {
        let raw = RawValue::Dword(0x1234_5678);
        assert_eq!(raw.to_wire(), vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(RawValue::from_wire(ValueType::REG_DWORD, &raw.to_wire()), raw);
    }

    #[test]
    fn test_short_dword_stays_bytes() {
        let raw = RawValue::from_wire(ValueType::REG_DWORD, &[1, 2]);
        assert_eq!(raw, RawValue::Bytes(vec![1, 2]));
    }

    #[test]
    fn test_text_shapes() {
        let raw = RawValue::Text("hi".into());
        assert_eq!(RawValue::from_wire(ValueType::REG_SZ, &raw.to_wire()), raw);
        assert_eq!(RawValue::from_wire(ValueType::REG_EXPAND_SZ, &raw.to_wire()), raw);

        let list = RawValue::TextList(vec!["a".into(), "b".into()]);
        assert_eq!(RawValue::from_wire(ValueType::REG_MULTI_SZ, &list.to_wire()), list);
    }

    #[test]
    fn test_link_and_unknown_are_bytes() {
        let data = write_utf16_string("target");
        assert_eq!(
            RawValue::from_wire(ValueType::REG_LINK, &data),
            RawValue::Bytes(data.clone())
        );
        assert_eq!(RawValue::from_wire(9999, &[1, 2, 3]), RawValue::Bytes(vec![1, 2, 3]));
    }
}
