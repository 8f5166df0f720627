//! Utility functions for wire conversion: UTF-16 text, DWORD sign handling,
//! and key timestamps.

use crate::error::{RegistryError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use encoding_rs::UTF_16LE;
use std::io::Cursor;

/// Number of 100-nanosecond intervals in one microsecond.
const TICKS_PER_MICROSECOND: u64 = 10;

/// Reads a UTF-16LE string from a byte slice, trimming null terminators.
///
/// Registry strings are typically null-terminated. This function decodes
/// UTF-16LE data and removes trailing null characters.
///
/// # Errors
///
/// Returns an error if the data length is not even (UTF-16 requires 2-byte units)
/// or if the UTF-16 decoding fails.
pub fn read_utf16_string(data: &[u8]) -> Result<String> {
    Ok(decode_utf16(data)?.trim_end_matches('\0').to_string())
}

/// Decodes UTF-16LE without touching null characters.
fn decode_utf16(data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    if data.len() % 2 != 0 {
        return Err(RegistryError::type_conversion(format!(
            "UTF-16 data has odd length {}",
            data.len()
        )));
    }

    let (decoded, had_errors) = UTF_16LE.decode_without_bom_handling(data);

    if had_errors {
        return Err(RegistryError::type_conversion("invalid UTF-16 sequence"));
    }

    Ok(decoded.into_owned())
}

/// Reads a UTF-16LE string, replacing malformed sequences with U+FFFD.
///
/// A trailing odd byte is dropped.
pub fn read_utf16_string_lossy(data: &[u8]) -> String {
    let even = &data[..data.len() & !1];
    let (decoded, _had_errors) = UTF_16LE.decode_without_bom_handling(even);
    decoded.trim_end_matches('\0').to_string()
}

/// Encodes a string as null-terminated UTF-16LE.
pub fn write_utf16_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity((text.len() + 1) * 2);
    for unit in text.encode_utf16().chain(std::iter::once(0)) {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Reads a `REG_MULTI_SZ` payload: null-terminated strings followed by one
/// more null.
///
/// Empty elements are kept, so `[""]` and `[]` decode differently. A payload
/// missing the final list terminator is accepted.
pub fn read_multi_string(data: &[u8]) -> Result<Vec<String>> {
    let decoded = decode_utf16(data)?;
    if decoded.is_empty() || decoded == "\0" {
        return Ok(Vec::new());
    }
    let body = decoded
        .strip_suffix("\0\0")
        .or_else(|| decoded.strip_suffix('\0'))
        .unwrap_or(decoded.as_str());
    Ok(body.split('\0').map(str::to_string).collect())
}

/// Encodes strings as a `REG_MULTI_SZ` payload.
pub fn write_multi_string<S: AsRef<str>>(items: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        out.extend(write_utf16_string(item.as_ref()));
    }
    out.extend_from_slice(&[0, 0]);
    out
}

/// Converts an unsigned DWORD to the signed form native registry bindings take.
///
/// Values at or above 2^31 wrap to negative numbers; the bit pattern is unchanged.
#[inline]
pub fn dword_to_signed(value: u32) -> i32 {
    value as i32
}

/// Inverse of [`dword_to_signed`]: masks a signed 32-bit value back to unsigned.
#[inline]
pub fn dword_from_signed(value: i32) -> u32 {
    value as u32
}

/// Packs a DWORD as 4 big-endian bytes.
pub fn write_u32_be(value: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    buf
}

/// Reads a big-endian DWORD from the first 4 bytes of `data`.
pub fn read_u32_be(data: &[u8]) -> Result<u32> {
    if data.len() < 4 {
        return Err(RegistryError::TruncatedData {
            expected: 4,
            actual: data.len(),
        });
    }
    let mut cursor = Cursor::new(&data[..4]);
    Ok(cursor.read_u32::<BigEndian>()?)
}

/// Reads a little-endian DWORD from the first 4 bytes of `data`.
pub fn read_u32_le(data: &[u8]) -> Result<u32> {
    if data.len() < 4 {
        return Err(RegistryError::TruncatedData {
            expected: 4,
            actual: data.len(),
        });
    }
    let mut cursor = Cursor::new(&data[..4]);
    Ok(cursor.read_u32::<LittleEndian>()?)
}

/// Epoch that key write times are counted from.
pub fn registry_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1600, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Converts a count of 100-nanosecond intervals since [`registry_epoch`]
/// into an absolute timestamp (microsecond resolution).
///
/// Returns `None` if the result is not representable.
pub fn ticks_to_datetime(ticks: u64) -> Option<NaiveDateTime> {
    let micros = i64::try_from(ticks / TICKS_PER_MICROSECOND).ok()?;
    registry_epoch().checked_add_signed(Duration::microseconds(micros))
}

/// Converts an absolute timestamp back into 100-nanosecond ticks since
/// [`registry_epoch`]. Timestamps before the epoch clamp to 0.
pub fn datetime_to_ticks(when: NaiveDateTime) -> u64 {
    let micros = (when - registry_epoch()).num_microseconds().unwrap_or(0);
    u64::try_from(micros).unwrap_or(0) * TICKS_PER_MICROSECOND
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_utf16_round_trip() {
        let bytes = write_utf16_string("Hello");
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[10..], &[0, 0]);
        assert_eq!(read_utf16_string(&bytes).unwrap(), "Hello");
    }

    #[test]
    fn test_utf16_odd_length() {
        assert!(read_utf16_string(&[0x41, 0x00, 0x42]).is_err());
        assert_eq!(read_utf16_string_lossy(&[0x41, 0x00, 0x42]), "A");
    }

    #[test]
    fn test_multi_string() {
        let bytes = write_multi_string(&["a", "bc"]);
        // "a\0bc\0\0" in UTF-16LE
        assert_eq!(bytes.len(), 12);
        assert_eq!(read_multi_string(&bytes).unwrap(), vec!["a", "bc"]);

        let empty: [&str; 0] = [];
        assert_eq!(read_multi_string(&write_multi_string(&empty)).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_multi_string_keeps_empty_elements() {
        for items in [vec![""], vec!["a", ""], vec!["", "b"], vec!["", ""], vec!["a", "", "c"]] {
            assert_eq!(read_multi_string(&write_multi_string(&items)).unwrap(), items);
        }
        // Missing list terminator
        let unterminated = write_utf16_string("a");
        assert_eq!(read_multi_string(&unterminated).unwrap(), vec!["a"]);
        assert_eq!(read_multi_string(&[]).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_dword_sign_handling() {
        assert_eq!(dword_to_signed(0x8765_4321), -2_023_406_815);
        assert_eq!(dword_from_signed(-2_023_406_815), 0x8765_4321);
        assert_eq!(dword_to_signed(0x7FFF_FFFF), i32::MAX);
        assert_eq!(dword_from_signed(-1), u32::MAX);
    }

    #[test]
    fn test_big_endian() {
        assert_eq!(write_u32_be(0x1234_5678), [0x12, 0x34, 0x56, 0x78]);
        assert_eq!(read_u32_be(&[0x12, 0x34, 0x56, 0x78]).unwrap(), 0x1234_5678);
        assert!(matches!(
            read_u32_be(&[0x12, 0x34]),
            Err(RegistryError::TruncatedData { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_read_u32_le() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_u32_le(&data).unwrap(), 0x04030201);
    }

    #[test]
    fn test_ticks() {
        let epoch = ticks_to_datetime(0).unwrap();
        assert_eq!((epoch.year(), epoch.month(), epoch.day()), (1600, 1, 1));

        // One second and 1.5 microseconds
        let when = ticks_to_datetime(10_000_015).unwrap();
        assert_eq!(when.second(), 1);
        assert_eq!(when.nanosecond(), 1_000);
        assert_eq!(datetime_to_ticks(when), 10_000_010);
    }
}
