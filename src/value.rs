//! Typed registry values and their conversion to and from the transport.
//!
//! [`decode`] turns a wire tag plus a [`RawValue`] into a [`ValueData`];
//! [`encode`] goes the other way, accepting either a `ValueData` or any
//! native Rust value that implements [`IntoRegistry`].
//!
//! Native values are mapped to the closest registry type:
//!
//! | Native | Registry type |
//! |---|---|
//! | `&str`, `String` | `REG_SZ` |
//! | collections of text (`Vec`, arrays, slices, `VecDeque`, `BTreeSet`, `HashSet`; iterators collected into a [`TextList`]) | `REG_MULTI_SZ` |
//! | `Vec<u8>`, `&[u8]` | `REG_BINARY` |
//! | integers | `REG_DWORD` (range checked) |
//! | `bool` | `REG_DWORD`, `0` or `0xFFFFFFFF` |
//! | `None` | `REG_NONE`, empty |

use crate::error::{RegistryError, Result};
use crate::raw::RawValue;
use crate::utils::{
    dword_from_signed, dword_to_signed, read_multi_string, read_u32_be, read_u32_le,
    read_utf16_string, read_utf16_string_lossy, write_u32_be, write_utf16_string,
};
use crate::value_type::ValueType;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::hash::BuildHasher;
use std::ops::{Deref, Range};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parsed registry value data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueData {
    /// No declared type (`REG_NONE`); raw bytes.
    None(Vec<u8>),

    /// String value.
    String(String),

    /// Expandable string value. `%VAR%` references are left unexpanded.
    ExpandString(String),

    /// Binary data.
    Binary(Vec<u8>),

    /// 32-bit integer.
    Dword(u32),

    /// 32-bit little-endian integer. Shares the `REG_DWORD` tag on the wire.
    DwordLittleEndian(u32),

    /// 32-bit big-endian integer.
    DwordBigEndian(u32),

    /// Symbolic link target. Reserved for system use.
    Link(String),

    /// Multiple strings.
    MultiString(TextList),

    /// Device-driver resource list; opaque bytes.
    ResourceList(Vec<u8>),
}

impl ValueData {
    /// Creates a `REG_DWORD` value, rejecting integers outside `0..=u32::MAX`.
    pub fn dword(value: impl Into<i128>) -> Result<Self> {
        Ok(ValueData::Dword(checked_dword(value.into())?))
    }

    /// Creates a `REG_DWORD_LITTLE_ENDIAN` value, range checked.
    pub fn dword_little_endian(value: impl Into<i128>) -> Result<Self> {
        Ok(ValueData::DwordLittleEndian(checked_dword(value.into())?))
    }

    /// Creates a `REG_DWORD_BIG_ENDIAN` value, range checked.
    pub fn dword_big_endian(value: impl Into<i128>) -> Result<Self> {
        Ok(ValueData::DwordBigEndian(checked_dword(value.into())?))
    }

    /// Returns the registry type this value is written as.
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueData::None(_) => ValueType::None,
            ValueData::String(_) => ValueType::String,
            ValueData::ExpandString(_) => ValueType::ExpandString,
            ValueData::Binary(_) => ValueType::Binary,
            ValueData::Dword(_) | ValueData::DwordLittleEndian(_) => ValueType::Dword,
            ValueData::DwordBigEndian(_) => ValueType::DwordBigEndian,
            ValueData::Link(_) => ValueType::Link,
            ValueData::MultiString(_) => ValueType::MultiString,
            ValueData::ResourceList(_) => ValueType::ResourceList,
        }
    }

    /// Returns the text of a string-like value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) | ValueData::Link(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number held by any of the DWORD variants.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ValueData::Dword(d) | ValueData::DwordLittleEndian(d) | ValueData::DwordBigEndian(d) => {
                Some(*d)
            }
            _ => None,
        }
    }

    /// Returns the payload of a byte-based value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ValueData::None(b) | ValueData::Binary(b) | ValueData::ResourceList(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the strings of a `REG_MULTI_SZ` value.
    pub fn as_list(&self) -> Option<&TextList> {
        match self {
            ValueData::MultiString(list) => Some(list),
            _ => None,
        }
    }

    /// Compares two values the way the registry sees them.
    ///
    /// `Dword` and `DwordLittleEndian` are the same type on the wire, so they
    /// compare equal when they hold the same number.
    pub fn same_data(&self, other: &ValueData) -> bool {
        match (self, other) {
            (
                ValueData::Dword(a) | ValueData::DwordLittleEndian(a),
                ValueData::Dword(b) | ValueData::DwordLittleEndian(b),
            ) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::None(b) if b.is_empty() => write!(f, "(none)"),
            ValueData::None(b) | ValueData::Binary(b) | ValueData::ResourceList(b) => {
                write!(f, "{}", hex::encode(b))
            }
            ValueData::String(s) | ValueData::ExpandString(s) | ValueData::Link(s) => {
                write!(f, "{}", s)
            }
            ValueData::Dword(d) | ValueData::DwordLittleEndian(d) | ValueData::DwordBigEndian(d) => {
                write!(f, "{} (0x{:08X})", d, d)
            }
            ValueData::MultiString(list) => write!(f, "{}", list.join(", ")),
        }
    }
}

fn checked_dword(value: i128) -> Result<u32> {
    u32::try_from(value).map_err(|_| RegistryError::dword_out_of_range(value))
}

/// An ordered list of strings (`REG_MULTI_SZ`).
///
/// Only text can be stored. Fallible mutators validate their whole input
/// before touching the list, so a rejected call leaves it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextList(Vec<String>);

impl TextList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a list from dynamically typed items, failing if any is not text.
    pub fn try_from_natives<I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = NativeValue>,
    {
        Ok(Self(require_text(items)?))
    }

    /// Appends a string.
    pub fn push(&mut self, item: impl Into<String>) {
        self.0.push(item.into());
    }

    /// Appends a dynamically typed item, failing if it is not text.
    pub fn try_push(&mut self, item: NativeValue) -> Result<()> {
        let text = item.into_text()?;
        self.0.push(text);
        Ok(())
    }

    /// Replaces the item at `index`.
    ///
    /// # Errors
    ///
    /// Fails if `item` is not text or `index` is out of bounds.
    pub fn set(&mut self, index: usize, item: NativeValue) -> Result<()> {
        let text = item.into_text()?;
        let len = self.0.len();
        let slot = self.0.get_mut(index).ok_or_else(|| {
            RegistryError::type_conversion(format!("index {} out of bounds (len {})", index, len))
        })?;
        *slot = text;
        Ok(())
    }

    /// Replaces `range` with `items`, like `Vec::splice`.
    ///
    /// # Errors
    ///
    /// Fails if any item is not text or the range is out of bounds.
    pub fn splice<I>(&mut self, range: Range<usize>, items: I) -> Result<()>
    where
        I: IntoIterator<Item = NativeValue>,
    {
        if range.start > range.end || range.end > self.0.len() {
            return Err(RegistryError::type_conversion(format!(
                "range {:?} out of bounds (len {})",
                range,
                self.0.len()
            )));
        }
        let replacement = require_text(items)?;
        self.0.splice(range, replacement);
        Ok(())
    }

    /// Returns the strings as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consumes the list, returning the strings.
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

fn require_text<I>(items: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = NativeValue>,
{
    items.into_iter().map(NativeValue::into_text).collect()
}

impl Deref for TextList {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for TextList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for TextList {
    fn from(items: Vec<String>) -> Self {
        Self(items)
    }
}

impl<'a> IntoIterator for &'a TextList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A dynamically typed native value, for callers whose data is not typed
/// until runtime (parsed config, scripting bridges).
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer of any width.
    Int(i128),
    /// Floating point; has no registry representation.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A sequence of items.
    List(Vec<NativeValue>),
}

impl NativeValue {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int(_) => "int",
            NativeValue::Float(_) => "float",
            NativeValue::Text(_) => "text",
            NativeValue::Bytes(_) => "bytes",
            NativeValue::List(_) => "list",
        }
    }

    fn into_text(self) -> Result<String> {
        match self {
            NativeValue::Text(s) => Ok(s),
            other => Err(RegistryError::type_conversion(format!(
                "expected text in string list, found {}",
                other.kind()
            ))),
        }
    }
}

impl From<&str> for NativeValue {
    fn from(s: &str) -> Self {
        NativeValue::Text(s.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(s: String) -> Self {
        NativeValue::Text(s)
    }
}

impl From<bool> for NativeValue {
    fn from(b: bool) -> Self {
        NativeValue::Bool(b)
    }
}

impl From<i32> for NativeValue {
    fn from(n: i32) -> Self {
        NativeValue::Int(n.into())
    }
}

impl From<i64> for NativeValue {
    fn from(n: i64) -> Self {
        NativeValue::Int(n.into())
    }
}

impl From<u32> for NativeValue {
    fn from(n: u32) -> Self {
        NativeValue::Int(n.into())
    }
}

impl From<u64> for NativeValue {
    fn from(n: u64) -> Self {
        NativeValue::Int(n.into())
    }
}

impl From<f64> for NativeValue {
    fn from(x: f64) -> Self {
        NativeValue::Float(x)
    }
}

impl From<Vec<u8>> for NativeValue {
    fn from(b: Vec<u8>) -> Self {
        NativeValue::Bytes(b)
    }
}

impl From<Vec<NativeValue>> for NativeValue {
    fn from(items: Vec<NativeValue>) -> Self {
        NativeValue::List(items)
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(NativeValue::Null, Into::into)
    }
}

/// Conversion into a typed registry value.
///
/// Implement this for your own types to make them assignable with
/// [`Values::set`](crate::values::Values::set).
pub trait IntoRegistry {
    /// Converts `self` into the closest registry type.
    fn into_registry(self) -> Result<ValueData>;
}

impl IntoRegistry for ValueData {
    fn into_registry(self) -> Result<ValueData> {
        Ok(self)
    }
}

impl IntoRegistry for &ValueData {
    fn into_registry(self) -> Result<ValueData> {
        Ok(self.clone())
    }
}

impl IntoRegistry for NativeValue {
    fn into_registry(self) -> Result<ValueData> {
        match self {
            NativeValue::Text(s) => Ok(ValueData::String(s)),
            NativeValue::List(items) => Ok(ValueData::MultiString(TextList::try_from_natives(items)?)),
            NativeValue::Bytes(b) => Ok(ValueData::Binary(b)),
            NativeValue::Int(n) => ValueData::dword(n),
            NativeValue::Bool(b) => Ok(ValueData::Dword(if b { u32::MAX } else { 0 })),
            NativeValue::Null => Ok(ValueData::None(Vec::new())),
            NativeValue::Float(x) => Err(RegistryError::type_conversion(format!(
                "no registry type for float {}",
                x
            ))),
        }
    }
}

impl IntoRegistry for &str {
    fn into_registry(self) -> Result<ValueData> {
        Ok(ValueData::String(self.to_string()))
    }
}

impl IntoRegistry for String {
    fn into_registry(self) -> Result<ValueData> {
        Ok(ValueData::String(self))
    }
}

impl IntoRegistry for TextList {
    fn into_registry(self) -> Result<ValueData> {
        Ok(ValueData::MultiString(self))
    }
}

impl IntoRegistry for Vec<String> {
    fn into_registry(self) -> Result<ValueData> {
        Ok(ValueData::MultiString(TextList(self)))
    }
}

fn text_list<I, S>(items: I) -> Result<ValueData>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Ok(ValueData::MultiString(items.into_iter().collect()))
}

impl IntoRegistry for Vec<&str> {
    fn into_registry(self) -> Result<ValueData> {
        text_list(self)
    }
}

impl IntoRegistry for &[&str] {
    fn into_registry(self) -> Result<ValueData> {
        text_list(self.iter().copied())
    }
}

impl IntoRegistry for &[String] {
    fn into_registry(self) -> Result<ValueData> {
        text_list(self.iter().cloned())
    }
}

impl<const N: usize> IntoRegistry for [&str; N] {
    fn into_registry(self) -> Result<ValueData> {
        text_list(self)
    }
}

impl<const N: usize> IntoRegistry for [String; N] {
    fn into_registry(self) -> Result<ValueData> {
        text_list(self)
    }
}

impl<S: Into<String>> IntoRegistry for VecDeque<S> {
    fn into_registry(self) -> Result<ValueData> {
        text_list(self)
    }
}

/// Elements are stored in sorted order.
impl<S: Into<String>> IntoRegistry for BTreeSet<S> {
    fn into_registry(self) -> Result<ValueData> {
        text_list(self)
    }
}

/// Elements are stored in the set's iteration order, which is unspecified.
impl<S: Into<String>, H: BuildHasher> IntoRegistry for HashSet<S, H> {
    fn into_registry(self) -> Result<ValueData> {
        text_list(self)
    }
}

impl IntoRegistry for Vec<u8> {
    fn into_registry(self) -> Result<ValueData> {
        Ok(ValueData::Binary(self))
    }
}

impl IntoRegistry for &[u8] {
    fn into_registry(self) -> Result<ValueData> {
        Ok(ValueData::Binary(self.to_vec()))
    }
}

impl IntoRegistry for u32 {
    fn into_registry(self) -> Result<ValueData> {
        Ok(ValueData::Dword(self))
    }
}

impl IntoRegistry for i32 {
    fn into_registry(self) -> Result<ValueData> {
        ValueData::dword(self)
    }
}

impl IntoRegistry for i64 {
    fn into_registry(self) -> Result<ValueData> {
        ValueData::dword(self)
    }
}

impl IntoRegistry for u64 {
    fn into_registry(self) -> Result<ValueData> {
        ValueData::dword(self)
    }
}

impl IntoRegistry for bool {
    fn into_registry(self) -> Result<ValueData> {
        NativeValue::Bool(self).into_registry()
    }
}

impl<T: IntoRegistry> IntoRegistry for Option<T> {
    fn into_registry(self) -> Result<ValueData> {
        match self {
            Some(v) => v.into_registry(),
            None => Ok(ValueData::None(Vec::new())),
        }
    }
}

/// Converts a wire tag and transport value into a typed value.
///
/// Unknown tags never fail; they become [`ValueData::None`] holding the raw bytes.
///
/// # Errors
///
/// Fails when the data does not fit its tag, e.g. a `REG_DWORD_BIG_ENDIAN`
/// shorter than 4 bytes.
pub fn decode(tag: u32, raw: RawValue) -> Result<ValueData> {
    match ValueType::from_u32(tag) {
        ValueType::Binary => Ok(ValueData::Binary(raw.into_bytes())),
        ValueType::None | ValueType::Unknown(_) => Ok(ValueData::None(raw.into_bytes())),
        ValueType::ResourceList => Ok(ValueData::ResourceList(raw.into_bytes())),
        ValueType::Dword => match raw {
            RawValue::Dword(d) => Ok(ValueData::Dword(dword_from_signed(d))),
            RawValue::Bytes(b) => Ok(ValueData::Dword(read_u32_le(&b)?)),
            other => Err(shape_mismatch(ValueType::Dword, &other)),
        },
        ValueType::DwordBigEndian => Ok(ValueData::DwordBigEndian(read_u32_be(&raw.into_bytes())?)),
        ValueType::String => Ok(ValueData::String(raw_to_text(ValueType::String, raw)?)),
        ValueType::ExpandString => Ok(ValueData::ExpandString(raw_to_text(
            ValueType::ExpandString,
            raw,
        )?)),
        ValueType::Link => match raw {
            RawValue::Text(s) => Ok(ValueData::Link(s)),
            RawValue::Bytes(b) => Ok(ValueData::Link(read_utf16_string_lossy(&b))),
            other => Err(shape_mismatch(ValueType::Link, &other)),
        },
        ValueType::MultiString => match raw {
            RawValue::TextList(items) => Ok(ValueData::MultiString(TextList(items))),
            RawValue::Bytes(b) => Ok(ValueData::MultiString(TextList(read_multi_string(&b)?))),
            other => Err(shape_mismatch(ValueType::MultiString, &other)),
        },
    }
}

fn raw_to_text(value_type: ValueType, raw: RawValue) -> Result<String> {
    match raw {
        RawValue::Text(s) => Ok(s),
        RawValue::Bytes(b) => read_utf16_string(&b),
        other => Err(shape_mismatch(value_type, &other)),
    }
}

fn shape_mismatch(value_type: ValueType, raw: &RawValue) -> RegistryError {
    RegistryError::type_conversion(format!("{} cannot hold {:?}", value_type.name(), raw))
}

/// Converts a value into the transport representation and its wire tag.
///
/// # Errors
///
/// Fails if a native value has no registry representation or is out of range.
pub fn encode(value: impl IntoRegistry) -> Result<(RawValue, u32)> {
    let value = value.into_registry()?;
    let tag = value.value_type().to_u32();
    let raw = match value {
        ValueData::None(b) | ValueData::Binary(b) | ValueData::ResourceList(b) => RawValue::Bytes(b),
        ValueData::Dword(d) | ValueData::DwordLittleEndian(d) => RawValue::Dword(dword_to_signed(d)),
        ValueData::DwordBigEndian(d) => RawValue::Bytes(write_u32_be(d).to_vec()),
        ValueData::String(s) | ValueData::ExpandString(s) => RawValue::Text(s),
        ValueData::Link(s) => RawValue::Bytes(write_utf16_string(&s)),
        ValueData::MultiString(list) => RawValue::TextList(list.into_vec()),
    };
    Ok((raw, tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: ValueData) -> ValueData {
        let (raw, tag) = encode(value).unwrap();
        decode(tag, raw).unwrap()
    }

    #[test]
    fn test_round_trip_each_variant() {
        let samples = vec![
            ValueData::Binary(vec![0x12, 0x34, 0x56, 0x78, 0x90]),
            ValueData::None(b"blahdy blah \xDE\xAD\xBE\xEF".to_vec()),
            ValueData::ResourceList(b"What is this?".to_vec()),
            ValueData::Dword(0),
            ValueData::Dword(u32::MAX),
            ValueData::DwordBigEndian(0),
            ValueData::DwordBigEndian(u32::MAX),
            ValueData::String(String::new()),
            ValueData::String("A plain ol' string".into()),
            ValueData::ExpandString("You are %USER%".into()),
            ValueData::Link("some link?".into()),
            ValueData::MultiString(TextList::new()),
            ValueData::MultiString(TextList::from_iter(["one"])),
        ];
        for value in samples {
            assert_eq!(round_trip(value.clone()), value);
        }
    }

    #[test]
    fn test_little_endian_decodes_as_dword() {
        let decoded = round_trip(ValueData::DwordLittleEndian(0x8765_4321));
        assert_eq!(decoded, ValueData::Dword(0x8765_4321));
        assert!(decoded.same_data(&ValueData::DwordLittleEndian(0x8765_4321)));
    }

    #[test]
    fn test_big_endian_packing() {
        let (raw, tag) = encode(ValueData::DwordBigEndian(0x1234_5678)).unwrap();
        assert_eq!(tag, ValueType::REG_DWORD_BIG_ENDIAN);
        assert_eq!(raw, RawValue::Bytes(vec![0x12, 0x34, 0x56, 0x78]));
        assert_eq!(
            decode(tag, RawValue::Bytes(vec![0x12, 0x34, 0x56, 0x78])).unwrap(),
            ValueData::DwordBigEndian(0x1234_5678)
        );
    }

    #[test]
    fn test_big_endian_too_short() {
        let err = decode(ValueType::REG_DWORD_BIG_ENDIAN, RawValue::Bytes(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, RegistryError::TruncatedData { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_dword_sign_handling() {
        let (raw, tag) = encode(ValueData::Dword(0x8765_4321)).unwrap();
        assert_eq!(tag, ValueType::REG_DWORD);
        assert_eq!(raw, RawValue::Dword(-2_023_406_815));
        assert_eq!(decode(tag, raw).unwrap(), ValueData::Dword(0x8765_4321));
    }

    #[test]
    fn test_unknown_tag_falls_back() {
        let decoded = decode(9999, RawValue::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(decoded, ValueData::None(vec![1, 2, 3]));
    }

    #[test]
    fn test_native_precedence() {
        assert_eq!(encode("hi").unwrap(), (RawValue::Text("hi".into()), ValueType::REG_SZ));
        assert_eq!(
            encode(vec!["a", "b"]).unwrap(),
            (RawValue::TextList(vec!["a".into(), "b".into()]), ValueType::REG_MULTI_SZ)
        );
        assert_eq!(
            encode(vec![1u8, 2]).unwrap(),
            (RawValue::Bytes(vec![1, 2]), ValueType::REG_BINARY)
        );
        assert_eq!(encode(7u32).unwrap(), (RawValue::Dword(7), ValueType::REG_DWORD));
        assert_eq!(encode(None::<String>).unwrap(), (RawValue::Bytes(vec![]), ValueType::REG_NONE));
    }

    #[test]
    fn test_text_collections_become_lists() {
        let ab = ValueData::MultiString(["a", "b"].into_iter().collect());
        let owned = vec!["a".to_string(), "b".to_string()];

        assert_eq!(["a", "b"].into_registry().unwrap(), ab);
        assert_eq!(["a".to_string(), "b".to_string()].into_registry().unwrap(), ab);
        assert_eq!(owned.as_slice().into_registry().unwrap(), ab);
        assert_eq!(VecDeque::from(owned.clone()).into_registry().unwrap(), ab);
        assert_eq!(BTreeSet::from(["b", "a"]).into_registry().unwrap(), ab);

        let set: HashSet<String> = owned.iter().cloned().collect();
        let mut stored = set.into_registry().unwrap().as_list().unwrap().to_vec();
        stored.sort();
        assert_eq!(stored, owned);

        let lazy: TextList = (1..=3).map(|i| format!("item{}", i)).collect();
        assert_eq!(encode(lazy).unwrap().1, ValueType::REG_MULTI_SZ);

        let empty: [&str; 0] = [];
        assert_eq!(empty.into_registry().unwrap(), ValueData::MultiString(TextList::new()));
    }

    #[test]
    fn test_link_is_null_terminated() {
        let (raw, tag) = encode(ValueData::Link("x".into())).unwrap();
        let (text, _) = encode(ValueData::String("x".into())).unwrap();
        assert_eq!(tag, ValueType::REG_LINK);
        assert_eq!(raw, RawValue::Bytes(vec![b'x', 0, 0, 0]));
        assert_eq!(raw.to_wire(), text.to_wire());
        assert_eq!(decode(tag, raw).unwrap(), ValueData::Link("x".into()));
    }

    #[test]
    fn test_bool_encoding() {
        assert_eq!(true.into_registry().unwrap(), ValueData::Dword(0xFFFF_FFFF));
        assert_eq!(false.into_registry().unwrap(), ValueData::Dword(0));
    }

    #[test]
    fn test_integer_range() {
        assert!(matches!(
            ValueData::dword(-1),
            Err(RegistryError::OutOfRange { value: -1, .. })
        ));
        assert!(ValueData::dword(0x1_0000_0000i64).is_err());
        assert!(encode(-5i64).is_err());
        assert_eq!(ValueData::dword(u32::MAX).unwrap(), ValueData::Dword(u32::MAX));
    }

    #[test]
    fn test_float_has_no_registry_type() {
        let err = encode(NativeValue::Float(1.5)).unwrap_err();
        assert!(matches!(err, RegistryError::TypeConversion(_)));
    }

    #[test]
    fn test_text_list_rejects_non_text() {
        let items = vec![NativeValue::from("a"), NativeValue::from(5i32), NativeValue::from("c")];
        let err = TextList::try_from_natives(items.clone()).unwrap_err();
        assert!(matches!(err, RegistryError::TypeConversion(_)));
        assert!(encode(NativeValue::List(items)).is_err());
    }

    #[test]
    fn test_text_list_mutation_is_atomic() {
        let mut list: TextList = ["a", "b", "c"].into_iter().collect();

        assert!(list.try_push(NativeValue::Int(1)).is_err());
        assert!(list.set(1, NativeValue::Bool(true)).is_err());
        assert!(list
            .splice(0..2, vec![NativeValue::from("x"), NativeValue::Null])
            .is_err());
        assert_eq!(list.as_slice(), ["a", "b", "c"]);

        list.set(1, "B".into()).unwrap();
        list.splice(2..3, vec![NativeValue::from("c1"), NativeValue::from("c2")]).unwrap();
        list.try_push("d".into()).unwrap();
        assert_eq!(list.as_slice(), ["a", "B", "c1", "c2", "d"]);
    }

    #[test]
    fn test_decode_from_wire_bytes() {
        let bytes = crate::utils::write_utf16_string("hello");
        assert_eq!(
            decode(ValueType::REG_SZ, RawValue::Bytes(bytes)).unwrap(),
            ValueData::String("hello".into())
        );
        assert_eq!(
            decode(ValueType::REG_DWORD, RawValue::Bytes(vec![0x21, 0x43, 0x65, 0x87])).unwrap(),
            ValueData::Dword(0x8765_4321)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueData::Binary(vec![0xde, 0xad]).to_string(), "dead");
        assert_eq!(ValueData::Dword(255).to_string(), "255 (0x000000FF)");
        assert_eq!(ValueData::None(vec![]).to_string(), "(none)");
        let list: TextList = ["a", "b"].into_iter().collect();
        assert_eq!(ValueData::MultiString(list).to_string(), "a, b");
    }
}
