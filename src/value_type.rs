//! Registry wire tags and access-mode flags.
//!
//! The numeric values are the ones the Windows registry API uses, so they can
//! be handed to a native transport unchanged.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Registry value data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit integer in native (little-endian) byte order.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Any tag outside the set above.
    /// Contains the raw type value.
    Unknown(u32),
}

impl ValueType {
    /// `REG_NONE`
    pub const REG_NONE: u32 = 0;
    /// `REG_SZ`
    pub const REG_SZ: u32 = 1;
    /// `REG_EXPAND_SZ`
    pub const REG_EXPAND_SZ: u32 = 2;
    /// `REG_BINARY`
    pub const REG_BINARY: u32 = 3;
    /// `REG_DWORD`
    pub const REG_DWORD: u32 = 4;
    /// `REG_DWORD_LITTLE_ENDIAN`, an alias of `REG_DWORD`.
    pub const REG_DWORD_LITTLE_ENDIAN: u32 = 4;
    /// `REG_DWORD_BIG_ENDIAN`
    pub const REG_DWORD_BIG_ENDIAN: u32 = 5;
    /// `REG_LINK`
    pub const REG_LINK: u32 = 6;
    /// `REG_MULTI_SZ`
    pub const REG_MULTI_SZ: u32 = 7;
    /// `REG_RESOURCE_LIST`
    pub const REG_RESOURCE_LIST: u32 = 8;

    /// Parses a value type from its wire tag. Never fails.
    pub fn from_u32(value: u32) -> Self {
        match value {
            Self::REG_NONE => ValueType::None,
            Self::REG_SZ => ValueType::String,
            Self::REG_EXPAND_SZ => ValueType::ExpandString,
            Self::REG_BINARY => ValueType::Binary,
            Self::REG_DWORD => ValueType::Dword,
            Self::REG_DWORD_BIG_ENDIAN => ValueType::DwordBigEndian,
            Self::REG_LINK => ValueType::Link,
            Self::REG_MULTI_SZ => ValueType::MultiString,
            Self::REG_RESOURCE_LIST => ValueType::ResourceList,
            _ => ValueType::Unknown(value),
        }
    }

    /// Returns the wire tag for this type.
    pub fn to_u32(self) -> u32 {
        match self {
            ValueType::None => Self::REG_NONE,
            ValueType::String => Self::REG_SZ,
            ValueType::ExpandString => Self::REG_EXPAND_SZ,
            ValueType::Binary => Self::REG_BINARY,
            ValueType::Dword => Self::REG_DWORD,
            ValueType::DwordBigEndian => Self::REG_DWORD_BIG_ENDIAN,
            ValueType::Link => Self::REG_LINK,
            ValueType::MultiString => Self::REG_MULTI_SZ,
            ValueType::ResourceList => Self::REG_RESOURCE_LIST,
            ValueType::Unknown(value) => value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }
}

impl From<u32> for ValueType {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

/// Access rights requested when opening a key.
///
/// Passed through to the transport verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AccessMask(pub u32);

impl AccessMask {
    /// Query the values of a key.
    pub const QUERY_VALUE: Self = Self(0x0001);

    /// Create, delete, or set a value.
    pub const SET_VALUE: Self = Self(0x0002);

    /// Create a subkey.
    pub const CREATE_SUB_KEY: Self = Self(0x0004);

    /// Enumerate subkeys.
    pub const ENUMERATE_SUB_KEYS: Self = Self(0x0008);

    /// Request change notifications.
    pub const NOTIFY: Self = Self(0x0010);

    /// Reserved for system use.
    pub const CREATE_LINK: Self = Self(0x0020);

    /// Read access (`STANDARD_RIGHTS_READ | QUERY_VALUE | ENUMERATE_SUB_KEYS | NOTIFY`).
    pub const READ: Self = Self(0x0002_0019);

    /// Write access (`STANDARD_RIGHTS_WRITE | SET_VALUE | CREATE_SUB_KEY`).
    pub const WRITE: Self = Self(0x0002_0006);

    /// Equivalent to [`AccessMask::READ`].
    pub const EXECUTE: Self = Self(0x0002_0019);

    /// All rights.
    pub const ALL_ACCESS: Self = Self(0x000F_003F);

    /// Creates a mask from raw bits.
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `other` is set in `self`.
    pub fn contains(&self, other: AccessMask) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for AccessMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Default for AccessMask {
    fn default() -> Self {
        Self::READ
    }
}
