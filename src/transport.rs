//! The registry transport: the narrow interface through which every read,
//! write and enumeration reaches the platform.
//!
//! This crate never talks to an OS registry directly. A [`Transport`] is
//! supplied by the host (a native binding, a remote agent, or
//! [`MemoryTransport`](crate::memory::MemoryTransport) in tests) and the
//! [`Key`](crate::key::Key) layer drives it one blocking call at a time.

use crate::raw::RawValue;
use crate::value_type::AccessMask;
use std::fmt;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias for transport calls.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Opaque reference to an open key, issued by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u64);

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Key metadata returned by [`Transport::query_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    /// Number of direct subkeys.
    pub subkey_count: u32,

    /// Number of values.
    pub value_count: u32,

    /// Last write time, in 100-nanosecond ticks since the registry epoch.
    pub last_write: u64,
}

/// Errors reported by a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The key or value does not exist.
    #[error("the system cannot find the file specified")]
    NotFound,

    /// The handle lacks the access right the call needs.
    #[error("access is denied")]
    AccessDenied,

    /// A key with subkeys cannot be deleted.
    #[error("key has subkeys")]
    HasSubkeys,

    /// The handle was never issued or was already closed.
    #[error("invalid handle {0}")]
    InvalidHandle(RawHandle),

    /// The key behind the handle was deleted.
    #[error("illegal operation attempted on a registry key that has been marked for deletion")]
    KeyDeleted,

    /// The predefined root is not available on this platform.
    #[error("predefined key {0} is not supported on this platform")]
    UnsupportedRoot(RawHandle),

    /// The call is not valid for this key.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A key file could not be parsed.
    #[error("invalid key file: {0}")]
    InvalidKeyFile(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Operations the registry layer needs from the platform.
///
/// Every method is a single blocking round-trip. Implementations decide
/// atomicity and cross-handle consistency; callers get no guarantees beyond
/// what a single call provides.
pub trait Transport: Send + Sync {
    /// Opens an existing subkey. Fails with [`TransportError::NotFound`] if absent.
    fn open_key(&self, parent: RawHandle, name: &str, access: AccessMask) -> TransportResult<RawHandle>;

    /// Opens a subkey, creating it first if it does not exist.
    fn create_key(&self, parent: RawHandle, name: &str) -> TransportResult<RawHandle>;

    /// Releases a handle.
    fn close_key(&self, handle: RawHandle) -> TransportResult<()>;

    /// Reads a named value, returning its data and wire tag.
    fn query_value(&self, handle: RawHandle, name: &str) -> TransportResult<(RawValue, u32)>;

    /// Writes a named value, replacing any existing one.
    fn set_value(&self, handle: RawHandle, name: &str, tag: u32, value: RawValue) -> TransportResult<()>;

    /// Deletes a named value.
    fn delete_value(&self, handle: RawHandle, name: &str) -> TransportResult<()>;

    /// Deletes a subkey that has no subkeys of its own.
    fn delete_key(&self, handle: RawHandle, name: &str) -> TransportResult<()>;

    /// Returns the value at `index` as `(name, data, tag)`, or `None` past the end.
    fn enum_value(&self, handle: RawHandle, index: u32) -> TransportResult<Option<(String, RawValue, u32)>>;

    /// Returns the name of the subkey at `index`, or `None` past the end.
    fn enum_key(&self, handle: RawHandle, index: u32) -> TransportResult<Option<String>>;

    /// Returns subkey count, value count and last write time.
    fn query_info(&self, handle: RawHandle) -> TransportResult<KeyInfo>;

    /// Writes pending changes for the key to stable storage.
    fn flush_key(&self, handle: RawHandle) -> TransportResult<()>;

    /// Creates subkey `name` from a key file and returns a handle to it.
    fn load_key(&self, parent: RawHandle, name: &str, path: &Path) -> TransportResult<RawHandle>;

    /// Writes the key and all its descendants to a key file.
    fn save_key(&self, handle: RawHandle, path: &Path) -> TransportResult<()>;
}
