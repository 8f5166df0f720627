//! Error types for registry operations.
//!
//! Every failure is surfaced to the immediate caller. Errors reported by the
//! transport are wrapped unchanged, except a missing key or value, which is
//! promoted to [`RegistryError::NotFound`] with the name that was requested.

use crate::transport::TransportError;
use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while reading or writing the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Key or value not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A value could not be converted to or from a registry type.
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// An integer does not fit the registry type it was assigned to.
    #[error("Value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// The rejected value.
        value: i128,
        /// Smallest accepted value.
        min: i128,
        /// Largest accepted value.
        max: i128,
    },

    /// Fixed-width data was shorter than its type requires.
    #[error("Truncated data: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        /// Number of bytes the type requires.
        expected: usize,
        /// Number of bytes supplied.
        actual: usize,
    },

    /// Failure reported by the underlying transport.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O error outside the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Broad error categories callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested key or value does not exist.
    NotFound,
    /// A value has no representation in the requested registry type.
    TypeConversion,
    /// An integer was outside its type's range.
    Range,
    /// The transport (or the OS behind it) refused the operation.
    Collaborator,
}

impl RegistryError {
    /// Creates a not found error with context about what was being searched.
    ///
    /// # Arguments
    ///
    /// * `item_type` - Type of item (e.g., "key", "value")
    /// * `name` - Name of the item that wasn't found
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use regkey::error::RegistryError;
    /// let err = RegistryError::not_found("value", "DisplayName");
    /// assert_eq!(err.to_string(), "Not found: value 'DisplayName'");
    /// ```
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Creates a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion(message.into())
    }

    /// Creates an out-of-range error for an unsigned 32-bit target.
    pub fn dword_out_of_range(value: i128) -> Self {
        Self::OutOfRange {
            value,
            min: 0,
            max: i128::from(u32::MAX),
        }
    }

    /// Maps a transport error, promoting `NotFound` to a named [`RegistryError::NotFound`].
    pub(crate) fn from_transport(err: TransportError, item_type: &str, name: &str) -> Self {
        match err {
            TransportError::NotFound => Self::not_found(item_type, name),
            other => Self::Transport(other),
        }
    }

    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::TypeConversion(_) | Self::TruncatedData { .. } => ErrorKind::TypeConversion,
            Self::OutOfRange { .. } => ErrorKind::Range,
            Self::Transport(TransportError::NotFound) => ErrorKind::NotFound,
            Self::Transport(_) | Self::Io(_) => ErrorKind::Collaborator,
        }
    }

    /// Returns true if the error means the key or value does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
