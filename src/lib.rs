//! # Typed Registry Keys
//!
//! A typed, hierarchical key/value layer over the Windows registry, driven
//! through a pluggable transport.
//!
//! ## Features
//!
//! - **Typed values**: every wire tag decodes to a [`ValueData`] variant and
//!   native values encode to the most natural registry type
//! - **Dictionary-like views**: [`Values`] and [`Children`] read through to
//!   the transport on every call, nothing is cached
//! - **Owned handles**: a [`Key`] closes its handle on drop; predefined roots
//!   are never closed
//! - **Pluggable transport**: the [`Transport`] trait is the only seam to the
//!   platform; [`MemoryTransport`] implements it fully in-process
//!
//! ## Architecture
//!
//! 1. **Type registry** ([`value`]): encode/decode between tags and values
//! 2. **Transport** ([`transport`]): blocking calls on raw handles
//! 3. **Keys** ([`key`]): handle ownership, paths, membership
//! 4. **Views** ([`values`], [`children`]): mapping-style access to one key
//! 5. **Roots** ([`roots`]): the predefined keys and path lookup
//!
//! ## Examples
//!
//! ```
//! use regkey::{MemoryTransport, Registry, ValueData};
//!
//! # fn main() -> regkey::Result<()> {
//! let registry = Registry::new(MemoryTransport::new());
//! let key = registry.current_user().child("Test")?;
//!
//! key.set("greeting", "hello")?;
//! key.set("count", 3u32)?;
//! key.set("paths", vec!["C:\\a", "C:\\b"])?;
//!
//! for entry in key.values() {
//!     let (name, value) = entry?;
//!     println!("{} = {}", name, value);
//! }
//!
//! assert_eq!(key.get("count")?, ValueData::Dword(3));
//! key.remove("greeting")?;
//! assert!(!key.values().contains("greeting"));
//!
//! drop(key);
//! registry.current_user().children().delete("Test")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod children;
pub mod error;
pub mod key;
pub mod memory;
pub mod raw;
pub mod roots;
pub mod transport;
pub mod utils;
pub mod value;
pub mod value_type;
pub mod values;

// Re-export main types for convenience
pub use children::{Children, SubkeyNames};
pub use error::{ErrorKind, RegistryError, Result};
pub use key::{Key, Member};
pub use memory::MemoryTransport;
pub use raw::RawValue;
pub use roots::{Registry, RegistryOptions, RootKey};
pub use transport::{KeyInfo, RawHandle, Transport, TransportError, TransportResult};
pub use value::{decode, encode, IntoRegistry, NativeValue, TextList, ValueData};
pub use value_type::{AccessMask, ValueType};
pub use values::{ValueEntries, ValueNames, ValueRef, Values};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
