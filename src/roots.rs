//! Predefined root keys and the [`Registry`] entry point.

use crate::error::{RegistryError, Result};
use crate::key::{Key, PATH_SEPARATOR};
use crate::transport::{RawHandle, Transport};
use crate::value_type::AccessMask;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The predefined keys every registry path starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RootKey {
    /// `HKEY_CLASSES_ROOT`
    ClassesRoot,
    /// `HKEY_CURRENT_CONFIG`
    CurrentConfig,
    /// `HKEY_CURRENT_USER`
    CurrentUser,
    /// `HKEY_DYN_DATA` (Windows 9x only)
    DynData,
    /// `HKEY_LOCAL_MACHINE`
    LocalMachine,
    /// `HKEY_PERFORMANCE_DATA`
    PerformanceData,
    /// `HKEY_PERFORMANCE_TEXT`
    PerformanceText,
    /// `HKEY_PERFORMANCE_NLSTEXT`
    PerformanceNlsText,
    /// `HKEY_USERS`
    Users,
}

impl RootKey {
    /// Every root, in declaration order.
    pub const ALL: [RootKey; 9] = [
        RootKey::ClassesRoot,
        RootKey::CurrentConfig,
        RootKey::CurrentUser,
        RootKey::DynData,
        RootKey::LocalMachine,
        RootKey::PerformanceData,
        RootKey::PerformanceText,
        RootKey::PerformanceNlsText,
        RootKey::Users,
    ];

    /// Returns the abbreviated name, e.g. `HKCU`.
    pub fn short_name(&self) -> &'static str {
        match self {
            RootKey::ClassesRoot => "HKCR",
            RootKey::CurrentConfig => "HKCC",
            RootKey::CurrentUser => "HKCU",
            RootKey::DynData => "HKDD",
            RootKey::LocalMachine => "HKLM",
            RootKey::PerformanceData => "HKPD",
            RootKey::PerformanceText => "HKPT",
            RootKey::PerformanceNlsText => "HKPN",
            RootKey::Users => "HKU",
        }
    }

    /// Returns the full name, e.g. `HKEY_CURRENT_USER`.
    pub fn full_name(&self) -> &'static str {
        match self {
            RootKey::ClassesRoot => "HKEY_CLASSES_ROOT",
            RootKey::CurrentConfig => "HKEY_CURRENT_CONFIG",
            RootKey::CurrentUser => "HKEY_CURRENT_USER",
            RootKey::DynData => "HKEY_DYN_DATA",
            RootKey::LocalMachine => "HKEY_LOCAL_MACHINE",
            RootKey::PerformanceData => "HKEY_PERFORMANCE_DATA",
            RootKey::PerformanceText => "HKEY_PERFORMANCE_TEXT",
            RootKey::PerformanceNlsText => "HKEY_PERFORMANCE_NLSTEXT",
            RootKey::Users => "HKEY_USERS",
        }
    }

    /// Returns the platform's predefined handle value for this root.
    pub fn handle(&self) -> RawHandle {
        RawHandle(match self {
            RootKey::ClassesRoot => 0x8000_0000,
            RootKey::CurrentUser => 0x8000_0001,
            RootKey::LocalMachine => 0x8000_0002,
            RootKey::Users => 0x8000_0003,
            RootKey::PerformanceData => 0x8000_0004,
            RootKey::CurrentConfig => 0x8000_0005,
            RootKey::DynData => 0x8000_0006,
            RootKey::PerformanceText => 0x8000_0050,
            RootKey::PerformanceNlsText => 0x8000_0060,
        })
    }

    /// Looks a root up by short or full name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<RootKey> {
        Self::ALL.into_iter().find(|root| {
            root.short_name().eq_ignore_ascii_case(name) || root.full_name().eq_ignore_ascii_case(name)
        })
    }

    /// Looks a root up by predefined handle.
    pub fn from_handle(handle: RawHandle) -> Option<RootKey> {
        Self::ALL.into_iter().find(|root| root.handle() == handle)
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name())
    }
}

/// Settings applied to every key reached through a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Access rights used by [`Key::open`].
    pub default_access: AccessMask,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            default_access: AccessMask::READ,
        }
    }
}

/// Entry point: a transport plus the fixed table of root keys.
///
/// The root keys are built once, here, and wrap predefined handles that are
/// never closed. Everything else is reached by walking down from a root.
///
/// ```
/// use regkey::{MemoryTransport, Registry, ValueData};
///
/// # fn main() -> regkey::Result<()> {
/// let registry = Registry::new(MemoryTransport::new());
/// let key = registry.current_user().child("Software")?.child("Example")?;
/// key.set("greeting", "hello")?;
/// assert_eq!(key.get("greeting")?, ValueData::String("hello".into()));
/// assert_eq!(key.path(true), r"HKCU\Software\Example");
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    roots: Vec<Key>,
    options: RegistryOptions,
}

impl Registry {
    /// Creates a registry over `transport` with default options.
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    /// Creates a registry over a shared transport.
    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        Self::with_options(transport, RegistryOptions::default())
    }

    /// Creates a registry with explicit options.
    pub fn with_options(transport: Arc<dyn Transport>, options: RegistryOptions) -> Self {
        debug!(default_access = %format!("{:#x}", options.default_access.bits()), "Building root table");
        let roots = RootKey::ALL
            .into_iter()
            .map(|root| Key::root(Arc::clone(&transport), root, options.default_access))
            .collect();
        Self { roots, options }
    }

    /// Returns the options this registry was built with.
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Returns the key for a root.
    pub fn root(&self, root: RootKey) -> &Key {
        // roots are built in declaration order
        &self.roots[root as usize]
    }

    /// `HKEY_CLASSES_ROOT`
    pub fn classes_root(&self) -> &Key {
        self.root(RootKey::ClassesRoot)
    }

    /// `HKEY_CURRENT_CONFIG`
    pub fn current_config(&self) -> &Key {
        self.root(RootKey::CurrentConfig)
    }

    /// `HKEY_CURRENT_USER`
    pub fn current_user(&self) -> &Key {
        self.root(RootKey::CurrentUser)
    }

    /// `HKEY_DYN_DATA`
    pub fn dyn_data(&self) -> &Key {
        self.root(RootKey::DynData)
    }

    /// `HKEY_LOCAL_MACHINE`
    pub fn local_machine(&self) -> &Key {
        self.root(RootKey::LocalMachine)
    }

    /// `HKEY_PERFORMANCE_DATA`
    pub fn performance_data(&self) -> &Key {
        self.root(RootKey::PerformanceData)
    }

    /// `HKEY_PERFORMANCE_TEXT`
    pub fn performance_text(&self) -> &Key {
        self.root(RootKey::PerformanceText)
    }

    /// `HKEY_PERFORMANCE_NLSTEXT`
    pub fn performance_nls_text(&self) -> &Key {
        self.root(RootKey::PerformanceNlsText)
    }

    /// `HKEY_USERS`
    pub fn users(&self) -> &Key {
        self.root(RootKey::Users)
    }

    /// Opens an existing key by full path, e.g. `HKLM\Software\Vendor`.
    ///
    /// Each segment is opened with the default access mask; nothing is created.
    pub fn open_path(&self, path: &str) -> Result<Key> {
        self.walk(path, |key, name| key.open(name))
    }

    /// Opens a key by full path, creating any missing segments.
    pub fn create_path(&self, path: &str) -> Result<Key> {
        self.walk(path, |key, name| key.child(name))
    }

    fn walk<F>(&self, path: &str, step: F) -> Result<Key>
    where
        F: Fn(&Key, &str) -> Result<Key>,
    {
        let mut segments = path.split(PATH_SEPARATOR).filter(|s| !s.is_empty());
        let root_name = segments
            .next()
            .ok_or_else(|| RegistryError::not_found("key", path))?;
        let root = RootKey::from_name(root_name)
            .ok_or_else(|| RegistryError::not_found("root key", root_name))?;

        let first = segments.next().ok_or_else(|| {
            RegistryError::type_conversion(format!("path '{}' names a root, not a subkey", path))
        })?;
        let mut key = step(self.root(root), first)?;
        for name in segments {
            key = step(&key, name)?;
        }
        Ok(key)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("roots", &self.roots)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;

    #[test]
    fn test_root_names() {
        assert_eq!(RootKey::CurrentUser.short_name(), "HKCU");
        assert_eq!(RootKey::Users.short_name(), "HKU");
        assert_eq!(RootKey::PerformanceNlsText.full_name(), "HKEY_PERFORMANCE_NLSTEXT");
        assert_eq!(RootKey::from_name("hklm"), Some(RootKey::LocalMachine));
        assert_eq!(RootKey::from_name("HKEY_CLASSES_ROOT"), Some(RootKey::ClassesRoot));
        assert_eq!(RootKey::from_name("HKXX"), None);
    }

    #[test]
    fn test_handles_are_distinct() {
        for root in RootKey::ALL {
            assert_eq!(RootKey::from_handle(root.handle()), Some(root));
        }
    }

    #[test]
    fn test_root_keys() {
        let registry = Registry::new(MemoryTransport::new());
        for root in RootKey::ALL {
            let key = registry.root(root);
            assert!(key.is_root());
            assert_eq!(key.name(), "");
            assert_eq!(key.path(true), root.short_name());
            assert_eq!(key.path(false), root.full_name());
            assert_eq!(format!("{:?}", key), root.full_name());
        }
    }

    #[test]
    fn test_open_and_create_path() {
        let registry = Registry::new(MemoryTransport::new());
        assert!(registry.open_path(r"HKCU\Software\Test").unwrap_err().is_not_found());

        let created = registry.create_path(r"HKCU\Software\Test").unwrap();
        assert_eq!(created.path(false), r"HKEY_CURRENT_USER\Software\Test");

        let opened = registry.open_path(r"HKEY_CURRENT_USER\Software\Test").unwrap();
        assert_eq!(opened.path(true), r"HKCU\Software\Test");
        assert!(registry.open_path(r"HKZZ\Software").is_err());
        assert!(registry.open_path("HKCU").is_err());
    }
}
