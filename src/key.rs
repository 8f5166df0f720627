//! Registry key handles and path composition.

use crate::children::Children;
use crate::error::{RegistryError, Result};
use crate::roots::RootKey;
use crate::transport::{KeyInfo, RawHandle, Transport};
use crate::utils::ticks_to_datetime;
use crate::value::{IntoRegistry, ValueData};
use crate::value_type::AccessMask;
use crate::values::Values;
use chrono::NaiveDateTime;
use std::fmt;
use std::ops::{BitOr, Div};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '\\';

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

/// Where a key sits in the tree.
///
/// Holds names only, never handles, so a child can keep its ancestry alive
/// for path rendering after the parent [`Key`] has been dropped and closed.
#[derive(Debug)]
pub(crate) struct Lineage {
    id: u64,
    origin: Origin,
}

#[derive(Debug)]
enum Origin {
    Root(RootKey),
    Child { parent: Arc<Lineage>, name: String },
}

impl Lineage {
    fn new(origin: Origin) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed),
            origin,
        })
    }

    fn path(&self, abbreviated: bool) -> String {
        match &self.origin {
            Origin::Root(root) if abbreviated => root.short_name().to_string(),
            Origin::Root(root) => root.full_name().to_string(),
            Origin::Child { parent, name } => {
                format!("{}{}{}", parent.path(abbreviated), PATH_SEPARATOR, name)
            }
        }
    }

    fn root(&self) -> RootKey {
        match &self.origin {
            Origin::Root(root) => *root,
            Origin::Child { parent, .. } => parent.root(),
        }
    }

    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Origin::Root(root) => write!(f, "{}", root.full_name()),
            Origin::Child { parent, name } => {
                parent.fmt_debug(f)?;
                write!(f, "/{:?}", name)
            }
        }
    }
}

/// Something a key can be tested for containing: another key or a subkey name.
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    /// A key; matches if it was opened directly from this key.
    Key(&'a Key),
    /// A subkey name; matches if the subkey exists.
    Name(&'a str),
}

impl<'a> From<&'a Key> for Member<'a> {
    fn from(key: &'a Key) -> Self {
        Member::Key(key)
    }
}

impl<'a> From<&'a str> for Member<'a> {
    fn from(name: &'a str) -> Self {
        Member::Name(name)
    }
}

impl<'a> From<&'a String> for Member<'a> {
    fn from(name: &'a String) -> Self {
        Member::Name(name)
    }
}

/// An open registry key.
///
/// A `Key` exclusively owns its transport handle and closes it on drop.
/// Opening the same subkey twice yields two `Key`s with independent handles
/// to the same registry key. Keys obtained from a [`Registry`](crate::Registry)
/// root wrap predefined handles and never close them.
///
/// No state is cached: every call is a fresh round-trip to the transport.
pub struct Key {
    transport: Arc<dyn Transport>,
    handle: RawHandle,
    lineage: Arc<Lineage>,
    owned: bool,
    default_access: AccessMask,
}

impl Key {
    /// Wraps a predefined root handle. The handle is never closed.
    pub(crate) fn root(transport: Arc<dyn Transport>, root: RootKey, default_access: AccessMask) -> Self {
        Self {
            transport,
            handle: root.handle(),
            lineage: Lineage::new(Origin::Root(root)),
            owned: false,
            default_access,
        }
    }

    /// Wraps a handle just issued for subkey `name` of `self`.
    pub(crate) fn adopt_child(&self, name: &str, handle: RawHandle) -> Key {
        Key {
            transport: Arc::clone(&self.transport),
            handle,
            lineage: Lineage::new(Origin::Child {
                parent: Arc::clone(&self.lineage),
                name: name.to_string(),
            }),
            owned: true,
            default_access: self.default_access,
        }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Returns the transport handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Returns the name this key was opened by; empty for roots.
    pub fn name(&self) -> &str {
        match &self.lineage.origin {
            Origin::Root(_) => "",
            Origin::Child { name, .. } => name,
        }
    }

    /// Returns true if this key is one of the predefined roots.
    pub fn is_root(&self) -> bool {
        matches!(self.lineage.origin, Origin::Root(_))
    }

    /// Returns the root this key descends from.
    pub fn root_key(&self) -> RootKey {
        self.lineage.root()
    }

    /// Returns the full path of this key, e.g. `HKCU\Software\Test`.
    ///
    /// With `abbreviated` false the root is spelled out (`HKEY_CURRENT_USER`).
    pub fn path(&self, abbreviated: bool) -> String {
        self.lineage.path(abbreviated)
    }

    /// Returns a view of this key's values.
    pub fn values(&self) -> Values<'_> {
        Values::new(self)
    }

    /// Returns a view of this key's subkeys.
    pub fn children(&self) -> Children<'_> {
        Children::new(self)
    }

    /// Opens subkey `name`, creating it if needed. Same as `children().get(name)`.
    pub fn child(&self, name: &str) -> Result<Key> {
        self.children().get(name)
    }

    /// Opens an existing subkey with the default access mask.
    ///
    /// Unlike [`Key::child`], this never creates the subkey.
    pub fn open(&self, name: &str) -> Result<Key> {
        self.open_with(name, self.default_access)
    }

    /// Opens an existing subkey with the given access rights.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the subkey does not exist.
    #[instrument(skip(self), fields(key = %self))]
    pub fn open_with(&self, name: &str, access: AccessMask) -> Result<Key> {
        debug!(access = %format!("{:#x}", access.bits()), "Opening subkey");
        let handle = self
            .transport
            .open_key(self.handle, name, access)
            .map_err(|e| RegistryError::from_transport(e, "key", name))?;
        Ok(self.adopt_child(name, handle))
    }

    /// Reads a value. Same as `values().get(name)`.
    pub fn get(&self, name: &str) -> Result<ValueData> {
        self.values().get(name)
    }

    /// Writes a value. Same as `values().set(name, value)`.
    pub fn set(&self, name: &str, value: impl IntoRegistry) -> Result<()> {
        self.values().set(name, value)
    }

    /// Deletes a value. Same as `values().delete(name)`.
    pub fn remove(&self, name: &str) -> Result<()> {
        self.values().delete(name)
    }

    /// Tests membership of a key or a subkey name.
    ///
    /// For a [`Key`], true only if it was opened directly from this key
    /// instance; nothing is looked up. For a name, true if the subkey exists.
    /// Neither form is recursive.
    pub fn contains<'a>(&self, item: impl Into<Member<'a>>) -> bool {
        match item.into() {
            Member::Key(key) => self.is_parent_of(key),
            Member::Name(name) => self.children().contains(name),
        }
    }

    /// Returns true if `other` was opened directly from this key instance.
    pub fn is_parent_of(&self, other: &Key) -> bool {
        match &other.lineage.origin {
            Origin::Child { parent, .. } => parent.id == self.lineage.id,
            Origin::Root(_) => false,
        }
    }

    /// Returns subkey count, value count and raw write time.
    pub fn info(&self) -> Result<KeyInfo> {
        Ok(self.transport.query_info(self.handle)?)
    }

    /// Forces pending writes for this key to stable storage.
    #[instrument(skip(self), fields(key = %self))]
    pub fn flush(&self) -> Result<()> {
        debug!("Flushing key");
        Ok(self.transport.flush_key(self.handle)?)
    }

    /// Returns the time this key was last written.
    pub fn last_modified(&self) -> Result<NaiveDateTime> {
        let info = self.info()?;
        ticks_to_datetime(info.last_write).ok_or_else(|| {
            RegistryError::type_conversion(format!("write time {} out of range", info.last_write))
        })
    }

    /// Creates subkey `name` from a key file written by [`Key::save`].
    ///
    /// Transports usually accept this only directly below the machine and
    /// users roots.
    #[instrument(skip(self, path), fields(key = %self, path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(&self, name: &str, path: P) -> Result<Key> {
        info!("Loading key file");
        let handle = self
            .transport
            .load_key(self.handle, name, path.as_ref())
            .map_err(|e| RegistryError::from_transport(e, "key file", &path.as_ref().display().to_string()))?;
        Ok(self.adopt_child(name, handle))
    }

    /// Writes this key and all its descendants to a key file.
    #[instrument(skip(self, path), fields(key = %self, path = %path.as_ref().display()))]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        info!("Saving key file");
        Ok(self.transport.save_key(self.handle, path.as_ref())?)
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        if let Err(e) = self.transport.close_key(self.handle) {
            debug!(handle = %self.handle, error = %e, "Ignoring failure to close key");
        }
    }
}

/// `&key / "Sub"` opens or creates a subkey, like [`Key::child`].
impl Div<&str> for &Key {
    type Output = Result<Key>;

    fn div(self, name: &str) -> Result<Key> {
        self.child(name)
    }
}

/// `&key | "name"` reads a value, like [`Key::get`].
impl BitOr<&str> for &Key {
    type Output = Result<ValueData>;

    fn bitor(self, name: &str) -> Result<ValueData> {
        self.get(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path(true))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.lineage.fmt_debug(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::MemoryTransport;
    use crate::roots::{Registry, RootKey};
    use crate::value::ValueData;

    #[test]
    fn test_path_composition() {
        let registry = Registry::new(MemoryTransport::new());
        let software = registry.current_user().child("Software").unwrap();
        let test = software.child("Test").unwrap();
        assert_eq!(test.path(true), r"HKCU\Software\Test");
        assert_eq!(test.path(false), r"HKEY_CURRENT_USER\Software\Test");
        assert_eq!(test.to_string(), r"HKCU\Software\Test");
        assert_eq!(format!("{:?}", test), r#"HKEY_CURRENT_USER/"Software"/"Test""#);
    }

    #[test]
    fn test_path_survives_parent_drop() {
        let registry = Registry::new(MemoryTransport::new());
        let test = registry.current_user().child("Software").unwrap().child("Test").unwrap();
        assert_eq!(test.path(true), r"HKCU\Software\Test");
        assert_eq!(test.root_key(), RootKey::CurrentUser);
        assert_eq!(test.name(), "Test");
    }

    #[test]
    fn test_membership_by_identity() {
        let registry = Registry::new(MemoryTransport::new());
        let root = registry.current_user();
        let a = root.child("A").unwrap();
        let again = root.child("A").unwrap();
        let b = a.child("B").unwrap();

        assert!(root.contains(&a));
        assert!(a.contains(&b));
        assert!(!root.contains(&b));
        // A separately opened key to the same subkey is not the same parent
        assert!(!again.contains(&b));
        assert!(again.contains("B"));
    }

    #[test]
    fn test_roots_are_not_closed() {
        let transport = std::sync::Arc::new(MemoryTransport::new());
        let registry = Registry::from_arc(transport.clone());
        {
            let _child = registry.local_machine().child("Software").unwrap();
            assert_eq!(transport.open_handle_count(), 1);
        }
        assert_eq!(transport.open_handle_count(), 0);
        drop(registry);
        assert_eq!(transport.open_handle_count(), 0);
    }

    #[test]
    fn test_operator_shortcuts() {
        let registry = Registry::new(MemoryTransport::new());
        let software = (registry.current_user() / "Software").unwrap();
        let test = (&software / "Test").unwrap();
        assert_eq!(test.path(true), r"HKCU\Software\Test");

        test.set("greeting", "hello").unwrap();
        assert_eq!((&test | "greeting").unwrap(), ValueData::String("hello".into()));
        assert!((&test | "missing").unwrap_err().is_not_found());
    }
}
