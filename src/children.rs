//! Dictionary-like view over the subkeys of one key.

use crate::error::{RegistryError, Result};
use crate::key::Key;
use crate::value_type::AccessMask;
use tracing::{debug, instrument};

/// The subkeys of a [`Key`].
///
/// Obtained from [`Key::children`]. Like [`Values`](crate::values::Values),
/// it caches nothing.
#[derive(Debug, Clone, Copy)]
pub struct Children<'k> {
    key: &'k Key,
}

impl<'k> Children<'k> {
    pub(crate) fn new(key: &'k Key) -> Self {
        Self { key }
    }

    /// Returns the number of direct subkeys.
    pub fn len(&self) -> Result<usize> {
        let info = self.key.transport().query_info(self.key.handle())?;
        Ok(info.subkey_count as usize)
    }

    /// Returns true if the key has no subkeys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Opens subkey `name`, creating it if it does not exist.
    ///
    /// Use [`Key::open`] to open without creating.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn get(&self, name: &str) -> Result<Key> {
        debug!("Opening or creating subkey");
        let handle = self
            .key
            .transport()
            .create_key(self.key.handle(), name)
            .map_err(|e| RegistryError::from_transport(e, "key", name))?;
        Ok(self.key.adopt_child(name, handle))
    }

    /// Deletes subkey `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if it does not exist, and the
    /// transport's error if it still has subkeys.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn delete(&self, name: &str) -> Result<()> {
        debug!("Deleting subkey");
        self.key
            .transport()
            .delete_key(self.key.handle(), name)
            .map_err(|e| RegistryError::from_transport(e, "key", name))
    }

    /// Returns true if subkey `name` exists. Never fails; any error reads as absent.
    pub fn contains(&self, name: &str) -> bool {
        let transport = self.key.transport();
        match transport.open_key(self.key.handle(), name, AccessMask::READ) {
            Ok(probe) => {
                if let Err(e) = transport.close_key(probe) {
                    debug!(handle = %probe, error = %e, "Ignoring failure to close probe handle");
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Enumerates subkey names, starting from the first each time it is called.
    pub fn names(&self) -> SubkeyNames<'k> {
        SubkeyNames {
            key: self.key,
            index: 0,
            done: false,
        }
    }
}

impl<'k> IntoIterator for Children<'k> {
    type Item = Result<String>;
    type IntoIter = SubkeyNames<'k>;

    fn into_iter(self) -> Self::IntoIter {
        self.names()
    }
}

/// Iterator over subkey names. See [`Children::names`].
#[derive(Debug)]
pub struct SubkeyNames<'k> {
    key: &'k Key,
    index: u32,
    done: bool,
}

impl Iterator for SubkeyNames<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.key.transport().enum_key(self.key.handle(), self.index) {
            Ok(Some(name)) => {
                self.index += 1;
                Some(Ok(name))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ErrorKind, RegistryError};
    use crate::memory::MemoryTransport;
    use crate::roots::Registry;

    #[test]
    fn test_get_creates() {
        let registry = Registry::new(MemoryTransport::new());
        let root = registry.current_user();
        assert!(!root.children().contains("Software"));
        let _software = root.children().get("Software").unwrap();
        assert!(root.children().contains("Software"));
        assert_eq!(root.children().len().unwrap(), 1);
    }

    #[test]
    fn test_contains_is_not_recursive() {
        let registry = Registry::new(MemoryTransport::new());
        let parent = registry.current_user().child("Parent").unwrap();
        parent.child("Sub").unwrap().child("SubSub").unwrap();

        assert!(parent.children().contains("Sub"));
        assert!(!parent.children().contains("SubSub"));
    }

    #[test]
    fn test_names_restart() {
        let registry = Registry::new(MemoryTransport::new());
        let key = registry.current_user().child("Parent").unwrap();
        for name in ["one", "two", "three"] {
            key.child(name).unwrap();
        }
        let first: Vec<String> = key.children().names().collect::<Result<_, _>>().unwrap();
        let second: Vec<String> = key.children().names().collect::<Result<_, _>>().unwrap();
        assert_eq!(first, vec!["one", "two", "three"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_delete() {
        let registry = Registry::new(MemoryTransport::new());
        let key = registry.current_user().child("Parent").unwrap();
        key.child("Sub").unwrap().child("SubSub").unwrap();

        let err = key.children().delete("Sub").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Collaborator);

        key.child("Sub").unwrap().children().delete("SubSub").unwrap();
        key.children().delete("Sub").unwrap();
        assert!(!key.contains("Sub"));
        assert!(matches!(key.children().delete("Sub"), Err(RegistryError::NotFound(_))));
    }
}
