//! Dictionary-like view over the values of one key.

use crate::error::{RegistryError, Result};
use crate::key::Key;
use crate::value::{decode, encode, IntoRegistry, ValueData};
use std::collections::BTreeMap;
use tracing::debug;

/// The values of a [`Key`].
///
/// Obtained from [`Key::values`]. Holds nothing but a reference to the key;
/// every call goes to the transport.
#[derive(Debug, Clone, Copy)]
pub struct Values<'k> {
    key: &'k Key,
}

impl<'k> Values<'k> {
    pub(crate) fn new(key: &'k Key) -> Self {
        Self { key }
    }

    /// Returns the number of values.
    pub fn len(&self) -> Result<usize> {
        let info = self.key.transport().query_info(self.key.handle())?;
        Ok(info.value_count as usize)
    }

    /// Returns true if the key has no values.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads and decodes a value. The default value is named `""`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if there is no such value.
    pub fn get(&self, name: &str) -> Result<ValueData> {
        let (raw, tag) = self
            .key
            .transport()
            .query_value(self.key.handle(), name)
            .map_err(|e| RegistryError::from_transport(e, "value", name))?;
        decode(tag, raw)
    }

    /// Encodes and writes a value, replacing any existing one.
    ///
    /// Nothing is written if encoding fails.
    pub fn set(&self, name: &str, value: impl IntoRegistry) -> Result<()> {
        let (raw, tag) = encode(value)?;
        debug!(key = %self.key, name, tag, "Setting value");
        self.key.transport().set_value(self.key.handle(), name, tag, raw)?;
        Ok(())
    }

    /// Deletes a value.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if there is no such value.
    pub fn delete(&self, name: &str) -> Result<()> {
        debug!(key = %self.key, name, "Deleting value");
        self.key
            .transport()
            .delete_value(self.key.handle(), name)
            .map_err(|e| RegistryError::from_transport(e, "value", name))
    }

    /// Returns true if the value exists. Never fails; any error reads as absent.
    pub fn contains(&self, name: &str) -> bool {
        self.key.transport().query_value(self.key.handle(), name).is_ok()
    }

    /// Enumerates value names, starting from the first each time it is called.
    pub fn names(&self) -> ValueNames<'k> {
        ValueNames {
            key: self.key,
            index: 0,
            done: false,
        }
    }

    /// Enumerates `(name, value)` pairs, starting from the first each time.
    pub fn iter(&self) -> ValueEntries<'k> {
        ValueEntries {
            key: self.key,
            index: 0,
            done: false,
        }
    }

    /// Returns a deferred reference to a value.
    pub fn reference(&self, name: &str) -> ValueRef<'k> {
        ValueRef {
            key: self.key,
            name: name.to_string(),
        }
    }

    /// Reads every value into a map.
    pub fn to_map(&self) -> Result<BTreeMap<String, ValueData>> {
        self.iter().collect()
    }

    /// Writes every `(name, value)` pair, stopping at the first failure.
    pub fn update<I, N, V>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: IntoRegistry,
    {
        for (name, value) in items {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }
}

impl<'k> IntoIterator for Values<'k> {
    type Item = Result<(String, ValueData)>;
    type IntoIter = ValueEntries<'k>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over value names. See [`Values::names`].
#[derive(Debug)]
pub struct ValueNames<'k> {
    key: &'k Key,
    index: u32,
    done: bool,
}

impl Iterator for ValueNames<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.key.transport().enum_value(self.key.handle(), self.index) {
            Ok(Some((name, _, _))) => {
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

/// Iterator over `(name, value)` pairs. See [`Values::iter`].
#[derive(Debug)]
pub struct ValueEntries<'k> {
    key: &'k Key,
    index: u32,
    done: bool,
}

impl Iterator for ValueEntries<'_> {
    type Item = Result<(String, ValueData)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.key.transport().enum_value(self.key.handle(), self.index) {
            Ok(Some((name, raw, tag))) => {
                self.index += 1;
                Some(decode(tag, raw).map(|value| (name, value)))
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

/// A named value that is read each time it is dereferenced.
#[derive(Debug, Clone)]
pub struct ValueRef<'k> {
    key: &'k Key,
    name: String,
}

impl ValueRef<'_> {
    /// Returns the referenced value's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the value now.
    pub fn get(&self) -> Result<ValueData> {
        self.key.values().get(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RegistryError;
    use crate::memory::MemoryTransport;
    use crate::roots::Registry;
    use crate::value::ValueData;

    #[test]
    fn test_set_get_delete() {
        let registry = Registry::new(MemoryTransport::new());
        let key = registry.current_user().child("Test").unwrap();
        let values = key.values();

        values.set("greeting", "hello").unwrap();
        assert_eq!(values.get("greeting").unwrap(), ValueData::String("hello".into()));
        assert!(values.contains("greeting"));
        assert_eq!(values.len().unwrap(), 1);

        values.delete("greeting").unwrap();
        assert!(!values.contains("greeting"));
        assert!(values.is_empty().unwrap());
        assert!(matches!(values.get("greeting"), Err(RegistryError::NotFound(_))));
        assert!(matches!(values.delete("greeting"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_failed_encode_writes_nothing() {
        let registry = Registry::new(MemoryTransport::new());
        let key = registry.current_user().child("Test").unwrap();
        assert!(key.values().set("n", -1i64).is_err());
        assert!(!key.values().contains("n"));
    }

    #[test]
    fn test_default_value() {
        let registry = Registry::new(MemoryTransport::new());
        let key = registry.classes_root().child(".py").unwrap();
        key.set("", "Python.File").unwrap();
        assert_eq!(key.get("").unwrap().as_str(), Some("Python.File"));
    }

    #[test]
    fn test_enumeration_and_map() {
        let registry = Registry::new(MemoryTransport::new());
        let key = registry.current_user().child("Test").unwrap();
        key.values()
            .update([("b", ValueData::Dword(2)), ("a", ValueData::Binary(vec![1]))])
            .unwrap();

        let names: Vec<String> = key.values().names().collect::<Result<_, _>>().unwrap();
        assert_eq!(names, vec!["b", "a"]);

        let map = key.values().to_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["b"], ValueData::Dword(2));
    }

    #[test]
    fn test_reference_reads_live_value() {
        let registry = Registry::new(MemoryTransport::new());
        let key = registry.current_user().child("Test").unwrap();
        let r = key.values().reference("counter");
        assert!(r.get().is_err());
        key.set("counter", 1u32).unwrap();
        assert_eq!(r.get().unwrap(), ValueData::Dword(1));
        key.set("counter", 2u32).unwrap();
        assert_eq!(r.get().unwrap(), ValueData::Dword(2));
        assert_eq!(r.name(), "counter");
    }
}
