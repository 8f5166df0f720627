//! In-process registry transport.
//!
//! [`MemoryTransport`] implements the whole [`Transport`] contract over an
//! in-memory tree: case-insensitive names, ordered enumeration, access checks
//! on handles, write timestamps, and key files for load/save. It backs the
//! test suite and can be embedded wherever a real registry is unavailable.
//!
//! ## Key file layout
//!
//! ```text
//! [Header - 8 bytes]
//!   - Signature: "RKEY"
//!   - Version (u32 LE)
//!
//! [Key record - recursive]
//!   - Name length (u32 LE), name (UTF-8)
//!   - Last write (u64 LE, 100ns ticks)
//!   - Value count (u32 LE)
//!     [Value] name length, name, tag (u32 LE), data length (u32 LE), data
//!   - Subkey count (u32 LE)
//!     [Key record]...
//! ```

use crate::raw::RawValue;
use crate::roots::RootKey;
use crate::transport::{KeyInfo, RawHandle, Transport, TransportError, TransportResult};
use crate::utils::datetime_to_ticks;
use crate::value_type::AccessMask;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Key file signature.
pub const KEY_FILE_SIGNATURE: &[u8; 4] = b"RKEY";

/// Key file format version.
pub const KEY_FILE_VERSION: u32 = 1;

/// Size of the key file header in bytes.
const KEY_FILE_HEADER_SIZE: usize = 8;

/// Deepest key nesting accepted from a key file.
const MAX_KEY_DEPTH: usize = 512;

/// First handle value issued for opened keys.
const FIRST_HANDLE: u64 = 0x1000;

type NodeId = usize;

#[derive(Debug, Clone)]
struct StoredValue {
    name: String,
    tag: u32,
    data: Vec<u8>,
}

#[derive(Debug)]
struct Node {
    name: String,
    children: Vec<NodeId>,
    values: Vec<StoredValue>,
    last_write: u64,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
            values: Vec::new(),
            last_write: now_ticks(),
        }
    }

    fn value_index(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|v| v.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenKey {
    node: NodeId,
    generation: u32,
    access: AccessMask,
}

/// One slab entry. The generation changes whenever the slot is freed, so
/// handles issued for an earlier occupant stop resolving.
#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Default)]
struct State {
    slots: Vec<Slot>,
    /// Freed slots, reused before the slab grows.
    free: Vec<NodeId>,
    handles: HashMap<RawHandle, OpenKey>,
    next_handle: u64,
    flushes: u64,
}

impl State {
    fn node(&self, id: NodeId) -> TransportResult<&Node> {
        self.slots
            .get(id)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(TransportError::KeyDeleted)
    }

    fn node_mut(&mut self, id: NodeId) -> TransportResult<&mut Node> {
        self.slots
            .get_mut(id)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(TransportError::KeyDeleted)
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id].node = Some(node);
            return id;
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        self.slots.len() - 1
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id) {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id);
            }
        }
    }

    fn generation(&self, id: NodeId) -> u32 {
        self.slots.get(id).map_or(0, |slot| slot.generation)
    }

    fn key_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    fn issue_handle(&mut self, node: NodeId, access: AccessMask) -> RawHandle {
        let handle = RawHandle(self.next_handle);
        self.next_handle += 1;
        let generation = self.generation(node);
        self.handles.insert(
            handle,
            OpenKey {
                node,
                generation,
                access,
            },
        );
        handle
    }

    fn find_child(&self, parent: NodeId, name: &str) -> TransportResult<Option<NodeId>> {
        let node = self.node(parent)?;
        for &child in &node.children {
            if self.node(child)?.name.eq_ignore_ascii_case(name) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    fn add_child(&mut self, parent: NodeId, node: Node) -> TransportResult<NodeId> {
        // Fail before allocating if the parent is gone.
        self.node(parent)?;
        let id = self.alloc(node);
        let parent_node = self.node_mut(parent)?;
        parent_node.children.push(id);
        parent_node.last_write = now_ticks();
        Ok(id)
    }
}

/// Transport backed by an in-memory key tree.
///
/// All state sits behind a `RwLock`, so one instance can be shared between
/// threads; individual calls are atomic.
pub struct MemoryTransport {
    state: RwLock<State>,
    /// Predefined handles; `None` marks a root this instance does not provide.
    roots: HashMap<RawHandle, Option<NodeId>>,
}

impl MemoryTransport {
    /// Creates a transport with an empty tree under every root except
    /// `HKEY_DYN_DATA`, which modern platforms lack.
    pub fn new() -> Self {
        let mut state = State {
            next_handle: FIRST_HANDLE,
            ..State::default()
        };
        let mut roots = HashMap::new();
        for root in RootKey::ALL {
            let node = match root {
                RootKey::DynData => None,
                _ => Some(state.alloc(Node::new(""))),
            };
            roots.insert(root.handle(), node);
        }
        Self {
            state: RwLock::new(state),
            roots,
        }
    }

    /// Removes a root, so every call through its handle fails with
    /// [`TransportError::UnsupportedRoot`].
    pub fn without_root(mut self, root: RootKey) -> Self {
        self.roots.insert(root.handle(), None);
        self
    }

    /// Number of handles issued and not yet closed.
    pub fn open_handle_count(&self) -> usize {
        self.state.read().expect("registry state lock poisoned").handles.len()
    }

    /// Number of live keys, roots included.
    pub fn key_count(&self) -> usize {
        self.state.read().expect("registry state lock poisoned").key_count()
    }

    /// Number of successful [`Transport::flush_key`] calls.
    pub fn flush_count(&self) -> u64 {
        self.state.read().expect("registry state lock poisoned").flushes
    }

    /// Resolves a handle to its node and access rights.
    fn resolve(&self, state: &State, handle: RawHandle) -> TransportResult<OpenKey> {
        if let Some(root) = self.roots.get(&handle) {
            return match root {
                Some(node) => Ok(OpenKey {
                    node: *node,
                    generation: state.generation(*node),
                    access: AccessMask::ALL_ACCESS,
                }),
                None => Err(TransportError::UnsupportedRoot(handle)),
            };
        }
        let open = state
            .handles
            .get(&handle)
            .copied()
            .ok_or(TransportError::InvalidHandle(handle))?;
        if state.generation(open.node) != open.generation {
            return Err(TransportError::KeyDeleted);
        }
        state.node(open.node)?;
        Ok(open)
    }

    fn resolve_with(&self, state: &State, handle: RawHandle, needed: AccessMask) -> TransportResult<NodeId> {
        let open = self.resolve(state, handle)?;
        if !open.access.contains(needed) {
            return Err(TransportError::AccessDenied);
        }
        Ok(open.node)
    }

    fn is_root_handle(&self, handle: RawHandle) -> bool {
        self.roots.contains_key(&handle)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("registry state lock poisoned");
        f.debug_struct("MemoryTransport")
            .field("key_count", &state.key_count())
            .field("open_handles", &state.handles.len())
            .finish()
    }
}

fn segments(name: &str) -> impl Iterator<Item = &str> {
    name.split('\\').filter(|s| !s.is_empty())
}

fn now_ticks() -> u64 {
    datetime_to_ticks(chrono::Utc::now().naive_utc())
}

impl Transport for MemoryTransport {
    fn open_key(&self, parent: RawHandle, name: &str, access: AccessMask) -> TransportResult<RawHandle> {
        let mut state = self.state.write().expect("registry state lock poisoned");
        let mut node = self.resolve(&state, parent)?.node;
        for segment in segments(name) {
            node = state.find_child(node, segment)?.ok_or(TransportError::NotFound)?;
        }
        Ok(state.issue_handle(node, access))
    }

    fn create_key(&self, parent: RawHandle, name: &str) -> TransportResult<RawHandle> {
        let mut state = self.state.write().expect("registry state lock poisoned");
        let mut node = self.resolve_with(&state, parent, AccessMask::CREATE_SUB_KEY)?;
        for segment in segments(name) {
            node = match state.find_child(node, segment)? {
                Some(existing) => existing,
                None => {
                    debug!(name = segment, "Creating key");
                    state.add_child(node, Node::new(segment))?
                }
            };
        }
        Ok(state.issue_handle(node, AccessMask::ALL_ACCESS))
    }

    fn close_key(&self, handle: RawHandle) -> TransportResult<()> {
        if self.is_root_handle(handle) {
            return Ok(());
        }
        let mut state = self.state.write().expect("registry state lock poisoned");
        state
            .handles
            .remove(&handle)
            .map(|_| ())
            .ok_or(TransportError::InvalidHandle(handle))
    }

    fn query_value(&self, handle: RawHandle, name: &str) -> TransportResult<(RawValue, u32)> {
        let state = self.state.read().expect("registry state lock poisoned");
        let node = state.node(self.resolve_with(&state, handle, AccessMask::QUERY_VALUE)?)?;
        let index = node.value_index(name).ok_or(TransportError::NotFound)?;
        let value = &node.values[index];
        Ok((RawValue::from_wire(value.tag, &value.data), value.tag))
    }

    fn set_value(&self, handle: RawHandle, name: &str, tag: u32, value: RawValue) -> TransportResult<()> {
        let mut state = self.state.write().expect("registry state lock poisoned");
        let id = self.resolve_with(&state, handle, AccessMask::SET_VALUE)?;
        let node = state.node_mut(id)?;
        let stored = StoredValue {
            name: name.to_string(),
            tag,
            data: value.into_bytes(),
        };
        match node.value_index(name) {
            Some(index) => node.values[index] = stored,
            None => node.values.push(stored),
        }
        node.last_write = now_ticks();
        Ok(())
    }

    fn delete_value(&self, handle: RawHandle, name: &str) -> TransportResult<()> {
        let mut state = self.state.write().expect("registry state lock poisoned");
        let id = self.resolve_with(&state, handle, AccessMask::SET_VALUE)?;
        let node = state.node_mut(id)?;
        let index = node.value_index(name).ok_or(TransportError::NotFound)?;
        node.values.remove(index);
        node.last_write = now_ticks();
        Ok(())
    }

    fn delete_key(&self, handle: RawHandle, name: &str) -> TransportResult<()> {
        let mut state = self.state.write().expect("registry state lock poisoned");
        let mut parent = self.resolve(&state, handle)?.node;
        let mut target = None;
        for segment in segments(name) {
            if let Some(current) = target {
                parent = current;
            }
            target = Some(state.find_child(parent, segment)?.ok_or(TransportError::NotFound)?);
        }
        let target = target.ok_or(TransportError::NotFound)?;
        if !state.node(target)?.children.is_empty() {
            return Err(TransportError::HasSubkeys);
        }
        let parent_node = state.node_mut(parent)?;
        parent_node.children.retain(|&child| child != target);
        parent_node.last_write = now_ticks();
        state.release(target);
        debug!(name, "Deleted key");
        Ok(())
    }

    fn enum_value(&self, handle: RawHandle, index: u32) -> TransportResult<Option<(String, RawValue, u32)>> {
        let state = self.state.read().expect("registry state lock poisoned");
        let node = state.node(self.resolve_with(&state, handle, AccessMask::QUERY_VALUE)?)?;
        Ok(node
            .values
            .get(index as usize)
            .map(|v| (v.name.clone(), RawValue::from_wire(v.tag, &v.data), v.tag)))
    }

    fn enum_key(&self, handle: RawHandle, index: u32) -> TransportResult<Option<String>> {
        let state = self.state.read().expect("registry state lock poisoned");
        let node = state.node(self.resolve_with(&state, handle, AccessMask::ENUMERATE_SUB_KEYS)?)?;
        match node.children.get(index as usize) {
            Some(&child) => Ok(Some(state.node(child)?.name.clone())),
            None => Ok(None),
        }
    }

    fn query_info(&self, handle: RawHandle) -> TransportResult<KeyInfo> {
        let state = self.state.read().expect("registry state lock poisoned");
        let node = state.node(self.resolve_with(&state, handle, AccessMask::QUERY_VALUE)?)?;
        Ok(KeyInfo {
            subkey_count: node.children.len() as u32,
            value_count: node.values.len() as u32,
            last_write: node.last_write,
        })
    }

    fn flush_key(&self, handle: RawHandle) -> TransportResult<()> {
        let mut state = self.state.write().expect("registry state lock poisoned");
        self.resolve(&state, handle)?;
        state.flushes += 1;
        Ok(())
    }

    fn load_key(&self, parent: RawHandle, name: &str, path: &Path) -> TransportResult<RawHandle> {
        match RootKey::from_handle(parent) {
            Some(RootKey::LocalMachine) | Some(RootKey::Users) => {}
            _ => {
                return Err(TransportError::InvalidOperation(
                    "key files can only be loaded directly under HKEY_LOCAL_MACHINE or HKEY_USERS".to_string(),
                ))
            }
        }
        if name.is_empty() || name.contains('\\') {
            return Err(TransportError::InvalidOperation(format!("invalid key name '{}'", name)));
        }

        let record = read_key_file(path)?;

        let mut state = self.state.write().expect("registry state lock poisoned");
        let parent_node = self.resolve(&state, parent)?.node;
        if state.find_child(parent_node, name)?.is_some() {
            return Err(TransportError::InvalidOperation(format!("key '{}' already exists", name)));
        }
        let id = insert_record(&mut state, parent_node, name, record)?;
        info!(name, path = %path.display(), "Loaded key file");
        Ok(state.issue_handle(id, AccessMask::ALL_ACCESS))
    }

    fn save_key(&self, handle: RawHandle, path: &Path) -> TransportResult<()> {
        let mut buffer = Vec::new();
        {
            let state = self.state.read().expect("registry state lock poisoned");
            let node = self.resolve(&state, handle)?.node;
            buffer.write_all(KEY_FILE_SIGNATURE)?;
            buffer.write_u32::<LittleEndian>(KEY_FILE_VERSION)?;
            write_record(&state, node, &mut buffer)?;
        }

        // Refuse to overwrite, as the platform call does.
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(&buffer)?;
        file.flush()?;
        info!(path = %path.display(), size = buffer.len(), "Saved key file");
        Ok(())
    }
}

/// A key subtree read from a key file.
#[derive(Debug)]
struct KeyRecord {
    name: String,
    last_write: u64,
    values: Vec<StoredValue>,
    children: Vec<KeyRecord>,
}

fn write_len(out: &mut Vec<u8>, len: usize) -> TransportResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| TransportError::InvalidOperation(format!("length {} does not fit a key file", len)))?;
    out.write_u32::<LittleEndian>(len)?;
    Ok(())
}

fn write_record(state: &State, id: NodeId, out: &mut Vec<u8>) -> TransportResult<()> {
    let node = state.node(id)?;
    write_len(out, node.name.len())?;
    out.write_all(node.name.as_bytes())?;
    out.write_u64::<LittleEndian>(node.last_write)?;

    write_len(out, node.values.len())?;
    for value in &node.values {
        write_len(out, value.name.len())?;
        out.write_all(value.name.as_bytes())?;
        out.write_u32::<LittleEndian>(value.tag)?;
        write_len(out, value.data.len())?;
        out.write_all(&value.data)?;
    }

    write_len(out, node.children.len())?;
    for &child in &node.children {
        write_record(state, child, out)?;
    }
    Ok(())
}

fn insert_record(state: &mut State, parent: NodeId, name: &str, record: KeyRecord) -> TransportResult<NodeId> {
    let id = state.add_child(
        parent,
        Node {
            name: name.to_string(),
            children: Vec::new(),
            values: record.values,
            last_write: record.last_write,
        },
    )?;
    for child in record.children {
        let child_name = child.name.clone();
        insert_record(state, id, &child_name, child)?;
    }
    Ok(id)
}

fn read_key_file(path: &Path) -> TransportResult<KeyRecord> {
    let file = File::open(path)?;
    let size = file.metadata()?.len() as usize;
    if size < KEY_FILE_HEADER_SIZE {
        return Err(TransportError::InvalidKeyFile(format!(
            "file is {} bytes, header needs {}",
            size, KEY_FILE_HEADER_SIZE
        )));
    }

    // SAFETY: The file is opened read-only, its size was checked above, and
    // the map is dropped before this function returns. Parsing copies
    // everything it keeps and bounds-checks every read.
    let mmap = unsafe { Mmap::map(&file)? };
    parse_key_file(&mmap)
}

/// Parses a complete key file image.
fn parse_key_file(data: &[u8]) -> TransportResult<KeyRecord> {
    if data.len() < KEY_FILE_HEADER_SIZE || &data[0..4] != KEY_FILE_SIGNATURE {
        return Err(TransportError::InvalidKeyFile("missing RKEY signature".to_string()));
    }
    let mut reader = KeyFileReader {
        cursor: Cursor::new(data),
    };
    reader.cursor.set_position(4);
    let version = reader.u32()?;
    if version != KEY_FILE_VERSION {
        return Err(TransportError::InvalidKeyFile(format!("unsupported version {}", version)));
    }
    let record = reader.record(0)?;
    let trailing = data.len() as u64 - reader.cursor.position();
    if trailing != 0 {
        warn!(trailing, "Ignoring trailing bytes after key file");
    }
    Ok(record)
}

struct KeyFileReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl KeyFileReader<'_> {
    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        (len.saturating_sub(self.cursor.position())) as usize
    }

    fn u32(&mut self) -> TransportResult<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(truncated)
    }

    fn u64(&mut self) -> TransportResult<u64> {
        self.cursor.read_u64::<LittleEndian>().map_err(truncated)
    }

    fn bytes(&mut self) -> TransportResult<Vec<u8>> {
        let len = self.u32()? as usize;
        if len > self.remaining() {
            return Err(TransportError::InvalidKeyFile(format!(
                "field of {} bytes overruns file ({} left)",
                len,
                self.remaining()
            )));
        }
        let mut buf = vec![0u8; len];
        self.cursor.read_exact(&mut buf).map_err(truncated)?;
        Ok(buf)
    }

    fn string(&mut self) -> TransportResult<String> {
        String::from_utf8(self.bytes()?)
            .map_err(|_| TransportError::InvalidKeyFile("name is not valid UTF-8".to_string()))
    }

    fn record(&mut self, depth: usize) -> TransportResult<KeyRecord> {
        if depth > MAX_KEY_DEPTH {
            return Err(TransportError::InvalidKeyFile(format!(
                "keys nested deeper than {}",
                MAX_KEY_DEPTH
            )));
        }
        let name = self.string()?;
        let last_write = self.u64()?;

        let value_count = self.u32()?;
        let mut values = Vec::new();
        for _ in 0..value_count {
            let name = self.string()?;
            let tag = self.u32()?;
            let data = self.bytes()?;
            values.push(StoredValue { name, tag, data });
        }

        let child_count = self.u32()?;
        let mut children = Vec::new();
        for _ in 0..child_count {
            children.push(self.record(depth + 1)?);
        }

        Ok(KeyRecord {
            name,
            last_write,
            values,
            children,
        })
    }
}

fn truncated(err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        TransportError::InvalidKeyFile("unexpected end of file".to_string())
    } else {
        TransportError::Io(err)
    }
}
