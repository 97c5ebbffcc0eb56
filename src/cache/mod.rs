//! Bounded cache of open resource handles with least-recently-used eviction.
//!
//! Entries live in a slot arena. An identifier index maps names to slots and a
//! recency index maps "last used" ticks to slots, so the least recently used
//! entry is always the first key of the recency index. Ticks only grow, so
//! no two entries ever share one.

mod alias;

pub use alias::{NameAliases, strip_chr_prefix};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::format::FormatDecoder;
use crate::io::{BufferedReader, ByteSource, ResourceSource, Transport};

/// A cached handle. The per-handle lock serialises readers of one resource.
pub type SharedHandle<S = ResourceSource> = Arc<Mutex<OpenHandle<S>>>;

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An open reader paired with the alias table of its sequence names.
pub struct OpenHandle<S: ByteSource = ResourceSource> {
    reader: BufferedReader<S>,
    aliases: NameAliases,
}

impl OpenHandle<ResourceSource> {
    /// Opens `identifier` and reads its name directory once.
    pub fn open<D: FormatDecoder + ?Sized>(
        identifier: &str,
        transport: &Transport,
        capacity: usize,
        decoder: &D,
    ) -> Result<Self> {
        let reader = BufferedReader::open(identifier, transport, capacity).map_err(|source| {
            Error::OpenFailure {
                identifier: identifier.to_string(),
                source,
            }
        })?;
        Self::with_directory(reader, decoder)
    }
}

impl<S: ByteSource> OpenHandle<S> {
    pub fn new(reader: BufferedReader<S>, aliases: NameAliases) -> Self {
        Self { reader, aliases }
    }

    /// Builds the alias table by enumerating the reader's name directory.
    pub fn with_directory<D: FormatDecoder + ?Sized>(
        mut reader: BufferedReader<S>,
        decoder: &D,
    ) -> Result<Self> {
        let names = decoder.sequence_names(&mut reader).map_err(|e| match e {
            Error::IoFailure { identifier, source } => Error::OpenFailure { identifier, source },
            other => other,
        })?;
        debug!("{}: {} sequence names", reader.identifier(), names.len());
        Ok(Self::new(reader, NameAliases::build(names)))
    }

    pub fn reader(&self) -> &BufferedReader<S> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut BufferedReader<S> {
        &mut self.reader
    }

    pub fn aliases(&self) -> &NameAliases {
        &self.aliases
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_closed()
    }

    /// Releases the reader's source and forgets the alias table.
    pub fn close(&mut self) {
        self.reader.close();
        self.aliases = NameAliases::default();
    }

    /// Maps a caller-supplied name to the canonical name stored in the resource.
    ///
    /// Tries the name verbatim and `chr`-stripped; on a miss the alias table
    /// is rebuilt from the resource's current directory and tried once more.
    pub fn resolve_name<D: FormatDecoder + ?Sized>(
        &mut self,
        decoder: &D,
        requested: &str,
    ) -> Result<String> {
        if let Some(name) = self.aliases.resolve(requested) {
            return Ok(name.to_string());
        }

        info!(
            "{}: '{requested}' not in alias table, rebuilding",
            self.identifier()
        );
        let names = decoder.sequence_names(&mut self.reader)?;
        self.aliases = NameAliases::build(names);

        match self.aliases.resolve(requested) {
            Some(name) => Ok(name.to_string()),
            None => Err(Error::NameNotFound {
                name: requested.to_string(),
                identifier: self.identifier().to_string(),
                preview: self.aliases.preview(),
            }),
        }
    }
}

struct Slot<S: ByteSource> {
    identifier: String,
    handle: SharedHandle<S>,
    last_used: u64,
}

/// LRU cache of at most `capacity` open handles, keyed by resource identifier.
pub struct HandleCache<S: ByteSource = ResourceSource> {
    capacity: usize,
    slots: Vec<Option<Slot<S>>>,
    free: Vec<usize>,
    by_identifier: HashMap<String, usize>,
    by_recency: BTreeMap<u64, usize>,
    tick: u64,
}

impl<S: ByteSource> HandleCache<S> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            by_identifier: HashMap::with_capacity(capacity),
            by_recency: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.by_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identifier.is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.by_identifier.contains_key(identifier)
    }

    /// Cached identifiers, least recently used first.
    pub fn recency_order(&self) -> Vec<&str> {
        self.by_recency
            .values()
            .filter_map(|&slot| self.slots[slot].as_ref())
            .map(|entry| entry.identifier.as_str())
            .collect()
    }

    /// Returns the cached handle for `identifier`, or opens and admits one.
    ///
    /// A hit becomes the most recently used entry. On a miss `open` runs; if
    /// it fails nothing is cached. Admitting into a full cache first closes
    /// and drops the least recently used entry.
    pub fn get_or_open_with<F>(&mut self, identifier: &str, open: F) -> Result<SharedHandle<S>>
    where
        F: FnOnce() -> Result<OpenHandle<S>>,
    {
        if let Some(&slot) = self.by_identifier.get(identifier) {
            self.touch(slot);
            if let Some(entry) = &self.slots[slot] {
                return Ok(entry.handle.clone());
            }
        }

        let handle = open()?;
        if self.len() >= self.capacity {
            self.evict_lru();
        }

        let handle = Arc::new(Mutex::new(handle));
        let last_used = self.next_tick();
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[slot] = Some(Slot {
            identifier: identifier.to_string(),
            handle: handle.clone(),
            last_used,
        });
        self.by_identifier.insert(identifier.to_string(), slot);
        self.by_recency.insert(last_used, slot);
        debug!("cached {identifier} ({}/{})", self.len(), self.capacity);
        Ok(handle)
    }

    /// Closes every handle and empties the cache. Returns how many were open.
    pub fn clear_all(&mut self) -> usize {
        let mut closed = 0;
        for entry in self.slots.drain(..).flatten() {
            lock(&entry.handle).close();
            closed += 1;
        }
        self.free.clear();
        self.by_identifier.clear();
        self.by_recency.clear();
        closed
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, slot: usize) {
        let tick = self.next_tick();
        if let Some(entry) = self.slots[slot].as_mut() {
            self.by_recency.remove(&entry.last_used);
            entry.last_used = tick;
            self.by_recency.insert(tick, slot);
        }
    }

    fn evict_lru(&mut self) {
        let Some((_, slot)) = self.by_recency.pop_first() else {
            return;
        };
        if let Some(entry) = self.slots[slot].take() {
            self.by_identifier.remove(&entry.identifier);
            self.free.push(slot);
            // waits for any reader still holding the handle
            lock(&entry.handle).close();
            info!("evicted {} from handle cache", entry.identifier);
        }
    }
}
