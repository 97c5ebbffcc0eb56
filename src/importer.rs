//! Process-scoped entry point: configuration, the shared transport and the
//! handle cache behind one value with explicit teardown.

use std::sync::Mutex;

use log::{debug, info};

use crate::cache::{HandleCache, OpenHandle, SharedHandle, lock};
use crate::config::Config;
use crate::error::{Error, Result, SourceError};
use crate::format::{BedGraphDecoder, FormatDecoder};
use crate::io::Transport;
use crate::query::QueryWindow;

/// Imports dense value arrays for sequence ranges of cached resources.
///
/// Every cache operation (lookup, open, evict, clear) runs under one mutex.
/// Reads against a handle run under that handle's own lock, after the cache
/// lock has been released, so slow queries on one resource do not block
/// lookups of another.
pub struct RangeImporter<D: FormatDecoder = BedGraphDecoder> {
    config: Config,
    decoder: D,
    transport: Transport,
    cache: Mutex<HandleCache>,
}

impl<D: FormatDecoder> RangeImporter<D> {
    pub fn new(config: Config, decoder: D) -> Self {
        let transport = Transport::new(config.transport.clone());
        let cache = Mutex::new(HandleCache::new(config.max_handles()));
        Self {
            config,
            decoder,
            transport,
            cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn cached_handles(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Cached identifiers, least recently used first.
    pub fn cached_identifiers(&self) -> Vec<String> {
        lock(&self.cache)
            .recency_order()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Returns the cached handle for `identifier`, opening it on a miss.
    pub fn get_or_open(&self, identifier: &str) -> Result<SharedHandle> {
        lock(&self.cache).get_or_open_with(identifier, || {
            OpenHandle::open(
                identifier,
                &self.transport,
                self.config.buffer_capacity(),
                &self.decoder,
            )
        })
    }

    /// Canonical sequence names of a resource, in directory order.
    pub fn sequence_names(&self, identifier: &str) -> Result<Vec<String>> {
        self.with_handle(identifier, |handle| Ok(handle.aliases().names().to_vec()))
    }

    /// Bytes the source of `identifier` has delivered so far.
    pub fn transferred_bytes(&self, identifier: &str) -> Result<u64> {
        self.with_handle(identifier, |handle| Ok(handle.reader().transferred_bytes()))
    }

    /// Returns the values of `name` over the 1-based inclusive range `[start, end]`.
    ///
    /// The result always has `end - start + 1` entries. Positions no record
    /// covers, and positions whose value is NaN, are `0.0`.
    pub fn import_range(&self, identifier: &str, name: &str, start: i64, end: i64) -> Result<Vec<f64>> {
        let window = QueryWindow::from_one_based(start, end)?;
        self.with_handle(identifier, |handle| {
            let canonical = handle.resolve_name(&self.decoder, name)?;
            let records = self.decoder.overlapping_records(
                handle.reader_mut(),
                &canonical,
                window.start,
                window.end,
            )?;
            debug!(
                "{identifier} {canonical}:{}-{}: {} records",
                window.start,
                window.end,
                records.len()
            );
            Ok(window.paint(&records))
        })
    }

    /// Closes every cached handle and resets the transport. The importer
    /// stays usable; the next call reopens what it needs.
    pub fn explicit_close(&self) {
        let closed = lock(&self.cache).clear_all();
        self.transport.reset();
        info!("closed {closed} cached handles");
    }

    /// Runs `f` on the locked handle for `identifier`.
    ///
    /// A handle evicted between the cache lookup and taking its lock is found
    /// closed; the lookup is then repeated once, which reopens it.
    fn with_handle<T>(
        &self,
        identifier: &str,
        mut f: impl FnMut(&mut OpenHandle) -> Result<T>,
    ) -> Result<T> {
        for _ in 0..2 {
            let shared = self.get_or_open(identifier)?;
            let mut handle = lock(&shared);
            if handle.is_closed() {
                debug!("{identifier} was evicted before use, reopening");
                continue;
            }
            return f(&mut *handle);
        }
        Err(Error::IoFailure {
            identifier: identifier.to_string(),
            source: SourceError::Closed,
        })
    }
}
