//! Buffered read/seek over a [`ByteSource`].

use std::io::{self, BufRead, Read, Seek, SeekFrom};

use log::{debug, warn};

use super::window::{ByteWindow, FillState};
use super::{ByteSource, RangeRead, ResourceSource, Transport};
use crate::error::SourceError;

/// Serves reads and seeks from a [`ByteWindow`], refilling it from the source
/// only when a read runs past the bytes it holds.
///
/// Seeks inside the window are pure cursor moves. Seeks outside it discard
/// the window; remote sources defer the fetch to the next read, local files
/// reposition immediately.
pub struct BufferedReader<S: ByteSource = ResourceSource> {
    identifier: String,
    source: Option<S>,
    window: ByteWindow,
    compressed: bool,
    needs_seek: bool,
    fetches: u64,
    transferred_bytes: u64,
}

impl BufferedReader<ResourceSource> {
    /// Opens `identifier` and, for remote resources, fetches the first window
    /// so unreachable URLs fail here rather than on the first read.
    pub fn open(identifier: &str, transport: &Transport, capacity: usize) -> Result<Self, SourceError> {
        let source = ResourceSource::open(identifier, transport)?;
        let mut reader = Self::new(identifier, source, capacity);
        if !reader.is_local() {
            reader.refill(0, capacity)?;
        }
        Ok(reader)
    }
}

impl<S: ByteSource> BufferedReader<S> {
    pub fn new(identifier: impl Into<String>, source: S, capacity: usize) -> Self {
        Self {
            identifier: identifier.into(),
            source: Some(source),
            window: ByteWindow::new(capacity),
            compressed: false,
            needs_seek: false,
            fetches: 0,
            transferred_bytes: 0,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn window(&self) -> &ByteWindow {
        &self.window
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    /// Number of fetches issued against the source, failed ones included.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    /// Bytes the source delivered, including any it sent past a requested
    /// range that were drained and dropped.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    pub fn is_local(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_local())
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Whether a failed fetch is waiting for a seek.
    pub fn needs_seek(&self) -> bool {
        self.needs_seek
    }

    /// Absolute offset of the next byte a read returns.
    pub fn position(&self) -> u64 {
        self.window.position()
    }

    pub fn len(&self) -> Option<u64> {
        self.source.as_ref().and_then(|s| s.len())
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        self.compressed = compressed;
    }

    /// Releases the source. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!(
                "closed {} after {} fetches ({} bytes)",
                self.identifier, self.fetches, self.transferred_bytes
            );
        }
        self.window.reset_at(0);
    }

    /// Moves to `pos`. No I/O when `pos` lies inside the current window.
    pub fn seek_to(&mut self, pos: u64) -> Result<(), SourceError> {
        let source = self.source.as_mut().ok_or(SourceError::Closed)?;
        if !self.needs_seek && self.window.move_to(pos) {
            return Ok(());
        }

        self.needs_seek = false;
        self.window.reset_at(pos);
        if source.is_local() {
            if let Err(e) = source.seek_to(pos) {
                warn!("seek to {pos} in {} failed: {e}", self.identifier);
                self.needs_seek = true;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Reads up to `out.len()` bytes, draining the window before refilling it.
    ///
    /// Returns fewer bytes only at end of resource. A failed refill is
    /// returned as an error and leaves the reader needing a seek.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<usize, SourceError> {
        let mut copied = 0;
        while copied < out.len() {
            if !self.ensure_unread(out.len() - copied)? {
                break;
            }
            copied += self.window.take_into(&mut out[copied..]);
        }
        Ok(copied)
    }

    /// Makes sure the window has unread bytes, refilling sequentially when it
    /// is drained. Returns `false` at end of resource.
    ///
    /// `wanted` is how many bytes the caller still needs; it only bounds the
    /// refill while a compressed block is being read.
    fn ensure_unread(&mut self, wanted: usize) -> Result<bool, SourceError> {
        if self.source.is_none() {
            return Err(SourceError::Closed);
        }
        if self.needs_seek {
            return Err(SourceError::NeedsSeek);
        }
        if !self.window.is_drained() {
            return Ok(true);
        }
        if self.reached_end() {
            return Ok(false);
        }

        let len = if self.compressed {
            wanted.min(self.window.capacity())
        } else {
            self.window.capacity()
        };
        self.refill(self.window.next_origin(), len)?;
        Ok(!self.window.is_drained())
    }

    /// Whether the last fill ended the resource.
    ///
    /// A short fill is the end only when it delivered nothing or reached the
    /// known length. Servers that cap each reply also answer short; the next
    /// refill continues where they stopped.
    fn reached_end(&self) -> bool {
        match self.window.last_fill() {
            FillState::Short { .. } => {
                self.window.valid_len() == 0
                    || self
                        .len()
                        .is_some_and(|len| self.window.next_origin() >= len)
            }
            _ => false,
        }
    }

    fn refill(&mut self, offset: u64, len: usize) -> Result<FillState, SourceError> {
        let source = self.source.as_mut().ok_or(SourceError::Closed)?;
        self.fetches += 1;

        match self.window.fill(source, offset, len) {
            Ok(state) => {
                self.transferred_bytes += self.window.valid_len() as u64;
                if let FillState::Truncated { dropped } = state {
                    self.transferred_bytes += dropped;
                    debug!(
                        "{}: dropped {dropped} bytes past the requested {len} at {offset}",
                        self.identifier
                    );
                }
                Ok(state)
            }
            Err(e) => {
                warn!(
                    "fetch of {len} bytes at {offset} from {} failed: {e}",
                    self.identifier
                );
                self.needs_seek = true;
                Err(e)
            }
        }
    }
}

impl<S: ByteSource> Read for BufferedReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(io::Error::other)
    }
}

impl<S: ByteSource> BufRead for BufferedReader<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let wanted = self.window.capacity();
        self.ensure_unread(wanted).map_err(io::Error::other)?;
        Ok(self.window.unread())
    }

    fn consume(&mut self, amt: usize) {
        self.window.consume(amt);
    }
}

impl<S: ByteSource> Seek for BufferedReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.position().checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let len = self.len().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Unsupported, "resource length unknown")
                })?;
                len.checked_add_signed(delta)
            }
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid seek position"))?;

        self.seek_to(target).map_err(io::Error::other)?;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }
}

impl<S: ByteSource> RangeRead for BufferedReader<S> {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn set_compressed(&mut self, compressed: bool) {
        BufferedReader::set_compressed(self, compressed);
    }
}
