//! Fixed-capacity in-memory window over one contiguous slice of a resource.

use super::ByteSource;
use crate::error::SourceError;

/// How the most recent fill compared with what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    /// Nothing fetched since the last reset.
    Empty,
    /// The source delivered exactly the requested length.
    Exact,
    /// The source ran out before the requested length: end of resource.
    Short { requested: usize },
    /// The source delivered more than requested; the excess was dropped.
    Truncated { dropped: u64 },
}

/// A window holding the resource bytes `[origin, origin + valid_len)`.
///
/// `origin` is `None` until something has been fetched or a position has
/// been set. Bytes outside the window are only reachable through a refill.
pub struct ByteWindow {
    data: Box<[u8]>,
    origin: Option<u64>,
    valid_len: usize,
    cursor: usize,
    last_fill: FillState,
}

impl ByteWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            origin: None,
            valid_len: 0,
            cursor: 0,
            last_fill: FillState::Empty,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn origin(&self) -> Option<u64> {
        self.origin
    }

    pub fn valid_len(&self) -> usize {
        self.valid_len
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn last_fill(&self) -> FillState {
        self.last_fill
    }

    /// Absolute resource offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.origin.unwrap_or(0) + self.cursor as u64
    }

    /// Offset where a sequential refill continues: right after the valid bytes.
    pub fn next_origin(&self) -> u64 {
        self.origin.map_or(0, |origin| origin + self.valid_len as u64)
    }

    pub fn contains(&self, pos: u64) -> bool {
        self.origin
            .is_some_and(|origin| pos >= origin && pos < origin + self.valid_len as u64)
    }

    /// Unread bytes of the window.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.cursor..self.valid_len]
    }

    pub fn is_drained(&self) -> bool {
        self.cursor >= self.valid_len
    }

    pub fn consume(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.valid_len);
    }

    /// Copies as many unread bytes as fit into `out` and advances the cursor.
    pub fn take_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.valid_len - self.cursor);
        out[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    /// Moves the cursor to `pos` without I/O when the window covers it.
    pub fn move_to(&mut self, pos: u64) -> bool {
        match self.origin {
            Some(origin) if self.contains(pos) => {
                self.cursor = (pos - origin) as usize;
                true
            }
            _ => false,
        }
    }

    /// Discards the content and sets a new logical origin.
    pub fn reset_at(&mut self, origin: u64) {
        self.origin = Some(origin);
        self.valid_len = 0;
        self.cursor = 0;
        self.last_fill = FillState::Empty;
    }

    /// Replaces the content with `[offset, offset + len)` fetched from `source`.
    ///
    /// `len` is capped at the capacity. A short fill is not an error. On
    /// failure the window is left empty at `offset`.
    pub fn fill<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        offset: u64,
        len: usize,
    ) -> Result<FillState, SourceError> {
        let len = len.min(self.capacity());
        self.reset_at(offset);

        let fetched = source.fetch(offset, &mut self.data[..len])?;
        self.valid_len = fetched.bytes.min(len);
        self.last_fill = if fetched.overflow > 0 {
            FillState::Truncated {
                dropped: fetched.overflow,
            }
        } else if self.valid_len < len {
            FillState::Short { requested: len }
        } else {
            FillState::Exact
        };
        Ok(self.last_fill)
    }
}
