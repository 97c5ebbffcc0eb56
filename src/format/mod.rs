//! Track-format decoding.
//!
//! The byte-source layer never interprets file contents. A [`FormatDecoder`]
//! reads raw bytes through a [`RangeRead`] and hands back the sequence-name
//! directory and decoded interval records.
//!
//! - [`bedgraph`]: plain-text bedGraph, used by the command-line tool

pub mod bedgraph;

pub use bedgraph::BedGraphDecoder;

use crate::error::Result;
use crate::io::RangeRead;

/// One decoded interval: `value` covers the half-open span `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalRecord {
    pub start: u32,
    pub end: u32,
    pub value: f64,
}

impl IntervalRecord {
    pub fn new(start: u32, end: u32, value: f64) -> Self {
        Self { start, end, value }
    }

    /// Whether the record intersects the half-open window `[start, end)`.
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        self.start < end && self.end > start
    }
}

/// Decodes a track format from a seekable byte stream.
pub trait FormatDecoder: Send + Sync {
    /// Canonical sequence names stored in the resource, in directory order.
    fn sequence_names(&self, reader: &mut dyn RangeRead) -> Result<Vec<String>>;

    /// Records of sequence `name` overlapping the 0-based half-open window
    /// `[start, end)`. Coordinates are sequence positions, not byte offsets.
    fn overlapping_records(
        &self,
        reader: &mut dyn RangeRead,
        name: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<IntervalRecord>>;
}
