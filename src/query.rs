//! Translation of 1-based inclusive requests into decoder windows, and
//! painting of decoded records into dense output arrays.

use crate::error::{Error, Result};
use crate::format::IntervalRecord;

/// A 0-based half-open window `[start, end)` over one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: u32,
    pub end: u32,
}

impl QueryWindow {
    /// Converts a 1-based inclusive `[start, end]` request.
    pub fn from_one_based(start: i64, end: i64) -> Result<Self> {
        let invalid = || Error::InvalidRange { start, end };
        if start < 1 || end < start {
            return Err(invalid());
        }
        Ok(Self {
            start: u32::try_from(start - 1).map_err(|_| invalid())?,
            end: u32::try_from(end).map_err(|_| invalid())?,
        })
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Paints each record's value over its intersection with the window.
    ///
    /// Uncovered positions stay `0.0`, and so do positions whose value is NaN.
    /// Later records overwrite earlier ones where they overlap.
    pub fn paint(&self, records: &[IntervalRecord]) -> Vec<f64> {
        let mut out = vec![0.0; self.len()];
        for record in records {
            if !record.overlaps(self.start, self.end) {
                continue;
            }
            let from = (record.start.max(self.start) - self.start) as usize;
            let to = (record.end.min(self.end) - self.start) as usize;
            let value = if record.value.is_nan() {
                0.0
            } else {
                record.value
            };
            out[from..to].fill(value);
        }
        out
    }
}
