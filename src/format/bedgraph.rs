//! bedGraph: one `name start end value` line per interval, 0-based half-open.
//!
//! `track`, `browser` and `#` lines are skipped. The file has no index, so
//! both the name directory and range queries are a single sequential scan
//! through the buffered reader.

use std::collections::HashSet;
use std::io::{BufRead, Seek, SeekFrom};

use super::{FormatDecoder, IntervalRecord};
use crate::error::{Error, Result};
use crate::io::RangeRead;

#[derive(Debug, Default, Clone, Copy)]
pub struct BedGraphDecoder;

impl FormatDecoder for BedGraphDecoder {
    fn sequence_names(&self, reader: &mut dyn RangeRead) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        scan(reader, |name, _| {
            if !seen.contains(name) {
                seen.insert(name.to_string());
                names.push(name.to_string());
            }
        })?;
        Ok(names)
    }

    fn overlapping_records(
        &self,
        reader: &mut dyn RangeRead,
        name: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<IntervalRecord>> {
        let mut records = Vec::new();
        scan(reader, |line_name, record| {
            if line_name == name && record.overlaps(start, end) {
                records.push(record);
            }
        })?;
        Ok(records)
    }
}

/// Reads every data line from the start of the resource.
fn scan(
    reader: &mut dyn RangeRead,
    mut visit: impl FnMut(&str, IntervalRecord),
) -> Result<()> {
    let identifier = reader.identifier().to_string();
    reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| Error::from_read(&identifier, e))?;

    let mut line = String::new();
    let mut line_no = 0usize;
    loop {
        line.clear();
        let n = reader.read_line(&mut line).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                Error::Decode {
                    identifier: identifier.clone(),
                    reason: format!("line {}: not valid UTF-8", line_no + 1),
                }
            } else {
                Error::from_read(&identifier, e)
            }
        })?;
        if n == 0 {
            return Ok(());
        }
        line_no += 1;

        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }

        let (name, record) = parse_line(trimmed).map_err(|reason| Error::Decode {
            identifier: identifier.clone(),
            reason: format!("line {line_no}: {reason}"),
        })?;
        visit(name, record);
    }
}

fn parse_line(line: &str) -> std::result::Result<(&str, IntervalRecord), String> {
    let mut fields = line.split_whitespace();
    let (Some(name), Some(start), Some(end), Some(value)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err("expected 4 fields: name start end value".to_string());
    };

    let start: u32 = start
        .parse()
        .map_err(|e| format!("bad start '{start}': {e}"))?;
    let end: u32 = end.parse().map_err(|e| format!("bad end '{end}': {e}"))?;
    if end < start {
        return Err(format!("end {end} before start {start}"));
    }
    let value: f64 = value
        .parse()
        .map_err(|e| format!("bad value '{value}': {e}"))?;

    Ok((name, IntervalRecord::new(start, end, value)))
}
