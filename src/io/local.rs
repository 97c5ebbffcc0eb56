use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use super::{ByteSource, Fetched, read_full};
use crate::error::SourceError;

/// Local file source with random access support
pub struct LocalSource {
    file: File,
    size: u64,
}

impl LocalSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

impl ByteSource for LocalSource {
    fn fetch(&mut self, offset: u64, buf: &mut [u8]) -> Result<Fetched, SourceError> {
        self.file.seek(SeekFrom::Start(offset))?;

        Ok(Fetched::exact(read_full(&mut self.file, buf)?))
    }

    fn seek_to(&mut self, offset: u64) -> Result<(), SourceError> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn is_local(&self) -> bool {
        true
    }

    fn len(&self) -> Option<u64> {
        Some(self.size)
    }
}
