//! Byte sources and the buffered reader built on top of them.
//!
//! A [`ResourceSource`] is picked once, when an identifier is opened: a plain
//! path becomes a [`LocalSource`], `http://` and `https://` URLs become an
//! [`HttpSource`] and `ftp://` URLs an [`FtpSource`]. Every variant answers the
//! same question, "give me up to N bytes starting at offset O", and the
//! [`BufferedReader`] turns those answers into a seekable stream.

#[cfg(feature = "ftp")]
mod ftp;
mod http;
mod local;
mod reader;
mod transport;
mod window;

#[cfg(feature = "ftp")]
pub use ftp::FtpSource;
pub use http::HttpSource;
pub use local::LocalSource;
pub use reader::BufferedReader;
pub use transport::Transport;
pub use window::{ByteWindow, FillState};

use std::io::{BufRead, Read, Seek};
use std::path::Path;

use crate::error::SourceError;

/// Outcome of a single fetch from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fetched {
    /// Bytes written into the caller's buffer.
    pub bytes: usize,
    /// Bytes the source delivered beyond the requested length and discarded.
    pub overflow: u64,
}

impl Fetched {
    pub fn exact(bytes: usize) -> Self {
        Self { bytes, overflow: 0 }
    }
}

/// Reads until `buf` is full or the stream ends, returning the bytes read.
pub(crate) fn read_full(stream: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Random-access byte source.
pub trait ByteSource: Send {
    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returning fewer bytes than requested means end-of-resource was reached.
    fn fetch(&mut self, offset: u64, buf: &mut [u8]) -> Result<Fetched, SourceError>;

    /// Positions the source for the next fetch.
    ///
    /// Remote sources carry the offset in every request, so only local
    /// files do any work here.
    fn seek_to(&mut self, _offset: u64) -> Result<(), SourceError> {
        Ok(())
    }

    /// Whether seeks are cheap and exact, so they should be applied eagerly.
    fn is_local(&self) -> bool;

    /// Total length of the resource, when known.
    fn len(&self) -> Option<u64>;
}

/// URL scheme of a resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    File,
    Http,
    Https,
    Ftp,
}

impl Scheme {
    pub fn detect(identifier: &str) -> Self {
        if identifier.starts_with("http://") {
            Scheme::Http
        } else if identifier.starts_with("https://") {
            Scheme::Https
        } else if identifier.starts_with("ftp://") {
            Scheme::Ftp
        } else {
            Scheme::File
        }
    }

    pub fn is_remote(self) -> bool {
        self != Scheme::File
    }
}

/// The source variant chosen for an identifier at open time.
pub enum ResourceSource {
    Local(LocalSource),
    Http(HttpSource),
    #[cfg(feature = "ftp")]
    Ftp(FtpSource),
}

impl ResourceSource {
    /// Opens `identifier` with the variant matching its scheme.
    pub fn open(identifier: &str, transport: &Transport) -> Result<Self, SourceError> {
        match Scheme::detect(identifier) {
            Scheme::File => Ok(ResourceSource::Local(LocalSource::open(Path::new(identifier))?)),
            Scheme::Http | Scheme::Https => Ok(ResourceSource::Http(HttpSource::new(
                identifier,
                transport.client()?,
            ))),
            #[cfg(feature = "ftp")]
            Scheme::Ftp => Ok(ResourceSource::Ftp(FtpSource::connect(
                identifier,
                transport.config(),
            )?)),
            #[cfg(not(feature = "ftp"))]
            Scheme::Ftp => Err(SourceError::UnsupportedScheme("ftp".to_string())),
        }
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            ResourceSource::Local(_) => Scheme::File,
            ResourceSource::Http(http) => http.scheme(),
            #[cfg(feature = "ftp")]
            ResourceSource::Ftp(_) => Scheme::Ftp,
        }
    }
}

impl ByteSource for ResourceSource {
    fn fetch(&mut self, offset: u64, buf: &mut [u8]) -> Result<Fetched, SourceError> {
        match self {
            ResourceSource::Local(s) => s.fetch(offset, buf),
            ResourceSource::Http(s) => s.fetch(offset, buf),
            #[cfg(feature = "ftp")]
            ResourceSource::Ftp(s) => s.fetch(offset, buf),
        }
    }

    fn seek_to(&mut self, offset: u64) -> Result<(), SourceError> {
        match self {
            ResourceSource::Local(s) => s.seek_to(offset),
            ResourceSource::Http(s) => s.seek_to(offset),
            #[cfg(feature = "ftp")]
            ResourceSource::Ftp(s) => s.seek_to(offset),
        }
    }

    fn is_local(&self) -> bool {
        matches!(self, ResourceSource::Local(_))
    }

    fn len(&self) -> Option<u64> {
        match self {
            ResourceSource::Local(s) => s.len(),
            ResourceSource::Http(s) => s.len(),
            #[cfg(feature = "ftp")]
            ResourceSource::Ftp(s) => s.len(),
        }
    }
}

/// What a format decoder reads through: a seekable buffered stream.
pub trait RangeRead: BufRead + Seek {
    /// Identifier of the resource behind the stream, for error messages.
    fn identifier(&self) -> &str;

    /// Marks the following reads as part of a compressed block, so refills
    /// fetch exactly the bytes still requested instead of a full window.
    fn set_compressed(&mut self, _compressed: bool) {}
}
