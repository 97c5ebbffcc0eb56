//! Error types for range imports and the byte-source layer beneath them.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a [`ByteSource`](crate::io::ByteSource) or the transport under it.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Local file or socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP transport failed (connect, timeout, TLS, body read).
    #[error("HTTP transfer failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a status that cannot carry the requested bytes.
    #[error("HTTP status {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// The server ignored a byte-range request at a nonzero offset.
    #[error("server does not honour byte-range requests")]
    RangeNotSupported,

    /// The resource identifier looked like a URL but could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The FTP control or data connection failed.
    #[cfg(feature = "ftp")]
    #[error("FTP transfer failed: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    /// The identifier names a scheme this build cannot fetch.
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    /// The source has been released by eviction or teardown.
    #[error("source already closed")]
    Closed,

    /// A previous fetch failed; the reader must be repositioned before reading again.
    #[error("previous fetch failed; seek before reading again")]
    NeedsSeek,
}

/// Errors surfaced to callers of the import API.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any I/O.
    #[error("invalid coordinates: start must be >= 1 and end >= start (got start={start}, end={end})")]
    InvalidRange {
        /// Requested 1-based start
        start: i64,
        /// Requested 1-based inclusive end
        end: i64,
    },

    /// The resource could not be opened. Failed opens are never cached.
    #[error("cannot open '{identifier}': {source}")]
    OpenFailure {
        /// Resource identifier that failed
        identifier: String,
        /// Underlying cause
        #[source]
        source: SourceError,
    },

    /// The requested sequence name is absent even after alias normalisation and a rebuild.
    #[error("sequence '{name}' not found in '{identifier}'. Available examples: [{preview}]")]
    NameNotFound {
        /// Name the caller asked for
        name: String,
        /// Resource identifier that was searched
        identifier: String,
        /// First few names present in the resource
        preview: String,
    },

    /// A fetch failed mid-read or mid-seek.
    #[error("I/O failure on '{identifier}': {source}")]
    IoFailure {
        /// Resource identifier being read
        identifier: String,
        /// Underlying cause
        #[source]
        source: SourceError,
    },

    /// The format collaborator found malformed content.
    #[error("cannot decode '{identifier}': {reason}")]
    Decode {
        /// Resource identifier being decoded
        identifier: String,
        /// What was wrong
        reason: String,
    },
}

impl Error {
    /// Wraps an I/O error raised while a decoder was reading through a buffered reader.
    ///
    /// Errors that originated in the byte-source layer are unwrapped back into
    /// their [`SourceError`], everything else is kept as plain I/O.
    pub fn from_read(identifier: &str, err: std::io::Error) -> Self {
        let source = match err.downcast::<SourceError>() {
            Ok(source) => source,
            Err(err) => SourceError::Io(err),
        };
        Error::IoFailure {
            identifier: identifier.to_string(),
            source,
        }
    }
}
