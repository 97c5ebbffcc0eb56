//! # wigrange
//!
//! Random-access reads of genome track files from the local filesystem or
//! from HTTP, HTTPS and FTP servers, with a bounded cache of open handles.
//!
//! Remote resources are read with byte-range requests through a fixed-size
//! buffer window, so a query only transfers the parts of the file it touches.
//! Open handles are kept in a least-recently-used cache together with a
//! table of their sequence names, which resolves `chr12` and `12` alike.
//!
//! ## Example
//!
//! ```no_run
//! use wigrange::{BedGraphDecoder, Config, RangeImporter};
//!
//! fn main() -> wigrange::Result<()> {
//!     let importer = RangeImporter::new(Config::from_env(), BedGraphDecoder);
//!
//!     // 1-based, inclusive: 100 values for positions 1001..=1100
//!     let values = importer.import_range("https://example.com/signal.bedGraph", "12", 1001, 1100)?;
//!     assert_eq!(values.len(), 100);
//!
//!     importer.explicit_close();
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
mod importer;
pub mod io;
pub mod query;

use std::sync::OnceLock;

pub use cli::Cli;
pub use config::Config;
pub use error::{Error, Result, SourceError};
pub use format::{BedGraphDecoder, FormatDecoder, IntervalRecord};
pub use importer::RangeImporter;
pub use io::{BufferedReader, ByteSource, RangeRead, ResourceSource};

static GLOBAL: OnceLock<RangeImporter> = OnceLock::new();

/// Process-wide importer for bedGraph resources, configured from the environment on first use.
pub fn global() -> &'static RangeImporter {
    GLOBAL.get_or_init(|| RangeImporter::new(Config::from_env(), BedGraphDecoder))
}

/// [`RangeImporter::import_range`] on the [`global`] importer.
pub fn import_range(identifier: &str, name: &str, start: i64, end: i64) -> Result<Vec<f64>> {
    global().import_range(identifier, name, start, end)
}

/// Releases every resource held by the [`global`] importer. Safe to call at any time.
pub fn explicit_close() {
    if let Some(importer) = GLOBAL.get() {
        importer.explicit_close();
    }
}
