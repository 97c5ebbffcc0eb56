//! Runtime configuration, read from the environment with clamped defaults.

use std::time::Duration;

use log::warn;

/// Environment variable holding the buffer capacity in KiB.
pub const ENV_BUFFER_KB: &str = "WIGRANGE_BUFFER_KB";
/// Environment variable holding the maximum number of cached handles.
pub const ENV_MAX_HANDLES: &str = "WIGRANGE_MAX_HANDLES";
/// Environment variable enabling TLS certificate verification.
pub const ENV_TLS_VERIFY: &str = "WIGRANGE_TLS_VERIFY";

pub const DEFAULT_BUFFER_KB: usize = 1024;
pub const MIN_BUFFER_KB: usize = 64;
pub const MAX_BUFFER_KB: usize = 8192;

pub const DEFAULT_MAX_HANDLES: usize = 8;
pub const MIN_MAX_HANDLES: usize = 1;
pub const MAX_MAX_HANDLES: usize = 64;

/// Settings for the remote transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Verify server certificates on HTTPS. Off by default for compatibility.
    pub verify_tls: bool,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Whole-transfer timeout for one range request.
    pub total_timeout: Duration,
    /// Maximum redirect hops followed per request.
    pub max_redirects: usize,
    /// TCP keep-alive idle time.
    pub tcp_keepalive: Duration,
    /// Interval between TCP keep-alive probes once the connection is idle.
    pub tcp_keepalive_interval: Duration,
    /// How long an idle pooled connection is kept for reuse.
    pub pool_idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            verify_tls: false,
            connect_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(60),
            max_redirects: 5,
            tcp_keepalive: Duration::from_secs(30),
            tcp_keepalive_interval: Duration::from_secs(15),
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Top-level configuration for a [`RangeImporter`](crate::RangeImporter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    buffer_kb: usize,
    max_handles: usize,
    pub transport: TransportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_kb: DEFAULT_BUFFER_KB,
            max_handles: DEFAULT_MAX_HANDLES,
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    /// Builds a configuration from `WIGRANGE_*` environment variables.
    ///
    /// Missing variables take their defaults, unparseable ones are reported and
    /// ignored, and numeric values are clamped into their allowed ranges.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        if let Some(kb) = parse_usize(ENV_BUFFER_KB, lookup(ENV_BUFFER_KB)) {
            config = config.with_buffer_kb(kb);
        }
        if let Some(n) = parse_usize(ENV_MAX_HANDLES, lookup(ENV_MAX_HANDLES)) {
            config = config.with_max_handles(n);
        }
        if let Some(raw) = lookup(ENV_TLS_VERIFY) {
            config.transport.verify_tls = parse_flag(&raw);
        }
        config
    }

    /// Sets the buffer capacity in KiB, clamped to [64, 8192].
    pub fn with_buffer_kb(mut self, kb: usize) -> Self {
        self.buffer_kb = clamp_reported("buffer capacity (KiB)", kb, MIN_BUFFER_KB, MAX_BUFFER_KB);
        self
    }

    /// Sets the handle cache capacity, clamped to [1, 64].
    pub fn with_max_handles(mut self, n: usize) -> Self {
        self.max_handles = clamp_reported("max cached handles", n, MIN_MAX_HANDLES, MAX_MAX_HANDLES);
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.transport.verify_tls = verify;
        self
    }

    pub fn buffer_kb(&self) -> usize {
        self.buffer_kb
    }

    /// Buffer capacity in bytes.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_kb * 1024
    }

    pub fn max_handles(&self) -> usize {
        self.max_handles
    }
}

fn clamp_reported(what: &str, value: usize, min: usize, max: usize) -> usize {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!("{what} {value} outside [{min}, {max}], using {clamped}");
    }
    clamped
}

fn parse_usize(key: &str, raw: Option<String>) -> Option<usize> {
    let raw = raw?;
    match raw.trim().parse::<usize>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("ignoring {key}={raw:?}: {e}");
            None
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
