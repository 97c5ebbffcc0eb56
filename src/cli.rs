use clap::Parser;

use crate::config::Config;
use crate::io::Scheme;

#[derive(Parser, Debug)]
#[command(name = "wigrange")]
#[command(version)]
#[command(about = "Import values of a genome track range from a local file or URL", long_about = None)]
#[command(after_help = "Examples:\n  \
  wigrange signal.bedGraph chr12 1001 1100              print 100 values\n  \
  wigrange https://example.com/s.bedGraph 12 1 50       same name with or without 'chr'\n  \
  wigrange --names ftp://example.org/pub/s.bedGraph     list sequence names")]
pub struct Cli {
    /// Track file path or http/https/ftp URL
    #[arg(value_name = "RESOURCE")]
    pub resource: String,

    /// Sequence name; a leading "chr" is optional
    #[arg(value_name = "NAME", required_unless_present = "names")]
    pub name: Option<String>,

    /// First position, 1-based
    #[arg(value_name = "START", required_unless_present = "names", allow_negative_numbers = true)]
    pub start: Option<i64>,

    /// Last position, 1-based inclusive
    #[arg(value_name = "END", required_unless_present = "names", allow_negative_numbers = true)]
    pub end: Option<i64>,

    /// List sequence names and exit
    #[arg(long)]
    pub names: bool,

    /// Buffer window size in KiB (64..=8192) [env: WIGRANGE_BUFFER_KB]
    #[arg(long, value_name = "KIB")]
    pub buffer_kb: Option<usize>,

    /// Maximum number of cached open resources (1..=64) [env: WIGRANGE_MAX_HANDLES]
    #[arg(long, value_name = "N")]
    pub max_handles: Option<usize>,

    /// Verify TLS certificates on HTTPS [env: WIGRANGE_TLS_VERIFY]
    #[arg(long)]
    pub verify_tls: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_remote(&self) -> bool {
        Scheme::detect(&self.resource).is_remote()
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Environment configuration with command-line overrides applied.
    pub fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(kb) = self.buffer_kb {
            config = config.with_buffer_kb(kb);
        }
        if let Some(n) = self.max_handles {
            config = config.with_max_handles(n);
        }
        if self.verify_tls {
            config = config.with_verify_tls(true);
        }
        config
    }
}
