//! Main entry point for the wigrange CLI.
//!
//! Prints the values of one sequence range of a track file, or the file's
//! sequence names, reading local paths directly and URLs by byte range.

use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use wigrange::{BedGraphDecoder, Cli, RangeImporter};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let importer = RangeImporter::new(cli.config(), BedGraphDecoder);
    let outcome = run(&importer, &cli);

    if outcome.is_ok() && cli.is_remote() && !cli.is_quiet() {
        if let Ok(transferred) = importer.transferred_bytes(&cli.resource) {
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    }

    importer.explicit_close();
    outcome
}

fn init_logging(cli: &Cli) {
    let default = if cli.is_very_quiet() {
        "error"
    } else if cli.is_quiet() {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn run(importer: &RangeImporter, cli: &Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cli.names {
        for name in importer.sequence_names(&cli.resource)? {
            writeln!(out, "{name}")?;
        }
        out.flush()?;
        return Ok(());
    }

    // clap enforces these unless --names is given
    let name = cli.name.as_deref().context("missing sequence name")?;
    let start = cli.start.context("missing start position")?;
    let end = cli.end.context("missing end position")?;

    let values = importer.import_range(&cli.resource, name, start, end)?;
    debug!("{} values for {name}:{start}-{end}", values.len());
    for value in values {
        writeln!(out, "{value}")?;
    }
    out.flush()?;
    Ok(())
}

/// Formats a byte count with a binary unit.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
