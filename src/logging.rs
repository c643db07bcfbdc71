use eyre::{Result, eyre};
use indicatif::ProgressBar;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

/// Routes log lines through the progress bar so they land above it instead of tearing it.
struct ProgressWriter(ProgressBar);

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Console logging. `RUST_LOG` wins; otherwise `--verbose` shows progress detail and
/// `--quiet` keeps only errors.
pub fn init_tracing(verbose: bool, quiet: bool, pb: &ProgressBar) -> Result<()> {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let pb = pb.clone();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .compact()
        .with_writer(move || ProgressWriter(pb.clone()))
        .try_init()
        .map_err(|err| eyre!(err))
}
