mod logging;

use chatgpt_export_md::config::{self, CliOverrides};
use chatgpt_export_md::sequential;
use clap::Parser;
use eyre::Result;
use indicatif::ProgressBar;
use std::path::PathBuf;

/// Convert a ChatGPT data export into Markdown files.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder of the unzipped export (holds conversations.json and the images).
    /// Defaults to ./chatgptexport if not set in config.
    #[arg(value_name = "INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory to write markdown files and images to.
    /// Defaults to ./output if not set in config.
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Path to a specific configuration file (.json or .toml).
    /// Defaults to ./config.json, then $XDG_CONFIG_HOME/chatgpt-export-md/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print each file written.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress progress bar and summary.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    logging::init_tracing(cli.verbose, cli.quiet, &pb)?;

    // 1. Load config file (CLI path > ./config.json > default path)
    let file_cfg = config::load_file_config(cli.config.as_deref())?;

    // 2. Merge CLI > Config > Defaults, then validate
    let config = config::resolve(
        file_cfg,
        CliOverrides {
            input_dir: cli.input_dir,
            output_dir: cli.output,
            quiet: cli.quiet,
        },
    )?;

    // 3. Run the conversion
    sequential::execute(&config, &pb)?;
    Ok(())
}
