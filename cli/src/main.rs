use anyhow::Result;
use clap::Parser;

use magtape::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    magtape::setup_logger(&cli.log_filter)?;
    magtape::run(cli)
}
