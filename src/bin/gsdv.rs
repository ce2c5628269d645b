//! Thin CLI entry point: parses arguments, initializes logging, and
//! dispatches into [`gsdv_core::cli`].

use clap::Parser;
use gsdv_core::cli::Cli;

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    std::process::exit(gsdv_core::cli::run(cli.command));
}
