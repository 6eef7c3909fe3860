//! mkplan CLI.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mkplan",
    version,
    about = "Assemble incremental build plans, reusing outputs from prior commits"
)]
struct Cli {
    #[command(subcommand)]
    command: mkplan::cli::Commands,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("MKPLAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = mkplan::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
