use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

/// rust-ndnr command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a consumer/router/producer forwarding scenario
    Run(commands::run::RunArgs),

    /// Benchmark the forwarding plane over virtual time
    Benchmark(commands::benchmark::BenchmarkArgs),
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    // Execute the specified command
    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Benchmark(args) => commands::benchmark::execute(args),
    }
}
