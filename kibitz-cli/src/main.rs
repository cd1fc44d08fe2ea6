use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod wire;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "kibitz", about = "Pooled chess engine sessions over UCI")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra config file, applied over user and project config
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one position and print the result
    Eval(commands::eval::EvalArgs),
    /// Serve engine sessions as JSON lines over stdin/stdout
    Serve(commands::serve::ServeArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries results, so logs go to stderr
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let explicit = cli.config.as_deref();
    match cli.command {
        Commands::Eval(args) => commands::eval::run(args, ConfigLoader::load(explicit)?).await,
        Commands::Serve(args) => commands::serve::run(args, ConfigLoader::load(explicit)?).await,
        Commands::Config(args) => commands::config::run(args, explicit),
    }
}
