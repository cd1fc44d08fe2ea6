//! kibitz eval: evaluate one position and print the result as JSON

use anyhow::Result;
use clap::Args;
use tracing::debug;

use super::build_manager;
use crate::config::KibitzConfig;
use crate::wire::Evaluation;

/// Arguments for the eval command
#[derive(Debug, Args)]
pub struct EvalArgs {
    /// Position in Forsyth-Edwards Notation
    #[arg(long)]
    pub fen: String,

    /// Search depth in plies (defaults to engine.default_depth)
    #[arg(short, long)]
    pub depth: Option<u32>,

    /// Session id (defaults to a fresh one)
    #[arg(long)]
    pub session: Option<String>,
}

/// Run the eval command
pub async fn run(args: EvalArgs, config: KibitzConfig) -> Result<()> {
    let depth = args.depth.unwrap_or(config.engine.default_depth);
    let session = args
        .session
        .unwrap_or_else(|| format!("eval-{}", uuid::Uuid::new_v4()));
    debug!(session_id = %session, depth, "Evaluating position");

    let manager = build_manager(&config);
    let outcome = manager.evaluate(&session, &args.fen, depth).await;
    manager.shutdown().await;

    let evaluation = Evaluation::new(outcome?, depth);
    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    Ok(())
}
