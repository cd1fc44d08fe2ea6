//! kibitz serve: JSON-lines engine service over stdio
//!
//! Requests are read one per line from stdin and handled concurrently;
//! responses are written one per line to stdout through a single writer
//! task so lines never interleave. Logs go to stderr.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use kibitz_core::EngineManager;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::build_manager;
use crate::config::KibitzConfig;
use crate::wire::{Evaluation, Request, Response};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Depth for requests that give none (defaults to engine.default_depth)
    #[arg(short, long)]
    pub depth: Option<u32>,
}

/// Run the serve command
pub async fn run(args: ServeArgs, config: KibitzConfig) -> Result<()> {
    let default_depth = args.depth.unwrap_or(config.engine.default_depth);
    let manager = Arc::new(build_manager(&config));
    manager.start();

    info!(default_depth, "Serving engine sessions on stdio");

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = serve_lines(Arc::clone(&manager), stdin, stdout, default_depth) => {
            if let Err(e) = result {
                warn!(error = %e, "Request loop failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
        }
    }

    manager.shutdown().await;
    Ok(())
}

/// Read requests from `reader` until EOF or a shutdown request
///
/// On EOF, in-flight requests are answered before returning. On
/// `shutdown` they are abandoned.
pub async fn serve_lines<R, W>(
    manager: Arc<EngineManager>,
    reader: R,
    writer: W,
    default_depth: u32,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Response>();
    let writer_task = tokio::spawn(write_responses(writer, rx));

    let mut lines = reader.lines();
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(pending = in_flight.len(), "Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<Request>(&line) {
                    Ok(Request::Shutdown { id }) => {
                        info!("Shutdown requested");
                        in_flight.abort_all();
                        let _ = tx.send(Response::done(id));
                        break;
                    }
                    Ok(request) => {
                        debug!(id = %request.id(), "Request received");
                        let manager = Arc::clone(&manager);
                        let tx = tx.clone();
                        in_flight.spawn(async move {
                            let response = handle_request(&manager, request, default_depth).await;
                            let _ = tx.send(response);
                        });
                    }
                    Err(e) => {
                        debug!(error = %e, "Unparseable request");
                        let _ = tx.send(Response::failure(
                            serde_json::Value::Null,
                            "invalid_request",
                            e.to_string(),
                        ));
                    }
                }
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Request task failed");
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined
            && !e.is_cancelled()
        {
            warn!(error = %e, "Request task failed");
        }
    }

    drop(tx);
    writer_task.await??;
    Ok(())
}

/// Answer one request
pub async fn handle_request(
    manager: &EngineManager,
    request: Request,
    default_depth: u32,
) -> Response {
    match request {
        Request::Evaluate {
            id,
            session,
            fen,
            depth,
        } => {
            let depth = depth.unwrap_or(default_depth);
            match manager.evaluate(&session, &fen, depth).await {
                Ok(result) => Response::success(id, Evaluation::new(result, depth)),
                Err(e) => {
                    debug!(session_id = %session, error = %e, "Evaluation failed");
                    Response::from_analysis_error(id, &e)
                }
            }
        }
        Request::Remove { id, session } => {
            manager.remove_session(&session).await;
            Response::done(id)
        }
        Request::List { id } => Response::success(id, manager.sessions().await),
        Request::Shutdown { id } => Response::done(id),
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Response>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
