//! Line-delimited JSON-RPC over stdin/stdout
//!
//! One message per line in, one response per line out. Requests are handled
//! concurrently, so responses may come back out of order; clients match them
//! by id.

use crate::mcp::server::McpServer;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Serve on the process's stdin/stdout until stdin closes
pub async fn serve_stdio(server: McpServer) -> Result<()> {
    info!("Serving MCP over stdio");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve_lines(Arc::new(server), stdin, tokio::io::stdout()).await
}

/// Serve any line-oriented reader/writer pair
///
/// Returns once the reader hits EOF and every in-flight request has answered.
pub async fn serve_lines<R, W>(server: Arc<McpServer>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut in_flight = JoinSet::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut reading = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if reading => {
                match line.context("Failed to read from input")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let server = server.clone();
                        let tx = tx.clone();
                        in_flight.spawn(async move {
                            if let Some(response) = server.handle_message(&line).await {
                                let _ = tx.send(response);
                            }
                        });
                    }
                    None => {
                        debug!("Input closed");
                        reading = false;
                    }
                }
            }
            Some(response) = rx.recv() => {
                write_line(&mut writer, &response).await?;
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    warn!("Request task failed: {}", e);
                }
            }
            else => break,
        }

        if !reading && in_flight.is_empty() {
            break;
        }
    }

    // Responses sent just before the last task finished
    drop(tx);
    while let Some(response) = rx.recv().await {
        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    writer
        .write_all(line.as_bytes())
        .await
        .context("Failed to write response")?;
    writer.write_all(b"\n").await.context("Failed to write response")?;
    writer.flush().await.context("Failed to flush output")
}
