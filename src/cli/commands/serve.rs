//! serve command - Newline-delimited JSON transport over stdin/stdout

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::clock::SystemClock;
use crate::core::config::Config;
use crate::core::types::{ProcedureId, UserDetails};
use crate::engine::{Callback, Dispatcher, OperationError, Reply, RequestMetadata};
use crate::service::Service;

/// One request line.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireRequest {
    pub procedure_id: ProcedureId,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub user: UserDetails,
    /// Client-chosen correlation id; generated when absent.
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

/// Counts reported when the input is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub requests: usize,
    pub replies: usize,
}

/// Load the configuration, build the service and serve stdin/stdout.
pub async fn serve(config_path: Option<&Path>) -> Result<()> {
    let loaded = Config::load(config_path).context("Failed to load configuration")?;
    for warning in &loaded.warnings {
        tracing::warn!(path = %warning.path.display(), "{}", warning.message);
    }
    if let Some(path) = loaded.config.loaded_from() {
        tracing::info!(path = %path.display(), "loaded configuration");
    }

    let service = Service::build(&loaded.config.service, Arc::new(SystemClock))
        .context("Failed to start service")?;

    let mut stdout = tokio::io::stdout();
    let summary = run(service.dispatcher(), tokio::io::stdin(), &mut stdout).await?;
    tracing::info!(
        requests = summary.requests,
        replies = summary.replies,
        "input closed; all replies written"
    );
    Ok(())
}

/// Serve requests from `input` until EOF, writing every reply to `output`.
///
/// Returns once every dispatched request has been answered.
pub async fn run<R, W>(dispatcher: &Dispatcher, input: R, output: &mut W) -> Result<ServeSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let (read, written) = tokio::join!(
        read_requests(dispatcher, input, tx),
        write_replies(rx, output)
    );
    Ok(ServeSummary {
        requests: read?,
        replies: written?,
    })
}

async fn read_requests<R: AsyncRead + Unpin>(
    dispatcher: &Dispatcher,
    input: R,
    replies: mpsc::UnboundedSender<Reply>,
) -> Result<usize> {
    let mut lines = BufReader::new(input).lines();
    let mut count = 0;

    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }
        count += 1;

        let tx = replies.clone();
        let callback = Callback::new(move |reply| {
            // The writer only stops once every sender is gone.
            let _ = tx.send(reply);
        });

        match serde_json::from_str::<WireRequest>(&line) {
            Ok(request) => {
                let mut metadata = RequestMetadata::new();
                if let Some(id) = request.request_id {
                    metadata.request_id = id;
                }
                dispatcher.dispatch(
                    request.procedure_id,
                    request.payload,
                    request.user,
                    metadata,
                    callback,
                );
            }
            Err(e) => {
                tracing::debug!(error = %e, "malformed request line");
                let mut metadata = RequestMetadata::new();
                if let Some(id) = salvage_request_id(&line) {
                    metadata.request_id = id;
                }
                callback.failure(
                    metadata,
                    OperationError::InvalidArgument(format!("malformed request: {}", e)),
                );
            }
        }
    }

    Ok(count)
}

/// Recover the correlation id from a line that failed strict decoding.
fn salvage_request_id(line: &str) -> Option<Uuid> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value.get("request_id")?.as_str()?.parse().ok()
}

async fn write_replies<W: AsyncWrite + Unpin>(
    mut replies: mpsc::UnboundedReceiver<Reply>,
    output: &mut W,
) -> Result<usize> {
    let mut count = 0;
    while let Some(reply) = replies.recv().await {
        let mut line = serde_json::to_vec(&reply.to_wire()).context("Failed to encode reply")?;
        line.push(b'\n');
        output
            .write_all(&line)
            .await
            .context("Failed to write reply")?;
        output.flush().await.context("Failed to write reply")?;
        count += 1;
    }
    Ok(count)
}
