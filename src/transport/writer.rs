//! Controller writer task.
//!
//! Drains the outbound frame queue in order, serializing each frame to a
//! single NDJSON line.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tracing::{debug, warn};

use crate::protocol::Frame;
use crate::transport::codec::FrameCodec;
use crate::{AppError, Result};

/// Writer task: runs until every [`Outbound`](crate::protocol::Outbound)
/// handle is dropped, so frames queued during shutdown are still flushed.
///
/// # Errors
///
/// Returns [`AppError::Transport`] if a write fails.
pub async fn run_writer<W>(sink: W, mut frames: mpsc::UnboundedReceiver<Frame>) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut framed = FramedWrite::new(sink, FrameCodec::new());

    while let Some(frame) = frames.recv().await {
        let line = match serde_json::to_string(&frame) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "writer: failed to serialize frame, skipping");
                continue;
            }
        };

        framed.send(line).await.map_err(|err| {
            warn!(error = %err, "writer: write failed");
            AppError::Transport(format!("write failed: {err}"))
        })?;
    }

    debug!("writer: outbound queue closed, stopping");
    Ok(())
}
