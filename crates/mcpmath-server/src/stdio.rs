//! Local Channel
//!
//! Newline-delimited JSON-RPC over a byte stream, normally stdin/stdout.
//! One request is read, handled and answered before the next line is read,
//! so responses leave in exactly the order requests arrived.

use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use mcpmath_common::protocol::jsonrpc::INVALID_REQUEST;
use mcpmath_common::transport::{decode_request, encode_line, read_frame, Frame, MAX_LINE_BYTES};
use mcpmath_common::{JsonRpcError, JsonRpcResponse, Result};

use crate::router::{Caller, McpRouter};

/// Serves one session until `reader` reaches end of input.
///
/// # Arguments
///
/// * `router` - Handles decoded requests
/// * `reader` - Incoming request lines
/// * `writer` - Outgoing response lines; flushed after every response
///
/// # Errors
///
/// Only I/O failures on the channel itself end the session with an error;
/// malformed input is answered and skipped.
pub async fn serve_lines<R, W>(router: &McpRouter, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let caller = Caller::session();
    debug!(?caller, "Local session started");

    loop {
        let line = match read_frame(&mut reader, MAX_LINE_BYTES).await? {
            Frame::Eof => break,
            Frame::Oversized(size) => {
                warn!(size, limit = MAX_LINE_BYTES, "Dropped oversized request line");
                let error = JsonRpcError::new(
                    INVALID_REQUEST,
                    format!("Request line exceeds {} bytes", MAX_LINE_BYTES),
                )
                .with_data(json!({ "size": size, "limit": MAX_LINE_BYTES }));
                write_response(&mut writer, &JsonRpcResponse::error(json!(null), error)).await?;
                continue;
            }
            Frame::Line(line) => line,
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = match decode_request(line.as_bytes()) {
            Ok(request) => router.handle(request, &caller, None).await,
            Err(error_response) => Some(error_response),
        };
        if let Some(response) = response {
            write_response(&mut writer, &response).await?;
        }
    }

    info!("Local channel closed");
    Ok(())
}

async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_line(response)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Serves the process's stdin and stdout.
pub async fn run_stdio(router: McpRouter) -> Result<()> {
    serve_lines(&router, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
