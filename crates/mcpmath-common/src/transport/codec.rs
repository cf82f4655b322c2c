use serde_json::Value;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::protocol::error::Result;
use crate::protocol::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, VERSION};

/// Longest accepted request line, excluding the terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One unit read from the local channel.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// A complete line without its terminator
    Line(String),
    /// A line longer than the limit; its bytes were discarded
    Oversized(usize),
    /// The peer closed the channel
    Eof,
}

/// Reads the next newline-terminated frame, holding at most `limit` bytes.
///
/// An oversized line is drained up to its newline so the next read starts on
/// a fresh message. A final line without a trailing newline is still returned.
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut discarded: Option<usize> = None;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if let Some(total) = discarded {
                return Ok(Frame::Oversized(total));
            }
            if line.is_empty() {
                return Ok(Frame::Eof);
            }
            break;
        }

        let newline = available.iter().position(|b| *b == b'\n');
        let consumed = newline.map_or(available.len(), |pos| pos + 1);
        let payload = newline.unwrap_or(available.len());

        if let Some(total) = discarded {
            discarded = Some(total + payload);
        } else if line.len() + payload > limit {
            discarded = Some(line.len() + payload);
            line.clear();
        } else {
            line.extend_from_slice(&available[..payload]);
        }

        reader.consume(consumed);
        if newline.is_some() {
            break;
        }
    }

    if let Some(total) = discarded {
        return Ok(Frame::Oversized(total));
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Frame::Line(String::from_utf8_lossy(&line).into_owned()))
}

/// Decodes one JSON-RPC request.
///
/// On failure returns the error response to send back: a parse error with a
/// `null` id for malformed JSON, an invalid-request error (echoing the id when
/// one could be read) for anything that is JSON but not a request.
pub fn decode_request(data: &[u8]) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(data)
        .map_err(|_| JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))?;

    let id = match value.get("id") {
        Some(id @ (Value::String(_) | Value::Number(_))) => id.clone(),
        _ => Value::Null,
    };

    if !value.is_object() {
        return Err(JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_request().with_data(Value::from("expected a single request object")),
        ));
    }

    let request: JsonRpcRequest = serde_json::from_value(value)
        .map_err(|_| JsonRpcResponse::error(id.clone(), JsonRpcError::invalid_request()))?;

    if request.jsonrpc != VERSION {
        return Err(JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_request().with_data(Value::from("jsonrpc must be \"2.0\"")),
        ));
    }

    Ok(request)
}

/// Encodes a response as one `\n`-terminated line.
pub fn encode_line(response: &JsonRpcResponse) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(response)?;
    bytes.push(b'\n');
    Ok(bytes)
}
