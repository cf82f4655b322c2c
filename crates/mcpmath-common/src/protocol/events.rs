use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use super::jsonrpc::JsonRpcResponse;

/// One event of a streamed call.
///
/// A stream is always `Started`, then any number of `Progress`, then exactly
/// one `Result`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Started {
        id: Value,
        /// Milliseconds since the Unix epoch
        timestamp: u64,
    },
    Progress {
        id: Value,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    },
    Result(JsonRpcResponse),
}

impl StreamEvent {
    /// `Started` stamped with the current time.
    pub fn started(id: Value) -> Self {
        StreamEvent::Started {
            id,
            timestamp: unix_millis(),
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Started { .. } => "started",
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::Result(_) => "result",
        }
    }

    /// SSE data payload.
    pub fn data(&self) -> Value {
        match self {
            StreamEvent::Started { id, timestamp } => json!({"id": id, "timestamp": timestamp}),
            StreamEvent::Progress {
                id,
                progress,
                total,
                message,
            } => {
                let mut data = json!({"id": id, "progress": progress});
                if let Some(total) = total {
                    data["total"] = json!(total);
                }
                if let Some(message) = message {
                    data["message"] = json!(message);
                }
                data
            }
            StreamEvent::Result(response) => {
                serde_json::to_value(response).unwrap_or(Value::Null)
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Result(_))
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
