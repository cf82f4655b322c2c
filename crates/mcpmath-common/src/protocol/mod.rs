pub mod error;
pub mod events;
pub mod jsonrpc;
pub mod mcp;
pub mod requests;
pub mod responses;

pub use error::{CallErrorKind, McpMathError, Result};
pub use events::StreamEvent;
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use requests::CallRequest;
pub use responses::CallResult;
