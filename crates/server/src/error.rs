//! Tool argument errors for the warden server.
//!
//! Engine and storage failures use `warden_core::Error`; these cover
//! arguments that never reach the engine.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Header name or value rejected before dispatch.
    #[error("INVALID_INPUT: invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Method is not an HTTP token.
    #[error("INVALID_INPUT: invalid method {0:?}")]
    InvalidMethod(String),

    /// None of the optional selectors was given.
    #[error("INVALID_INPUT: {0}")]
    MissingSelector(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        McpError { code: ErrorCode(-32602), message: err.to_string().into(), data: None }
    }
}
