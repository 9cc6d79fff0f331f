use thiserror::Error;

/// A convenience `Result` alias using [`ToolbridgeError`].
pub type ToolbridgeResult<T> = Result<T, ToolbridgeError>;

/// Top-level error type for toolbridge.
///
/// Variants split into two families. Fatal ones abort a chat run (a session that never
/// came up, a model call that failed). Contained ones only affect a single tool call or
/// a single stream chunk and let the run continue. See [`ToolbridgeError::is_fatal`].
#[derive(Error, Debug)]
pub enum ToolbridgeError {
    /// A tool session could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No session owns the requested tool.
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// The streamed arguments of a tool call are not well-formed JSON.
    #[error("Malformed arguments for tool '{tool}': {message}")]
    MalformedArguments {
        /// Name of the tool the arguments were meant for.
        tool: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A stream delta arrived that does not fit the current accumulation state.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The model capability failed.
    #[error("Model error: {0}")]
    Model(String),

    /// An outbound HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A tool ran but reported a failure.
    #[error("Tool error: {0}")]
    Tool(String),

    /// A live session misbehaved (timeouts, dropped channels, JSON-RPC errors).
    #[error("Session error: {0}")]
    Session(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The consumer stopped listening.
    #[error("Run cancelled by consumer")]
    Cancelled,

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolbridgeError {
    /// Whether this error must end the chat run.
    ///
    /// Routing misses, malformed arguments, tool failures and protocol violations are
    /// reported in-band and the run continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ToolNotFound(_)
                | Self::MalformedArguments { .. }
                | Self::ProtocolViolation(_)
                | Self::Tool(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contained_errors_are_not_fatal() {
        assert!(!ToolbridgeError::ToolNotFound("search".into()).is_fatal());
        assert!(!ToolbridgeError::ProtocolViolation("delta".into()).is_fatal());
        assert!(!ToolbridgeError::Tool("boom".into()).is_fatal());
        assert!(!ToolbridgeError::MalformedArguments {
            tool: "search".into(),
            message: "EOF".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(ToolbridgeError::Connection("refused".into()).is_fatal());
        assert!(ToolbridgeError::Model("500".into()).is_fatal());
        assert!(ToolbridgeError::Cancelled.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = ToolbridgeError::MalformedArguments {
            tool: "search".into(),
            message: "expected value".into(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed arguments for tool 'search': expected value"
        );
        assert_eq!(
            ToolbridgeError::ToolNotFound("x".into()).to_string(),
            "Tool 'x' not found"
        );
    }
}
