use thiserror::Error;

#[derive(Error, Debug)]
pub enum FabricxError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timed out after {0}ms waiting for {1}")]
    Timeout(u64, String),

    #[error("Network not found: {0}")]
    NetworkNotFound(String),

    #[error("Container runtime unavailable: {0}")]
    ToolUnavailable(String),

    #[error("{operation} failed: {output}")]
    CommandFailed { operation: String, output: String },

    #[error("Crypto material generation failed: {0}")]
    CryptoGeneration(String),

    #[error("No installed package found for label {0}")]
    PackageIdNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FabricxError {
    /// Whether this error is the caller's own cancellation (or a deadline
    /// expiring), as opposed to a business-level failure. Cancellation
    /// propagates to the transport; everything else becomes a soft failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FabricxError::Cancelled | FabricxError::Timeout(..))
    }

    /// Shorthand for a failed external command, carrying the operation name
    /// and the captured combined output for diagnostics.
    pub fn command_failed(operation: impl Into<String>, output: impl Into<String>) -> Self {
        FabricxError::CommandFailed {
            operation: operation.into(),
            output: output.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FabricxError>;
