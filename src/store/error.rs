//! Store error types
//!
//! The configuration service fails in two different shapes: writes answer
//! with an opaque text body, the paginated list answers with a structured
//! `{code, message}` envelope. Both are kept as they arrive.

use std::fmt;
use thiserror::Error;

/// Client operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateResources,
    UpdateResources,
    UpdateResource,
    GetResource,
    DeleteResource,
    ListResources,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateResources => "create resources",
            Self::UpdateResources => "update resources",
            Self::UpdateResource => "update resource",
            Self::GetResource => "get resource",
            Self::DeleteResource => "delete resource",
            Self::ListResources => "list resources",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to turn a response into resources
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("resource content is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Store error type
///
/// `target` is the REST path that was addressed, which names the scope and,
/// for single-resource calls, the resource URI.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{operation} {target}: rejected with status {status}: {body}")]
    RemoteWrite {
        operation: Operation,
        target: String,
        status: u16,
        body: String,
    },

    #[error("{operation} {target}: error code {code}: {message}")]
    RemoteRead {
        operation: Operation,
        target: String,
        code: i64,
        message: String,
    },

    #[error("{operation} {target}: resource not found")]
    NotFound { operation: Operation, target: String },

    #[error("{operation} {target}: {source}")]
    Decode {
        operation: Operation,
        target: String,
        #[source]
        source: DecodeError,
    },

    #[error("{operation} {target}: transport failure: {source}")]
    Transport {
        operation: Operation,
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} {target}: cancelled")]
    Cancelled { operation: Operation, target: String },

    #[error("failed to create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Store result type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for a 404 on a single-resource read
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Operation that failed, if the error came from a call
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::RemoteWrite { operation, .. }
            | Self::RemoteRead { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Cancelled { operation, .. } => Some(*operation),
            Self::ClientBuild(_) => None,
        }
    }
}
