//! Transport abstraction for the remote search engine.

use crate::error::Error;
use crate::proto::{QueryRequest, QueryResponse, SearchRequest, SearchResponse};
use async_trait::async_trait;
use tonic::{Code, Status};

/// One bounded-size unary call per method.
///
/// Implementations return the raw [`Status`] on failure; the client turns it
/// into an [`Error`] with [`classify_status`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Paged scan, or fetch by identifiers.
    async fn query(&self, req: QueryRequest) -> Result<QueryResponse, Status>;

    /// Dense vector search.
    async fn search(&self, req: SearchRequest) -> Result<SearchResponse, Status>;

    /// Dense + sparse search with server-side rerank.
    async fn hybrid_search(&self, req: SearchRequest) -> Result<SearchResponse, Status>;
}

/// Map a transport status onto the oversized / other split.
///
/// The oversized signature is a resource-exhausted status, a decode-limit
/// status, or a connection reset reported while the call was in flight.
pub fn classify_status(status: Status) -> Error {
    let message = status.message().to_ascii_lowercase();
    let oversized = match status.code() {
        Code::ResourceExhausted => true,
        Code::OutOfRange => message.contains("message length too large") || message.contains("larger than max"),
        Code::Unavailable | Code::Internal | Code::Unknown => {
            message.contains("reset") || message.contains("rst_stream")
        }
        _ => false,
    };

    if oversized {
        Error::Oversized(status)
    } else {
        Error::Transport(status)
    }
}

/// Reject a response carrying a non-zero application code.
pub fn check_response(code: i32, msg: &str, warning: &str) -> crate::Result<()> {
    if code != 0 {
        return Err(Error::Server {
            code,
            message: msg.to_string(),
        });
    }
    if !warning.is_empty() {
        tracing::warn!(warning, "server returned a warning");
    }
    Ok(())
}
