//! vdbrpc - An async client for a remote document/vector store over gRPC.
//!
//! The transport caps the size of one exchange. Bulk reads that would exceed it
//! are handled transparently:
//! - **Batch splitting**: scans and searches are cut into contiguous chunks and
//!   reassembled in order, halving any chunk that fails as oversized
//! - **Split cache**: the smallest failing size per operation shape is
//!   remembered, so later calls are pre-split without a failed attempt
//! - **Two-phase search**: large searches run as an id-and-score pass followed
//!   by a fetch of the requested fields, merged back into ranked results
//!
//! The transport is a trait; [`GrpcTransport`] is the tonic implementation.

pub mod batch;
pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod enrich;
pub mod error;
pub mod grpc;
pub mod proto;
pub mod query;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use batch::{plan_chunks, BatchExecutor, ChunkRange};
pub use cache::{Ceilings, MemorySplitCache, OperationKey, OperationKind, SplitCache};
pub use client::Client;
pub use config::ClientConfig;
pub use enrich::{MergeStrategy, SearchEnricher};
pub use error::{CodecError, Error, RehydrationError, Result};
pub use grpc::GrpcTransport;
pub use query::{HybridQuery, ScanTarget, SearchQuery, VectorQuery};
pub use transport::Transport;
pub use types::{
    AnnSearch, FieldValue, Filter, FilterValue, KeywordSearch, OutputSpec, Probe, ProbeResults,
    ReadConsistency, Record, Rerank, SearchParams, SparseVector,
};
