//! tonic adapter implementing the Transport trait.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::proto::{QueryRequest, QueryResponse, SearchRequest, SearchResponse};
use crate::transport::Transport;
use async_trait::async_trait;
use std::time::Duration;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

const QUERY_PATH: &str = "/olama.SearchEngine/query";
const SEARCH_PATH: &str = "/olama.SearchEngine/search";
const HYBRID_SEARCH_PATH: &str = "/olama.SearchEngine/hybrid_search";

/// Transport backed by a tonic channel.
pub struct GrpcTransport {
    channel: Channel,
    /// `authorization` metadata sent with every call.
    authorization: MetadataValue<Ascii>,
    /// Deadline of a single call.
    timeout: Duration,
    /// Encode and decode limit for one message.
    max_message_bytes: usize,
}

impl GrpcTransport {
    /// Create a lazily connected transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let authorization = config
            .authorization()?
            .parse::<MetadataValue<Ascii>>()
            .map_err(|e| Error::Config(format!("invalid credentials: {}", e)))?;

        let endpoint = Endpoint::from_shared(config.endpoint()?)
            .map_err(|e| Error::Config(e.to_string()))?
            .connect_timeout(config.timeout());

        Ok(Self {
            channel: endpoint.connect_lazy(),
            authorization,
            timeout: config.timeout(),
            max_message_bytes: config.max_message_bytes,
        })
    }

    async fn unary<Req, Resp>(&self, path: &'static str, req: Req) -> std::result::Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = Grpc::new(self.channel.clone())
            .max_decoding_message_size(self.max_message_bytes)
            .max_encoding_message_size(self.max_message_bytes);
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {}", e)))?;

        let mut request = tonic::Request::new(req);
        request.set_timeout(self.timeout);
        let metadata = request.metadata_mut();
        metadata.insert("authorization", self.authorization.clone());
        metadata.insert("backend-service", MetadataValue::from_static("vdb"));

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(request, PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn query(&self, req: QueryRequest) -> std::result::Result<QueryResponse, Status> {
        self.unary(QUERY_PATH, req).await
    }

    async fn search(&self, req: SearchRequest) -> std::result::Result<SearchResponse, Status> {
        self.unary(SEARCH_PATH, req).await
    }

    async fn hybrid_search(
        &self,
        req: SearchRequest,
    ) -> std::result::Result<SearchResponse, Status> {
        self.unary(HYBRID_SEARCH_PATH, req).await
    }
}
