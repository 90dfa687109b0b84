//! Client facade: scans and searches over a bounded transport.

use crate::batch::BatchExecutor;
use crate::cache::{MemorySplitCache, OperationKey, OperationKind, SplitCache};
use crate::codec;
use crate::config::ClientConfig;
use crate::enrich::SearchEnricher;
use crate::error::{Error, Result};
use crate::grpc::GrpcTransport;
use crate::proto;
use crate::query::{fetch_by_ids, HybridQuery, ScanTarget, SearchQuery, VectorQuery};
use crate::transport::{check_response, classify_status, Transport};
use crate::types::{KeywordSearch, OutputSpec, ProbeResults, Record, Rerank};
use std::sync::Arc;
use tracing::debug;

/// Client for one remote store.
///
/// Reads larger than one exchange can carry are split transparently; the
/// sizes learned on the way are kept in the client's split cache.
pub struct Client {
    /// Transport backend.
    transport: Arc<dyn Transport>,
    /// Split/retry driver, holding the split cache.
    executor: BatchExecutor,
    config: ClientConfig,
}

impl Client {
    /// Create a client over any transport, with a fresh split cache.
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let cache = Arc::new(MemorySplitCache::with_ceilings(config.ceilings));
        Self::with_cache(transport, config, cache)
    }

    /// Create a client sharing an existing split cache.
    pub fn with_cache(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        cache: Arc<dyn SplitCache>,
    ) -> Self {
        Self {
            transport,
            executor: BatchExecutor::new(cache),
            config,
        }
    }

    /// Connect over gRPC. Must be called from within a Tokio runtime.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(GrpcTransport::connect(&config)?);
        Ok(Self::new(transport, config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The split cache shared by every call of this client.
    pub fn split_cache(&self) -> &Arc<dyn SplitCache> {
        self.executor.cache()
    }

    /// Read `count` documents starting at `offset`, in server order.
    pub async fn scan(
        &self,
        database: &str,
        collection: &str,
        target: &ScanTarget,
        count: usize,
        offset: usize,
        output: &OutputSpec,
    ) -> Result<Vec<Record>> {
        let key = OperationKey::new(OperationKind::Scan, database, collection, 1, output.vector);
        self.executor
            .execute(&key, offset, count, None, |range| {
                let cond = target.condition(range.offset, range.count, output);
                self.query_call(database, collection, cond)
            })
            .await
    }

    /// Dense similarity search returning `count` hits per probe.
    pub async fn search(
        &self,
        database: &str,
        collection: &str,
        query: &VectorQuery,
        count: usize,
        output: &OutputSpec,
    ) -> Result<ProbeResults> {
        self.run_search(database, collection, query, count, output)
            .await
    }

    /// Dense + keyword search returning `count` fused hits per probe.
    pub async fn hybrid_search(
        &self,
        database: &str,
        collection: &str,
        query: &HybridQuery,
        count: usize,
        output: &OutputSpec,
    ) -> Result<ProbeResults> {
        self.run_search(database, collection, query, count, output)
            .await
    }

    /// Keyword-only search; a hybrid search without dense probes.
    pub async fn keyword_search(
        &self,
        database: &str,
        collection: &str,
        keyword: KeywordSearch,
        rerank: Option<Rerank>,
        count: usize,
        output: &OutputSpec,
    ) -> Result<ProbeResults> {
        let query = HybridQuery {
            keyword: Some(keyword),
            rerank,
            ..HybridQuery::default()
        };
        self.run_search(database, collection, &query, count, output)
            .await
    }

    /// Try the search in one exchange when it is below the learned ceiling;
    /// otherwise, or when that exchange is oversized, run it in two phases.
    async fn run_search<Q: SearchQuery>(
        &self,
        database: &str,
        collection: &str,
        query: &Q,
        count: usize,
        output: &OutputSpec,
    ) -> Result<ProbeResults> {
        if count == 0 {
            return Err(Error::Validation("count must be positive".to_string()));
        }
        query.validate()?;

        let probes = query.probe_count();
        let full_key = OperationKey::new(Q::KIND, database, collection, probes, output.vector);
        let cache = self.executor.cache();

        if count < cache.get(&full_key) {
            let cond = query.condition(0, count, output)?;
            match self.search_call(Q::KIND, database, collection, cond).await {
                Ok(results) => return Ok(results),
                // A single hit that does not fit is terminal, as in the executor.
                Err(err) if err.is_oversized() && count > 1 => {
                    cache.record_failure(&full_key, count);
                    debug!(kind = ?Q::KIND, count, "full search oversized, switching to two-phase search");
                }
                Err(err) => return Err(err),
            }
        }

        let slim_kind = Q::KIND.slim();
        let slim_key = OperationKey::new(slim_kind, database, collection, probes, false);
        let scan_key = OperationKey::new(OperationKind::Scan, database, collection, 1, output.vector);
        let enricher = SearchEnricher::new(&self.executor, self.config.merge_strategy);

        enricher
            .run(
                &slim_key,
                &scan_key,
                count,
                move |range| async move {
                    let cond = query.slim_condition(range.offset, range.count)?;
                    self.search_call(slim_kind, database, collection, cond).await
                },
                |ids| self.query_call(database, collection, fetch_by_ids(ids, output)),
            )
            .await
    }

    /// One query call.
    async fn query_call(
        &self,
        database: &str,
        collection: &str,
        cond: proto::QueryCond,
    ) -> Result<Vec<Record>> {
        debug!(
            database,
            collection,
            offset = cond.offset,
            limit = cond.limit,
            ids = cond.document_ids.len(),
            "query"
        );
        let req = proto::QueryRequest {
            database: database.to_string(),
            collection: collection.to_string(),
            query: Some(cond),
            read_consistency: self.config.read_consistency.as_str().to_string(),
        };
        let resp = self.transport.query(req).await.map_err(classify_status)?;
        check_response(resp.code, &resp.msg, "")?;
        debug!(documents = resp.documents.len(), "query response");
        Ok(codec::decode_all(resp.documents)?)
    }

    /// One search or hybrid search call; results keep one list per probe.
    async fn search_call(
        &self,
        kind: OperationKind,
        database: &str,
        collection: &str,
        cond: proto::SearchCond,
    ) -> Result<ProbeResults> {
        debug!(
            ?kind,
            database,
            collection,
            offset = cond.offset,
            limit = cond.limit,
            "search"
        );
        let req = proto::SearchRequest {
            database: database.to_string(),
            collection: collection.to_string(),
            read_consistency: self.config.read_consistency.as_str().to_string(),
            search: Some(cond),
        };
        let resp = match kind {
            OperationKind::HybridSearch | OperationKind::SlimHybridSearch => {
                self.transport.hybrid_search(req).await
            }
            _ => self.transport.search(req).await,
        }
        .map_err(classify_status)?;
        check_response(resp.code, &resp.msg, &resp.warning)?;
        debug!(probes = resp.results.len(), "search response");

        resp.results
            .into_iter()
            .map(|r| codec::decode_all(r.documents).map_err(Error::from))
            .collect()
    }
}
