//! Request builders for scans and searches.

use crate::cache::OperationKind;
use crate::error::{Error, Result};
use crate::proto;
use crate::types::{
    normalize_weights, AnnSearch, Filter, KeywordSearch, OutputSpec, Probe, Rerank, SearchParams,
};

/// Field list sent by the identifier-and-score pass.
const SLIM_OUTPUT: &str = "id";

/// Documents addressed by a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanTarget {
    /// Restrict to these identifiers; empty means no restriction.
    pub document_ids: Vec<String>,
    pub filter: Option<Filter>,
}

impl ScanTarget {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            document_ids: ids.into_iter().map(Into::into).collect(),
            filter: None,
        }
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            document_ids: Vec::new(),
            filter: Some(filter),
        }
    }

    /// Scan condition for the hit range `[offset, offset + limit)`.
    pub fn condition(&self, offset: usize, limit: usize, output: &OutputSpec) -> proto::QueryCond {
        proto::QueryCond {
            document_ids: self.document_ids.clone(),
            filter: filter_cond(&self.filter),
            retrieve_vector: output.vector,
            limit: limit as u64,
            offset: offset as u64,
            output_fields: output.fields.clone(),
        }
    }
}

/// Condition fetching exactly `ids`, used by rehydration.
pub fn fetch_by_ids(ids: Vec<String>, output: &OutputSpec) -> proto::QueryCond {
    proto::QueryCond {
        limit: ids.len() as u64,
        document_ids: ids,
        filter: String::new(),
        retrieve_vector: output.vector,
        offset: 0,
        output_fields: output.fields.clone(),
    }
}

/// A probe-based search that the client can split and enrich.
pub trait SearchQuery: Send + Sync {
    /// Operation kind of the full-output call.
    const KIND: OperationKind;

    /// Number of probes carried by one call.
    fn probe_count(&self) -> usize;

    /// Reject malformed requests before any call.
    fn validate(&self) -> Result<()>;

    /// Search condition without paging or output selection.
    fn base_condition(&self) -> proto::SearchCond;

    /// Condition for hits `[offset, offset + limit)` of every probe.
    fn condition(
        &self,
        offset: usize,
        limit: usize,
        output: &OutputSpec,
    ) -> Result<proto::SearchCond> {
        Ok(proto::SearchCond {
            offset: wire_u32("offset", offset)?,
            limit: wire_u32("limit", limit)?,
            retrieve_vector: output.vector,
            output_fields: output.fields.clone(),
            ..self.base_condition()
        })
    }

    /// Condition returning identifiers and scores only.
    fn slim_condition(&self, offset: usize, limit: usize) -> Result<proto::SearchCond> {
        Ok(proto::SearchCond {
            offset: wire_u32("offset", offset)?,
            limit: wire_u32("limit", limit)?,
            retrieve_vector: false,
            output_fields: vec![SLIM_OUTPUT.to_string()],
            ..self.base_condition()
        })
    }
}

/// Search cursors are 32-bit on the wire.
fn wire_u32(name: &str, value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::Validation(format!("search {name} {value} exceeds {}", u32::MAX)))
}

/// Dense similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub probes: Vec<Probe>,
    pub filter: Option<Filter>,
    pub params: Option<SearchParams>,
}

impl VectorQuery {
    pub fn new(probes: Vec<Probe>) -> Self {
        Self {
            probes,
            filter: None,
            params: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_params(mut self, params: SearchParams) -> Self {
        self.params = Some(params);
        self
    }
}

impl SearchQuery for VectorQuery {
    const KIND: OperationKind = OperationKind::Search;

    fn probe_count(&self) -> usize {
        self.probes.len()
    }

    fn validate(&self) -> Result<()> {
        if self.probes.is_empty() {
            return Err(Error::Validation("search needs at least one probe".to_string()));
        }
        if !Probe::uniform(&self.probes) {
            return Err(Error::Validation(
                "all probes of a search must have the same type".to_string(),
            ));
        }
        Ok(())
    }

    fn base_condition(&self) -> proto::SearchCond {
        let mut cond = proto::SearchCond {
            params: self.params.map(search_params),
            filter: filter_cond(&self.filter),
            ..Default::default()
        };
        for probe in &self.probes {
            match probe {
                Probe::Vector(v) => cond.vectors.push(proto::VectorArray { vector: v.clone() }),
                Probe::Text(t) => cond.embedding_items.push(t.clone()),
                Probe::DocumentId(id) => cond.document_ids.push(id.clone()),
            }
        }
        cond
    }
}

/// Dense + keyword search fused by a server-side rerank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridQuery {
    pub ann: Option<AnnSearch>,
    pub keyword: Option<KeywordSearch>,
    pub rerank: Option<Rerank>,
    pub filter: Option<Filter>,
}

impl HybridQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ann(mut self, ann: AnnSearch) -> Self {
        self.ann = Some(ann);
        self
    }

    pub fn keyword(mut self, keyword: KeywordSearch) -> Self {
        self.keyword = Some(keyword);
        self
    }

    pub fn rerank(mut self, rerank: Rerank) -> Self {
        self.rerank = Some(rerank);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl SearchQuery for HybridQuery {
    const KIND: OperationKind = OperationKind::HybridSearch;

    fn probe_count(&self) -> usize {
        let ann = self.ann.as_ref().map_or(0, |a| a.probes.len());
        let keyword = self.keyword.as_ref().map_or(0, |k| k.probes.len());
        ann.max(keyword)
    }

    fn validate(&self) -> Result<()> {
        let ann = self.ann.as_ref().map(|a| a.probes.len());
        let keyword = self.keyword.as_ref().map(|k| k.probes.len());
        match (ann, keyword) {
            (None, None) | (Some(0), None) | (None, Some(0)) | (Some(0), Some(0)) => {
                return Err(Error::Validation(
                    "hybrid search needs dense or keyword probes".to_string(),
                ));
            }
            (Some(a), Some(k)) if a != k => {
                return Err(Error::Validation(format!(
                    "dense and keyword probe counts differ: {a} vs {k}"
                )));
            }
            _ => {}
        }
        if let Some(ann) = &self.ann {
            if !Probe::uniform(&ann.probes) {
                return Err(Error::Validation(
                    "all dense probes must have the same type".to_string(),
                ));
            }
        }
        if let Some(Rerank::Weighted { fields, weights }) = &self.rerank {
            if fields.len() != weights.len() {
                return Err(Error::Validation(format!(
                    "weighted rerank has {} fields but {} weights",
                    fields.len(),
                    weights.len()
                )));
            }
        }
        Ok(())
    }

    fn base_condition(&self) -> proto::SearchCond {
        let mut cond = proto::SearchCond {
            filter: filter_cond(&self.filter),
            rerank_params: self.rerank.as_ref().map(rerank_params),
            ..Default::default()
        };
        if let Some(ann) = &self.ann {
            let mut data = proto::AnnData {
                field_name: ann.field_name.clone(),
                params: ann.params.map(search_params),
                limit: ann.limit.unwrap_or_default(),
                ..Default::default()
            };
            for probe in &ann.probes {
                match probe {
                    Probe::Vector(v) => data.data.push(proto::VectorArray { vector: v.clone() }),
                    Probe::Text(t) => data.data_expr.push(t.clone()),
                    Probe::DocumentId(id) => data.document_ids.push(id.clone()),
                }
            }
            cond.ann.push(data);
        }
        if let Some(keyword) = &self.keyword {
            cond.sparse.push(proto::SparseData {
                field_name: keyword.field_name.clone(),
                data: keyword
                    .probes
                    .iter()
                    .map(|sv| proto::SparseVectorArray {
                        sp_vector: sv
                            .iter()
                            .map(|&(term_id, score)| proto::SparseVecItem { term_id, score })
                            .collect(),
                    })
                    .collect(),
                limit: keyword.limit.unwrap_or_default(),
            });
        }
        cond
    }
}

fn filter_cond(filter: &Option<Filter>) -> String {
    filter.as_ref().map(|f| f.cond().to_string()).unwrap_or_default()
}

fn search_params(params: SearchParams) -> proto::SearchParams {
    let mut p = proto::SearchParams::default();
    match params {
        SearchParams::Ef(ef) => p.ef = ef,
        SearchParams::Nprobe(n) => p.nprobe = n,
        SearchParams::Radius(r) => p.radius = r,
    }
    p
}

fn rerank_params(rerank: &Rerank) -> proto::RerankParams {
    let mut p = proto::RerankParams {
        method: rerank.method().to_string(),
        ..Default::default()
    };
    match rerank {
        Rerank::Weighted { fields, weights } => {
            p.weights = fields.iter().cloned().zip(normalize_weights(weights)).collect();
        }
        Rerank::Rrf { k } => {
            if let Some(k) = k {
                p.rrf_k = *k as i32;
            }
        }
    }
    p
}
