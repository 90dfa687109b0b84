//! Core types shared by requests and results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sparse vector as ordered `(term_id, weight)` pairs.
pub type SparseVector = Vec<(u32, f32)>;

/// A scalar field value attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// UTF-8 string.
    String(String),
    /// Unsigned integer.
    Uint(u64),
    /// Double; negative integers travel as doubles too.
    Double(f64),
    /// Array of strings.
    StringArray(Vec<String>),
    /// Arbitrary JSON blob.
    Json(serde_json::Value),
}

impl FieldValue {
    /// Map a signed integer onto the wire's field kinds.
    pub fn from_i64(v: i64) -> Self {
        if v < 0 {
            FieldValue::Double(v as f64)
        } else {
            FieldValue::Uint(v as u64)
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Uint(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::from_i64(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::StringArray(v)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Json(v)
    }
}

/// A document as stored in, or returned from, the remote collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Document identifier.
    pub id: String,
    /// Similarity score, present on search results.
    pub score: Option<f32>,
    /// Dense vector, present when requested.
    pub vector: Option<Vec<f32>>,
    /// Sparse vector, present when requested.
    pub sparse_vector: Option<SparseVector>,
    /// Scalar fields.
    pub fields: HashMap<String, FieldValue>,
}

impl Record {
    /// Create a record with only an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Per-probe search results, in probe order.
pub type ProbeResults = Vec<Vec<Record>>;

/// Read consistency requested from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadConsistency {
    #[default]
    EventualConsistency,
    StrongConsistency,
}

impl ReadConsistency {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadConsistency::EventualConsistency => "eventualConsistency",
            ReadConsistency::StrongConsistency => "strongConsistency",
        }
    }

    /// Parse the wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eventualConsistency" => Some(ReadConsistency::EventualConsistency),
            "strongConsistency" => Some(ReadConsistency::StrongConsistency),
            _ => None,
        }
    }
}

/// Scalar filter condition, composed as a server-side expression string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    cond: String,
}

impl Filter {
    pub fn new(cond: impl Into<String>) -> Self {
        Self { cond: cond.into() }
    }

    pub fn and(mut self, cond: &str) -> Self {
        self.cond = format!("{} and ({})", self.cond, cond);
        self
    }

    pub fn or(mut self, cond: &str) -> Self {
        self.cond = format!("{} or ({})", self.cond, cond);
        self
    }

    pub fn and_not(mut self, cond: &str) -> Self {
        self.cond = format!("{} and not ({})", self.cond, cond);
        self
    }

    pub fn or_not(mut self, cond: &str) -> Self {
        self.cond = format!("{} or not ({})", self.cond, cond);
        self
    }

    /// `key include (v1,v2)`.
    pub fn include(key: &str, values: &[FilterValue]) -> String {
        format!("{} include ({})", key, join_values(values))
    }

    /// `key exclude (v1,v2)`.
    pub fn exclude(key: &str, values: &[FilterValue]) -> String {
        format!("{} exclude ({})", key, join_values(values))
    }

    /// `key include all (v1,v2)`.
    pub fn include_all(key: &str, values: &[FilterValue]) -> String {
        format!("{} include all ({})", key, join_values(values))
    }

    /// `key in (v1,v2)`.
    pub fn is_in(key: &str, values: &[FilterValue]) -> String {
        format!("{} in ({})", key, join_values(values))
    }

    /// `key not in (v1,v2)`.
    pub fn not_in(key: &str, values: &[FilterValue]) -> String {
        format!("{} not in ({})", key, join_values(values))
    }

    /// The condition expression sent to the server.
    pub fn cond(&self) -> &str {
        &self.cond
    }
}

/// A literal inside a filter list expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    Num(f64),
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_string())
    }
}

impl From<u64> for FilterValue {
    fn from(v: u64) -> Self {
        FilterValue::Num(v as f64)
    }
}

fn join_values(values: &[FilterValue]) -> String {
    values
        .iter()
        .map(|v| match v {
            FilterValue::Str(s) => format!("\"{}\"", s),
            FilterValue::Num(n) => n.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Index-specific search effort parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchParams {
    /// HNSW candidate list size.
    Ef(u32),
    /// IVF cluster probe count.
    Nprobe(u32),
    /// Range search radius.
    Radius(f32),
}

/// One query point of a search.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// Dense query vector.
    Vector(Vec<f32>),
    /// Text to be embedded server-side.
    Text(String),
    /// Use the stored vector of an existing document.
    DocumentId(String),
}

impl Probe {
    fn kind(&self) -> u8 {
        match self {
            Probe::Vector(_) => 0,
            Probe::Text(_) => 1,
            Probe::DocumentId(_) => 2,
        }
    }

    /// True when every probe has the same variant.
    pub fn uniform(probes: &[Probe]) -> bool {
        probes
            .first()
            .map(|first| probes.iter().all(|p| p.kind() == first.kind()))
            .unwrap_or(true)
    }
}

/// Dense sub-search of a hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnSearch {
    /// Vector field name.
    pub field_name: String,
    pub probes: Vec<Probe>,
    pub params: Option<SearchParams>,
    /// Candidates retrieved by this sub-search before fusion.
    pub limit: Option<u32>,
}

impl AnnSearch {
    pub fn new(probes: Vec<Probe>) -> Self {
        Self {
            field_name: "vector".to_string(),
            probes,
            params: None,
            limit: None,
        }
    }
}

/// Sparse (keyword) sub-search of a hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSearch {
    /// Sparse vector field name.
    pub field_name: String,
    pub probes: Vec<SparseVector>,
    pub limit: Option<u32>,
}

impl KeywordSearch {
    pub fn new(probes: Vec<SparseVector>) -> Self {
        Self {
            field_name: "sparse_vector".to_string(),
            probes,
            limit: None,
        }
    }
}

/// How the server fuses dense and sparse candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum Rerank {
    /// Weighted sum of per-field scores.
    Weighted { fields: Vec<String>, weights: Vec<f32> },
    /// Reciprocal rank fusion.
    Rrf { k: Option<u32> },
}

impl Rerank {
    /// Method name on the wire.
    pub fn method(&self) -> &'static str {
        match self {
            Rerank::Weighted { .. } => "weighted",
            Rerank::Rrf { .. } => "rrf",
        }
    }
}

/// Normalize weights to sum to one.
///
/// Weights are returned unchanged when they sum to zero, contain a negative
/// value, or are all zero.
pub fn normalize_weights(weights: &[f32]) -> Vec<f32> {
    let total: f32 = weights.iter().sum();
    if total == 0.0 || weights.iter().any(|w| *w < 0.0) || weights.iter().all(|w| *w == 0.0) {
        return weights.to_vec();
    }
    weights.iter().map(|w| w / total).collect()
}

/// Which parts of each record the caller wants back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSpec {
    /// Scalar fields to return; empty means all.
    pub fields: Vec<String>,
    /// Whether to return the dense vector.
    pub vector: bool,
}

impl OutputSpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_vector(mut self) -> Self {
        self.vector = true;
        self
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            vector: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let rec = Record::new("doc-1")
            .with_field("title", "hello")
            .with_field("page", 3u64)
            .with_field("delta", -2i64);
        assert_eq!(rec.id, "doc-1");
        assert_eq!(rec.field("title"), Some(&FieldValue::String("hello".to_string())));
        assert_eq!(rec.field("page"), Some(&FieldValue::Uint(3)));
        assert_eq!(rec.field("delta"), Some(&FieldValue::Double(-2.0)));
        assert!(rec.score.is_none());
    }

    #[test]
    fn test_filter_composition() {
        let filter = Filter::new(Filter::is_in("author", &["a".into(), "b".into()]))
            .and("page > 10")
            .or_not(&Filter::exclude("tag", &[3u64.into()]));
        assert_eq!(
            filter.cond(),
            "author in (\"a\",\"b\") and (page > 10) or not (tag exclude (3))"
        );
    }

    #[test]
    fn test_filter_include_all() {
        let cond = Filter::include_all("tags", &["x".into(), "y".into()]);
        assert_eq!(cond, "tags include all (\"x\",\"y\")");
    }

    #[test]
    fn test_normalize_weights() {
        assert_eq!(normalize_weights(&[1.0, 3.0]), vec![0.25, 0.75]);
        assert_eq!(normalize_weights(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(normalize_weights(&[-1.0, 2.0]), vec![-1.0, 2.0]);
    }

    #[test]
    fn test_probe_uniform() {
        assert!(Probe::uniform(&[]));
        assert!(Probe::uniform(&[
            Probe::Vector(vec![1.0]),
            Probe::Vector(vec![2.0])
        ]));
        assert!(!Probe::uniform(&[
            Probe::Vector(vec![1.0]),
            Probe::Text("q".to_string())
        ]));
    }

    #[test]
    fn test_read_consistency_wire() {
        for rc in [
            ReadConsistency::EventualConsistency,
            ReadConsistency::StrongConsistency,
        ] {
            assert_eq!(ReadConsistency::parse(rc.as_str()), Some(rc));
        }
        assert_eq!(ReadConsistency::parse("bogus"), None);
    }
}
