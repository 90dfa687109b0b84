//! Protobuf messages of the `olama.SearchEngine` service.
//!
//! Declared by hand with prost derives; only the document, query and search
//! calls used by this crate are covered.

use std::collections::HashMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringArray {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub str_arr: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Field {
    #[prost(oneof = "field::Value", tags = "1, 2, 3, 4, 5")]
    pub value: Option<field::Value>,
}

pub mod field {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(uint64, tag = "1")]
        ValU64(u64),
        #[prost(bytes = "bytes", tag = "2")]
        ValStr(::prost::bytes::Bytes),
        #[prost(message, tag = "3")]
        ValStrArr(super::StringArray),
        #[prost(double, tag = "4")]
        ValDouble(f64),
        #[prost(bytes = "bytes", tag = "5")]
        ValJson(::prost::bytes::Bytes),
    }
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SparseVecItem {
    #[prost(uint32, tag = "1")]
    pub term_id: u32,
    #[prost(float, tag = "2")]
    pub score: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Document {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(float, repeated, tag = "2")]
    pub vector: Vec<f32>,
    #[prost(float, optional, tag = "3")]
    pub score: Option<f32>,
    #[prost(map = "string, message", tag = "4")]
    pub fields: HashMap<String, Field>,
    #[prost(message, repeated, tag = "5")]
    pub sparse_vector: Vec<SparseVecItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryCond {
    #[prost(string, repeated, tag = "1")]
    pub document_ids: Vec<String>,
    #[prost(string, tag = "2")]
    pub filter: String,
    #[prost(bool, tag = "3")]
    pub retrieve_vector: bool,
    #[prost(uint64, tag = "4")]
    pub limit: u64,
    #[prost(uint64, tag = "5")]
    pub offset: u64,
    #[prost(string, repeated, tag = "6")]
    pub output_fields: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryRequest {
    #[prost(string, tag = "1")]
    pub database: String,
    #[prost(string, tag = "2")]
    pub collection: String,
    #[prost(message, optional, tag = "3")]
    pub query: Option<QueryCond>,
    #[prost(string, tag = "4")]
    pub read_consistency: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryResponse {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub msg: String,
    #[prost(message, repeated, tag = "3")]
    pub documents: Vec<Document>,
    #[prost(uint64, tag = "4")]
    pub count: u64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SearchParams {
    #[prost(uint32, tag = "1")]
    pub ef: u32,
    #[prost(uint32, tag = "2")]
    pub nprobe: u32,
    #[prost(float, tag = "3")]
    pub radius: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VectorArray {
    #[prost(float, repeated, tag = "1")]
    pub vector: Vec<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnnData {
    #[prost(string, tag = "1")]
    pub field_name: String,
    #[prost(message, repeated, tag = "2")]
    pub data: Vec<VectorArray>,
    #[prost(string, repeated, tag = "3")]
    pub document_ids: Vec<String>,
    #[prost(message, optional, tag = "4")]
    pub params: Option<SearchParams>,
    #[prost(uint32, tag = "5")]
    pub limit: u32,
    #[prost(string, repeated, tag = "6")]
    pub data_expr: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SparseVectorArray {
    #[prost(message, repeated, tag = "1")]
    pub sp_vector: Vec<SparseVecItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SparseData {
    #[prost(string, tag = "1")]
    pub field_name: String,
    #[prost(message, repeated, tag = "2")]
    pub data: Vec<SparseVectorArray>,
    #[prost(uint32, tag = "3")]
    pub limit: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RerankParams {
    #[prost(string, tag = "1")]
    pub method: String,
    #[prost(map = "string, float", tag = "2")]
    pub weights: HashMap<String, f32>,
    #[prost(int32, tag = "3")]
    pub rrf_k: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchCond {
    #[prost(message, repeated, tag = "1")]
    pub vectors: Vec<VectorArray>,
    #[prost(string, repeated, tag = "2")]
    pub document_ids: Vec<String>,
    #[prost(message, optional, tag = "3")]
    pub params: Option<SearchParams>,
    #[prost(string, tag = "4")]
    pub filter: String,
    #[prost(bool, tag = "5")]
    pub retrieve_vector: bool,
    #[prost(uint32, tag = "6")]
    pub limit: u32,
    #[prost(string, repeated, tag = "7")]
    pub output_fields: Vec<String>,
    #[prost(string, repeated, tag = "8")]
    pub embedding_items: Vec<String>,
    #[prost(message, repeated, tag = "9")]
    pub ann: Vec<AnnData>,
    #[prost(message, repeated, tag = "10")]
    pub sparse: Vec<SparseData>,
    #[prost(message, optional, tag = "11")]
    pub rerank_params: Option<RerankParams>,
    #[prost(uint32, tag = "12")]
    pub offset: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchRequest {
    #[prost(string, tag = "1")]
    pub database: String,
    #[prost(string, tag = "2")]
    pub collection: String,
    #[prost(string, tag = "3")]
    pub read_consistency: String,
    #[prost(message, optional, tag = "4")]
    pub search: Option<SearchCond>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchResult {
    #[prost(message, repeated, tag = "1")]
    pub documents: Vec<Document>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchResponse {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub msg: String,
    #[prost(message, repeated, tag = "3")]
    pub results: Vec<SearchResult>,
    #[prost(string, tag = "4")]
    pub warning: String,
}
