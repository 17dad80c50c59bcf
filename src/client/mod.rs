//! The remote-client seam.
//!
//! The mapping layer never talks to a vector database directly; it issues the
//! operations of the [`VectorClient`] trait and shapes their inputs and
//! outputs. Transport, retries, and timeouts are the implementation's
//! concern. All operations are asynchronous and may suspend at the point of
//! the remote call.

pub mod gateway;
pub mod session;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::entity::value::{Row, Value};
use crate::error::Result;
use crate::schema::{ConsistencyLevel, DistanceMetric, FieldSchema, IndexHint};

pub use gateway::CollectionGateway;
pub use session::{ConnectOptions, Session};

/// Request payload for collection creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateCollectionRequest {
    /// Collection to create.
    pub collection_name: String,
    /// Per-field schema fragments, in declaration order.
    pub fields: Vec<FieldSchema>,
    /// Vector-index hints.
    pub index_hints: Vec<IndexHint>,
    /// Whether the collection keeps undeclared fields in a dynamic field.
    pub enable_dynamic_field: bool,
    /// Collection description.
    pub description: String,
}

/// Result of an insert call.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertResult {
    /// Number of rows the store accepted.
    pub insert_count: usize,
    /// Primary keys of the inserted rows, in insertion order.
    pub primary_keys: Vec<Value>,
}

/// Result of a delete call.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResult {
    /// Number of rows removed.
    pub delete_count: usize,
}

/// Request payload for a scalar query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    /// Collection to query.
    pub collection_name: String,
    /// Compiled filter expression; empty matches everything.
    pub filter: String,
    /// Maximum number of rows to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Number of rows to skip.
    pub offset: usize,
    /// Fields to return.
    pub output_fields: Vec<String>,
    /// Freshness requirement.
    pub consistency_level: ConsistencyLevel,
}

/// Request payload for a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Collection to search.
    pub collection_name: String,
    /// Query vectors.
    pub vectors: Vec<Vec<f32>>,
    /// The vector field to search against.
    pub anns_field: String,
    /// Compiled pre-filter expression; empty matches everything.
    pub filter: String,
    /// Maximum number of ranked hits to return.
    pub limit: usize,
    /// Fields to return with each hit.
    pub output_fields: Vec<String>,
    /// Distance metric override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<DistanceMetric>,
    /// Extra engine-specific search parameters.
    pub params: BTreeMap<String, serde_json::Value>,
    /// Freshness requirement.
    pub consistency_level: ConsistencyLevel,
}

/// One ranked similarity-search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The matched row.
    pub row: Row,
    /// Similarity score under the request's metric.
    pub score: f32,
}

/// The set of operations the mapping layer requires from a vector database
/// client.
///
/// Implementations should surface the store's "collection already exists" and
/// "collection not found" responses as
/// [`QuiverError::CollectionExists`](crate::error::QuiverError::CollectionExists)
/// and
/// [`QuiverError::CollectionNotFound`](crate::error::QuiverError::CollectionNotFound)
/// so the core can treat those races as benign; any other failure belongs in
/// [`QuiverError::Client`](crate::error::QuiverError::Client).
#[async_trait]
pub trait VectorClient: Send + Sync {
    /// Check whether a collection exists.
    async fn has_collection(&self, name: &str) -> Result<bool>;

    /// Create a collection from the given schema.
    async fn create_collection(&self, request: CreateCollectionRequest) -> Result<()>;

    /// Drop a collection.
    async fn drop_collection(&self, name: &str) -> Result<()>;

    /// Load a collection so it can serve queries and searches.
    async fn load_collection(&self, name: &str) -> Result<()>;

    /// Insert rows, returning the store-assigned primary keys.
    async fn insert(&self, name: &str, rows: Vec<Row>) -> Result<InsertResult>;

    /// Delete rows matching a filter. An empty filter deletes every row.
    async fn delete(&self, name: &str, filter: &str) -> Result<DeleteResult>;

    /// Run a scalar query.
    async fn query(&self, request: QueryRequest) -> Result<Vec<Row>>;

    /// Run a similarity search, returning ranked hits.
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>>;
}
