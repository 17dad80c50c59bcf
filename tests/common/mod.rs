//! A scripted in-memory client for exercising the mapping layer.
//!
//! The mock tracks which collections exist, records every call it receives,
//! and returns canned results for query/search/delete. Inserts synthesize
//! sequential primary keys for rows that arrive without an `id` value, the
//! way an auto-id store would.

// Each scenario file uses its own subset of the mock surface.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quiver::client::{
    CreateCollectionRequest, DeleteResult, InsertResult, QueryRequest, SearchHit, SearchRequest,
    VectorClient,
};
use quiver::entity::{Row, Value};
use quiver::error::{QuiverError, Result};

/// One recorded client call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    HasCollection(String),
    CreateCollection(String),
    DropCollection(String),
    LoadCollection(String),
    Insert { collection: String, rows: Vec<Row> },
    Delete { collection: String, filter: String },
    Query(QueryRequest),
    Search(SearchRequest),
}

#[derive(Default)]
struct State {
    collections: HashSet<String>,
    next_id: i64,
    insert_results: VecDeque<InsertResult>,
    delete_results: VecDeque<DeleteResult>,
    delete_errors: VecDeque<QuiverError>,
    query_results: VecDeque<Vec<Row>>,
    search_results: VecDeque<Vec<SearchHit>>,
    calls: Vec<Call>,
}

pub struct MockClient {
    state: Mutex<State>,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(MockClient {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        })
    }

    /// Pretend the named collection already exists on the server.
    pub fn seed_collection(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .collections
            .insert(name.to_string());
    }

    pub fn push_insert_result(&self, result: InsertResult) {
        self.state.lock().unwrap().insert_results.push_back(result);
    }

    pub fn push_delete_result(&self, delete_count: usize) {
        self.state
            .lock()
            .unwrap()
            .delete_results
            .push_back(DeleteResult { delete_count });
    }

    /// Fail the next delete call with the given error.
    pub fn push_delete_error(&self, error: QuiverError) {
        self.state.lock().unwrap().delete_errors.push_back(error);
    }

    pub fn push_query_result(&self, rows: Vec<Row>) {
        self.state.lock().unwrap().query_results.push_back(rows);
    }

    pub fn push_search_result(&self, hits: Vec<SearchHit>) {
        self.state.lock().unwrap().search_results.push_back(hits);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl VectorClient for MockClient {
    async fn has_collection(&self, name: &str) -> Result<bool> {
        self.record(Call::HasCollection(name.to_string()));
        Ok(self.state.lock().unwrap().collections.contains(name))
    }

    async fn create_collection(&self, request: CreateCollectionRequest) -> Result<()> {
        self.record(Call::CreateCollection(request.collection_name.clone()));
        let mut state = self.state.lock().unwrap();
        if !state.collections.insert(request.collection_name.clone()) {
            return Err(QuiverError::CollectionExists(request.collection_name));
        }
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.record(Call::DropCollection(name.to_string()));
        let mut state = self.state.lock().unwrap();
        if !state.collections.remove(name) {
            return Err(QuiverError::CollectionNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn load_collection(&self, name: &str) -> Result<()> {
        self.record(Call::LoadCollection(name.to_string()));
        if !self.state.lock().unwrap().collections.contains(name) {
            return Err(QuiverError::CollectionNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn insert(&self, name: &str, rows: Vec<Row>) -> Result<InsertResult> {
        self.record(Call::Insert {
            collection: name.to_string(),
            rows: rows.clone(),
        });
        let mut state = self.state.lock().unwrap();
        if !state.collections.contains(name) {
            return Err(QuiverError::CollectionNotFound(name.to_string()));
        }
        if let Some(canned) = state.insert_results.pop_front() {
            return Ok(canned);
        }
        let primary_keys = rows
            .iter()
            .map(|row| match row.get("id") {
                Some(key) => key.clone(),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    Value::Int(id)
                }
            })
            .collect();
        Ok(InsertResult {
            insert_count: rows.len(),
            primary_keys,
        })
    }

    async fn delete(&self, name: &str, filter: &str) -> Result<DeleteResult> {
        self.record(Call::Delete {
            collection: name.to_string(),
            filter: filter.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.delete_errors.pop_front() {
            return Err(error);
        }
        if !state.collections.contains(name) {
            return Err(QuiverError::CollectionNotFound(name.to_string()));
        }
        Ok(state
            .delete_results
            .pop_front()
            .unwrap_or(DeleteResult { delete_count: 1 }))
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<Row>> {
        let name = request.collection_name.clone();
        self.record(Call::Query(request));
        let mut state = self.state.lock().unwrap();
        if !state.collections.contains(&name) {
            return Err(QuiverError::CollectionNotFound(name));
        }
        Ok(state.query_results.pop_front().unwrap_or_default())
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        let name = request.collection_name.clone();
        self.record(Call::Search(request));
        let mut state = self.state.lock().unwrap();
        if !state.collections.contains(&name) {
            return Err(QuiverError::CollectionNotFound(name));
        }
        Ok(state.search_results.pop_front().unwrap_or_default())
    }
}

/// Build a `Row` out of literal pairs.
pub fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
