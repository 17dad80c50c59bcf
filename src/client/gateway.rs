//! Collection lifecycle façade.
//!
//! A thin layer over [`VectorClient`] for has/create/drop/load calls. The
//! gateway remembers, per process, which collection names it has already
//! ensured and loaded, so the existence probe before a save and the load
//! before a query each happen at most once per name. Two concurrent
//! first-time saves can still both pass the probe; the store's own
//! "already exists" response is swallowed as a benign outcome.

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::client::{CreateCollectionRequest, VectorClient};
use crate::error::{QuiverError, Result};
use crate::schema::EntitySchema;

/// Façade over the external client's collection lifecycle calls.
#[derive(Clone)]
pub struct CollectionGateway {
    client: Arc<dyn VectorClient>,
    ensured: Arc<Mutex<HashSet<String>>>,
    loaded: Arc<Mutex<HashSet<String>>>,
}

impl std::fmt::Debug for CollectionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionGateway").finish_non_exhaustive()
    }
}

impl CollectionGateway {
    /// Create a gateway over a client handle.
    pub fn new(client: Arc<dyn VectorClient>) -> Self {
        CollectionGateway {
            client,
            ensured: Arc::new(Mutex::new(HashSet::new())),
            loaded: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Check whether a collection exists.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.client.has_collection(name).await
    }

    /// Create the collection backing `schema` under `name`.
    ///
    /// Returns `false` without creating anything if the collection already
    /// exists, including when a concurrent creator wins the race.
    pub async fn create(&self, schema: &EntitySchema, name: &str) -> Result<bool> {
        if self.client.has_collection(name).await? {
            return Ok(false);
        }

        debug!("creating collection '{name}' for entity type '{}'", schema.name());
        let request = CreateCollectionRequest {
            collection_name: name.to_string(),
            fields: schema.field_schemas(),
            index_hints: schema.index_hints(),
            enable_dynamic_field: schema.options().enable_dynamic_field,
            description: schema.options().description.clone(),
        };
        match self.client.create_collection(request).await {
            Ok(()) => {
                self.ensured.lock().insert(name.to_string());
                Ok(true)
            }
            Err(QuiverError::CollectionExists(_)) => {
                debug!("collection '{name}' was created concurrently");
                self.ensured.lock().insert(name.to_string());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop a collection. Returns whether this call dropped anything,
    /// including `false` when a concurrent drop wins the race.
    pub async fn drop(&self, name: &str) -> Result<bool> {
        if !self.client.has_collection(name).await? {
            return Ok(false);
        }
        debug!("dropping collection '{name}'");
        let dropped = match self.client.drop_collection(name).await {
            Ok(()) => true,
            Err(QuiverError::CollectionNotFound(_)) => {
                debug!("collection '{name}' was dropped concurrently");
                false
            }
            Err(e) => return Err(e),
        };
        self.ensured.lock().remove(name);
        self.loaded.lock().remove(name);
        Ok(dropped)
    }

    /// Make sure the collection exists, creating it on first use.
    ///
    /// The existence probe runs at most once per process per name.
    pub async fn ensure_exists(&self, schema: &EntitySchema, name: &str) -> Result<()> {
        if self.ensured.lock().contains(name) {
            return Ok(());
        }
        if !self.client.has_collection(name).await? {
            self.create(schema, name).await?;
        }
        self.ensured.lock().insert(name.to_string());
        Ok(())
    }

    /// Make sure the collection is loaded, at most once per process per name.
    pub async fn ensure_loaded(&self, name: &str) -> Result<()> {
        if self.loaded.lock().contains(name) {
            return Ok(());
        }
        debug!("loading collection '{name}'");
        self.client.load_collection(name).await?;
        self.loaded.lock().insert(name.to_string());
        Ok(())
    }
}
