//! Per-type persistence surface.
//!
//! An [`EntityStore`] binds one entity schema to an injected client handle
//! and exposes the object-style operations: query-set access, create,
//! bulk-create, save, delete, update, and collection lifecycle. Because the
//! backing store has no in-place update, [`EntityStore::update`] rewrites the
//! row with a delete-then-resave protocol and renegotiates the primary key.

use std::sync::Arc;

use log::debug;

use crate::client::{CollectionGateway, Session, VectorClient};
use crate::entity::entity::Entity;
use crate::entity::value::Value;
use crate::error::{QuiverError, Result};
use crate::query::filter::Cond;
use crate::query::queryset::QuerySet;
use crate::schema::EntitySchema;

/// Handle for persisting and querying one entity type.
#[derive(Clone)]
pub struct EntityStore {
    schema: Arc<EntitySchema>,
    client: Arc<dyn VectorClient>,
    gateway: CollectionGateway,
    target: Option<String>,
    restore_assigned_keys: bool,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entity", &self.schema.name())
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl EntityStore {
    /// Create a store over a schema and a client handle.
    pub fn new(schema: Arc<EntitySchema>, client: Arc<dyn VectorClient>) -> Self {
        let gateway = CollectionGateway::new(client.clone());
        EntityStore {
            schema,
            client,
            gateway,
            target: None,
            restore_assigned_keys: true,
        }
    }

    /// Create a store borrowing its client from a session.
    pub fn from_session(schema: Arc<EntitySchema>, session: &Session) -> Result<Self> {
        Ok(Self::new(schema, session.client()?))
    }

    /// Pin every operation of this store to an explicit collection.
    ///
    /// Required for dynamic-field schemas, which have no implicit target.
    pub fn with_target<S: Into<String>>(mut self, collection_name: S) -> Self {
        self.target = Some(collection_name.into());
        self
    }

    /// Control primary-key handling during [`update`](Self::update).
    ///
    /// When `true` (the default), a caller-assigned key of a non-auto-id
    /// primary field is reinstated before the resave, so the rewritten row
    /// keeps its identity. When `false`, the key is cleared unconditionally
    /// and the resave relies on the store assigning a fresh one.
    pub fn restore_assigned_keys(mut self, restore: bool) -> Self {
        self.restore_assigned_keys = restore;
        self
    }

    /// The schema this store persists.
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub(crate) fn client(&self) -> &Arc<dyn VectorClient> {
        &self.client
    }

    pub(crate) fn gateway(&self) -> &CollectionGateway {
        &self.gateway
    }

    /// Resolve the collection an operation should touch.
    pub(crate) fn resolve_target(&self, override_name: Option<&str>) -> Result<String> {
        if let Some(name) = override_name.or(self.target.as_deref()) {
            return Ok(name.to_string());
        }
        if self.schema.options().enable_dynamic_field {
            return Err(QuiverError::schema(format!(
                "Entity type '{}' uses a dynamic field and requires an explicit target collection",
                self.schema.name()
            )));
        }
        Ok(self.schema.options().collection_name.clone())
    }

    /// A fresh query builder for this type.
    pub fn objects(&self) -> QuerySet {
        QuerySet::new(self.clone())
    }

    /// Construct, validate, and persist a new instance.
    pub async fn create<K, V, I>(&self, pairs: I) -> Result<Entity>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let target = self.resolve_target(None)?;
        self.create_in(&target, pairs).await
    }

    pub(crate) async fn create_in<K, V, I>(&self, target: &str, pairs: I) -> Result<Entity>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entity = Entity::new(self.schema.clone(), pairs)?;
        self.save_to(target, &mut entity).await?;
        Ok(entity)
    }

    /// Persist a batch in one insert, adopting assigned keys positionally.
    ///
    /// Returns the number of rows the store accepted.
    pub async fn bulk_create(&self, instances: &mut [Entity]) -> Result<usize> {
        if instances.is_empty() {
            return Ok(0);
        }
        let target = self.resolve_target(None)?;
        self.gateway.ensure_exists(&self.schema, &target).await?;

        let rows = instances.iter().map(Entity::to_record).collect();
        let result = self.client.insert(&target, rows).await?;
        debug!(
            "bulk insert of {} {} rows into '{target}'",
            result.insert_count,
            self.schema.name()
        );

        for (instance, key) in instances.iter_mut().zip(result.primary_keys.iter()) {
            if instance.primary_key().is_none() {
                instance.set_primary_key(key.clone());
            }
            instance.clear_dirty();
        }
        Ok(result.insert_count)
    }

    /// Create the backing collection. Returns `false` if it already existed.
    pub async fn create_collection(&self) -> Result<bool> {
        let target = self.resolve_target(None)?;
        self.gateway.create(&self.schema, &target).await
    }

    /// Drop the backing collection. Returns `false` if it did not exist.
    pub async fn drop_collection(&self) -> Result<bool> {
        let target = self.resolve_target(None)?;
        self.gateway.drop(&target).await
    }

    /// Insert the instance as a single row.
    ///
    /// Ensures the collection exists first (created from the derived schema
    /// on first use). If the primary key is still unset, the store-assigned
    /// identifier is adopted. Returns whether exactly one row was inserted.
    pub async fn save(&self, entity: &mut Entity) -> Result<bool> {
        let target = self.resolve_target(None)?;
        self.save_to(&target, entity).await
    }

    pub(crate) async fn save_to(&self, target: &str, entity: &mut Entity) -> Result<bool> {
        self.gateway.ensure_exists(&self.schema, target).await?;

        let result = self.client.insert(target, vec![entity.to_record()]).await?;
        if entity.primary_key().is_none()
            && result.insert_count > 0
            && let Some(key) = result.primary_keys.first()
        {
            entity.set_primary_key(key.clone());
        }
        entity.clear_dirty();
        Ok(result.insert_count == 1)
    }

    /// Delete the instance's row by primary key.
    ///
    /// Requires a persisted instance; a missing collection is reported as
    /// `false` rather than an error. Returns whether a row was removed.
    pub async fn delete(&self, entity: &Entity) -> Result<bool> {
        let key = entity
            .primary_key()
            .ok_or(QuiverError::MissingPrimaryKey {
                operation: "delete",
            })?
            .clone();
        let target = self.resolve_target(None)?;

        let pk_name = self.schema.primary_key_name();
        let filter = Cond::eq(pk_name, key).compile(false)?;
        match self.client.delete(&target, &filter).await {
            Ok(result) => Ok(result.delete_count > 0),
            Err(QuiverError::CollectionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Validate and apply changes, then rewrite the row.
    ///
    /// The backing store has no in-place update, so the existing row is
    /// deleted and the instance is saved again. If the delete finds no row
    /// (a concurrent deletion won), the update reports `false` and does not
    /// resave the stale record. Primary-key handling on the resave follows
    /// [`restore_assigned_keys`](Self::restore_assigned_keys). A concurrent
    /// reader may observe the window where the row is absent.
    pub async fn update<K, V, I>(&self, entity: &mut Entity, changes: I) -> Result<bool>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let original_key = entity
            .primary_key()
            .ok_or(QuiverError::MissingPrimaryKey {
                operation: "update",
            })?
            .clone();

        for (name, value) in changes {
            entity.set(&name.into(), value)?;
        }

        if !self.delete(entity).await? {
            debug!(
                "update of {} row {original_key:?} aborted: row already gone",
                self.schema.name()
            );
            return Ok(false);
        }

        entity.clear_primary_key();
        if self.restore_assigned_keys && !self.schema.primary_key_field().is_auto_id() {
            entity.set_primary_key(original_key);
        }
        self.save(entity).await
    }
}
