//! The chainable, lazily-executed query builder.
//!
//! A [`QuerySet`] is an immutable snapshot of filter, ordering, pagination,
//! and vector-search state. Chain methods clone the snapshot and return a
//! new builder, so branching from a shared base is safe and never mutates
//! the original. Nothing touches the remote service until a terminal call
//! (`all`, `get`, `count`, `delete`, `first`, `last`, `exists`, `create`),
//! and every terminal call re-executes from scratch: there is no result
//! caching.

use std::collections::BTreeMap;

use log::debug;

use crate::client::{QueryRequest, SearchRequest};
use crate::entity::entity::Entity;
use crate::entity::store::EntityStore;
use crate::entity::value::Value;
use crate::error::{QuiverError, Result};
use crate::query::filter::{Cond, FilterExpr};
use crate::schema::{ConsistencyLevel, DistanceMetric};

/// Default maximum number of rows a terminal call returns.
pub const DEFAULT_LIMIT: usize = 1000;

/// Vector-search parameters for a query chain.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearch {
    vector: Vec<f32>,
    field: String,
    metric: Option<DistanceMetric>,
    params: BTreeMap<String, serde_json::Value>,
}

impl VectorSearch {
    /// Search `field` for neighbors of `vector`.
    pub fn new<F: Into<String>>(vector: Vec<f32>, field: F) -> Self {
        VectorSearch {
            vector,
            field: field.into(),
            metric: None,
            params: BTreeMap::new(),
        }
    }

    /// Override the distance metric.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Add an engine-specific search parameter.
    pub fn param<K: Into<String>, V: Into<serde_json::Value>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SortKey {
    field: String,
    descending: bool,
}

impl SortKey {
    /// `"-price"` sorts descending, `"price"` ascending.
    fn parse(key: &str) -> Self {
        match key.strip_prefix('-') {
            Some(field) => SortKey {
                field: field.to_string(),
                descending: true,
            },
            None => SortKey {
                field: key.to_string(),
                descending: false,
            },
        }
    }
}

/// An unexecuted query specification for one entity type.
#[derive(Clone)]
pub struct QuerySet {
    store: EntityStore,
    filter: FilterExpr,
    limit: usize,
    offset: usize,
    order: Vec<SortKey>,
    only: Option<Vec<String>>,
    defer: Vec<String>,
    search: Option<VectorSearch>,
    target: Option<String>,
    consistency: Option<ConsistencyLevel>,
}

impl std::fmt::Debug for QuerySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("entity", &self.store.schema().name())
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("search", &self.search.is_some())
            .finish_non_exhaustive()
    }
}

impl QuerySet {
    pub(crate) fn new(store: EntityStore) -> Self {
        QuerySet {
            store,
            filter: FilterExpr::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            order: Vec::new(),
            only: None,
            defer: Vec::new(),
            search: None,
            target: None,
            consistency: None,
        }
    }

    /// Add a condition, ANDed with the accumulated filter.
    pub fn filter(&self, cond: Cond) -> Self {
        let mut qs = self.clone();
        qs.filter.push(cond, false);
        qs
    }

    /// Add the negated counterpart of a condition.
    pub fn exclude(&self, cond: Cond) -> Self {
        let mut qs = self.clone();
        qs.filter.push(cond, true);
        qs
    }

    /// AND a raw filter expression in verbatim.
    pub fn raw_filter<S: Into<String>>(&self, expr: S) -> Self {
        let mut qs = self.clone();
        qs.filter.push_raw(expr);
        qs
    }

    /// Declare sort keys for scalar queries; a `-` prefix sorts descending.
    ///
    /// The backing engine does not order scalar results, so sorting happens
    /// client-side on the returned page. Vector searches are ranked by
    /// similarity and ignore declared ordering.
    pub fn order_by<S: AsRef<str>, I: IntoIterator<Item = S>>(&self, keys: I) -> Self {
        let mut qs = self.clone();
        qs.order = keys.into_iter().map(|k| SortKey::parse(k.as_ref())).collect();
        qs
    }

    /// Set the maximum number of results.
    pub fn limit(&self, limit: usize) -> Self {
        let mut qs = self.clone();
        qs.limit = limit;
        qs
    }

    /// Skip the first `offset` results.
    pub fn offset(&self, offset: usize) -> Self {
        let mut qs = self.clone();
        qs.offset = offset;
        qs
    }

    /// Return only the named fields.
    pub fn only<S: Into<String>, I: IntoIterator<Item = S>>(&self, fields: I) -> Self {
        let mut qs = self.clone();
        qs.only = Some(fields.into_iter().map(Into::into).collect());
        qs
    }

    /// Leave the named fields out of the result rows.
    pub fn defer<S: Into<String>, I: IntoIterator<Item = S>>(&self, fields: I) -> Self {
        let mut qs = self.clone();
        qs.defer = fields.into_iter().map(Into::into).collect();
        qs
    }

    /// Turn the chain into a similarity search.
    ///
    /// The accumulated filter becomes a pre-filter that narrows candidates
    /// alongside the search.
    pub fn search(&self, search: VectorSearch) -> Self {
        let mut qs = self.clone();
        qs.search = Some(search);
        qs
    }

    /// Target an explicit collection instead of the schema default.
    pub fn on<S: Into<String>>(&self, collection_name: S) -> Self {
        let mut qs = self.clone();
        qs.target = Some(collection_name.into());
        qs
    }

    /// Override the consistency level for this chain.
    pub fn consistency(&self, level: ConsistencyLevel) -> Self {
        let mut qs = self.clone();
        qs.consistency = Some(level);
        qs
    }

    fn resolve_target(&self) -> Result<String> {
        self.store.resolve_target(self.target.as_deref())
    }

    fn output_fields(&self) -> Vec<String> {
        match &self.only {
            Some(fields) => fields.clone(),
            None => self.store.schema().output_field_names(&self.defer),
        }
    }

    fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency
            .unwrap_or(self.store.schema().options().consistency_level)
    }

    /// Execute the specification and rehydrate the matching rows.
    ///
    /// Returns an empty vector when the collection does not exist. With
    /// vector-search parameters set, the hits come back in similarity rank
    /// and `offset` is applied by slicing that order; otherwise a scalar
    /// query runs with filter, limit, and offset.
    pub async fn all(&self) -> Result<Vec<Entity>> {
        let target = self.resolve_target()?;
        let gateway = self.store.gateway();
        if !gateway.exists(&target).await? {
            return Ok(Vec::new());
        }
        gateway.ensure_loaded(&target).await?;

        let filter = self.filter.compile()?;
        let schema = self.store.schema();

        if let Some(search) = &self.search {
            debug!(
                "searching '{target}' on field '{}' (limit {})",
                search.field, self.limit
            );
            let request = SearchRequest {
                collection_name: target,
                vectors: vec![search.vector.clone()],
                anns_field: search.field.clone(),
                filter,
                limit: self.limit,
                output_fields: self.output_fields(),
                metric_type: search.metric,
                params: search.params.clone(),
                consistency_level: self.consistency_level(),
            };
            let hits = self.store.client().search(request).await?;

            // Ranked results are not paginated server-side; slice the order.
            Ok(hits
                .into_iter()
                .skip(self.offset)
                .map(|hit| Entity::from_row(schema.clone(), hit.row))
                .collect())
        } else {
            debug!("querying '{target}' (limit {}, offset {})", self.limit, self.offset);
            let request = QueryRequest {
                collection_name: target,
                filter,
                limit: Some(self.limit),
                offset: self.offset,
                output_fields: self.output_fields(),
                consistency_level: self.consistency_level(),
            };
            let rows = self.store.client().query(request).await?;
            let mut entities: Vec<Entity> = rows
                .into_iter()
                .map(|row| Entity::from_row(schema.clone(), row))
                .collect();
            self.apply_order(&mut entities);
            Ok(entities)
        }
    }

    fn apply_order(&self, entities: &mut [Entity]) {
        if self.order.is_empty() {
            return;
        }
        entities.sort_by(|a, b| {
            for key in &self.order {
                let null = Value::Null;
                let left = a.get(&key.field).unwrap_or(&null);
                let right = b.get(&key.field).unwrap_or(&null);
                let ordering = left.compare(right);
                if ordering != std::cmp::Ordering::Equal {
                    return if key.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    /// Fetch exactly one row matching the given conditions.
    ///
    /// Executes with a limit of 2, which is enough to distinguish zero, one,
    /// and many. Zero matches return `DoesNotExist`, more than one returns
    /// `MultipleObjectsReturned`.
    pub async fn get<I: IntoIterator<Item = Cond>>(&self, conds: I) -> Result<Entity> {
        let qs = conds
            .into_iter()
            .fold(self.clone(), |qs, cond| qs.filter(cond));
        let mut results = qs.limit(2).all().await?;

        let entity_name = self.store.schema().name().to_string();
        match results.len() {
            0 => Err(QuiverError::does_not_exist(entity_name)),
            1 => Ok(results.remove(0)),
            count => Err(QuiverError::multiple_objects(entity_name, count)),
        }
    }

    /// Count the rows matching the accumulated filter.
    ///
    /// Returns 0 when the collection does not exist.
    pub async fn count(&self) -> Result<usize> {
        let target = self.resolve_target()?;
        let gateway = self.store.gateway();
        if !gateway.exists(&target).await? {
            return Ok(0);
        }
        gateway.ensure_loaded(&target).await?;

        let request = QueryRequest {
            collection_name: target,
            filter: self.filter.compile()?,
            limit: None,
            offset: 0,
            output_fields: vec!["count(*)".to_string()],
            consistency_level: self.consistency_level(),
        };
        let rows = self.store.client().query(request).await?;
        rows.first()
            .and_then(|row| row.get("count(*)"))
            .and_then(Value::as_i64)
            .map(|count| count.max(0) as usize)
            .ok_or_else(|| QuiverError::query("Store returned no count(*) aggregate"))
    }

    /// Check whether any row matches the accumulated filter.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.count().await? > 0)
    }

    /// Bulk-delete every row matching the accumulated filter.
    ///
    /// An empty filter deletes all rows in the collection. Returns the
    /// number of rows removed, 0 when the collection does not exist,
    /// including when a concurrent drop wins after the existence probe.
    pub async fn delete(&self) -> Result<usize> {
        let target = self.resolve_target()?;
        if !self.store.gateway().exists(&target).await? {
            return Ok(0);
        }
        let filter = self.filter.compile()?;
        debug!("bulk delete on '{target}' with filter '{filter}'");
        match self.store.client().delete(&target, &filter).await {
            Ok(result) => Ok(result.delete_count),
            Err(QuiverError::CollectionNotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// The first matching row, if any.
    pub async fn first(&self) -> Result<Option<Entity>> {
        Ok(self.limit(1).all().await?.into_iter().next())
    }

    /// The last matching row, if any.
    ///
    /// The engine has no reverse scan, so this materializes the full result
    /// and takes the tail.
    pub async fn last(&self) -> Result<Option<Entity>> {
        Ok(self.all().await?.pop())
    }

    /// Construct, validate, and persist a new instance in this chain's
    /// target collection.
    pub async fn create<K, V, I>(&self, pairs: I) -> Result<Entity>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let target = self.resolve_target()?;
        self.store.create_in(&target, pairs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(
            SortKey::parse("price"),
            SortKey {
                field: "price".to_string(),
                descending: false,
            }
        );
        assert_eq!(
            SortKey::parse("-price"),
            SortKey {
                field: "price".to_string(),
                descending: true,
            }
        );
    }

    #[test]
    fn test_vector_search_builder() {
        let search = VectorSearch::new(vec![0.1, 0.2], "embedding")
            .metric(DistanceMetric::Cosine)
            .param("nprobe", 16);

        assert_eq!(search.field, "embedding");
        assert_eq!(search.metric, Some(DistanceMetric::Cosine));
        assert_eq!(
            search.params.get("nprobe"),
            Some(&serde_json::Value::from(16))
        );
    }
}
