//! Validated, schema-bound entity instances.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::entity::store::EntityStore;
use crate::entity::value::{Row, Value};
use crate::error::Result;
use crate::schema::EntitySchema;

/// One in-memory record bound to an [`EntitySchema`].
///
/// Every declared field holds a value that passed the field's validation rule
/// (possibly `Null` for nullable fields and unset auto keys). Undeclared
/// values live in the extras bag when the schema enables the dynamic field;
/// otherwise they are silently dropped at construction time. The instance's
/// identity is the primary-key value, which stays `None` until the row has
/// been persisted.
#[derive(Debug, Clone)]
pub struct Entity {
    schema: Arc<EntitySchema>,
    values: BTreeMap<String, Value>,
    extras: BTreeMap<String, Value>,
    dirty: BTreeSet<String>,
}

impl Entity {
    /// Construct and validate an instance from field/value pairs.
    ///
    /// Each declared field takes the supplied value or the field's default;
    /// any validation failure names the offending field. Unknown keys are
    /// kept in the extras bag only under a dynamic-field schema.
    pub fn new<K, V, I>(schema: Arc<EntitySchema>, pairs: I) -> Result<Self>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut supplied: BTreeMap<String, Value> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut values = BTreeMap::new();
        for (name, field) in schema.fields() {
            let raw = supplied.remove(name).or_else(|| field.default().cloned());
            let validated = field.validate(name, raw.as_ref())?;
            values.insert(name.to_string(), validated);
        }

        let extras = if schema.options().enable_dynamic_field {
            supplied
        } else {
            BTreeMap::new()
        };

        Ok(Entity {
            schema,
            values,
            extras,
            dirty: BTreeSet::new(),
        })
    }

    /// Rehydrate an instance from a row returned by the backing store.
    ///
    /// Declared values are stored verbatim without re-validation, because
    /// `only`/`defer` legitimately produce partial rows. Unknown keys go to
    /// the extras bag under a dynamic-field schema.
    pub fn from_row(schema: Arc<EntitySchema>, row: Row) -> Self {
        let mut values = BTreeMap::new();
        let mut extras = BTreeMap::new();
        let dynamic = schema.options().enable_dynamic_field;

        for (name, value) in row {
            if schema.has_field(&name) {
                values.insert(name, value);
            } else if dynamic {
                extras.insert(name, value);
            }
        }

        Entity {
            schema,
            values,
            extras,
            dirty: BTreeSet::new(),
        }
    }

    /// The schema this instance is bound to.
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Get a stored value, declared or extra.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).or_else(|| self.extras.get(name))
    }

    /// Set a value, validating declared fields and tracking the change.
    ///
    /// Assignments to undeclared names always land in the extras bag.
    pub fn set<V: Into<Value>>(&mut self, name: &str, value: V) -> Result<()> {
        let value = value.into();
        match self.schema.get_field(name) {
            Some(field) => {
                let validated = field.validate(name, Some(&value))?;
                self.values.insert(name.to_string(), validated);
            }
            None => {
                self.extras.insert(name.to_string(), value);
            }
        }
        self.dirty.insert(name.to_string());
        Ok(())
    }

    /// The extras bag of undeclared values.
    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }

    /// The primary-key value, or `None` until the row has been persisted.
    pub fn primary_key(&self) -> Option<&Value> {
        self.values
            .get(self.schema.primary_key_name())
            .filter(|v| !v.is_null())
    }

    pub(crate) fn set_primary_key(&mut self, value: Value) {
        self.values
            .insert(self.schema.primary_key_name().to_string(), value);
    }

    pub(crate) fn clear_primary_key(&mut self) {
        self.values
            .insert(self.schema.primary_key_name().to_string(), Value::Null);
    }

    /// Fields changed since construction or the last successful save.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(|s| s.as_str())
    }

    /// Check whether any field has changed since the last save.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Serialize declared non-null values plus extras into the flat row shape
    /// the insert/query API expects.
    pub fn to_record(&self) -> Row {
        let mut row: Row = self
            .values
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in &self.extras {
            row.insert(k.clone(), v.clone());
        }
        row
    }

    /// Persist this instance through the store. See [`EntityStore::save`].
    pub async fn save(&mut self, store: &EntityStore) -> Result<bool> {
        store.save(self).await
    }

    /// Delete this instance's row. See [`EntityStore::delete`].
    pub async fn delete(&self, store: &EntityStore) -> Result<bool> {
        store.delete(self).await
    }

    /// Apply changes and rewrite the row. See [`EntityStore::update`].
    pub async fn update<K, V, I>(&mut self, store: &EntityStore, changes: I) -> Result<bool>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        store.update(self, changes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    fn article_schema(dynamic: bool) -> Arc<EntitySchema> {
        Arc::new(
            EntitySchema::builder("Article")
                .field("title", FieldDescriptor::varchar().max_length(50))
                .field("views", FieldDescriptor::int64().default_value(0i64))
                .field("embedding", FieldDescriptor::float_vector(2))
                .dynamic_field(dynamic)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_construction_validates_and_applies_defaults() {
        let schema = article_schema(false);
        let entity = Entity::new(
            schema,
            [
                ("title", Value::from("hello")),
                ("embedding", Value::Vector(vec![0.1, 0.2])),
            ],
        )
        .unwrap();

        assert_eq!(entity.get("title"), Some(&Value::String("hello".into())));
        assert_eq!(entity.get("views"), Some(&Value::Int(0)));
        assert_eq!(entity.primary_key(), None);
    }

    #[test]
    fn test_construction_failure_names_the_field() {
        let schema = article_schema(false);
        let err = Entity::new(
            schema,
            [
                ("title", Value::from("hello")),
                ("embedding", Value::Vector(vec![0.1])),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding"));
    }

    #[test]
    fn test_unknown_keys_require_dynamic_schema() {
        let pairs = [
            ("title", Value::from("x")),
            ("embedding", Value::Vector(vec![0.0, 0.0])),
            ("author", Value::from("carol")),
        ];

        let strict = Entity::new(article_schema(false), pairs.clone()).unwrap();
        assert!(strict.extras().is_empty());
        assert_eq!(strict.get("author"), None);

        let dynamic = Entity::new(article_schema(true), pairs).unwrap();
        assert_eq!(dynamic.get("author"), Some(&Value::String("carol".into())));
    }

    #[test]
    fn test_set_validates_and_tracks_dirt() {
        let schema = article_schema(false);
        let mut entity = Entity::new(
            schema,
            [
                ("title", Value::from("x")),
                ("embedding", Value::Vector(vec![0.0, 0.0])),
            ],
        )
        .unwrap();
        assert!(!entity.is_dirty());

        entity.set("views", 7i64).unwrap();
        assert_eq!(entity.get("views"), Some(&Value::Int(7)));
        assert!(entity.is_dirty());
        assert_eq!(entity.dirty_fields().collect::<Vec<_>>(), vec!["views"]);

        assert!(entity.set("views", "not a number").is_err());

        // Undeclared assignments land in extras.
        entity.set("note", "draft").unwrap();
        assert_eq!(entity.extras().get("note"), Some(&Value::String("draft".into())));
    }

    #[test]
    fn test_to_record_skips_nulls_and_includes_extras() {
        let schema = article_schema(true);
        let mut entity = Entity::new(
            schema,
            [
                ("title", Value::from("x")),
                ("embedding", Value::Vector(vec![0.0, 0.0])),
                ("tag", Value::from("tech")),
            ],
        )
        .unwrap();
        entity.set_primary_key(Value::Null);

        let record = entity.to_record();
        assert!(!record.contains_key("id"));
        assert_eq!(record.get("tag"), Some(&Value::String("tech".into())));
        assert_eq!(record.get("title"), Some(&Value::String("x".into())));
    }

    #[test]
    fn test_from_row_is_lenient_for_partial_rows() {
        let schema = article_schema(false);
        let mut row = Row::new();
        row.insert("id".into(), Value::Int(11));
        row.insert("title".into(), Value::String("partial".into()));

        let entity = Entity::from_row(schema, row);
        assert_eq!(entity.primary_key(), Some(&Value::Int(11)));
        assert_eq!(entity.get("title"), Some(&Value::String("partial".into())));
        assert_eq!(entity.get("views"), None);
    }
}
