//! Entity schema derivation.
//!
//! An [`EntitySchema`] is derived once when an entity type is declared, via
//! [`SchemaBuilder`]: an explicit, ordered registration of
//! `(name, FieldDescriptor)` pairs plus collection-level options. The builder
//! rejects misconfigured types at definition time (no vector field, ambiguous
//! primary key) and synthesizes an auto-generated `id` primary key when none
//! is declared. The result is immutable and shared by every instance.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{QuiverError, Result};
use crate::schema::field::{FieldDescriptor, FieldKind, FieldSchema, IndexHint};

/// Name of the synthesized primary-key field.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Per-request freshness knob for queries and searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum ConsistencyLevel {
    /// Read your own writes.
    Strong,
    /// Session-scoped consistency.
    #[default]
    Session,
    /// Bounded staleness.
    Bounded,
    /// No freshness guarantee.
    Eventually,
}

impl ConsistencyLevel {
    /// Wire name of the consistency level.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::Bounded => "Bounded",
            ConsistencyLevel::Eventually => "Eventually",
        }
    }
}

/// Collection-level options resolved at definition time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionOptions {
    /// Name of the backing collection.
    pub collection_name: String,
    /// Whether undeclared fields are stored in the collection's dynamic field.
    pub enable_dynamic_field: bool,
    /// Default consistency level for queries against this type.
    pub consistency_level: ConsistencyLevel,
    /// Collection description.
    pub description: String,
}

/// The frozen schema of one entity type: an ordered field map plus options.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    fields: Vec<(String, FieldDescriptor)>,
    index: HashMap<String, usize>,
    primary_key: String,
    options: CollectionOptions,
}

impl EntitySchema {
    /// Start building a schema for the entity type with the given name.
    pub fn builder<S: Into<String>>(name: S) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Get the entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterate over declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Get a field descriptor by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i].1)
    }

    /// Check whether a field is declared.
    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get the number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether the schema has no fields. Built schemas never are.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Name of the primary-key field.
    pub fn primary_key_name(&self) -> &str {
        &self.primary_key
    }

    /// The primary-key field descriptor.
    pub fn primary_key_field(&self) -> &FieldDescriptor {
        self.get_field(&self.primary_key)
            .expect("schema invariant: primary key field exists")
    }

    /// Collection-level options.
    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    /// Emit the full set of remote schema fragments, in declaration order.
    pub fn field_schemas(&self) -> Vec<FieldSchema> {
        self.fields
            .iter()
            .map(|(name, field)| field.to_schema_fragment(name))
            .collect()
    }

    /// Emit index hints for every vector field.
    pub fn index_hints(&self) -> Vec<IndexHint> {
        self.fields
            .iter()
            .filter_map(|(name, field)| field.index_hint(name))
            .collect()
    }

    /// Default output fields for a query: every declared field except sparse
    /// vectors and the given deferred names.
    pub fn output_field_names(&self, deferred: &[String]) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(name, field)| {
                field.kind() != FieldKind::SparseFloatVector
                    && !deferred.iter().any(|d| d == name)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Builder that assembles and validates an [`EntitySchema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<(String, FieldDescriptor)>,
    collection_name: Option<String>,
    enable_dynamic_field: bool,
    consistency_level: ConsistencyLevel,
    description: String,
}

impl SchemaBuilder {
    fn new<S: Into<String>>(name: S) -> Self {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            collection_name: None,
            enable_dynamic_field: false,
            consistency_level: ConsistencyLevel::default(),
            description: String::new(),
        }
    }

    /// Declare a field. Declaration order is preserved.
    pub fn field<S: Into<String>>(mut self, name: S, descriptor: FieldDescriptor) -> Self {
        self.fields.push((name.into(), descriptor));
        self
    }

    /// Override the backing collection name (defaults to the lower-cased
    /// entity type name).
    pub fn collection_name<S: Into<String>>(mut self, name: S) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    /// Enable the collection's dynamic field for undeclared values.
    ///
    /// Dynamic-field schemas require an explicit target collection (via
    /// `QuerySet::on` or `EntityStore::with_target`) for every remote
    /// operation.
    pub fn dynamic_field(mut self, enable: bool) -> Self {
        self.enable_dynamic_field = enable;
        self
    }

    /// Set the default consistency level.
    pub fn consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = level;
        self
    }

    /// Set the collection description.
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Validate and freeze the schema.
    pub fn build(self) -> Result<EntitySchema> {
        if self.name.is_empty() {
            return Err(QuiverError::schema("Entity type name cannot be empty"));
        }

        let mut fields = self.fields;
        let mut seen = HashSet::new();
        for (name, _) in &fields {
            if name.is_empty() {
                return Err(QuiverError::schema("Field name cannot be empty"));
            }
            if !seen.insert(name.clone()) {
                return Err(QuiverError::schema(format!(
                    "Field '{name}' is declared twice"
                )));
            }
        }

        if !fields.iter().any(|(_, f)| f.is_vector()) {
            return Err(QuiverError::schema(format!(
                "Entity type '{}' must declare at least one vector field",
                self.name
            )));
        }

        let mut primary_keys = fields
            .iter()
            .filter(|(_, f)| f.is_primary_key())
            .map(|(name, _)| name.clone());
        let first_pk = primary_keys.next();
        if let Some(second) = primary_keys.next() {
            let first = first_pk.unwrap();
            return Err(QuiverError::schema(format!(
                "Entity type '{}' declares more than one primary key ('{first}' and '{second}')",
                self.name
            )));
        }

        let primary_key = match first_pk {
            Some(name) => {
                let field = &fields[fields.iter().position(|(n, _)| *n == name).unwrap()].1;
                match field.kind() {
                    FieldKind::Int64 | FieldKind::VarChar => {}
                    other => {
                        return Err(QuiverError::schema(format!(
                            "Primary key '{name}' must be Int64 or VarChar, got {}",
                            other.type_name()
                        )));
                    }
                }
                if field.is_nullable() {
                    return Err(QuiverError::schema(format!(
                        "Primary key '{name}' cannot be nullable"
                    )));
                }
                name
            }
            None => {
                if fields.iter().any(|(n, _)| n == DEFAULT_PRIMARY_KEY) {
                    return Err(QuiverError::schema(format!(
                        "Cannot synthesize primary key: field '{DEFAULT_PRIMARY_KEY}' already exists"
                    )));
                }
                let id_field = FieldDescriptor::int64().primary_key(true).auto_id(true);
                fields.insert(0, (DEFAULT_PRIMARY_KEY.to_string(), id_field));
                DEFAULT_PRIMARY_KEY.to_string()
            }
        };

        for (name, field) in &fields {
            if field.kind() == FieldKind::FloatVector && field.dim().unwrap_or(0) == 0 {
                return Err(QuiverError::schema(format!(
                    "Dense vector field '{name}' must have a positive dimension"
                )));
            }
        }

        let index = fields
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();

        let options = CollectionOptions {
            collection_name: self
                .collection_name
                .unwrap_or_else(|| self.name.to_lowercase()),
            enable_dynamic_field: self.enable_dynamic_field,
            consistency_level: self.consistency_level,
            description: self.description,
        };

        Ok(EntitySchema {
            name: self.name,
            fields,
            index,
            primary_key,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_builder() -> SchemaBuilder {
        EntitySchema::builder("Article")
            .field("title", FieldDescriptor::varchar().max_length(200))
            .field("embedding", FieldDescriptor::float_vector(4))
    }

    #[test]
    fn test_primary_key_is_synthesized() {
        let schema = article_builder().build().unwrap();

        assert_eq!(schema.primary_key_name(), "id");
        let pk = schema.primary_key_field();
        assert!(pk.is_primary_key());
        assert!(pk.is_auto_id());
        assert_eq!(pk.kind(), FieldKind::Int64);

        // Synthesized key is first in declaration order.
        let names: Vec<&str> = schema.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "title", "embedding"]);
    }

    #[test]
    fn test_declared_primary_key_is_kept() {
        let schema = EntitySchema::builder("Doc")
            .field("key", FieldDescriptor::varchar().primary_key(true))
            .field("embedding", FieldDescriptor::float_vector(4))
            .build()
            .unwrap();

        assert_eq!(schema.primary_key_name(), "key");
        assert!(!schema.has_field("id"));
    }

    #[test]
    fn test_zero_vector_fields_fails_at_definition_time() {
        let err = EntitySchema::builder("Plain")
            .field("title", FieldDescriptor::varchar())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("at least one vector field"));
    }

    #[test]
    fn test_ambiguous_primary_key_is_rejected() {
        let err = EntitySchema::builder("Doc")
            .field("a", FieldDescriptor::int64().primary_key(true))
            .field("b", FieldDescriptor::int64().primary_key(true))
            .field("embedding", FieldDescriptor::float_vector(4))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than one primary key"));
    }

    #[test]
    fn test_primary_key_kind_restriction() {
        let err = EntitySchema::builder("Doc")
            .field("score", FieldDescriptor::float().primary_key(true))
            .field("embedding", FieldDescriptor::float_vector(4))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must be Int64 or VarChar"));
    }

    #[test]
    fn test_id_collision_with_synthesized_key() {
        let err = EntitySchema::builder("Doc")
            .field("id", FieldDescriptor::varchar())
            .field("embedding", FieldDescriptor::float_vector(4))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_duplicate_field_names_are_rejected() {
        let err = EntitySchema::builder("Doc")
            .field("title", FieldDescriptor::varchar())
            .field("title", FieldDescriptor::varchar())
            .field("embedding", FieldDescriptor::float_vector(4))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_collection_options_defaults_and_overrides() {
        let schema = article_builder().build().unwrap();
        assert_eq!(schema.options().collection_name, "article");
        assert!(!schema.options().enable_dynamic_field);
        assert_eq!(
            schema.options().consistency_level,
            ConsistencyLevel::Session
        );

        let schema = article_builder()
            .collection_name("articles_v2")
            .dynamic_field(true)
            .consistency_level(ConsistencyLevel::Strong)
            .build()
            .unwrap();
        assert_eq!(schema.options().collection_name, "articles_v2");
        assert!(schema.options().enable_dynamic_field);
        assert_eq!(schema.options().consistency_level, ConsistencyLevel::Strong);
    }

    #[test]
    fn test_output_fields_exclude_sparse_and_deferred() {
        let schema = EntitySchema::builder("Doc")
            .field("title", FieldDescriptor::varchar())
            .field("body", FieldDescriptor::varchar())
            .field("embedding", FieldDescriptor::float_vector(4))
            .field("sparse", FieldDescriptor::sparse_float_vector())
            .build()
            .unwrap();

        let fields = schema.output_field_names(&["body".to_string()]);
        assert_eq!(fields, vec!["id", "title", "embedding"]);
    }

    #[test]
    fn test_field_schemas_in_declaration_order() {
        let schema = article_builder().build().unwrap();
        let fragments = schema.field_schemas();
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].name, "id");
        assert!(fragments[0].is_primary);
        assert!(fragments[0].auto_id);
        assert_eq!(fragments[2].dim, Some(4));

        let hints = schema.index_hints();
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].field_name, "embedding");
    }
}
