//! Schema definition: field descriptors and entity schema derivation.

pub mod field;
pub mod schema;

pub use field::{
    DEFAULT_MAX_LENGTH, DistanceMetric, FieldDescriptor, FieldKind, FieldSchema, IndexHint,
    IndexKind,
};
pub use schema::{
    CollectionOptions, ConsistencyLevel, DEFAULT_PRIMARY_KEY, EntitySchema, SchemaBuilder,
};
