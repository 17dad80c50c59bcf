//! # Quiver
//!
//! A declarative object-mapping layer over a remote vector database.
//!
//! ## Features
//!
//! - Fluent field descriptors and an explicit schema builder
//! - Validated entity instances with dynamic-field support
//! - Chainable, immutable query sets with a `field__op` filter DSL
//! - Similarity search with scalar pre-filtering
//! - Collection lifecycle managed lazily on first use
//! - Pluggable client transport behind an async trait

pub mod client;
pub mod entity;
pub mod error;
pub mod query;
pub mod schema;

pub mod prelude {
    pub use crate::client::{ConnectOptions, Session, VectorClient};
    pub use crate::entity::{Entity, EntityStore, Row, Value};
    pub use crate::error::{QuiverError, Result};
    pub use crate::query::{Cond, QuerySet, VectorSearch};
    pub use crate::schema::{
        ConsistencyLevel, DistanceMetric, EntitySchema, FieldDescriptor, IndexKind,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
