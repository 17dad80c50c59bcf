//! Error types for the quiver library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`QuiverError`] enum. The taxonomy follows the layers of the crate:
//! schema/configuration problems are fatal and raised at definition time,
//! validation problems are raised when an entity is constructed or mutated,
//! lookup outcomes (`DoesNotExist`, `MultipleObjectsReturned`) are ordinary
//! recoverable results of `get`, and anything coming out of the remote client
//! is carried through unchanged in the `Client` variant.

use thiserror::Error;

/// The main error type for quiver operations.
#[derive(Error, Debug)]
pub enum QuiverError {
    /// Schema or configuration errors, raised when an entity type is defined.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A value rejected by a field's validation rule.
    #[error("Invalid value for field '{field}': {message}")]
    Validation {
        /// Name of the offending field.
        field: String,
        /// What was wrong with the value.
        message: String,
    },

    /// Query construction or execution errors (bad filter operands, malformed
    /// aggregate responses).
    #[error("Query error: {0}")]
    Query(String),

    /// `get` matched no rows.
    #[error("{0} matching query does not exist")]
    DoesNotExist(String),

    /// `get` matched more than one row.
    #[error("get() returned more than one {entity}: it returned {count}")]
    MultipleObjectsReturned {
        /// Entity type name.
        entity: String,
        /// Number of rows the probe returned.
        count: usize,
    },

    /// Instance-level delete/update attempted before the row was persisted.
    #[error("Cannot {operation} instance without a primary key")]
    MissingPrimaryKey {
        /// The operation that required a primary key.
        operation: &'static str,
    },

    /// The backing store reported that the collection already exists.
    ///
    /// Client implementations should return this variant rather than `Client`
    /// so the collection gateway can treat the creation race as benign.
    #[error("Collection '{0}' already exists")]
    CollectionExists(String),

    /// The backing store reported that the collection does not exist.
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport or remote-service errors, propagated unchanged.
    #[error("Client error: {0}")]
    Client(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with [`QuiverError`].
pub type Result<T> = std::result::Result<T, QuiverError>;

impl QuiverError {
    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        QuiverError::Schema(msg.into())
    }

    /// Create a new validation error naming the offending field.
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        QuiverError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        QuiverError::Query(msg.into())
    }

    /// Create a new "does not exist" lookup error for an entity type.
    pub fn does_not_exist<S: Into<String>>(entity: S) -> Self {
        QuiverError::DoesNotExist(entity.into())
    }

    /// Create a new "multiple objects returned" lookup error.
    pub fn multiple_objects<S: Into<String>>(entity: S, count: usize) -> Self {
        QuiverError::MultipleObjectsReturned {
            entity: entity.into(),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = QuiverError::schema("no vector field");
        assert_eq!(error.to_string(), "Schema error: no vector field");

        let error = QuiverError::validation("title", "expected a string");
        assert_eq!(
            error.to_string(),
            "Invalid value for field 'title': expected a string"
        );

        let error = QuiverError::multiple_objects("Article", 2);
        assert_eq!(
            error.to_string(),
            "get() returned more than one Article: it returned 2"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = QuiverError::from(json_error);

        match error {
            QuiverError::Json(_) => {}
            _ => panic!("Expected JSON error variant"),
        }
    }
}
