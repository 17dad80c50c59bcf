//! Field descriptors for entity definitions.
//!
//! A [`FieldDescriptor`] declares one column's semantic type, constraints, and
//! validation rule. Descriptors are created once when an entity type is
//! defined, frozen inside the [`EntitySchema`](crate::schema::EntitySchema),
//! and shared read-only by every instance of that type.

use serde::Serialize;

use crate::entity::value::Value;
use crate::error::{QuiverError, Result};

/// Semantic type tag for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float,
    /// Boolean.
    Bool,
    /// Variable-length string.
    VarChar,
    /// Arbitrary JSON document.
    Json,
    /// Dense float vector of a fixed dimension.
    FloatVector,
    /// Sparse float vector (index -> weight).
    SparseFloatVector,
}

impl FieldKind {
    /// Wire name of the type tag, as the backing store's schema API spells it.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Int64 => "Int64",
            FieldKind::Float => "Float",
            FieldKind::Bool => "Bool",
            FieldKind::VarChar => "VarChar",
            FieldKind::Json => "JSON",
            FieldKind::FloatVector => "FloatVector",
            FieldKind::SparseFloatVector => "SparseFloatVector",
        }
    }

    /// Check whether this kind is a vector kind.
    pub fn is_vector(&self) -> bool {
        matches!(self, FieldKind::FloatVector | FieldKind::SparseFloatVector)
    }
}

/// Index type hint for a vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexKind {
    /// Let the backing store pick an index.
    AutoIndex,
    /// Brute-force flat index.
    Flat,
    /// Inverted-file flat index.
    IvfFlat,
    /// HNSW graph index.
    Hnsw,
}

impl IndexKind {
    /// Wire name of the index type.
    pub fn type_name(&self) -> &'static str {
        match self {
            IndexKind::AutoIndex => "AUTOINDEX",
            IndexKind::Flat => "FLAT",
            IndexKind::IvfFlat => "IVF_FLAT",
            IndexKind::Hnsw => "HNSW",
        }
    }
}

/// Distance metric used to rank similarity-search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DistanceMetric {
    /// Euclidean distance.
    L2,
    /// Inner product.
    Ip,
    /// Cosine similarity.
    Cosine,
}

impl DistanceMetric {
    /// Wire name of the metric.
    pub fn type_name(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "L2",
            DistanceMetric::Ip => "IP",
            DistanceMetric::Cosine => "COSINE",
        }
    }
}

/// Default maximum length for varchar fields.
pub const DEFAULT_MAX_LENGTH: usize = 65_535;

/// Declares one field of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    kind: FieldKind,
    primary_key: bool,
    auto_id: bool,
    nullable: bool,
    default: Option<Value>,
    description: String,
    max_length: Option<usize>,
    dim: Option<usize>,
    enable_analyzer: bool,
    enable_match: bool,
    index_type: Option<IndexKind>,
    metric: Option<DistanceMetric>,
}

impl FieldDescriptor {
    fn new(kind: FieldKind) -> Self {
        FieldDescriptor {
            kind,
            primary_key: false,
            auto_id: false,
            nullable: false,
            default: None,
            description: String::new(),
            max_length: None,
            dim: None,
            enable_analyzer: false,
            enable_match: false,
            index_type: None,
            metric: None,
        }
    }

    /// Create a new 64-bit integer field.
    pub fn int64() -> Self {
        Self::new(FieldKind::Int64)
    }

    /// Create a new float field.
    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    /// Create a new boolean field.
    pub fn boolean() -> Self {
        Self::new(FieldKind::Bool)
    }

    /// Create a new varchar field with the default maximum length.
    pub fn varchar() -> Self {
        let mut field = Self::new(FieldKind::VarChar);
        field.max_length = Some(DEFAULT_MAX_LENGTH);
        field
    }

    /// Create a new JSON field.
    pub fn json() -> Self {
        Self::new(FieldKind::Json)
    }

    /// Create a new dense float vector field of the given dimension.
    pub fn float_vector(dim: usize) -> Self {
        let mut field = Self::new(FieldKind::FloatVector);
        field.dim = Some(dim);
        field
    }

    /// Create a new sparse float vector field.
    pub fn sparse_float_vector() -> Self {
        Self::new(FieldKind::SparseFloatVector)
    }

    /// Mark this field as the primary key.
    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Let the backing store assign this field's value on insert.
    pub fn auto_id(mut self, auto_id: bool) -> Self {
        self.auto_id = auto_id;
        self
    }

    /// Set whether this field accepts null values.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set the default value used when construction supplies none.
    pub fn default_value<V: Into<Value>>(mut self, value: V) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the field description.
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Set the maximum length for varchar values.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Enable text analysis on a varchar field.
    pub fn enable_analyzer(mut self, enable: bool) -> Self {
        self.enable_analyzer = enable;
        self
    }

    /// Enable text-match filtering on a varchar field.
    pub fn enable_match(mut self, enable: bool) -> Self {
        self.enable_match = enable;
        self
    }

    /// Set the index type hint for a vector field.
    pub fn index_type(mut self, index_type: IndexKind) -> Self {
        self.index_type = Some(index_type);
        self
    }

    /// Set the distance metric hint for a vector field.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Get the semantic type tag.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Check whether this field is the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Check whether the backing store assigns this field's value.
    pub fn is_auto_id(&self) -> bool {
        self.auto_id
    }

    /// Check whether this field accepts null values.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Check whether this field is a vector field.
    pub fn is_vector(&self) -> bool {
        self.kind.is_vector()
    }

    /// Get the declared default value, if any.
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Get the dense vector dimension, if this is a dense vector field.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    /// Validate a caller-supplied value against this descriptor.
    ///
    /// Returns the value to store, applying the documented coercions
    /// (numeric string -> Int64, Int -> Float). `None` and `Null` pass only
    /// for nullable fields and auto-generated primary keys.
    pub fn validate(&self, field_name: &str, value: Option<&Value>) -> Result<Value> {
        let value = match value {
            None | Some(Value::Null) => {
                if self.nullable || (self.primary_key && self.auto_id) {
                    return Ok(Value::Null);
                }
                return Err(QuiverError::validation(
                    field_name,
                    "null is not allowed for a non-nullable field",
                ));
            }
            Some(value) => value,
        };

        match self.kind {
            FieldKind::Int64 => match value {
                Value::Int(_) => Ok(value.clone()),
                Value::String(s) => s.parse::<i64>().map(Value::Int).map_err(|_| {
                    QuiverError::validation(field_name, format!("expected an integer, got '{s}'"))
                }),
                other => Err(self.kind_error(field_name, other)),
            },
            FieldKind::Float => match value {
                Value::Float(_) => Ok(value.clone()),
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                other => Err(self.kind_error(field_name, other)),
            },
            FieldKind::Bool => match value {
                Value::Bool(_) => Ok(value.clone()),
                other => Err(self.kind_error(field_name, other)),
            },
            FieldKind::VarChar => match value {
                Value::String(s) => {
                    let max = self.max_length.unwrap_or(DEFAULT_MAX_LENGTH);
                    if s.chars().count() > max {
                        return Err(QuiverError::validation(
                            field_name,
                            format!("string exceeds max_length {max}"),
                        ));
                    }
                    Ok(value.clone())
                }
                other => Err(self.kind_error(field_name, other)),
            },
            FieldKind::Json => match value {
                Value::Json(_) | Value::String(_) | Value::Int(_) | Value::Float(_)
                | Value::Bool(_) => Ok(value.clone()),
                other => Err(self.kind_error(field_name, other)),
            },
            FieldKind::FloatVector => match value {
                Value::Vector(v) => {
                    let dim = self.dim.unwrap_or(0);
                    if v.len() != dim {
                        return Err(QuiverError::validation(
                            field_name,
                            format!("expected a vector of dimension {dim}, got {}", v.len()),
                        ));
                    }
                    if v.iter().any(|f| !f.is_finite()) {
                        return Err(QuiverError::validation(
                            field_name,
                            "vector components must be finite",
                        ));
                    }
                    Ok(value.clone())
                }
                other => Err(self.kind_error(field_name, other)),
            },
            FieldKind::SparseFloatVector => match value {
                Value::SparseVector(entries) => {
                    if entries.values().any(|w| !w.is_finite()) {
                        return Err(QuiverError::validation(
                            field_name,
                            "sparse vector weights must be finite",
                        ));
                    }
                    Ok(value.clone())
                }
                other => Err(self.kind_error(field_name, other)),
            },
        }
    }

    fn kind_error(&self, field_name: &str, value: &Value) -> QuiverError {
        QuiverError::validation(
            field_name,
            format!(
                "expected {}, got {}",
                self.kind.type_name(),
                value.kind_name()
            ),
        )
    }

    /// Emit this field's contribution to the remote collection schema.
    pub fn to_schema_fragment(&self, name: &str) -> FieldSchema {
        FieldSchema {
            name: name.to_string(),
            data_type: self.kind.type_name(),
            is_primary: self.primary_key,
            auto_id: self.auto_id,
            nullable: self.nullable,
            max_length: if self.kind == FieldKind::VarChar {
                self.max_length
            } else {
                None
            },
            dim: self.dim,
            enable_analyzer: self.enable_analyzer,
            enable_match: self.enable_match,
            description: self.description.clone(),
        }
    }

    /// Emit the vector-index hint for this field, if it is a vector field.
    pub fn index_hint(&self, name: &str) -> Option<IndexHint> {
        if !self.is_vector() {
            return None;
        }
        Some(IndexHint {
            field_name: name.to_string(),
            index_type: self.index_type.unwrap_or(IndexKind::AutoIndex),
            metric_type: self.metric,
        })
    }
}

/// One field's slice of the remote collection schema. Pure data, no I/O.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Wire type tag.
    pub data_type: &'static str,
    /// Primary-key flag.
    pub is_primary: bool,
    /// Store-assigned identifier flag.
    pub auto_id: bool,
    /// Nullability flag.
    pub nullable: bool,
    /// Maximum length, varchar only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Dimension, dense vectors only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim: Option<usize>,
    /// Text-analysis flag, varchar only.
    pub enable_analyzer: bool,
    /// Text-match flag, varchar only.
    pub enable_match: bool,
    /// Field description.
    pub description: String,
}

/// Index hint for one vector field of a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexHint {
    /// The vector field to index.
    pub field_name: String,
    /// Index type to build.
    pub index_type: IndexKind,
    /// Distance metric, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<DistanceMetric>,
}
