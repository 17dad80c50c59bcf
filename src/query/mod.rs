//! Filter conditions and the chainable query builder.

pub mod filter;
pub mod queryset;

pub use filter::{CmpOp, Cond, FilterExpr};
pub use queryset::{QuerySet, VectorSearch, DEFAULT_LIMIT};
