//! Entity instances, values, and the per-type persistence surface.

pub mod entity;
pub mod store;
pub mod value;

pub use entity::Entity;
pub use store::EntityStore;
pub use value::{Row, Value};
