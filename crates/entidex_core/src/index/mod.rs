//! Index model: entity indexes, the catalog index, and their registry.

pub mod attribute;
pub mod catalog;
pub mod entity;
pub mod facet;
pub mod hierarchy;
pub mod key;
pub mod price;
pub mod registry;

pub use catalog::CatalogIndex;
pub use entity::EntityIndex;
pub use key::IndexKey;
pub use price::IndexedPrice;
pub use registry::IndexRegistry;
