//! Storage containers and the per-batch container executor.

pub mod associated_data;
pub mod attributes;
pub mod body;
pub mod executor;
pub mod prices;
pub mod references;
pub mod store;

pub use executor::ContainerExecutor;
pub use prices::PriceRecord;
pub use references::Reference;
pub use store::{ContainerStore, InMemoryStore};
