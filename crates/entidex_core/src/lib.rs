//! Write-path indexing core of an entity database.
//!
//! A batch of [`mutation::LocalMutation`]s for one entity runs through the
//! [`MutationExecutor`]: each mutation first updates the affected entity
//! indexes (reading pre-mutation container state), then the storage
//! containers. Commit settles locale bookkeeping, drops emptied reduced
//! indexes, and persists dirty containers; failure or rollback replays the
//! undo log so indexes return to their pre-batch state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod containers;
pub mod error;
pub mod index;
pub mod mutation;
pub mod mutator;
pub mod schema;
pub mod types;
pub mod value;

pub use config::BatchOptions;
pub use error::{CoreError, CoreResult};
pub use mutator::MutationExecutor;
