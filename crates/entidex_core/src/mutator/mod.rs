//! Index-side mutators and the batch executor.

mod attribute;
mod hierarchy;
mod price;
mod reference;
mod undo;

pub mod executor;

pub use executor::MutationExecutor;
