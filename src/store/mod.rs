//! Entity request lifecycle stores.

pub mod backend;
pub mod draft;
pub mod handle;
pub mod registry;
pub mod sequence;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::Backend;
pub use handle::{Phase, Store, StoreEvent, WriteOutcome};
pub use registry::{Registered, Registry};
pub use state::Status;
