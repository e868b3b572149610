//! stratus-db — store abstraction for the price catalog.
//!
//! The core only depends on the `PriceStore` and `StatusSink` traits;
//! connection management for a relational backend lives outside this
//! workspace. `MemoryStore` is the reference implementation used by the
//! runtime default and by tests.

pub mod error;
pub mod memory;
pub mod status;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use status::{FileStatus, StatusSink};
pub use store::{PriceStore, QueryFilter, SortField, SortOrder, StoredPrice};
