//! stratus-ranker — alternative-offering discovery over the price catalog.
//!
//! Given one catalog entry, finds the closest substitute offerings from the
//! same provider and service, scored by resource-family match and relative
//! price distance. Reads the catalog through the [`CatalogSource`] trait so
//! the engine stays independent of the concrete store.

pub mod alternatives;
pub mod catalog;

pub use alternatives::{
    find_alternatives, AlternativeCandidate, AlternativesError, AlternativesPage, DeltaDirection,
};
pub use catalog::{CatalogSource, MockCatalog, StoreCatalog};
