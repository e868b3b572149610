//! stratus-common — Shared types, errors, and the paced HTTP client used
//! across all Stratus crates.

pub mod config;
pub mod error;
pub mod family;
pub mod http;
pub mod model;

// Re-export commonly used types
pub use config::StratusConfig;
pub use error::FetchError;
pub use model::{PriceRecord, Provider};
