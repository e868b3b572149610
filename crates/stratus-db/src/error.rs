use thiserror::Error;

/// Store-side failures. Scoped to one provider batch by the orchestrator;
/// sibling providers keep ingesting.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store rejected batch: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
