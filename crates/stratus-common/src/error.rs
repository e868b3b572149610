use thiserror::Error;

/// Failure of a provider fetch after the retry budget is spent, or a
/// non-retriable response. Scoped to one sub-service pipeline; the
/// orchestrator catches it and continues with siblings.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url} after {attempts} attempt(s)")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        attempts: u32,
    },

    #[error("transport failure after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response shape from {url}: {detail}")]
    Shape { url: String, detail: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Configuration file problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
