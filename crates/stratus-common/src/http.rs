//! Paced, retrying HTTP client.
//! See ARCHITECTURE.md §2 (provider clients)
//!
//! One `PacedClient` exists per provider source and is shared across all of
//! that provider's pages and sub-service pipelines. It owns the provider's
//! rate-limit clock (last-call instant) so pacing state never leaks across
//! providers or tests.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::error::FetchError;

/// Exponent cap for the backoff doubling; keeps the worst-case wait bounded.
const MAX_BACKOFF_EXPONENT: u32 = 6;

pub struct PacedClient {
    client: Client,
    min_interval: Duration,
    jitter: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    last_call: AsyncMutex<Option<Instant>>,
    jitter_rng: StdMutex<StdRng>,
}

impl PacedClient {
    pub fn new(cfg: &HttpConfig) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            client,
            min_interval: Duration::from_millis(cfg.min_interval_ms),
            jitter: Duration::from_millis(cfg.jitter_ms),
            max_attempts: cfg.max_attempts.max(1),
            base_backoff: Duration::from_millis(cfg.base_backoff_ms),
            last_call: AsyncMutex::new(None),
            jitter_rng: StdMutex::new(StdRng::from_entropy()),
        })
    }

    /// GET a JSON document, paced and retried.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Value, FetchError> {
        self.request_json(url, || {
            let mut req = self.client.get(url);
            if !query.is_empty() {
                req = req.query(query);
            }
            req
        })
        .await
    }

    /// POST a JSON body and read a JSON document back. Extra headers carry
    /// protocol framing such as AWS's `X-Amz-Target`.
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &[(&'static str, String)],
    ) -> Result<Value, FetchError> {
        self.request_json(url, || {
            let mut req = self.client.post(url).json(body);
            for (name, value) in headers {
                req = req.header(*name, value);
            }
            req
        })
        .await
    }

    async fn request_json<F>(&self, url: &str, build: F) -> Result<Value, FetchError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.pace().await;

            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<Value>().await.map_err(|e| FetchError::Shape {
                            url: url.to_string(),
                            detail: e.to_string(),
                        });
                    }

                    if !is_retriable(status) {
                        return Err(FetchError::Status {
                            status,
                            url: url.to_string(),
                            attempts: attempt,
                        });
                    }

                    if attempt >= self.max_attempts {
                        return Err(FetchError::Status {
                            status,
                            url: url.to_string(),
                            attempts: attempt,
                        });
                    }

                    // Prefer the server's own hint over computed backoff.
                    let delay = retry_after(&resp).unwrap_or_else(|| self.backoff_delay(attempt));
                    warn!(
                        %url,
                        %status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate-limited or server error; retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    if attempt >= self.max_attempts {
                        return Err(FetchError::Transport {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        %url,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "transport failure; retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Enforce the minimum gap (plus jitter) since this client's last call.
    async fn pace(&self) {
        let interval = self.min_interval + self.jitter_sample();
        let mut guard = self.last_call.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < interval {
                debug!(wait_ms = (interval - elapsed).as_millis() as u64, "pacing");
                sleep(interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }

    /// base × 2^(attempt−1), exponent-capped, plus jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_backoff * (1u32 << exponent) + self.jitter_sample()
    }

    fn jitter_sample(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let ms = match self.jitter_rng.lock() {
            Ok(mut rng) => rng.gen_range(0..max_ms),
            Err(_) => 0,
        };
        Duration::from_millis(ms)
    }
}

fn is_retriable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Parse a `Retry-After` seconds value if the response carries one.
fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
