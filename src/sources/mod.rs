pub mod aic;
pub mod cma;
pub mod met;
pub mod rma;
pub mod smk;
mod xml;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::config::SourceHttpConfig;
use crate::{Result, SyncError};

/// Museums with a built-in source adapter.
pub const SUPPORTED_MUSEUMS: &[MuseumInfo] = &[
    MuseumInfo {
        slug: "smk",
        full_name: "Statens Museum for Kunst",
        short_name: "SMK",
    },
    MuseumInfo {
        slug: "cma",
        full_name: "Cleveland Museum of Art",
        short_name: "Cleveland",
    },
    MuseumInfo {
        slug: "aic",
        full_name: "Art Institute of Chicago",
        short_name: "Art Institute of Chicago",
    },
    MuseumInfo {
        slug: "met",
        full_name: "Metropolitan Museum of Art",
        short_name: "The Met",
    },
    MuseumInfo {
        slug: "rma",
        full_name: "Rijksmuseum Amsterdam",
        short_name: "Rijksmuseum",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuseumInfo {
    pub slug: &'static str,
    pub full_name: &'static str,
    pub short_name: &'static str,
}

/// One page of raw records from a museum API.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    /// Raw records in the museum's native shape.
    pub records: Vec<Value>,
    /// Opaque cursor for the next page; `None` means the extraction is done.
    pub next_cursor: Option<String>,
    /// Total catalog size when the source reports one.
    pub total: Option<u64>,
}

/// A paginated, rate-limited museum catalog source.
///
/// `fetch(None)` starts a pass from the beginning; each returned cursor
/// resumes where the previous page left off. Implementations must issue
/// requests sequentially and apply the source API's own rate limit.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn slug(&self) -> &'static str;

    async fn fetch(&self, cursor: Option<&str>) -> Result<SourcePage>;
}

/// Static registry mapping a museum slug to its adapter, assembled once at
/// startup from explicit configuration.
#[derive(Clone)]
pub struct SourceRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("slugs", &self.slugs())
            .finish()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry wired with every built-in museum adapter.
    pub fn builtin(config: &SourceHttpConfig) -> Self {
        let mut registry = Self::new();
        registry.insert(Arc::new(smk::SmkAdapter::new(config)));
        registry.insert(Arc::new(cma::CmaAdapter::new(config)));
        registry.insert(Arc::new(aic::AicAdapter::new(config)));
        registry.insert(Arc::new(met::MetAdapter::new(config)));
        registry.insert(Arc::new(rma::RmaAdapter::new(config)));
        registry
    }

    /// Register an adapter. The slug must have a matching normalizer, or
    /// every record the adapter serves would abort the pass.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> Result<()> {
        if !crate::normalize::supported(adapter.slug()) {
            return Err(SyncError::Config(format!(
                "no normalizer for source '{}'",
                adapter.slug()
            )));
        }
        self.insert(adapter);
        Ok(())
    }

    fn insert(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.slug().to_string(), adapter);
    }

    pub fn get(&self, slug: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(slug).cloned()
    }

    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.adapters.keys().cloned().collect();
        slugs.sort();
        slugs
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport { .. } => None,
        }
    }
}

/// HTTP client shared by the adapters: sequential requests, inter-request
/// delay, bounded retries with exponential backoff on 5xx/429/transport
/// errors.
#[derive(Debug)]
pub struct HttpClient {
    agent: ureq::Agent,
    rate_limit: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpClient {
    pub fn new(config: &SourceHttpConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            rate_limit: Duration::from_millis(config.rate_limit_ms),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            last_request: Mutex::new(None),
        }
    }

    /// Enforce a stricter inter-request delay than the configured one.
    /// Used by adapters whose API demands extra politeness.
    pub fn with_min_rate_limit(mut self, min: Duration) -> Self {
        if self.rate_limit < min {
            self.rate_limit = min;
        }
        self
    }

    /// GET the URL and parse the response body as JSON, retrying retryable
    /// failures up to the configured budget.
    pub async fn get_json(&self, url: &Url) -> Result<Value, FetchError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("invalid JSON response: {}", e),
        })
    }

    /// GET the URL and return the raw response body, retrying retryable
    /// failures up to the configured budget.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
                sleep(delay).await;
            }

            self.apply_rate_limit().await;

            match self.try_get(url) {
                Ok(body) => return Ok(body),
                Err(e) if is_retryable(&e) => {
                    warn!("Retryable error for {}: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Transport {
            url: url.to_string(),
            message: "retry budget exhausted".to_string(),
        }))
    }

    async fn apply_rate_limit(&self) {
        let wait = {
            let guard = self
                .last_request
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard.and_then(|last| self.rate_limit.checked_sub(last.elapsed()))
        };

        if let Some(wait) = wait {
            debug!("Rate limiting: sleeping for {:?}", wait);
            sleep(wait).await;
        }

        let mut guard = self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Instant::now());
    }

    fn try_get(&self, url: &Url) -> Result<String, FetchError> {
        debug!("GET {}", url);

        match self.agent.get(url.as_str()).call() {
            Ok(mut response) => {
                response
                    .body_mut()
                    .read_to_string()
                    .map_err(|e| FetchError::Transport {
                        url: url.to_string(),
                        message: format!("failed to read response body: {}", e),
                    })
            }
            Err(ureq::Error::StatusCode(status)) => Err(FetchError::Status {
                status,
                url: url.to_string(),
            }),
            Err(e) => Err(FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

fn is_retryable(error: &FetchError) -> bool {
    match error {
        FetchError::Status { status, .. } => *status >= 500 || *status == 429,
        FetchError::Transport { .. } => true,
    }
}

/// Cursor for adapters that page through a sequence of query buckets
/// (e.g. one bucket per work-type filter), formatted as `"bucket:offset"`.
pub(crate) fn parse_bucket_cursor(cursor: Option<&str>) -> Result<(usize, u64)> {
    let Some(cursor) = cursor else {
        return Ok((0, 0));
    };

    let parsed = cursor.split_once(':').and_then(|(bucket, offset)| {
        Some((bucket.parse::<usize>().ok()?, offset.parse::<u64>().ok()?))
    });

    parsed.ok_or_else(|| SyncError::Config(format!("malformed source cursor: {cursor:?}")))
}

pub(crate) fn format_bucket_cursor(bucket: usize, offset: u64) -> String {
    format!("{}:{}", bucket, offset)
}

/// Helper for adapters: wrap a fetch failure into the pass-aborting
/// `SourceUnavailable` error.
pub(crate) fn source_unavailable(slug: &str, error: &FetchError) -> SyncError {
    SyncError::SourceUnavailable {
        museum: slug.to_string(),
        message: error.to_string(),
    }
}
