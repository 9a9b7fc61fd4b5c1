//! Client for the external CLIP embedding service.
//!
//! The service exposes a small HTTP API: `POST /embed` takes the artwork's
//! text payload and image URL and returns one joint vector; `GET /health`
//! reports readiness and the loaded model. Embedding failures are
//! per-record: the engine records them and moves on, they never abort a
//! pass.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::{Result, SyncError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Input for one embedding request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedPayload {
    pub text: String,
    pub image_url: String,
}

/// Produces fixed-dimension vectors for artwork payloads.
pub trait Embedder: Send + Sync {
    /// Dimension of every vector this embedder returns.
    fn dimension(&self) -> usize;

    fn embed(&self, payload: &EmbedPayload) -> Result<Vec<f32>>;

    /// Verify the service is reachable and serving the expected model.
    fn health_check(&self) -> Result<()>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    text: &'a str,
    image_url: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    model: Option<String>,
}

/// HTTP implementation of [`Embedder`] backed by `ureq`.
pub struct EmbeddingClient {
    agent: ureq::Agent,
    base_url: Url,
    model: String,
    dimension: usize,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .service_url()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();

        Ok(Self {
            agent,
            base_url,
            model: config.model.clone(),
            dimension: config.dimension as usize,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SyncError::Config(format!("invalid embedding service URL: {}", e)))
    }

    fn post_embed(&self, payload: &EmbedPayload) -> Result<Vec<f32>, String> {
        let url = self.endpoint("/embed").map_err(|e| e.to_string())?;

        let request = EmbedRequest {
            model: &self.model,
            text: &payload.text,
            image_url: &payload.image_url,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| format!("failed to serialize request: {}", e))?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| format!("embedding request failed: {}", e))?;

        let parsed: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| format!("invalid embedding response: {}", e))?;

        Ok(parsed.embedding)
    }
}

impl Embedder for EmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, payload: &EmbedPayload) -> Result<Vec<f32>> {
        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retrying embedding request (attempt {})", attempt + 1);
                std::thread::sleep(RETRY_DELAY * attempt);
            }

            match self.post_embed(payload) {
                Ok(vector) => {
                    if vector.len() != self.dimension {
                        // A dimension mismatch is a deployment problem, not a
                        // transient fault; retrying cannot fix it.
                        return Err(SyncError::Embedding(format!(
                            "service returned {}-dimensional vector, expected {}",
                            vector.len(),
                            self.dimension
                        )));
                    }
                    return Ok(vector);
                }
                Err(e) => {
                    warn!("Embedding attempt {} failed: {}", attempt + 1, e);
                    last_error = e;
                }
            }
        }

        Err(SyncError::Embedding(format!(
            "all {} attempts failed: {}",
            MAX_RETRIES, last_error
        )))
    }

    fn health_check(&self) -> Result<()> {
        let url = self.endpoint("/health")?;

        let response_text = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| SyncError::Embedding(format!("health check failed: {}", e)))?;

        let health: HealthResponse = serde_json::from_str(&response_text)
            .map_err(|e| SyncError::Embedding(format!("invalid health response: {}", e)))?;

        if health.status != "ok" {
            return Err(SyncError::Embedding(format!(
                "embedding service not ready: status '{}'",
                health.status
            )));
        }

        if let Some(served) = &health.model {
            if served != &self.model {
                return Err(SyncError::Embedding(format!(
                    "embedding service serves model '{}', expected '{}'",
                    served, self.model
                )));
            }
        }

        Ok(())
    }
}
