//! Metropolitan Museum of Art collection API.
//!
//! The Met exposes no bulk listing with full payloads: a department query
//! returns bare object IDs, and every object must then be fetched
//! individually. The adapter lists the covered departments at the start of
//! each pass and serves fixed-size chunks of per-object records from the
//! listing; the listing is cached only between that pass's cursors, so a
//! later pass always paginates the current catalog. Objects removed since
//! the listing (the API answers 404) are skipped rather than failing the
//! pass.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;
use url::Url;

use crate::Result;
use crate::config::SourceHttpConfig;

use super::{HttpClient, SourceAdapter, SourcePage, source_unavailable};

const OBJECTS_URL: &str = "https://collectionapi.metmuseum.org/public/collection/v1/objects";

/// European Paintings (11), The Robert Lehman Collection (15),
/// Drawings and Prints (9).
const DEPARTMENT_IDS: &[u32] = &[11, 15, 9];

const CHUNK_SIZE: usize = 25;

pub struct MetAdapter {
    http: HttpClient,
    base_url: String,
    object_ids: Mutex<Option<Arc<Vec<u64>>>>,
}

impl MetAdapter {
    pub fn new(config: &SourceHttpConfig) -> Self {
        Self {
            http: HttpClient::new(config),
            base_url: OBJECTS_URL.to_string(),
            object_ids: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn objects_url(&self) -> Result<Url> {
        let department_ids = DEPARTMENT_IDS
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("|");
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| crate::SyncError::Config(format!("invalid Met objects URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("departmentIds", &department_ids);
        Ok(url)
    }

    fn object_url(&self, object_id: u64) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.base_url, object_id))
            .map_err(|e| crate::SyncError::Config(format!("invalid Met object URL: {}", e)))
    }

    /// Combined object-ID listing for the covered departments. `refresh`
    /// drops the cached listing from the previous pass; mid-pass cursors
    /// reuse it so chunk offsets stay aligned with one listing.
    async fn object_ids(&self, refresh: bool) -> Result<Arc<Vec<u64>>> {
        let mut cached = self.object_ids.lock().await;
        if !refresh {
            if let Some(ids) = cached.as_ref() {
                return Ok(Arc::clone(ids));
            }
        }

        let url = self.objects_url()?;
        let body = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| source_unavailable(self.slug(), &e))?;

        let ids: Vec<u64> = body
            .get("objectIDs")
            .and_then(|ids| ids.as_array())
            .map(|ids| ids.iter().filter_map(|id| id.as_u64()).collect())
            .unwrap_or_default();

        let ids = Arc::new(ids);
        *cached = Some(Arc::clone(&ids));
        Ok(ids)
    }

    async fn fetch_object(&self, object_id: u64) -> Result<Option<Value>> {
        let url = self.object_url(object_id)?;
        match self.http.get_json(&url).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.status() == Some(404) => {
                warn!("Met object {} no longer exists, skipping", object_id);
                Ok(None)
            }
            Err(e) => Err(source_unavailable(self.slug(), &e)),
        }
    }
}

#[async_trait]
impl SourceAdapter for MetAdapter {
    fn slug(&self) -> &'static str {
        "met"
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<SourcePage> {
        let start = match cursor {
            None => 0,
            Some(cursor) => cursor.parse::<usize>().map_err(|_| {
                crate::SyncError::Config(format!("malformed source cursor: {cursor:?}"))
            })?,
        };

        let ids = self.object_ids(cursor.is_none()).await?;
        let end = (start + CHUNK_SIZE).min(ids.len());

        let mut records = Vec::with_capacity(end.saturating_sub(start));
        for &object_id in ids.get(start..end).unwrap_or_default() {
            if let Some(record) = self.fetch_object(object_id).await? {
                records.push(record);
            }
        }

        let next_cursor = if end < ids.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(SourcePage {
            records,
            next_cursor,
            total: Some(ids.len() as u64),
        })
    }
}
