//! Cleveland Museum of Art open-access API.
//!
//! One query per supported artwork type, restricted to CC0 works with
//! images, paged with skip/limit.

use async_trait::async_trait;
use url::Url;

use crate::Result;
use crate::config::SourceHttpConfig;

use super::{
    HttpClient, SourceAdapter, SourcePage, format_bucket_cursor, parse_bucket_cursor,
    source_unavailable,
};

const SEARCH_URL: &str = "https://openaccess-api.clevelandart.org/api/artworks/";
const PAGE_SIZE: u64 = 100;

const WORK_TYPES: &[&str] = &["Print", "Painting", "Drawing"];

pub struct CmaAdapter {
    http: HttpClient,
    base_url: String,
}

impl CmaAdapter {
    pub fn new(config: &SourceHttpConfig) -> Self {
        Self {
            http: HttpClient::new(config),
            base_url: SEARCH_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn search_url(&self, work_type: &str, skip: u64) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| crate::SyncError::Config(format!("invalid CMA search URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("q", "")
            .append_pair("has_image", "1")
            .append_pair("cc0", "1")
            .append_pair("type", work_type)
            .append_pair("skip", &skip.to_string())
            .append_pair("limit", &PAGE_SIZE.to_string());
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for CmaAdapter {
    fn slug(&self) -> &'static str {
        "cma"
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<SourcePage> {
        let (bucket, skip) = parse_bucket_cursor(cursor)?;

        let Some(work_type) = WORK_TYPES.get(bucket) else {
            return Ok(SourcePage::default());
        };

        let url = self.search_url(work_type, skip)?;
        let body = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| source_unavailable(self.slug(), &e))?;

        let records: Vec<serde_json::Value> = body
            .get("data")
            .and_then(|data| data.as_array())
            .cloned()
            .unwrap_or_default();

        let total = body
            .pointer("/info/total")
            .and_then(|t| t.as_u64())
            .unwrap_or(0);

        let next_cursor = if skip + PAGE_SIZE < total && !records.is_empty() {
            Some(format_bucket_cursor(bucket, skip + PAGE_SIZE))
        } else if bucket + 1 < WORK_TYPES.len() {
            Some(format_bucket_cursor(bucket + 1, 0))
        } else {
            None
        };

        Ok(SourcePage {
            records,
            next_cursor,
            total: None,
        })
    }
}
