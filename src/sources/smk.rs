//! Statens Museum for Kunst open-data API.
//!
//! The search endpoint is queried once per supported work-type filter
//! (the API exposes Danish object-name facets), with offset pagination
//! inside each filter bucket.

use async_trait::async_trait;
use url::Url;

use crate::Result;
use crate::config::SourceHttpConfig;

use super::{
    HttpClient, SourceAdapter, SourcePage, format_bucket_cursor, parse_bucket_cursor,
    source_unavailable,
};

const SEARCH_URL: &str = "https://api.smk.dk/api/v1/art/search/";
const PAGE_SIZE: u64 = 100;

/// Danish object-name facets queried in order. The normalizer maps these
/// back to canonical English work-type labels.
const WORK_TYPE_FILTERS: &[&str] = &[
    "maleri",
    "tegning",
    "akvarel",
    "pastel",
    "akvatinte",
    "buste",
];

pub struct SmkAdapter {
    http: HttpClient,
    base_url: String,
}

impl SmkAdapter {
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

    fn search_url(&self, work_type: &str, offset: u64) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| crate::SyncError::Config(format!("invalid SMK search URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("keys", "*")
            .append_pair("filters", &format!("[has_image:true],[object_names:{work_type}],[public_domain:true]"))
            .append_pair("offset", &offset.to_string())
            .append_pair("rows", &PAGE_SIZE.to_string());
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for SmkAdapter {
    fn slug(&self) -> &'static str {
        "smk"
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<SourcePage> {
        let (bucket, offset) = parse_bucket_cursor(cursor)?;

        let Some(work_type) = WORK_TYPE_FILTERS.get(bucket) else {
            return Ok(SourcePage::default());
        };

        let url = self.search_url(work_type, offset)?;
        let body = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| source_unavailable(self.slug(), &e))?;

        let records: Vec<serde_json::Value> = body
            .get("items")
            .and_then(|items| items.as_array())
            .cloned()
            .unwrap_or_default();

        let found = body.get("found").and_then(|f| f.as_u64()).unwrap_or(0);

        // Advance within the current filter bucket, or move to the next one
        // once this bucket is exhausted.
        let next_cursor = if offset + PAGE_SIZE < found && !records.is_empty() {
            Some(format_bucket_cursor(bucket, offset + PAGE_SIZE))
        } else if bucket + 1 < WORK_TYPE_FILTERS.len() {
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
