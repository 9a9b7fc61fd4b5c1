//! Rijksmuseum Amsterdam linked-data API.
//!
//! Listing goes through the collection search endpoint, which returns JSON
//! pages with an opaque `pageToken` and one query bucket per work type.
//! The listing only carries item IDs; the full record comes from a
//! per-item OAI-PMH `GetRecord` call whose EDM payload is XML, converted
//! to JSON so the normalizer can address it like any other source.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::config::SourceHttpConfig;
use crate::{Result, SyncError};

use super::{HttpClient, SourceAdapter, SourcePage, source_unavailable, xml};

const SEARCH_URL: &str = "https://data.rijksmuseum.nl/search/collection";
const OAI_URL: &str = "https://data.rijksmuseum.nl/oai";
const RECORD_ID_PREFIX: &str = "https://id.rijksmuseum.nl/";

const WORK_TYPES: &[&str] = &["painting", "drawing"];

pub struct RmaAdapter {
    http: HttpClient,
    search_url: String,
    oai_url: String,
}

impl RmaAdapter {
    pub fn new(config: &SourceHttpConfig) -> Self {
        Self {
            http: HttpClient::new(config),
            search_url: SEARCH_URL.to_string(),
            oai_url: OAI_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_urls(
        mut self,
        search_url: impl Into<String>,
        oai_url: impl Into<String>,
    ) -> Self {
        self.search_url = search_url.into();
        self.oai_url = oai_url.into();
        self
    }

    fn search_page_url(&self, work_type: &str, page_token: &str) -> Result<Url> {
        let mut url = Url::parse(&self.search_url)
            .map_err(|e| SyncError::Config(format!("invalid RMA search URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("type", work_type)
            .append_pair("pageToken", page_token);
        Ok(url)
    }

    fn record_url(&self, item_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.oai_url)
            .map_err(|e| SyncError::Config(format!("invalid RMA OAI URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("verb", "GetRecord")
            .append_pair("metadataPrefix", "edm")
            .append_pair("identifier", &format!("{}{}", RECORD_ID_PREFIX, item_id));
        Ok(url)
    }

    /// Fetch one item's EDM record over OAI-PMH. Items whose record element
    /// is missing from the response are skipped rather than failing the
    /// pass.
    async fn fetch_record(&self, item_id: &str) -> Result<Option<Value>> {
        let url = self.record_url(item_id)?;
        let body = self
            .http
            .get_text(&url)
            .await
            .map_err(|e| source_unavailable(self.slug(), &e))?;

        let document = xml::document_to_value(&body).map_err(|e| SyncError::SourceUnavailable {
            museum: self.slug().to_string(),
            message: format!("invalid OAI response for '{}': {}", item_id, e),
        })?;

        let record = document.pointer("/OAI-PMH/GetRecord/record").cloned();
        if record.is_none() {
            warn!("RMA item '{}' has no OAI record, skipping", item_id);
        }
        Ok(record)
    }
}

#[async_trait]
impl SourceAdapter for RmaAdapter {
    fn slug(&self) -> &'static str {
        "rma"
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<SourcePage> {
        let (bucket, page_token) = parse_cursor(cursor)?;
        let Some(work_type) = WORK_TYPES.get(bucket) else {
            return Ok(SourcePage::default());
        };

        let url = self.search_page_url(work_type, &page_token)?;
        let body = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| source_unavailable(self.slug(), &e))?;

        let total = body.pointer("/partOf/totalItems").and_then(Value::as_u64);
        let items: Vec<Value> = body
            .get("orderedItems")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            let Some(item_id) = item
                .get("id")
                .and_then(Value::as_str)
                .and_then(|id| id.rsplit('/').next())
            else {
                continue;
            };
            if let Some(record) = self.fetch_record(item_id).await? {
                records.push(record);
            }
        }

        let next_token = body
            .pointer("/next/id")
            .and_then(Value::as_str)
            .and_then(page_token_of);
        let next_cursor = match next_token {
            Some(token) => Some(format_cursor(bucket, &token)),
            None if bucket + 1 < WORK_TYPES.len() => Some(format_cursor(bucket + 1, "")),
            None => None,
        };

        Ok(SourcePage {
            records,
            next_cursor,
            total,
        })
    }
}

/// Cursor shaped `"bucket:pageToken"`; the token is the search API's own
/// opaque continuation value and may be empty at a bucket start.
fn parse_cursor(cursor: Option<&str>) -> Result<(usize, String)> {
    let Some(cursor) = cursor else {
        return Ok((0, String::new()));
    };

    let parsed = cursor
        .split_once(':')
        .and_then(|(bucket, token)| Some((bucket.parse::<usize>().ok()?, token.to_string())));

    parsed.ok_or_else(|| SyncError::Config(format!("malformed source cursor: {cursor:?}")))
}

fn format_cursor(bucket: usize, page_token: &str) -> String {
    format!("{}:{}", bucket, page_token)
}

/// `pageToken` query parameter of the API's `next` page link.
fn page_token_of(next_url: &str) -> Option<String> {
    let url = Url::parse(next_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "pageToken")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.trim().is_empty())
}
