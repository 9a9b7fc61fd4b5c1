//! Art Institute of Chicago API.
//!
//! Uses the artworks listing endpoint with page pagination and an explicit
//! field list. The API has no server-side public-domain or type filter on
//! the listing endpoint, so those checks happen in the normalizer. AIC asks
//! bulk consumers to keep request rates low, hence the stricter floor on
//! the inter-request delay.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::Result;
use crate::config::SourceHttpConfig;

use super::{HttpClient, SourceAdapter, SourcePage, source_unavailable};

const LISTING_URL: &str = "https://api.artic.edu/api/v1/artworks";
const PAGE_SIZE: u64 = 100;
const MIN_REQUEST_DELAY: Duration = Duration::from_secs(3);

const FIELDS: &str = "id,title,main_reference_number,artist_titles,image_id,\
    is_public_domain,artwork_type_title,date_start,date_end,date_display";

pub struct AicAdapter {
    http: HttpClient,
    base_url: String,
}

impl AicAdapter {
    pub fn new(config: &SourceHttpConfig) -> Self {
        Self {
            http: HttpClient::new(config).with_min_rate_limit(MIN_REQUEST_DELAY),
            base_url: LISTING_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn listing_url(&self, page: u64) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| crate::SyncError::Config(format!("invalid AIC listing URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("fields", FIELDS)
            .append_pair("page", &page.to_string())
            .append_pair("limit", &PAGE_SIZE.to_string());
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for AicAdapter {
    fn slug(&self) -> &'static str {
        "aic"
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<SourcePage> {
        let page = match cursor {
            None => 1,
            Some(cursor) => cursor
                .parse::<u64>()
                .map_err(|_| crate::SyncError::Config(format!("malformed source cursor: {cursor:?}")))?,
        };

        let url = self.listing_url(page)?;
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

        let total_pages = body
            .pointer("/pagination/total_pages")
            .and_then(|t| t.as_u64())
            .unwrap_or(0);
        let total = body.pointer("/pagination/total").and_then(|t| t.as_u64());

        let next_cursor = if page < total_pages && !records.is_empty() {
            Some((page + 1).to_string())
        } else {
            None
        };

        Ok(SourcePage {
            records,
            next_cursor,
            total,
        })
    }
}
