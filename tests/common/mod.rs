//! Scripted fakes for engine tests. Records flow through the real
//! normalizers and a real temp-file mirror; only the network edges (source
//! feed, embedding service) and the vector store are faked.

use artsync::embeddings::{EmbedPayload, Embedder};
use artsync::index::{IndexPoint, ScoredPoint, SearchFilter, VectorIndex};
use artsync::sources::{SourceAdapter, SourcePage};
use artsync::{Result, SyncError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const DIM: usize = 8;

/// Raw CMA-shaped record, exercised through the real `cma` normalizer.
pub fn cma_record(accession_number: &str, work_type: &str) -> Value {
    json!({
        "accession_number": accession_number,
        "title": format!("Artwork {}", accession_number),
        "share_license_status": "CC0",
        "type": work_type,
        "creators": [{"description": "Anonymous"}],
        "images": {"web": {"url": format!("https://example.com/{}.jpg", accession_number)}}
    })
}

/// Raw SMK-shaped record, exercised through the real `smk` normalizer.
pub fn smk_record(object_number: &str, object_name: &str) -> Value {
    json!({
        "object_number": object_number,
        "public_domain": true,
        "image_native": format!("https://iip.smk.dk/{}.jpg", object_number),
        "titles": [{"title": format!("Artwork {}", object_number)}],
        "artist": ["Anonymous"],
        "object_names": [{"name": object_name}]
    })
}

/// CMA-shaped record with no image, which the normalizer must skip.
pub fn cma_record_without_image(accession_number: &str) -> Value {
    json!({
        "accession_number": accession_number,
        "title": format!("Artwork {}", accession_number),
        "share_license_status": "CC0",
        "type": "Painting"
    })
}

/// Source serving a fixed script of pages, optionally failing at one page
/// and optionally delaying each fetch.
pub struct ScriptedSource {
    slug: &'static str,
    pages: Vec<Vec<Value>>,
    fail_at_page: Option<usize>,
    delay: Duration,
}

impl ScriptedSource {
    pub fn new(slug: &'static str, pages: Vec<Vec<Value>>) -> Self {
        Self {
            slug,
            pages,
            fail_at_page: None,
            delay: Duration::ZERO,
        }
    }

    pub fn failing_at_page(mut self, page: usize) -> Self {
        self.fail_at_page = Some(page);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn slug(&self) -> &'static str {
        self.slug
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<SourcePage> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let page = match cursor {
            None => 0,
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| SyncError::Config(format!("bad cursor {cursor:?}")))?,
        };

        if self.fail_at_page == Some(page) {
            return Err(SyncError::SourceUnavailable {
                museum: self.slug.to_string(),
                message: "scripted outage".to_string(),
            });
        }

        let records = self.pages.get(page).cloned().unwrap_or_default();
        let next_cursor = if page + 1 < self.pages.len() {
            Some((page + 1).to_string())
        } else {
            None
        };

        Ok(SourcePage {
            records,
            next_cursor,
            total: Some(self.pages.iter().map(Vec::len).sum::<usize>() as u64),
        })
    }
}

/// Deterministic embedder: the vector is a function of the payload text.
/// Optionally fails for payloads containing a marker substring.
pub struct FakeEmbedder {
    fail_if_contains: Option<String>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            fail_if_contains: None,
        }
    }

    pub fn failing_for(marker: &str) -> Self {
        Self {
            fail_if_contains: Some(marker.to_string()),
        }
    }
}

impl Embedder for FakeEmbedder {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, payload: &EmbedPayload) -> Result<Vec<f32>> {
        if let Some(marker) = &self.fail_if_contains {
            if payload.text.contains(marker) {
                return Err(SyncError::Embedding("scripted embed failure".to_string()));
            }
        }

        let seed: u32 = payload.text.bytes().map(u32::from).sum();
        Ok((0..DIM)
            .map(|i| ((seed + i as u32) % 97) as f32 / 97.0)
            .collect())
    }

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory vector index keyed by point id.
#[derive(Default)]
pub struct FakeIndex {
    points: Mutex<HashMap<String, IndexPoint>>,
    failing_deletes: Mutex<u32>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delete fails, past any retry budget.
    pub fn failing_deletes() -> Self {
        Self::flaky_deletes(u32::MAX)
    }

    /// The first `count` delete calls fail, later ones succeed.
    pub fn flaky_deletes(count: u32) -> Self {
        Self {
            points: Mutex::new(HashMap::new()),
            failing_deletes: Mutex::new(count),
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .points
            .lock()
            .expect("index lock")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl VectorIndex for FakeIndex {
    async fn upsert(&self, points: &[IndexPoint]) -> Result<()> {
        let mut map = self.points.lock().expect("index lock");
        for point in points {
            map.insert(point.id.clone(), point.clone());
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        {
            let mut remaining = self.failing_deletes.lock().expect("failure counter lock");
            if *remaining > 0 {
                *remaining = remaining.saturating_sub(1);
                return Err(SyncError::IndexWrite("scripted delete failure".to_string()));
            }
        }
        let mut map = self.points.lock().expect("index lock");
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let map = self.points.lock().expect("index lock");
        let mut hits: Vec<ScoredPoint> = map
            .values()
            .filter(|p| {
                filter
                    .museum
                    .as_ref()
                    .is_none_or(|m| &p.payload.museum == m)
            })
            .filter(|p| {
                filter
                    .work_type
                    .as_ref()
                    .is_none_or(|w| p.payload.work_types.contains(w))
            })
            .map(|p| {
                let distance: f32 = p
                    .vector
                    .iter()
                    .zip(vector)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                ScoredPoint {
                    id: p.id.clone(),
                    payload: p.payload.clone(),
                    distance,
                    similarity: 1.0 - distance,
                }
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self, museum: Option<&str>) -> Result<u64> {
        let map = self.points.lock().expect("index lock");
        Ok(map
            .values()
            .filter(|p| museum.is_none_or(|m| p.payload.museum == m))
            .count() as u64)
    }

    async fn ids_for_museum(&self, museum: &str) -> Result<Vec<String>> {
        let map = self.points.lock().expect("index lock");
        Ok(map
            .values()
            .filter(|p| p.payload.museum == museum)
            .map(|p| p.id.clone())
            .collect())
    }
}
