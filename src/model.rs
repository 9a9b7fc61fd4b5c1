use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical artwork record produced by the normalizers.
///
/// This is the transient shape that flows through the sync pipeline; it is
/// never persisted directly. `(museum, object_number)` uniquely identifies
/// one real-world artwork across all pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkRecord {
    /// Short stable slug of the source museum (e.g. "smk", "cma").
    pub museum: String,
    /// Museum-local identifier, stable across runs. Not globally unique on
    /// its own; only the (museum, object_number) pair is.
    pub object_number: String,
    pub title: String,
    pub artists: Vec<String>,
    /// Full-resolution image URL. Required: records without a usable image
    /// are skipped by the normalizer, never indexed.
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    /// Canonical facet labels, sorted and deduplicated. May be empty.
    pub work_types: Vec<String>,
    pub production_start: Option<i32>,
    pub production_end: Option<i32>,
    /// Free-form period designation, carried through as opaque payload.
    pub period: Option<String>,
}

impl ArtworkRecord {
    /// Deterministic point identifier for the vector index and mapping
    /// table. Stable across re-syncs so repeated upserts overwrite in place
    /// rather than duplicate.
    pub fn point_id(&self) -> String {
        point_id(&self.museum, &self.object_number)
    }

    /// Text payload handed to the embedder alongside the image URL.
    pub fn embed_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.title.is_empty() {
            parts.push(&self.title);
        }
        for artist in &self.artists {
            parts.push(artist);
        }
        for work_type in &self.work_types {
            parts.push(work_type);
        }
        parts.join("; ")
    }
}

/// UUIDv5 over `"{museum}-{object_number}"` in the DNS namespace.
pub fn point_id(museum: &str, object_number: &str) -> String {
    let name = format!("{}-{}", museum, object_number);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ArtworkRecord {
        ArtworkRecord {
            museum: "cma".to_string(),
            object_number: "1953.424".to_string(),
            title: "Twilight in the Wilderness".to_string(),
            artists: vec!["Frederic Edwin Church".to_string()],
            image_url: "https://example.com/full.jpg".to_string(),
            thumbnail_url: Some("https://example.com/web.jpg".to_string()),
            work_types: vec!["painting".to_string()],
            production_start: Some(1860),
            production_end: Some(1860),
            period: None,
        }
    }

    #[test]
    fn point_id_is_deterministic() {
        assert_eq!(record().point_id(), record().point_id());
        assert_eq!(record().point_id(), point_id("cma", "1953.424"));
    }

    #[test]
    fn point_id_distinguishes_museums() {
        assert_ne!(point_id("cma", "42"), point_id("smk", "42"));
    }

    #[test]
    fn embed_text_skips_empty_fields() {
        let mut r = record();
        r.title = String::new();
        r.artists.clear();
        assert_eq!(r.embed_text(), "painting");
    }
}
