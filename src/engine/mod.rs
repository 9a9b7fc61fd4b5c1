//! Per-museum synchronization passes.
//!
//! A pass streams a museum's catalog, upserts embeddings into the vector
//! index with the mirror following along, then reconciles tombstones and
//! atomically recomputes that museum's statistics. Museums are disjoint
//! partitions: passes for different museums may run concurrently, a second
//! pass for the same museum is rejected.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::embeddings::{EmbedPayload, Embedder};
use crate::index::{IndexPoint, VectorIndex};
use crate::mirror::MirrorStore;
use crate::mirror::models::{MappingRow, NewMapping, StatisticEntry};
use crate::model::ArtworkRecord;
use crate::normalize::{Normalized, SkipReason, normalize};
use crate::sources::SourceRegistry;
use crate::{Result, SyncError};

const INDEX_WRITE_ATTEMPTS: u32 = 3;

/// Where a museum's in-flight pass currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Extracting,
    Reconciling,
    Recomputing,
}

/// Fold of per-record outcomes over one completed pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    pub museum: String,
    /// Distinct normalized records encountered, indexed or not.
    pub seen: u64,
    pub indexed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub tombstoned: u64,
    pub elapsed: Duration,
    pub skip_reasons: HashMap<&'static str, u64>,
}

impl PassSummary {
    fn new(museum: &str) -> Self {
        Self {
            museum: museum.to_string(),
            seen: 0,
            indexed: 0,
            skipped: 0,
            failed: 0,
            tombstoned: 0,
            elapsed: Duration::ZERO,
            skip_reasons: HashMap::new(),
        }
    }

    fn absorb(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Indexed => self.indexed += 1,
            RecordOutcome::Skipped(reason) => {
                self.skipped += 1;
                *self.skip_reasons.entry(reason.as_str()).or_default() += 1;
            }
            RecordOutcome::Duplicate => {
                self.skipped += 1;
                *self.skip_reasons.entry("duplicate").or_default() += 1;
            }
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Fate of one raw record inside a pass. Failures here are per-record:
/// they are tallied and the pass moves on.
#[derive(Debug, Clone, PartialEq)]
enum RecordOutcome {
    Indexed,
    Skipped(SkipReason),
    Duplicate,
    Failed(String),
}

pub struct SyncEngine {
    sources: SourceRegistry,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    mirror: MirrorStore,
    in_flight: Mutex<HashMap<String, PassState>>,
}

impl SyncEngine {
    pub fn new(
        sources: SourceRegistry,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        mirror: MirrorStore,
    ) -> Self {
        Self {
            sources,
            embedder,
            index,
            mirror,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn mirror(&self) -> &MirrorStore {
        &self.mirror
    }

    /// State of the museum's in-flight pass, if one is running.
    pub fn pass_state(&self, museum: &str) -> Option<PassState> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(museum)
            .copied()
    }

    /// Verify the embedding service before starting any pass.
    pub fn health_check(&self) -> Result<()> {
        self.embedder.health_check()
    }

    /// Run one full pass for the museum: extract, embed, upsert, reconcile
    /// tombstones, recompute statistics. Any fatal error before
    /// reconciliation leaves the mirror untouched.
    pub async fn sync_museum(&self, museum: &str) -> Result<PassSummary> {
        let adapter = self
            .sources
            .get(museum)
            .ok_or_else(|| SyncError::Config(format!("unknown museum '{}'", museum)))?;

        let _guard = self.begin_pass(museum)?;
        let started = Instant::now();
        info!("Starting sync pass for '{}'", museum);

        let mut summary = PassSummary::new(museum);
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = adapter.fetch(cursor.as_deref()).await?;
            debug!(
                "Fetched page of {} records for '{}'",
                page.records.len(),
                museum
            );

            for raw in &page.records {
                let outcome = self.process_record(museum, raw, &mut seen_ids).await?;
                if let RecordOutcome::Failed(cause) = &outcome {
                    warn!("Record failed for '{}': {}", museum, cause);
                }
                summary.absorb(outcome);
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        summary.seen = seen_ids.len() as u64;

        // The source is exhausted; anything previously mirrored but not
        // seen this pass has disappeared upstream.
        self.set_state(museum, PassState::Reconciling);
        let known = self.mirror.mapping_ids_for_museum(museum).await?;
        let tombstones: Vec<String> = known
            .into_iter()
            .filter(|id| !seen_ids.contains(id))
            .collect();

        if !tombstones.is_empty() {
            info!(
                "Tombstoning {} vanished artworks for '{}'",
                tombstones.len(),
                museum
            );
            // Index first. If every attempt fails the mapping rows stay,
            // the recompute is skipped, and the next pass retries the same
            // tombstones.
            self.delete_with_retry(&tombstones).await?;
            self.mirror.delete_mappings(&tombstones).await?;
            summary.tombstoned = tombstones.len() as u64;
        }

        self.set_state(museum, PassState::Recomputing);
        let rows = self.mirror.mappings_for_museum(museum).await?;
        let statistics = compute_statistics(&rows)?;
        self.mirror.replace_statistics(museum, &statistics).await?;

        summary.elapsed = started.elapsed();
        info!(
            "Pass for '{}' done: {} seen, {} indexed, {} skipped, {} failed, {} tombstoned in {:.1?}",
            museum,
            summary.seen,
            summary.indexed,
            summary.skipped,
            summary.failed,
            summary.tombstoned,
            summary.elapsed
        );
        Ok(summary)
    }

    async fn process_record(
        &self,
        museum: &str,
        raw: &serde_json::Value,
        seen_ids: &mut HashSet<String>,
    ) -> Result<RecordOutcome> {
        let record = match normalize(museum, raw)? {
            Normalized::Record(record) => record,
            Normalized::Skip(reason) => return Ok(RecordOutcome::Skipped(reason)),
        };

        // Mark the id seen before embedding: a transient embed failure must
        // not tombstone an artwork that is still in the catalog.
        let point_id = record.point_id();
        if !seen_ids.insert(point_id.clone()) {
            debug!("Duplicate record '{}' in feed", record.object_number);
            return Ok(RecordOutcome::Duplicate);
        }

        let vector = match self.embedder.embed(&embed_payload(&record)) {
            Ok(vector) => vector,
            Err(e) => return Ok(RecordOutcome::Failed(e.to_string())),
        };

        let point = IndexPoint {
            id: point_id.clone(),
            vector,
            payload: (&record).into(),
        };
        if let Err(e) = self.upsert_with_retry(&point).await {
            return Ok(RecordOutcome::Failed(e.to_string()));
        }

        // Mirror write failures are fatal: a mirror that silently drifts
        // from the index defeats reconciliation.
        self.mirror
            .upsert_mapping(&NewMapping {
                point_id,
                museum: record.museum.clone(),
                object_number: record.object_number.clone(),
                work_types: record.work_types.clone(),
            })
            .await?;

        Ok(RecordOutcome::Indexed)
    }

    async fn upsert_with_retry(&self, point: &IndexPoint) -> Result<()> {
        let mut last_error = None;

        for attempt in 0..INDEX_WRITE_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
            }
            match self.index.upsert(std::slice::from_ref(point)).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Index upsert attempt {} failed for '{}': {}",
                        attempt + 1,
                        point.id,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SyncError::IndexWrite("index upsert retry budget exhausted".to_string())
        }))
    }

    /// Tombstone deletion gets the same bounded retry as upserts; only an
    /// exhausted budget aborts the reconciliation.
    async fn delete_with_retry(&self, ids: &[String]) -> Result<()> {
        let mut last_error = None;

        for attempt in 0..INDEX_WRITE_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
            }
            match self.index.delete(ids).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Index delete attempt {} failed for {} tombstones: {}",
                        attempt + 1,
                        ids.len(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SyncError::IndexWrite("index delete retry budget exhausted".to_string())
        }))
    }

    fn begin_pass(&self, museum: &str) -> Result<PassGuard<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if in_flight.contains_key(museum) {
            return Err(SyncError::PassInProgress {
                museum: museum.to_string(),
            });
        }

        in_flight.insert(museum.to_string(), PassState::Extracting);
        Ok(PassGuard {
            engine: self,
            museum: museum.to_string(),
        })
    }

    fn set_state(&self, museum: &str, state: PassState) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = in_flight.get_mut(museum) {
            *entry = state;
        }
    }
}

/// Releases the per-museum in-flight slot when the pass ends, success or
/// abort alike.
struct PassGuard<'a> {
    engine: &'a SyncEngine,
    museum: String,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.engine
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.museum);
    }
}

fn embed_payload(record: &ArtworkRecord) -> EmbedPayload {
    EmbedPayload {
        text: record.embed_text(),
        // The service downloads the image; the thumbnail is plenty for
        // embedding and far cheaper to fetch.
        image_url: record
            .thumbnail_url
            .clone()
            .unwrap_or_else(|| record.image_url.clone()),
    }
}

/// Pure projection of a museum's statistics from its mapping rows: one
/// entry per distinct work type, plus the museum-wide total under the
/// NULL sentinel.
pub fn compute_statistics(rows: &[MappingRow]) -> Result<Vec<StatisticEntry>> {
    let mut per_type: BTreeMap<String, i64> = BTreeMap::new();
    for row in rows {
        for work_type in row.decode_work_types()? {
            *per_type.entry(work_type).or_default() += 1;
        }
    }

    let mut entries = Vec::with_capacity(per_type.len() + 1);
    entries.push(StatisticEntry {
        work_type: None,
        count: rows.len() as i64,
    });
    entries.extend(per_type.into_iter().map(|(work_type, count)| StatisticEntry {
        work_type: Some(work_type),
        count,
    }));
    Ok(entries)
}
