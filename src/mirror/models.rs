use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::{Result, SyncError};

/// Row of `artwork_work_type_mapping`: the relational shadow of one
/// indexed point.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MappingRow {
    pub point_id: String,
    pub museum: String,
    pub object_number: String,
    /// JSON-encoded list of canonical work types.
    pub work_types: String,
    pub last_updated: DateTime<Utc>,
}

impl MappingRow {
    pub fn decode_work_types(&self) -> Result<Vec<String>> {
        serde_json::from_str(&self.work_types).map_err(|e| {
            SyncError::MirrorWrite(format!(
                "corrupt work_types for point '{}': {}",
                self.point_id, e
            ))
        })
    }
}

/// Mapping data for one freshly indexed point.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMapping {
    pub point_id: String,
    pub museum: String,
    pub object_number: String,
    pub work_types: Vec<String>,
}

/// Row of `artwork_statistics`. `work_type` of `None` is the museum-wide
/// total.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StatisticRow {
    pub museum: String,
    pub work_type: Option<String>,
    pub count: i64,
    pub last_updated: DateTime<Utc>,
}

/// One statistic value to write during a recompute, scoped to the museum
/// being recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticEntry {
    pub work_type: Option<String>,
    pub count: i64,
}
