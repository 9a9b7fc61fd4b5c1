//! Vector index over artwork embeddings, backed by LanceDB.
//!
//! The index is the source of truth for what is searchable; the SQLite
//! mirror is derived from it. Upserts are keyed by point id so repeated
//! syncs overwrite in place.


use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use itertools::Itertools;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::model::ArtworkRecord;
use crate::{Result, SyncError};

const TABLE_NAME: &str = "artworks";

/// Descriptive payload stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub museum: String,
    pub object_number: String,
    pub title: String,
    pub artists: Vec<String>,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub work_types: Vec<String>,
    pub production_start: Option<i32>,
    pub production_end: Option<i32>,
    pub period: Option<String>,
}

impl From<&ArtworkRecord> for PointPayload {
    fn from(record: &ArtworkRecord) -> Self {
        Self {
            museum: record.museum.clone(),
            object_number: record.object_number.clone(),
            title: record.title.clone(),
            artists: record.artists.clone(),
            image_url: record.image_url.clone(),
            thumbnail_url: record.thumbnail_url.clone(),
            work_types: record.work_types.clone(),
            production_start: record.production_start,
            production_end: record.production_end,
            period: record.period.clone(),
        }
    }
}

/// One embedded artwork ready for the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Optional narrowing of a similarity query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub museum: Option<String>,
    pub work_type: Option<String>,
}

impl SearchFilter {
    fn predicate(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(museum) = &self.museum {
            clauses.push(museum_predicate(museum));
        }
        if let Some(work_type) = &self.work_type {
            // work_types is a JSON-encoded list; match the quoted element.
            let pattern = format!("%\"{}\"%", work_type.replace('\'', "''"));
            clauses.push(format!("work_types LIKE '{}'", pattern));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }
}

/// Search hit with its distance converted to a similarity score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub payload: PointPayload,
    pub distance: f32,
    pub similarity: f32,
}

/// Storage seam for the artwork vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, points: &[IndexPoint]) -> Result<()>;

    async fn delete(&self, ids: &[String]) -> Result<()>;

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPoint>>;

    async fn count(&self, museum: Option<&str>) -> Result<u64>;

    /// Point ids currently indexed for one museum.
    async fn ids_for_museum(&self, museum: &str) -> Result<Vec<String>>;
}

/// LanceDB-backed [`VectorIndex`].
pub struct ArtworkIndex {
    connection: Connection,
    dimension: usize,
}

impl std::fmt::Debug for ArtworkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtworkIndex")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl ArtworkIndex {
    /// Connect to (or create) the index at the given directory. Fails if an
    /// existing table was built with a different vector dimension.
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        debug!("Opening LanceDB index at {:?}", path);
        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to connect to LanceDB: {}", e)))?;

        let index = Self {
            connection,
            dimension,
        };
        index.initialize_table().await?;
        Ok(index)
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to list tables: {}", e)))?;

        if table_names.contains(&TABLE_NAME.to_string()) {
            let existing = self.existing_dimension().await?;
            if existing != self.dimension {
                return Err(SyncError::Config(format!(
                    "index was built with {}-dimensional vectors, configured for {}",
                    existing, self.dimension
                )));
            }
            return Ok(());
        }

        info!(
            "Creating artwork index table with {} dimensions",
            self.dimension
        );
        self.connection
            .create_empty_table(TABLE_NAME, self.schema())
            .execute()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to create table: {}", e)))?;

        Ok(())
    }

    async fn existing_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to read table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(SyncError::IndexWrite(
            "index table has no vector column".to_string(),
        ))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to open table: {}", e)))
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("museum", DataType::Utf8, false),
            Field::new("object_number", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            // JSON-encoded string lists; arrow list columns buy nothing
            // here since filtering only happens on scalar columns.
            Field::new("artists", DataType::Utf8, false),
            Field::new("work_types", DataType::Utf8, false),
            Field::new("image_url", DataType::Utf8, false),
            Field::new("thumbnail_url", DataType::Utf8, true),
            Field::new("production_start", DataType::Int32, true),
            Field::new("production_end", DataType::Int32, true),
            Field::new("period", DataType::Utf8, true),
            Field::new("indexed_at", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(&self, points: &[IndexPoint]) -> Result<RecordBatch> {
        let len = points.len();
        let indexed_at = chrono::Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut museums = Vec::with_capacity(len);
        let mut object_numbers = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut artists = Vec::with_capacity(len);
        let mut work_types = Vec::with_capacity(len);
        let mut image_urls = Vec::with_capacity(len);
        let mut thumbnail_urls = Vec::with_capacity(len);
        let mut production_starts = Vec::with_capacity(len);
        let mut production_ends = Vec::with_capacity(len);
        let mut periods = Vec::with_capacity(len);
        let mut indexed_ats = Vec::with_capacity(len);

        for point in points {
            if point.vector.len() != self.dimension {
                return Err(SyncError::IndexWrite(format!(
                    "point '{}' has a {}-dimensional vector, index expects {}",
                    point.id,
                    point.vector.len(),
                    self.dimension
                )));
            }

            ids.push(point.id.as_str());
            museums.push(point.payload.museum.as_str());
            object_numbers.push(point.payload.object_number.as_str());
            titles.push(point.payload.title.as_str());
            artists.push(encode_json(&point.payload.artists)?);
            work_types.push(encode_json(&point.payload.work_types)?);
            image_urls.push(point.payload.image_url.as_str());
            thumbnail_urls.push(point.payload.thumbnail_url.as_deref());
            production_starts.push(point.payload.production_start);
            production_ends.push(point.payload.production_end);
            periods.push(point.payload.period.as_deref());
            indexed_ats.push(indexed_at.as_str());
        }

        let mut flat_values = Vec::with_capacity(len * self.dimension);
        for point in points {
            flat_values.extend_from_slice(&point.vector);
        }
        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            self.dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| SyncError::IndexWrite(format!("failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(museums)),
            Arc::new(StringArray::from(object_numbers)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(artists)),
            Arc::new(StringArray::from(work_types)),
            Arc::new(StringArray::from(image_urls)),
            Arc::new(StringArray::from(thumbnail_urls)),
            Arc::new(Int32Array::from(production_starts)),
            Arc::new(Int32Array::from(production_ends)),
            Arc::new(StringArray::from(periods)),
            Arc::new(StringArray::from(indexed_ats)),
        ];

        RecordBatch::try_new(self.schema(), arrays)
            .map_err(|e| SyncError::IndexWrite(format!("failed to create record batch: {}", e)))
    }

    fn parse_batch(&self, batch: &RecordBatch) -> Result<Vec<ScoredPoint>> {
        let num_rows = batch.num_rows();
        let mut points = Vec::with_capacity(num_rows);

        let ids = string_column(batch, "id")?;
        let museums = string_column(batch, "museum")?;
        let object_numbers = string_column(batch, "object_number")?;
        let titles = string_column(batch, "title")?;
        let artists = string_column(batch, "artists")?;
        let work_types = string_column(batch, "work_types")?;
        let image_urls = string_column(batch, "image_url")?;
        let thumbnail_urls = string_column(batch, "thumbnail_url")?;
        let production_starts = int_column(batch, "production_start")?;
        let production_ends = int_column(batch, "production_end")?;
        let periods = string_column(batch, "period")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        for row in 0..num_rows {
            let payload = PointPayload {
                museum: museums.value(row).to_string(),
                object_number: object_numbers.value(row).to_string(),
                title: titles.value(row).to_string(),
                artists: decode_json(artists.value(row))?,
                work_types: decode_json(work_types.value(row))?,
                image_url: image_urls.value(row).to_string(),
                thumbnail_url: optional_string(thumbnail_urls, row),
                production_start: optional_int(production_starts, row),
                production_end: optional_int(production_ends, row),
                period: optional_string(periods, row),
            };

            let distance = distances.map_or(0.0, |d| {
                if d.is_null(row) { 0.0 } else { d.value(row) }
            });

            points.push(ScoredPoint {
                id: ids.value(row).to_string(),
                payload,
                distance,
                similarity: 1.0 - distance,
            });
        }

        Ok(points)
    }
}

#[async_trait]
impl VectorIndex for ArtworkIndex {
    async fn upsert(&self, points: &[IndexPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let table = self.open_table().await?;

        // Delete-then-add: LanceDB has no native upsert, and the point ids
        // are deterministic, so this overwrites in place.
        let predicate = id_predicate(points.iter().map(|p| p.id.as_str()));
        table
            .delete(&predicate)
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to delete stale points: {}", e)))?;

        let batch = self.create_record_batch(points)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to insert points: {}", e)))?;

        debug!("Upserted {} points", points.len());
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let table = self.open_table().await?;
        let predicate = id_predicate(ids.iter().map(String::as_str));
        table
            .delete(&predicate)
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to delete points: {}", e)))?;

        debug!("Deleted {} points", ids.len());
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let table = self.open_table().await?;

        let mut query = table
            .vector_search(vector)
            .map_err(|e| SyncError::IndexWrite(format!("failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        if let Some(predicate) = filter.predicate() {
            query = query.only_if(predicate);
        }

        let mut stream = query
            .execute()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to read result stream: {}", e)))?
        {
            results.extend(self.parse_batch(&batch)?);
        }

        Ok(results)
    }

    async fn count(&self, museum: Option<&str>) -> Result<u64> {
        let table = self.open_table().await?;
        let filter = museum.map(museum_predicate);
        let count = table
            .count_rows(filter)
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    async fn ids_for_museum(&self, museum: &str) -> Result<Vec<String>> {
        let table = self.open_table().await?;

        let mut stream = table
            .query()
            .only_if(museum_predicate(museum))
            .select(lancedb::query::Select::columns(&["id"]))
            .execute()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to list point ids: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| SyncError::IndexWrite(format!("failed to read id stream: {}", e)))?
        {
            let column = string_column(&batch, "id")?;
            for row in 0..batch.num_rows() {
                ids.push(column.value(row).to_string());
            }
        }

        Ok(ids)
    }
}

fn id_predicate<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let quoted = ids.map(quote_literal).join(", ");
    format!("id IN ({})", quoted)
}

fn museum_predicate(museum: &str) -> String {
    format!("museum = {}", quote_literal(museum))
}

/// SQL string literal with embedded quotes doubled.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| SyncError::IndexWrite(format!("failed to encode payload: {}", e)))
}

fn decode_json(value: &str) -> Result<Vec<String>> {
    serde_json::from_str(value)
        .map_err(|e| SyncError::IndexWrite(format!("failed to decode payload: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SyncError::IndexWrite(format!("missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| SyncError::IndexWrite(format!("invalid {} column type", name)))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SyncError::IndexWrite(format!("missing {} column", name)))?
        .as_any()
        .downcast_ref::<Int32Array>()
        .ok_or_else(|| SyncError::IndexWrite(format!("invalid {} column type", name)))
}

fn optional_string(column: &StringArray, row: usize) -> Option<String> {
    if column.is_null(row) {
        None
    } else {
        Some(column.value(row).to_string())
    }
}

fn optional_int(column: &Int32Array, row: usize) -> Option<i32> {
    if column.is_null(row) {
        None
    } else {
        Some(column.value(row))
    }
}
