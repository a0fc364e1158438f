//! LanceDB-backed vector store
//!
//! One table (`chunks`) holding the chunk text, its metadata as JSON, its
//! char offset, an insertion sequence number and the vector. Rows written by
//! `add` are on disk once the call returns, so a later process can reopen the
//! directory and query it.

use super::{Durability, SearchHit, VectorStore};
use crate::error::{Error, Result};
use crate::types::{Chunk, Metadata, VectorStoreEntry};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

const CHUNKS_TABLE: &str = "chunks";
const BACKEND: &str = "lancedb";

fn lance_err(e: impl std::fmt::Display) -> Error {
    Error::store(BACKEND, e)
}

struct Inner {
    table: Option<Table>,
    next_seq: u64,
}

pub struct LanceStore {
    conn: Connection,
    path: PathBuf,
    dimensions: usize,
    inner: Mutex<Inner>,
}

impl LanceStore {
    /// Open (or create) the store in `dir`.
    ///
    /// An existing table built for a different vector size is rejected.
    pub async fn open(dir: &Path, dimensions: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let uri = dir.to_string_lossy().to_string();

        let conn = connect(&uri).execute().await.map_err(lance_err)?;
        let table = conn.open_table(CHUNKS_TABLE).execute().await.ok();

        let mut next_seq = 0;
        if let Some(ref table) = table {
            let schema = table.schema().await.map_err(lance_err)?;
            let stored = schema.field_with_name("vector").ok().and_then(|f| match f.data_type() {
                DataType::FixedSizeList(_, size) => Some(*size as usize),
                _ => None,
            });
            if stored != Some(dimensions) {
                return Err(Error::store(
                    BACKEND,
                    format!(
                        "index at {} holds {:?}-dimension vectors but the embedding model produces {}; reset it first",
                        dir.display(),
                        stored,
                        dimensions
                    ),
                ));
            }
            next_seq = table.count_rows(None).await.map_err(lance_err)? as u64;
            info!(path = %dir.display(), rows = next_seq, "opened existing vector index");
        }

        Ok(Self {
            conn,
            path: dir.to_path_buf(),
            dimensions,
            inner: Mutex::new(Inner { table, next_seq }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema for the chunks table
    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("seq", DataType::UInt64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false), // JSON serialized
            Field::new("start", DataType::UInt64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimensions as i32,
                ),
                false,
            ),
        ]))
    }

    fn to_batch(&self, entries: &[VectorStoreEntry], first_seq: u64) -> Result<RecordBatch> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != self.dimensions) {
            return Err(Error::store(
                BACKEND,
                format!("vector has {} dimensions, store holds {}", bad.vector.len(), self.dimensions),
            ));
        }

        let seqs: Vec<u64> = (0..entries.len() as u64).map(|i| first_seq + i).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.chunk.text.as_str()).collect();
        let metadata: Vec<String> = entries
            .iter()
            .map(|e| serde_json::to_string(&e.chunk.metadata).unwrap_or_else(|_| "{}".to_string()))
            .collect();
        let starts: Vec<u64> = entries.iter().map(|e| e.chunk.start as u64).collect();
        let flat_vectors: Vec<f32> = entries.iter().flat_map(|e| e.vector.iter().copied()).collect();

        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimensions as i32,
            Arc::new(Float32Array::from(flat_vectors)),
            None,
        )
        .map_err(lance_err)?;

        RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(UInt64Array::from(seqs)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(UInt64Array::from(starts)),
                Arc::new(vectors),
            ],
        )
        .map_err(lance_err)
    }

    async fn get_or_create_table(&self, inner: &mut Inner) -> Result<Table> {
        if let Some(ref table) = inner.table {
            return Ok(table.clone());
        }

        let table = self
            .conn
            .create_empty_table(CHUNKS_TABLE, self.schema())
            .execute()
            .await
            .map_err(lance_err)?;

        inner.table = Some(table.clone());
        Ok(table)
    }
}

/// Decode one result batch into `(seq, hit)` pairs
fn read_hits(batch: &RecordBatch) -> Result<Vec<(u64, SearchHit)>> {
    let column = |name: &str| {
        batch
            .column_by_name(name)
            .ok_or_else(|| Error::store(BACKEND, format!("result is missing column '{}'", name)))
    };
    let seqs = column("seq")?.as_any().downcast_ref::<UInt64Array>();
    let texts = column("text")?.as_any().downcast_ref::<StringArray>();
    let metadata = column("metadata")?.as_any().downcast_ref::<StringArray>();
    let starts = column("start")?.as_any().downcast_ref::<UInt64Array>();
    let distances = column("_distance")?.as_any().downcast_ref::<Float32Array>();

    let (Some(seqs), Some(texts), Some(metadata), Some(starts), Some(distances)) =
        (seqs, texts, metadata, starts, distances)
    else {
        return Err(Error::store(BACKEND, "unexpected column types in result"));
    };

    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let meta: Metadata = if metadata.is_null(i) {
            Metadata::new()
        } else {
            serde_json::from_str(metadata.value(i)).map_err(lance_err)?
        };
        hits.push((
            seqs.value(i),
            SearchHit {
                chunk: Chunk {
                    text: texts.value(i).to_string(),
                    metadata: meta,
                    start: starts.value(i) as usize,
                },
                distance: distances.value(i),
            },
        ));
    }
    Ok(hits)
}

/// Nearest `limit` rows as `(seq, hit)` pairs, in LanceDB's order
async fn search(table: &Table, vector: &[f32], limit: usize) -> Result<Vec<(u64, SearchHit)>> {
    let results = table
        .vector_search(vector.to_vec())
        .map_err(lance_err)?
        .distance_type(DistanceType::Cosine)
        .limit(limit)
        .execute()
        .await
        .map_err(lance_err)?;

    let batches: Vec<RecordBatch> = results.try_collect().await.map_err(lance_err)?;

    let mut hits = Vec::new();
    for batch in &batches {
        hits.extend(read_hits(batch)?);
    }
    Ok(hits)
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn add(&self, entries: Vec<VectorStoreEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.lock().await;
        let batch = self.to_batch(&entries, inner.next_seq)?;
        let table = self.get_or_create_table(&mut inner).await?;

        let schema = self.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table.add(batches).execute().await.map_err(lance_err)?;

        inner.next_seq += entries.len() as u64;
        debug!(rows = entries.len(), total = inner.next_seq, "added rows to vector index");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let inner = self.inner.lock().await;
        let table = match &inner.table {
            Some(t) => t.clone(),
            None => return Ok(vec![]),
        };
        if k == 0 || inner.next_seq == 0 {
            return Ok(vec![]);
        }
        let total = inner.next_seq;
        drop(inner);

        // LanceDB picks arbitrarily among rows tied at the cutoff, so widen the
        // fetch until the k-th distance is followed by a strictly larger one
        let mut limit = k.saturating_add(1);
        let mut hits = loop {
            let mut hits = search(&table, vector, limit).await?;
            hits.sort_by(|a, b| a.1.distance.total_cmp(&b.1.distance).then(a.0.cmp(&b.0)));
            let all_rows = hits.len() < limit || limit as u64 >= total;
            let settled = hits.len() > k && hits[k].1.distance > hits[k - 1].1.distance;
            if all_rows || settled {
                break hits;
            }
            limit = limit.saturating_mul(2);
        };
        hits.truncate(k);
        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn persist(&self) -> Result<Durability> {
        // Lance commits on every add
        Ok(Durability::Durable {
            path: self.path.clone(),
        })
    }

    async fn len(&self) -> Result<usize> {
        let inner = self.inner.lock().await;
        match &inner.table {
            Some(table) => table.count_rows(None).await.map_err(lance_err),
            None => Ok(0),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.table.take().is_some() {
            self.conn.drop_table(CHUNKS_TABLE).await.map_err(lance_err)?;
        }
        inner.next_seq = 0;
        Ok(())
    }

    fn name(&self) -> &'static str {
        BACKEND
    }
}
