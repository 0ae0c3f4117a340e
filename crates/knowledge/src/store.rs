//! SQLite backing store for the vector index.
//!
//! The in-memory snapshot is the source of truth for searches; this store
//! makes it durable. Every mutation is written in a single transaction.

use crate::chunk::Chunk;
use crate::index::{DocumentEntry, IndexRecord, IndexSnapshot};
use crate::loader::DocumentFormat;
use crate::types::{DocumentId, DocumentSummary};
use chrono::{DateTime, Utc};
use navigator_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    format TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    ingested_at TEXT NOT NULL,
    unit_count INTEGER NOT NULL,
    text_len INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    document_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    unit INTEGER NOT NULL,
    label TEXT,
    text TEXT NOT NULL,
    start_byte INTEGER NOT NULL,
    end_byte INTEGER NOT NULL,
    overlap INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (document_id, chunk_index)
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Durable copy of the index in a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

fn store_error(action: &str, e: rusqlite::Error) -> AppError {
    AppError::Knowledge(format!("Failed to {}: {}", action, e))
}

fn corruption(message: impl Into<String>) -> AppError {
    AppError::IndexCorruption(message.into())
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| store_error("open SQLite index", e))?;
        let store = Self::init(conn)?;

        tracing::debug!("Opened SQLite index at {:?}", path);
        Ok(store)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| store_error("open in-memory index", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| store_error("create tables", e))?;
        Ok(Self { conn })
    }

    /// Load the stored index.
    ///
    /// An empty store adopts `dimension`. A store built for another
    /// dimension, or holding rows that do not parse, is reported as
    /// corruption so the caller can rebuild.
    pub fn load(&self, dimension: usize) -> AppResult<IndexSnapshot> {
        match self.stored_dimension()? {
            Some(stored) if stored != dimension => {
                return Err(corruption(format!(
                    "index was built with dimension {}, embedding service is configured for {}",
                    stored, dimension
                )));
            }
            Some(_) => {}
            None => set_dimension(&self.conn, dimension)?,
        }

        let mut entries: BTreeMap<DocumentId, DocumentEntry> = self
            .load_summaries()?
            .into_iter()
            .map(|s| {
                (
                    s.id.clone(),
                    DocumentEntry {
                        summary: s,
                        records: Vec::new(),
                    },
                )
            })
            .collect();

        for (document_id, record) in self.load_records(dimension)? {
            let entry = entries.get_mut(&document_id).ok_or_else(|| {
                corruption(format!("chunk {} has no document", record.chunk.id()))
            })?;
            entry.records.push(record);
        }

        let entries: Vec<DocumentEntry> = entries
            .into_values()
            .map(|mut entry| {
                for record in &mut entry.records {
                    record.chunk.filename = entry.summary.filename.clone();
                }
                entry
            })
            .collect();

        let snapshot = IndexSnapshot::from_entries(dimension, entries);
        snapshot.verify()?;
        Ok(snapshot)
    }

    fn stored_dimension(&self) -> AppResult<Option<usize>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'dimension'", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| store_error("read index metadata", e))?;

        value
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|_| corruption(format!("invalid stored dimension '{}'", v)))
            })
            .transpose()
    }

    fn load_summaries(&self) -> AppResult<Vec<DocumentSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, filename, format, content_hash, ingested_at, unit_count, text_len, chunk_count
                 FROM documents ORDER BY id",
            )
            .map_err(|e| store_error("prepare document query", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })
            .map_err(|e| store_error("query documents", e))?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, filename, format, content_hash, ingested_at, units, text_len, chunks) =
                row.map_err(|e| corruption(format!("malformed document row: {}", e)))?;

            let format = DocumentFormat::parse(&format).ok_or_else(|| {
                corruption(format!("document {} has unknown format '{}'", filename, format))
            })?;
            let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
                .map_err(|e| {
                    corruption(format!("document {} has invalid timestamp: {}", filename, e))
                })?
                .with_timezone(&Utc);

            summaries.push(DocumentSummary {
                id: DocumentId::from_raw(id),
                filename,
                format,
                content_hash,
                ingested_at,
                unit_count: to_usize(units, "unit_count")?,
                text_len: to_usize(text_len, "text_len")?,
                chunk_count: to_usize(chunks, "chunk_count")?,
            });
        }

        Ok(summaries)
    }

    fn load_records(&self, dimension: usize) -> AppResult<Vec<(DocumentId, IndexRecord)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT document_id, chunk_index, unit, label, text, start_byte, end_byte, overlap, seq, embedding
                 FROM chunks ORDER BY document_id, chunk_index",
            )
            .map_err(|e| store_error("prepare chunk query", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, Vec<u8>>(9)?,
                ))
            })
            .map_err(|e| store_error("query chunks", e))?;

        let mut records = Vec::new();
        for row in rows {
            let (doc, index, unit, label, text, start, end, overlap, seq, blob) =
                row.map_err(|e| corruption(format!("malformed chunk row: {}", e)))?;

            let document_id = DocumentId::from_raw(doc);
            let embedding = bytes_to_embedding(&blob)?;
            if embedding.len() != dimension {
                return Err(corruption(format!(
                    "chunk {}:{} has dimension {}, expected {}",
                    document_id,
                    index,
                    embedding.len(),
                    dimension
                )));
            }

            let chunk = Chunk {
                document_id: document_id.clone(),
                filename: String::new(),
                index: to_usize(index, "chunk_index")?,
                unit: to_usize(unit, "unit")?,
                label,
                byte_range: (to_usize(start, "start_byte")?, to_usize(end, "end_byte")?),
                overlap: to_usize(overlap, "overlap")?,
                text,
            };
            if chunk.overlap > chunk.text.len() || !chunk.text.is_char_boundary(chunk.overlap) {
                return Err(corruption(format!(
                    "chunk {} has invalid overlap {}",
                    chunk.id(),
                    chunk.overlap
                )));
            }

            records.push((
                document_id,
                IndexRecord {
                    chunk,
                    embedding,
                    seq: to_u64(seq)?,
                },
            ));
        }

        Ok(records)
    }

    /// Replace a document and all of its chunks.
    pub fn write_document(&mut self, entry: &DocumentEntry) -> AppResult<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| store_error("begin transaction", e))?;

        delete_document(&tx, &entry.summary.id)?;
        insert_entry(&tx, entry)?;

        tx.commit().map_err(|e| store_error("commit document", e))?;

        tracing::debug!(
            "Stored document {} ({} chunks)",
            entry.summary.filename,
            entry.records.len()
        );
        Ok(())
    }

    /// Insert or replace one chunk and refresh its document row.
    pub fn upsert_record(&mut self, summary: &DocumentSummary, record: &IndexRecord) -> AppResult<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| store_error("begin transaction", e))?;

        insert_summary(&tx, summary)?;
        insert_record(&tx, record)?;

        tx.commit().map_err(|e| store_error("commit chunk", e))
    }

    pub fn remove_document(&mut self, id: &DocumentId) -> AppResult<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| store_error("begin transaction", e))?;

        delete_document(&tx, id)?;

        tx.commit().map_err(|e| store_error("commit removal", e))
    }

    /// Replace the whole store with `snapshot`.
    pub fn replace_all(&mut self, snapshot: &IndexSnapshot) -> AppResult<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| store_error("begin transaction", e))?;

        tx.execute_batch("DELETE FROM chunks; DELETE FROM documents;")
            .map_err(|e| store_error("reset index", e))?;
        for entry in snapshot.entries() {
            insert_entry(&tx, entry)?;
        }
        set_dimension(&tx, snapshot.dimension())?;

        tx.commit().map_err(|e| store_error("commit rebuild", e))?;

        tracing::info!(
            "Stored rebuilt index: {} documents, {} chunks",
            snapshot.document_count(),
            snapshot.chunk_count()
        );
        Ok(())
    }

    /// (documents, chunks) row counts.
    pub fn counts(&self) -> AppResult<(usize, usize)> {
        let count = |table: &str| -> AppResult<usize> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(|e| store_error(&format!("count {}", table), e))
                .and_then(|n| to_usize(n, table))
        };

        Ok((count("documents")?, count("chunks")?))
    }
}

fn set_dimension(conn: &Connection, dimension: usize) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('dimension', ?1)",
        params![dimension.to_string()],
    )
    .map_err(|e| store_error("write index metadata", e))?;
    Ok(())
}

fn delete_document(tx: &Transaction<'_>, id: &DocumentId) -> AppResult<()> {
    tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![id.as_str()])
        .map_err(|e| store_error("delete chunks", e))?;
    tx.execute("DELETE FROM documents WHERE id = ?1", params![id.as_str()])
        .map_err(|e| store_error("delete document", e))?;
    Ok(())
}

fn insert_entry(tx: &Transaction<'_>, entry: &DocumentEntry) -> AppResult<()> {
    insert_summary(tx, &entry.summary)?;
    for record in &entry.records {
        insert_record(tx, record)?;
    }
    Ok(())
}

fn insert_summary(tx: &Transaction<'_>, summary: &DocumentSummary) -> AppResult<()> {
    tx.execute(
        "INSERT OR REPLACE INTO documents
         (id, filename, format, content_hash, ingested_at, unit_count, text_len, chunk_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            summary.id.as_str(),
            summary.filename,
            summary.format.as_str(),
            summary.content_hash,
            summary.ingested_at.to_rfc3339(),
            summary.unit_count as i64,
            summary.text_len as i64,
            summary.chunk_count as i64,
        ],
    )
    .map_err(|e| store_error("insert document", e))?;
    Ok(())
}

fn insert_record(tx: &Transaction<'_>, record: &IndexRecord) -> AppResult<()> {
    let chunk = &record.chunk;
    tx.execute(
        "INSERT OR REPLACE INTO chunks
         (document_id, chunk_index, unit, label, text, start_byte, end_byte, overlap, seq, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            chunk.document_id.as_str(),
            chunk.index as i64,
            chunk.unit as i64,
            chunk.label,
            chunk.text,
            chunk.byte_range.0 as i64,
            chunk.byte_range.1 as i64,
            chunk.overlap as i64,
            record.seq as i64,
            embedding_to_bytes(&record.embedding),
        ],
    )
    .map_err(|e| store_error("insert chunk", e))?;
    Ok(())
}

fn to_usize(value: i64, column: &str) -> AppResult<usize> {
    usize::try_from(value).map_err(|_| corruption(format!("negative {} ({})", column, value)))
}

fn to_u64(value: i64) -> AppResult<u64> {
    u64::try_from(value).map_err(|_| corruption(format!("negative seq ({})", value)))
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(corruption(format!(
            "embedding blob of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
