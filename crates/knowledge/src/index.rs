//! In-memory vector index with copy-on-write snapshots.
//!
//! Readers take an `Arc` of the current [`IndexSnapshot`] and search it without
//! holding a lock. Writers serialize on an async mutex, build the next
//! snapshot from a clone of the current one, write it through to the
//! [`SqliteStore`] and swap it in. A search that overlaps a write therefore
//! sees either the old or the new record set, never a mix.

use crate::chunk::Chunk;
use crate::embeddings::normalize;
use crate::store::SqliteStore;
use crate::types::{DocumentId, DocumentSummary};
use navigator_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, MutexGuard};

/// A chunk, its unit-length embedding and its insertion sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,

    /// Tie-breaker for equal scores; earlier insertions rank first
    pub seq: u64,
}

/// A retrieved chunk with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks ranked by descending score, all at or above the similarity floor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn top_score(&self) -> Option<f32> {
        self.chunks.first().map(|c| c.score)
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// An indexed document and its records, ordered by chunk index.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEntry {
    pub summary: DocumentSummary,
    pub records: Vec<IndexRecord>,
}

/// Immutable view of the whole index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    dimension: usize,
    documents: BTreeMap<DocumentId, Arc<DocumentEntry>>,
    next_seq: u64,
}

impl IndexSnapshot {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            documents: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Reassemble a snapshot from stored entries.
    pub(crate) fn from_entries(dimension: usize, entries: Vec<DocumentEntry>) -> Self {
        let next_seq = entries
            .iter()
            .flat_map(|e| e.records.iter().map(|r| r.seq + 1))
            .max()
            .unwrap_or(0);

        Self {
            dimension,
            documents: entries
                .into_iter()
                .map(|e| (e.summary.id.clone(), Arc::new(e)))
                .collect(),
            next_seq,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.documents.values().map(|e| e.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &DocumentId) -> Option<&DocumentEntry> {
        self.documents.get(id).map(|e| e.as_ref())
    }

    pub fn entries(&self) -> impl Iterator<Item = &DocumentEntry> {
        self.documents.values().map(|e| e.as_ref())
    }

    /// Document summaries in id order.
    pub fn summaries(&self) -> impl Iterator<Item = &DocumentSummary> {
        self.entries().map(|e| &e.summary)
    }

    pub fn records(&self) -> impl Iterator<Item = &IndexRecord> {
        self.entries().flat_map(|e| e.records.iter())
    }

    fn check_dimension(&self, embedding: &[f32]) -> AppResult<()> {
        if embedding.len() != self.dimension {
            return Err(AppError::EmbeddingDimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Replace every record of a document.
    ///
    /// Chunk `i` keeps the sequence number of the previous chunk `i`, so
    /// re-ingesting identical content yields identical records. Returns
    /// whether a previous version was replaced.
    pub fn upsert_document(
        &mut self,
        mut summary: DocumentSummary,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> AppResult<bool> {
        if chunks.len() != embeddings.len() {
            return Err(AppError::Knowledge(format!(
                "Cannot index {}: {} chunks but {} embeddings",
                summary.filename,
                chunks.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }
        for (position, chunk) in chunks.iter().enumerate() {
            if chunk.index != position || chunk.document_id != summary.id {
                return Err(AppError::Knowledge(format!(
                    "Chunk {} does not belong at position {} of document {}",
                    chunk.id(),
                    position,
                    summary.id
                )));
            }
        }

        let previous = self.documents.get(&summary.id).cloned();
        if let Some(prev) = &previous {
            if prev.summary.content_hash == summary.content_hash {
                summary.ingested_at = prev.summary.ingested_at;
            }
        }

        let mut next_seq = self.next_seq;
        let records = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let seq = previous
                    .as_ref()
                    .and_then(|p| p.records.get(chunk.index))
                    .map(|r| r.seq)
                    .unwrap_or_else(|| {
                        next_seq += 1;
                        next_seq - 1
                    });
                IndexRecord {
                    chunk,
                    embedding: normalize(embedding),
                    seq,
                }
            })
            .collect::<Vec<_>>();

        summary.chunk_count = records.len();
        self.next_seq = next_seq;
        self.documents.insert(
            summary.id.clone(),
            Arc::new(DocumentEntry { summary, records }),
        );

        Ok(previous.is_some())
    }

    /// Insert or replace a single chunk of an already indexed document.
    ///
    /// The chunk must replace an existing index or extend the document by one.
    pub fn upsert(&mut self, chunk: Chunk, embedding: Vec<f32>) -> AppResult<()> {
        self.check_dimension(&embedding)?;

        let entry = self.documents.get(&chunk.document_id).ok_or_else(|| {
            AppError::Knowledge(format!(
                "Cannot upsert chunk {}: document is not indexed",
                chunk.id()
            ))
        })?;

        let mut entry = DocumentEntry::clone(entry);
        let embedding = normalize(embedding);

        match chunk.index {
            i if i < entry.records.len() => {
                let seq = entry.records[i].seq;
                entry.records[i] = IndexRecord {
                    chunk,
                    embedding,
                    seq,
                };
            }
            i if i == entry.records.len() => {
                entry.records.push(IndexRecord {
                    chunk,
                    embedding,
                    seq: self.next_seq,
                });
                self.next_seq += 1;
            }
            i => {
                return Err(AppError::Knowledge(format!(
                    "Cannot upsert chunk {}: document has only {} chunks",
                    i,
                    entry.records.len()
                )));
            }
        }

        entry.summary.chunk_count = entry.records.len();
        self.documents
            .insert(entry.summary.id.clone(), Arc::new(entry));
        Ok(())
    }

    /// Remove a document and all of its chunks.
    pub fn remove(&mut self, id: &DocumentId) -> Option<DocumentSummary> {
        self.documents
            .remove(id)
            .map(|entry| entry.summary.clone())
    }

    /// Top-`k` chunks by cosine similarity, excluding scores below `floor`.
    pub fn search(&self, query: &[f32], k: usize, floor: f32) -> AppResult<RetrievalResult> {
        self.check_dimension(query)?;

        if k == 0 || self.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let query = normalize(query.to_vec());
        let mut scored: Vec<(f32, &IndexRecord)> = self
            .records()
            .map(|record| (dot(&query, &record.embedding), record))
            .filter(|(score, _)| *score >= floor)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.seq.cmp(&b.1.seq)));
        scored.truncate(k);

        tracing::debug!(
            "Search returned {} of {} chunks (top-{}, floor {:.2})",
            scored.len(),
            self.chunk_count(),
            k,
            floor
        );

        Ok(RetrievalResult {
            chunks: scored
                .into_iter()
                .map(|(score, record)| ScoredChunk {
                    chunk: record.chunk.clone(),
                    score,
                })
                .collect(),
        })
    }

    /// Check the structural invariants of the snapshot.
    pub fn verify(&self) -> AppResult<()> {
        let mut seqs = HashSet::new();

        for (id, entry) in &self.documents {
            if &entry.summary.id != id {
                return Err(AppError::IndexCorruption(format!(
                    "document {} is filed under id {}",
                    entry.summary.id, id
                )));
            }
            if entry.summary.chunk_count != entry.records.len() {
                return Err(AppError::IndexCorruption(format!(
                    "document {} claims {} chunks but has {}",
                    entry.summary.filename,
                    entry.summary.chunk_count,
                    entry.records.len()
                )));
            }

            for (position, record) in entry.records.iter().enumerate() {
                if record.chunk.index != position || &record.chunk.document_id != id {
                    return Err(AppError::IndexCorruption(format!(
                        "chunk {} found at position {} of document {}",
                        record.chunk.id(),
                        position,
                        id
                    )));
                }
                if record.embedding.len() != self.dimension {
                    return Err(AppError::IndexCorruption(format!(
                        "chunk {} has dimension {}, index dimension is {}",
                        record.chunk.id(),
                        record.embedding.len(),
                        self.dimension
                    )));
                }
                if record.embedding.iter().any(|v| !v.is_finite()) {
                    return Err(AppError::IndexCorruption(format!(
                        "chunk {} has a non-finite embedding",
                        record.chunk.id()
                    )));
                }
                if record.seq >= self.next_seq || !seqs.insert(record.seq) {
                    return Err(AppError::IndexCorruption(format!(
                        "chunk {} has invalid sequence number {}",
                        record.chunk.id(),
                        record.seq
                    )));
                }
            }
        }

        Ok(())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Read access to a vector index.
pub trait VectorIndex: Send + Sync {
    /// Search for the top-k most similar chunks to the query embedding.
    ///
    /// Returns chunks ordered by descending similarity score.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<RetrievalResult>;

    /// Embedding dimension every record must have.
    fn dimension(&self) -> usize;

    /// Number of indexed chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct WriterState {
    store: Option<SqliteStore>,
}

/// The shared index: a swappable snapshot plus a single-writer lock.
pub struct SharedIndex {
    current: RwLock<Arc<IndexSnapshot>>,
    writer: Mutex<WriterState>,
    epoch: AtomicU64,
    similarity_floor: f32,
}

impl SharedIndex {
    /// Create an empty index with no backing store.
    pub fn in_memory(dimension: usize, similarity_floor: f32) -> Self {
        Self::with_snapshot(IndexSnapshot::new(dimension), None, similarity_floor)
    }

    /// Open an index backed by `store`, loading whatever it holds.
    pub fn open(store: SqliteStore, dimension: usize, similarity_floor: f32) -> AppResult<Self> {
        let snapshot = store.load(dimension)?;

        tracing::info!(
            "Loaded index: {} documents, {} chunks (dimension {})",
            snapshot.document_count(),
            snapshot.chunk_count(),
            dimension
        );

        Ok(Self::with_snapshot(snapshot, Some(store), similarity_floor))
    }

    /// Open an index backed by `store`, discarding whatever it holds.
    ///
    /// Used when the stored index is corrupt and is about to be rebuilt.
    pub fn recover(mut store: SqliteStore, dimension: usize, similarity_floor: f32) -> AppResult<Self> {
        let empty = IndexSnapshot::new(dimension);
        store.replace_all(&empty)?;

        tracing::warn!("Discarded stored index, starting empty (dimension {})", dimension);
        Ok(Self::with_snapshot(empty, Some(store), similarity_floor))
    }

    fn with_snapshot(
        snapshot: IndexSnapshot,
        store: Option<SqliteStore>,
        similarity_floor: f32,
    ) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(WriterState { store }),
            epoch: AtomicU64::new(0),
            similarity_floor,
        }
    }

    /// The current snapshot. Stays valid and unchanged while writers proceed.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Number of completed full rebuilds.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn similarity_floor(&self) -> f32 {
        self.similarity_floor
    }

    /// Wait for exclusive write access.
    pub async fn write(&self) -> IndexWriter<'_> {
        IndexWriter {
            index: self,
            state: self.writer.lock().await,
        }
    }

    fn swap(&self, next: IndexSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(next);
    }
}

impl VectorIndex for SharedIndex {
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<RetrievalResult> {
        self.snapshot()
            .search(query_embedding, top_k, self.similarity_floor)
    }

    fn dimension(&self) -> usize {
        self.snapshot().dimension()
    }

    fn len(&self) -> usize {
        self.snapshot().chunk_count()
    }
}

/// Exclusive write access to a [`SharedIndex`].
///
/// Each mutation is applied to a copy of the current snapshot, persisted,
/// then published. On error nothing is published.
pub struct IndexWriter<'a> {
    index: &'a SharedIndex,
    state: MutexGuard<'a, WriterState>,
}

impl IndexWriter<'_> {
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.index.snapshot()
    }

    /// Replace all records of a document. Returns whether it was already indexed.
    pub fn upsert_document(
        &mut self,
        summary: DocumentSummary,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> AppResult<bool> {
        let mut next = IndexSnapshot::clone(&self.snapshot());
        let id = summary.id.clone();
        let replaced = next.upsert_document(summary, chunks, embeddings)?;

        if let (Some(store), Some(entry)) = (self.state.store.as_mut(), next.get(&id)) {
            store.write_document(entry)?;
        }

        self.index.swap(next);
        Ok(replaced)
    }

    /// Insert or replace a single chunk.
    pub fn upsert(&mut self, chunk: Chunk, embedding: Vec<f32>) -> AppResult<()> {
        let mut next = IndexSnapshot::clone(&self.snapshot());
        let id = chunk.id();
        next.upsert(chunk, embedding)?;

        if let (Some(store), Some(entry)) =
            (self.state.store.as_mut(), next.get(&id.document_id))
        {
            if let Some(record) = entry.records.get(id.index) {
                store.upsert_record(&entry.summary, record)?;
            }
        }

        self.index.swap(next);
        Ok(())
    }

    /// Remove a document. Returns its summary if it was indexed.
    pub fn remove(&mut self, id: &DocumentId) -> AppResult<Option<DocumentSummary>> {
        let mut next = IndexSnapshot::clone(&self.snapshot());
        let Some(removed) = next.remove(id) else {
            return Ok(None);
        };

        if let Some(store) = self.state.store.as_mut() {
            store.remove_document(id)?;
        }

        self.index.swap(next);
        Ok(Some(removed))
    }

    /// Publish a freshly built snapshot in place of everything, starting a
    /// new rebuild epoch. Returns the new epoch.
    pub fn replace_all(&mut self, snapshot: IndexSnapshot) -> AppResult<u64> {
        if snapshot.dimension() != self.index.snapshot().dimension() {
            return Err(AppError::EmbeddingDimensionMismatch {
                expected: self.index.snapshot().dimension(),
                actual: snapshot.dimension(),
            });
        }

        if let Some(store) = self.state.store.as_mut() {
            store.replace_all(&snapshot)?;
        }

        self.index.swap(snapshot);
        Ok(self.index.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
