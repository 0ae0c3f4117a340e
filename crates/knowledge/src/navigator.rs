//! The policy navigator: ingestion, querying and index maintenance.
//!
//! [`Navigator`] wires the loader, chunker, embedding client, shared index,
//! router and synthesizer together. It is cheap to share behind an `Arc`;
//! queries run concurrently while ingestion and rebuilds serialize on the
//! index writer lock.

use crate::chunk::{Chunk, ChunkPipeline};
use crate::config::KnowledgeConfig;
use crate::embeddings::EmbeddingClient;
use crate::index::{IndexSnapshot, RetrievalResult, SharedIndex, VectorIndex};
use crate::loader;
use crate::progress::ProgressReporter;
use crate::rag::{AnswerResult, AnswerSynthesizer, Query};
use crate::registry::{clean_number, FederalRegisterClient, InstrumentRegistry, InstrumentStatus};
use crate::retriever::Retriever;
use crate::router::QueryRouter;
use crate::sources::{DirectorySource, DocumentSource, UnreadableFile};
use crate::store::SqliteStore;
use crate::types::{
    Document, DocumentId, DocumentSummary, EmbeddingHealth, IndexStats, IngestReport,
    IngestedDocument, RebuildReport,
};
use navigator_core::{AppError, AppResult};
use navigator_llm::{ExtractiveClient, LlmClient};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Open the persistent index at `path`.
///
/// With `recover`, a corrupt store is discarded and the index starts empty.
pub fn open_index(
    path: &Path,
    dimension: usize,
    similarity_floor: f32,
    recover: bool,
) -> AppResult<SharedIndex> {
    match SharedIndex::open(SqliteStore::open(path)?, dimension, similarity_floor) {
        Err(AppError::IndexCorruption(reason)) if recover => {
            tracing::warn!("Stored index at {:?} is unusable: {}", path, reason);
            SharedIndex::recover(SqliteStore::open(path)?, dimension, similarity_floor)
        }
        other => other,
    }
}

/// Builder for [`Navigator`].
pub struct NavigatorBuilder {
    config: KnowledgeConfig,
    workspace: Option<PathBuf>,
    embedder: Option<EmbeddingClient>,
    llm: Option<(Arc<dyn LlmClient>, String)>,
    registry: Option<Arc<dyn InstrumentRegistry>>,
    source: Option<Arc<dyn DocumentSource>>,
    index: Option<Arc<SharedIndex>>,
    uploads_dir: Option<PathBuf>,
    recover: bool,
    progress: ProgressReporter,
}

impl NavigatorBuilder {
    pub fn new(config: KnowledgeConfig) -> Self {
        Self {
            config,
            workspace: None,
            embedder: None,
            llm: None,
            registry: None,
            source: None,
            index: None,
            uploads_dir: None,
            recover: false,
            progress: ProgressReporter::noop(),
        }
    }

    /// Persist the index and read documents under `workspace`, at the
    /// configured paths.
    pub fn workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn embedder(mut self, embedder: EmbeddingClient) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        self.llm = Some((llm, model.into()));
        self
    }

    /// Use this registry regardless of `registry.enabled`.
    pub fn registry(mut self, registry: Arc<dyn InstrumentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn index(mut self, index: Arc<SharedIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = Some(dir.into());
        self
    }

    /// Start from an empty index if the stored one is corrupt.
    pub fn recover_corrupt_index(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    pub fn progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn build(self) -> AppResult<Navigator> {
        let NavigatorBuilder {
            config,
            workspace,
            embedder,
            llm,
            registry,
            source,
            index,
            uploads_dir,
            recover,
            progress,
        } = self;

        config.validate()?;

        let embedder = match embedder {
            Some(embedder) => embedder,
            None => EmbeddingClient::from_config(&config.embedding)?,
        };
        let dimension = embedder.dimensions();

        let index = match (index, &workspace) {
            (Some(index), _) => index,
            (None, Some(ws)) => Arc::new(open_index(
                &config.index_path_in(ws),
                dimension,
                config.similarity_floor,
                recover,
            )?),
            (None, None) => Arc::new(SharedIndex::in_memory(dimension, config.similarity_floor)),
        };
        if index.dimension() != dimension {
            return Err(AppError::EmbeddingDimensionMismatch {
                expected: index.dimension(),
                actual: dimension,
            });
        }

        let source: Arc<dyn DocumentSource> = match (source, &workspace) {
            (Some(source), _) => source,
            (None, Some(ws)) => Arc::new(DirectorySource::new(config.initial_dir_in(ws))),
            (None, None) => Arc::new(DirectorySource::new(config.initial_dir.clone())),
        };
        let uploads_dir = uploads_dir.or_else(|| workspace.as_deref().map(|ws| config.uploads_dir_in(ws)));

        let registry: Option<Arc<dyn InstrumentRegistry>> = match registry {
            Some(registry) => Some(registry),
            None if config.registry.enabled => Some(Arc::new(FederalRegisterClient::new(
                config.registry.endpoint.clone(),
                Duration::from_secs(config.registry.timeout_secs),
            )?)),
            None => None,
        };
        let router = QueryRouter::new(registry, config.registry.retry_policy())?;

        let (llm, model) = llm.unwrap_or_else(|| {
            (
                Arc::new(ExtractiveClient::new()) as Arc<dyn LlmClient>,
                "extractive".to_string(),
            )
        });
        let synthesizer = AnswerSynthesizer::new(
            llm,
            model,
            config.max_context_chars,
            config.confidence_threshold,
            config.generation_policy(),
        );

        let retriever = Retriever::new(
            embedder.clone(),
            Arc::clone(&index) as Arc<dyn VectorIndex>,
            config.top_k,
        );

        tracing::info!(
            "Navigator ready: embeddings {}/{} (dimension {}), generation {}, registry {}",
            embedder.provider_name(),
            embedder.model_name(),
            dimension,
            synthesizer.provider_name(),
            router.registry().map(|r| r.name()).unwrap_or("disabled")
        );

        Ok(Navigator {
            chunker: ChunkPipeline::new(config.chunking.clone()),
            config,
            embedder,
            index,
            retriever,
            router,
            synthesizer,
            source,
            uploads_dir,
            progress,
            next_request: AtomicU64::new(1),
            last_rebuild: Mutex::new(None),
        })
    }
}

/// Question answering over an indexed policy collection.
pub struct Navigator {
    config: KnowledgeConfig,
    chunker: ChunkPipeline,
    embedder: EmbeddingClient,
    index: Arc<SharedIndex>,
    retriever: Retriever,
    router: QueryRouter,
    synthesizer: AnswerSynthesizer,
    source: Arc<dyn DocumentSource>,
    uploads_dir: Option<PathBuf>,
    progress: ProgressReporter,
    next_request: AtomicU64,
    last_rebuild: Mutex<Option<RebuildReport>>,
}

impl Navigator {
    pub fn builder(config: KnowledgeConfig) -> NavigatorBuilder {
        NavigatorBuilder::new(config)
    }

    /// Open the navigator of a workspace with the given generation client.
    pub fn open(
        workspace: &Path,
        config: KnowledgeConfig,
        llm: Arc<dyn LlmClient>,
        model: &str,
    ) -> AppResult<Self> {
        Self::builder(config)
            .workspace(workspace)
            .llm(llm, model)
            .build()
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<SharedIndex> {
        &self.index
    }

    /// Chunk and embed a document without touching the index.
    async fn prepare(&self, document: &Document) -> AppResult<(Vec<Chunk>, Vec<Vec<f32>>)> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            return Err(AppError::Extraction {
                file: document.filename.clone(),
                message: "no indexable text".to_string(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        Ok((chunks, embeddings))
    }

    /// Index a loaded document, replacing any earlier version.
    pub async fn ingest(&self, document: Document) -> AppResult<IngestedDocument> {
        let (chunks, embeddings) = self.prepare(&document).await?;
        let count = chunks.len();

        let replaced = self
            .index
            .write()
            .await
            .upsert_document(document.summary(count), chunks, embeddings)?;

        tracing::info!(
            "Indexed {} ({} chunks{})",
            document.filename,
            count,
            if replaced { ", replaced" } else { "" }
        );

        Ok(IngestedDocument {
            id: document.id,
            filename: document.filename,
            chunks: count,
            replaced,
        })
    }

    fn is_unchanged(&self, document: &Document) -> bool {
        self.index
            .snapshot()
            .get(&document.id)
            .is_some_and(|e| e.summary.content_hash == document.content_hash)
    }

    fn retain_upload(&self, path: &Path, filename: &str) -> AppResult<()> {
        let Some(dir) = &self.uploads_dir else {
            return Ok(());
        };
        if path.parent() == Some(dir.as_path()) {
            return Ok(());
        }

        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Knowledge(format!("Failed to create uploads directory {:?}: {}", dir, e))
        })?;
        std::fs::copy(path, dir.join(filename)).map_err(|e| {
            AppError::Knowledge(format!("Failed to copy {} into uploads: {}", filename, e))
        })?;
        Ok(())
    }

    async fn ingest_path(&self, path: &Path, current: u64, total: u64) -> AppResult<Option<IngestedDocument>> {
        let label = path.display().to_string();
        self.progress.load(current, total, &label);

        let document = loader::load(path)?;
        if self.is_unchanged(&document) {
            tracing::debug!("Skipping {}, content unchanged", document.filename);
            return Ok(None);
        }
        self.retain_upload(path, &document.filename)?;

        let (chunks, embeddings) = self.prepare(&document).await?;
        self.progress
            .chunk(current, total, &document.filename, chunks.len());
        self.progress
            .embed(current, total, &document.filename, self.embedder.model_name());

        let count = chunks.len();
        let replaced = self
            .index
            .write()
            .await
            .upsert_document(document.summary(count), chunks, embeddings)?;
        self.progress.index(current, total, &document.filename);

        Ok(Some(IngestedDocument {
            id: document.id,
            filename: document.filename,
            chunks: count,
            replaced,
        }))
    }

    /// Ingest files from disk. Directories are expanded to their supported
    /// files.
    ///
    /// Each file succeeds or fails on its own; failures are collected in the
    /// report. Files already indexed with identical content are skipped.
    pub async fn ingest_files(&self, paths: &[PathBuf]) -> AppResult<IngestReport> {
        let start = Instant::now();

        let mut report = IngestReport::default();
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                let scan = DirectorySource::new(path.clone()).scan()?;
                files.extend(scan.paths);
                record_unreadable(&mut report, scan.unreadable);
            } else {
                files.push(path.clone());
            }
        }

        let total = files.len() as u64;

        for (i, path) in files.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            match self.ingest_path(path, i as u64 + 1, total).await {
                Ok(Some(ingested)) => {
                    tracing::info!("Indexed {} ({} chunks)", ingested.filename, ingested.chunks);
                    report.succeeded.push(ingested);
                }
                Ok(None) => report.skipped.push(name),
                Err(e) => {
                    tracing::warn!("Failed to ingest {}: {}", name, e);
                    report.record_failure(&name, &e);
                }
            }
        }

        report.duration_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            "Ingestion finished: {} indexed, {} skipped, {} failed in {:.2}s",
            report.succeeded.len(),
            report.skipped.len(),
            report.failed.len(),
            report.duration_secs
        );
        Ok(report)
    }

    /// Index documents of the canonical source that are missing or changed.
    pub async fn sync_initial(&self) -> AppResult<IngestReport> {
        let start = Instant::now();
        let listing = self.source.list()?;
        let mut report = IngestReport::default();

        tracing::info!("Syncing {} files from the document source", listing.files.len());
        record_unreadable(&mut report, listing.unreadable);

        for file in listing.files {
            let document = match loader::load_bytes(&file.filename, &file.bytes) {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}", file.filename, e);
                    report.record_failure(&file.filename, &e);
                    continue;
                }
            };

            if self.is_unchanged(&document) {
                report.skipped.push(file.filename);
                continue;
            }

            match self.ingest(document).await {
                Ok(ingested) => report.succeeded.push(ingested),
                Err(e) => {
                    tracing::warn!("Failed to ingest {}: {}", file.filename, e);
                    report.record_failure(&file.filename, &e);
                }
            }
        }

        report.duration_secs = start.elapsed().as_secs_f64();
        Ok(report)
    }

    /// Clear the index and rebuild it from the canonical document source.
    ///
    /// A call that has to wait for a rebuild already in progress returns that
    /// rebuild's report instead of starting another one.
    pub async fn rebuild_index(&self) -> AppResult<RebuildReport> {
        let observed = self.index.epoch();
        let mut writer = self.index.write().await;

        if self.index.epoch() != observed {
            let finished = self
                .last_rebuild
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(report) = finished {
                tracing::info!("Rebuild completed while waiting (epoch {})", report.epoch);
                return Ok(report);
            }
        }

        let start = Instant::now();
        let listing = self.source.list()?;
        let total = listing.files.len() as u64;
        let mut snapshot = IndexSnapshot::new(self.embedder.dimensions());
        let mut report = IngestReport::default();

        tracing::info!("Rebuilding index from {} files", total);
        record_unreadable(&mut report, listing.unreadable);

        for (i, file) in listing.files.iter().enumerate() {
            let current = i as u64 + 1;
            tracing::info!("Processing {} ({}/{})", file.filename, current, total);
            self.progress.load(current, total, &file.filename);

            let outcome = match loader::load_bytes(&file.filename, &file.bytes) {
                Ok(document) => self.prepare(&document).await.and_then(|(chunks, embeddings)| {
                    let count = chunks.len();
                    self.progress
                        .embed(current, total, &file.filename, self.embedder.model_name());
                    let replaced =
                        snapshot.upsert_document(document.summary(count), chunks, embeddings)?;
                    Ok(IngestedDocument {
                        id: document.id,
                        filename: document.filename,
                        chunks: count,
                        replaced,
                    })
                }),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(ingested) => {
                    tracing::info!(
                        "Rebuild: indexed {} ({} chunks)",
                        ingested.filename,
                        ingested.chunks
                    );
                    report.succeeded.push(ingested);
                }
                Err(e) => {
                    tracing::warn!("Skipping {} during rebuild: {}", file.filename, e);
                    report.record_failure(&file.filename, &e);
                }
            }
        }

        let epoch = writer.replace_all(snapshot)?;
        report.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Rebuilt index (epoch {}): {} documents, {} chunks, {} failed in {:.2}s",
            epoch,
            report.succeeded.len(),
            report.chunks_indexed(),
            report.failed.len(),
            report.duration_secs
        );

        let result = RebuildReport { report, epoch };
        *self.last_rebuild.lock().unwrap_or_else(|e| e.into_inner()) = Some(result.clone());
        Ok(result)
    }

    /// Answer a question.
    ///
    /// Retrieval and live lookup run concurrently. Failures of either degrade
    /// the grounding; only a generation failure is an error.
    pub async fn query(&self, question: &str) -> AppResult<AnswerResult> {
        let query = Query::new(self.next_request.fetch_add(1, Ordering::SeqCst), question);
        tracing::info!("Request {}: {}", query.request_id, question);

        let decision = self.router.classify(question);
        let (retrieval, lookup) = tokio::join!(
            self.retriever.retrieve(question),
            self.router.lookup(&decision)
        );

        let retrieval = match retrieval {
            Ok(retrieval) => retrieval,
            Err(e) if e.is_degradable() => {
                tracing::warn!(
                    "Retrieval failed for request {}, continuing without documents: {}",
                    query.request_id,
                    e
                );
                RetrievalResult::empty()
            }
            Err(e) => return Err(e),
        };

        let grounding = self.router.ground(&decision, retrieval, lookup);
        let result = self
            .synthesizer
            .synthesize(
                &query,
                grounding.route,
                &grounding.retrieval,
                grounding.lookup.as_ref(),
            )
            .await?;

        tracing::info!(
            "Request {} answered via {} with {} citations",
            result.request_id,
            result.route,
            result.citations.len()
        );
        Ok(result)
    }

    /// Filenames of all indexed documents, sorted.
    pub fn list_documents(&self) -> Vec<String> {
        self.documents().into_iter().map(|d| d.filename).collect()
    }

    /// Summaries of all indexed documents, sorted by filename.
    pub fn documents(&self) -> Vec<DocumentSummary> {
        let mut documents: Vec<DocumentSummary> =
            self.index.snapshot().summaries().cloned().collect();
        documents.sort_by(|a, b| a.filename.cmp(&b.filename));
        documents
    }

    /// Remove a document by filename or id.
    pub async fn remove_document(&self, name: &str) -> AppResult<Option<DocumentSummary>> {
        let raw = DocumentId::from_raw(name);
        let id = if self.index.snapshot().get(&raw).is_some() {
            raw
        } else {
            DocumentId::from_filename(name)
        };

        let removed = self.index.write().await.remove(&id)?;
        match &removed {
            Some(summary) => tracing::info!("Removed {} from the index", summary.filename),
            None => tracing::debug!("No indexed document named {}", name),
        }
        Ok(removed)
    }

    /// Probe the embedding service.
    pub async fn check_embeddings(&self) -> AppResult<EmbeddingHealth> {
        self.embedder.health().await
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.index.snapshot();
        IndexStats {
            documents: snapshot.document_count(),
            chunks: snapshot.chunk_count(),
            dimension: snapshot.dimension(),
            epoch: self.index.epoch(),
        }
    }

    /// Check the invariants of the current index.
    pub fn verify_index(&self) -> AppResult<()> {
        self.index.snapshot().verify()
    }

    /// Look an instrument up in the registry directly.
    pub async fn lookup_instrument(&self, number: &str) -> AppResult<InstrumentStatus> {
        let registry = self
            .router
            .registry()
            .ok_or_else(|| AppError::Config("The instrument registry is disabled".to_string()))?;
        self.router
            .lookup_number(registry.as_ref(), &clean_number(number))
            .await
    }
}

fn record_unreadable(report: &mut IngestReport, unreadable: Vec<UnreadableFile>) {
    for file in unreadable {
        tracing::warn!("Failed to read {}: {}", file.filename, file.error);
        report.record_failure(&file.filename, &file.error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingConfig;
    use crate::loader::DocumentFormat;
    use tempfile::TempDir;

    fn offline_config() -> KnowledgeConfig {
        let mut config = KnowledgeConfig::default();
        config.registry.enabled = false;
        config
    }

    #[test]
    fn test_build_rejects_index_of_other_dimension() {
        let index = Arc::new(SharedIndex::in_memory(8, 0.2));
        let result = Navigator::builder(offline_config()).index(index).build();

        assert!(matches!(
            result,
            Err(AppError::EmbeddingDimensionMismatch { expected: 8, actual: 384 })
        ));
    }

    #[tokio::test]
    async fn test_ingest_empty_document_fails() {
        let navigator = Navigator::builder(offline_config()).build().unwrap();
        let doc = Document::from_text("blank.txt", DocumentFormat::PlainText, "  \n\n ");

        let err = navigator.ingest(doc).await.unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
        assert!(navigator.list_documents().is_empty());
    }

    #[tokio::test]
    async fn test_request_ids_increase() {
        let navigator = Navigator::builder(offline_config()).build().unwrap();

        let first = navigator.query("anything").await.unwrap();
        let second = navigator.query("anything else").await.unwrap();
        assert!(second.request_id > first.request_id);
    }

    #[tokio::test]
    async fn test_ingest_files_copies_into_uploads() {
        let temp = TempDir::new().unwrap();
        let incoming = temp.path().join("incoming");
        std::fs::create_dir_all(&incoming).unwrap();
        std::fs::write(incoming.join("travel.txt"), "Travel requires prior approval.").unwrap();
        std::fs::write(incoming.join("notes.docx"), "binary").unwrap();

        let navigator = Navigator::builder(offline_config())
            .workspace(temp.path())
            .build()
            .unwrap();

        let report = navigator
            .ingest_files(&[incoming.join("travel.txt"), incoming.join("notes.docx")])
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].kind, "unsupported_format");
        assert!(temp.path().join("data/uploaded_files/travel.txt").exists());

        let again = navigator
            .ingest_files(&[incoming.join("travel.txt")])
            .await
            .unwrap();
        assert_eq!(again.skipped, vec!["travel.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_index_persists_across_opens() {
        let temp = TempDir::new().unwrap();
        let doc = Document::from_text("retention.txt", DocumentFormat::PlainText, "Keep records seven years.");

        {
            let navigator = Navigator::builder(offline_config())
                .workspace(temp.path())
                .build()
                .unwrap();
            navigator.ingest(doc).await.unwrap();
        }

        let reopened = Navigator::builder(offline_config())
            .workspace(temp.path())
            .build()
            .unwrap();
        assert_eq!(reopened.list_documents(), vec!["retention.txt".to_string()]);
        reopened.verify_index().unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_index_recovers_on_request() {
        let temp = TempDir::new().unwrap();
        {
            let navigator = Navigator::builder(offline_config())
                .workspace(temp.path())
                .build()
                .unwrap();
            let doc = Document::from_text("a.txt", DocumentFormat::PlainText, "Alpha policy text.");
            navigator.ingest(doc).await.unwrap();
        }

        let mut other = offline_config();
        other.embedding = EmbeddingConfig {
            dimensions: 64,
            ..EmbeddingConfig::default()
        };

        let err = Navigator::builder(other.clone())
            .workspace(temp.path())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AppError::IndexCorruption(_)));

        let recovered = Navigator::builder(other)
            .workspace(temp.path())
            .recover_corrupt_index(true)
            .build()
            .unwrap();
        assert_eq!(recovered.stats().documents, 0);
        assert_eq!(recovered.stats().dimension, 64);
    }
}
