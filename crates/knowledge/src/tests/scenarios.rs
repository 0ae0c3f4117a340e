//! End-to-end behavior of the navigator with scripted services.

use super::support::*;
use crate::chunk::ChunkConfig;
use crate::embeddings::EmbeddingClient;
use crate::index::VectorIndex;
use crate::loader::DocumentFormat;
use crate::navigator::Navigator;
use crate::rag::{Citation, CitationKind};
use crate::registry::InstrumentRegistry;
use crate::router::Route;
use crate::sources::{DirectorySource, InMemorySource};
use crate::types::Document;
use navigator_core::AppError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const EO_STATUS_QUESTION: &str = "Is Executive Order 14067 still in effect?";

fn text_doc(name: &str, text: &str) -> Document {
    Document::from_text(name, DocumentFormat::PlainText, text)
}

fn keyword_embedder() -> Arc<KeywordEmbedder> {
    Arc::new(KeywordEmbedder::new(VOCABULARY))
}

fn registry(script: Script) -> Arc<ScriptedRegistry> {
    Arc::new(ScriptedRegistry::default().with("14067", script))
}

#[tokio::test]
async fn test_document_question_cites_matching_document() {
    let llm = Arc::new(RecordingLlm::default());
    let navigator = builder(keyword_embedder(), llm.clone()).build().unwrap();

    navigator
        .ingest(text_doc("doc1", "Policy X requires annual review."))
        .await
        .unwrap();
    navigator
        .ingest(text_doc("travel.txt", "Travel must be booked through the agency portal."))
        .await
        .unwrap();

    let result = navigator.query("What does Policy X require?").await.unwrap();

    assert_eq!(result.route, Route::DocumentGrounded);
    assert_eq!(result.citations, vec![Citation::document("doc1")]);
    assert_eq!(result.answer, "Grounded answer.");

    let request = llm.last().unwrap();
    assert_eq!(request.passages.len(), 1);
    assert!(request.passages[0].text.contains("annual review"));
    assert!(request.prompt.contains("What does Policy X require?"));
}

#[tokio::test]
async fn test_empty_index_answers_without_generation() {
    let embedder = keyword_embedder();
    let llm = Arc::new(RecordingLlm::default());
    let navigator = builder(embedder.clone(), llm.clone()).build().unwrap();

    let result = navigator.query("What is the capital of Mars?").await.unwrap();

    assert!(result.citations.is_empty());
    assert!(result.answer.contains("could not find enough information"));
    assert_eq!(llm.calls(), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unrelated_question_is_not_grounded() {
    let llm = Arc::new(RecordingLlm::default());
    let navigator = builder(keyword_embedder(), llm.clone()).build().unwrap();
    navigator
        .ingest(text_doc("doc1", "Policy X requires annual review."))
        .await
        .unwrap();

    let result = navigator.query("What is the capital of Mars?").await.unwrap();

    assert!(result.citations.is_empty());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_status_question_cites_live_lookup() {
    let llm = Arc::new(RecordingLlm::default());
    let registry = registry(Script::Found(revoked_14067()));
    let navigator = builder(keyword_embedder(), llm.clone())
        .registry(registry.clone())
        .build()
        .unwrap();
    navigator
        .ingest(text_doc("digital.txt", "Executive Order 14067 sets digital asset policy."))
        .await
        .unwrap();

    let result = navigator.query(EO_STATUS_QUESTION).await.unwrap();

    assert_eq!(result.route, Route::LiveLookup);
    assert_eq!(result.citations, vec![Citation::lookup("14067")]);
    assert_eq!(registry.calls.load(Ordering::SeqCst), 1);

    let request = llm.last().unwrap();
    let lookup = request.passages.last().unwrap();
    assert_eq!(lookup.source, "Federal Register - EO 14067");
    assert!(lookup.text.contains("Status: Revoked"));
}

#[tokio::test]
async fn test_registry_outage_degrades_to_documents() {
    let llm = Arc::new(RecordingLlm::default());
    let navigator = builder(keyword_embedder(), llm.clone())
        .registry(registry(Script::Down))
        .build()
        .unwrap();
    navigator
        .ingest(text_doc("digital.txt", "Executive Order 14067 sets digital asset policy."))
        .await
        .unwrap();

    let result = navigator.query(EO_STATUS_QUESTION).await.unwrap();

    assert_eq!(result.route, Route::DocumentGrounded);
    assert_eq!(result.citations, vec![Citation::document("digital.txt")]);
    assert!(result
        .citations
        .iter()
        .all(|c| c.kind != CitationKind::ExternalLookup));
}

#[tokio::test]
async fn test_unknown_instrument_degrades_to_documents() {
    let llm = Arc::new(RecordingLlm::default());
    let navigator = builder(keyword_embedder(), llm.clone())
        .registry(registry(Script::NotFound))
        .build()
        .unwrap();

    let result = navigator.query(EO_STATUS_QUESTION).await.unwrap();

    assert_eq!(result.route, Route::DocumentGrounded);
    assert!(result.citations.is_empty());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_hybrid_question_cites_documents_then_lookup() {
    let llm = Arc::new(RecordingLlm::default());
    let navigator = builder(keyword_embedder(), llm.clone())
        .registry(registry(Script::Found(revoked_14067())))
        .build()
        .unwrap();
    navigator
        .ingest(text_doc("digital.txt", "Executive Order 14067 sets digital asset policy."))
        .await
        .unwrap();

    let result = navigator
        .query("Has Executive Order 14067 been revoked, and what does it require?")
        .await
        .unwrap();

    assert_eq!(result.route, Route::Hybrid);
    assert_eq!(
        result.citations,
        vec![Citation::document("digital.txt"), Citation::lookup("14067")]
    );
}

#[tokio::test]
async fn test_embedding_outage_still_answers_from_lookup() {
    let embedder = keyword_embedder();
    let llm = Arc::new(RecordingLlm::default());
    let navigator = builder(embedder.clone(), llm.clone())
        .registry(registry(Script::Found(revoked_14067())))
        .build()
        .unwrap();
    navigator
        .ingest(text_doc("doc1", "Policy X requires annual review."))
        .await
        .unwrap();

    embedder.set_down(true);

    let status = navigator.query(EO_STATUS_QUESTION).await.unwrap();
    assert_eq!(status.citations, vec![Citation::lookup("14067")]);

    let document = navigator.query("What does Policy X require?").await.unwrap();
    assert!(document.citations.is_empty());
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_generation_failure_is_an_error() {
    let navigator = Navigator::builder(config())
        .embedder(embedder_client(keyword_embedder()))
        .llm(Arc::new(FailingLlm), "test-model")
        .build()
        .unwrap();
    navigator
        .ingest(text_doc("doc1", "Policy X requires annual review."))
        .await
        .unwrap();

    let err = navigator
        .query("What does Policy X require?")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GenerationUnavailable(_)));
}

#[tokio::test]
async fn test_citations_match_context_passages() {
    let llm = Arc::new(RecordingLlm::default());
    let navigator = builder(keyword_embedder(), llm.clone()).build().unwrap();
    navigator
        .ingest(text_doc("telework.txt", "Telework policy X requires supervisor review."))
        .await
        .unwrap();
    navigator
        .ingest(text_doc("annual.txt", "Annual review of policy X."))
        .await
        .unwrap();

    let result = navigator.query("What does Policy X require for review?").await.unwrap();
    let request = llm.last().unwrap();

    let mut sources: Vec<String> = Vec::new();
    for passage in &request.passages {
        if !sources.contains(&passage.source) {
            sources.push(passage.source.clone());
        }
    }
    let cited: Vec<String> = result.citations.iter().map(|c| c.name.clone()).collect();
    assert_eq!(cited, sources);
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .build()
        .unwrap();
    let text = "Policy X requires annual review.\n\nTelework requires approval.";

    navigator.ingest(text_doc("doc1", text)).await.unwrap();
    let before = navigator.index().snapshot();

    let again = navigator.ingest(text_doc("doc1", text)).await.unwrap();
    let after = navigator.index().snapshot();

    assert!(again.replaced);
    assert_eq!(*before, *after);
}

#[tokio::test]
async fn test_reingest_drops_stale_chunks() {
    let mut config = config();
    config.chunking = ChunkConfig {
        max_chunk_size: 40,
        chunk_overlap: 5,
    };
    let navigator = Navigator::builder(config)
        .embedder(embedder_client(keyword_embedder()))
        .llm(Arc::new(RecordingLlm::default()), "test-model")
        .build()
        .unwrap();

    let long = "Policy X requires annual review.\n\nTravel requires a booking.\n\nTelework requires approval.";
    let first = navigator.ingest(text_doc("doc1", long)).await.unwrap();
    assert!(first.chunks > 1);

    let second = navigator
        .ingest(text_doc("doc1", "Policy X requires annual review."))
        .await
        .unwrap();

    assert_eq!(second.chunks, 1);
    assert_eq!(navigator.stats().chunks, 1);
    navigator.verify_index().unwrap();
}

#[tokio::test]
async fn test_bad_files_do_not_block_good_ones() {
    let temp = TempDir::new().unwrap();
    let good = temp.path().join("good.txt");
    let broken_pdf = temp.path().join("broken.pdf");
    let broken_json = temp.path().join("broken.json");
    let slides = temp.path().join("slides.pptx");
    std::fs::write(&good, "Policy X requires annual review.").unwrap();
    std::fs::write(&broken_pdf, b"%PDF-1.4 not really a pdf").unwrap();
    std::fs::write(&broken_json, "{ not json").unwrap();
    std::fs::write(&slides, "binary").unwrap();

    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .build()
        .unwrap();
    let report = navigator
        .ingest_files(&[broken_pdf, good, broken_json, slides])
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].filename, "good.txt");
    assert_eq!(report.failed.len(), 3);
    assert_eq!(navigator.list_documents(), vec!["good.txt".to_string()]);
}

#[tokio::test]
async fn test_dimension_mismatch_is_rejected_before_upsert() {
    let embedder = keyword_embedder();
    let wrong = EmbeddingClient::new(embedder, VOCABULARY.len() + 1, policy());
    let navigator = Navigator::builder(config())
        .embedder(wrong)
        .llm(Arc::new(RecordingLlm::default()), "test-model")
        .build()
        .unwrap();

    let err = navigator
        .ingest(text_doc("doc1", "Policy X requires annual review."))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::EmbeddingDimensionMismatch { .. }));
    assert!(navigator.list_documents().is_empty());
}

#[tokio::test]
async fn test_remove_document_by_filename() {
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .build()
        .unwrap();
    navigator
        .ingest(text_doc("doc1", "Policy X requires annual review."))
        .await
        .unwrap();

    let removed = navigator.remove_document("doc1").await.unwrap();
    assert_eq!(removed.map(|s| s.filename), Some("doc1".to_string()));
    assert!(navigator.index().is_empty());
    assert!(navigator.remove_document("doc1").await.unwrap().is_none());
}

fn source() -> Arc<InMemorySource> {
    Arc::new(
        InMemorySource::default()
            .with("policy.txt", "Policy X requires annual review.")
            .with("travel.txt", "Travel requires a booking."),
    )
}

#[tokio::test]
async fn test_rebuild_replaces_everything() {
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .source(source())
        .build()
        .unwrap();
    navigator
        .ingest(text_doc("stale.txt", "Telework requires approval."))
        .await
        .unwrap();

    let rebuilt = navigator.rebuild_index().await.unwrap();

    assert_eq!(rebuilt.epoch, 1);
    assert_eq!(rebuilt.report.succeeded.len(), 2);
    assert_eq!(
        navigator.list_documents(),
        vec!["policy.txt".to_string(), "travel.txt".to_string()]
    );
}

#[tokio::test]
async fn test_concurrent_rebuilds_run_once() {
    let embedder = Arc::new(KeywordEmbedder::new(VOCABULARY).slow(Duration::from_millis(50)));
    let navigator = builder(embedder.clone(), Arc::new(RecordingLlm::default()))
        .source(source())
        .build()
        .unwrap();

    let (a, b) = tokio::join!(navigator.rebuild_index(), navigator.rebuild_index());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.epoch, 1);
    assert_eq!(b.epoch, 1);
    assert_eq!(navigator.index().epoch(), 1);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_search_during_rebuild_sees_old_index() {
    let embedder = Arc::new(KeywordEmbedder::new(VOCABULARY).slow(Duration::from_millis(50)));
    let navigator = Arc::new(
        builder(embedder, Arc::new(RecordingLlm::default()))
            .source(source())
            .build()
            .unwrap(),
    );
    navigator
        .ingest(text_doc("old.txt", "Telework requires approval."))
        .await
        .unwrap();

    let rebuilding = {
        let navigator = Arc::clone(&navigator);
        tokio::spawn(async move { navigator.rebuild_index().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(navigator.list_documents(), vec!["old.txt".to_string()]);

    rebuilding.await.unwrap().unwrap();
    assert_eq!(
        navigator.list_documents(),
        vec!["policy.txt".to_string(), "travel.txt".to_string()]
    );
}

#[tokio::test]
async fn test_sync_initial_skips_unchanged() {
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .source(source())
        .build()
        .unwrap();

    let first = navigator.sync_initial().await.unwrap();
    assert_eq!(first.succeeded.len(), 2);

    let second = navigator.sync_initial().await.unwrap();
    assert!(second.succeeded.is_empty());
    assert_eq!(second.skipped.len(), 2);
}

#[cfg(unix)]
fn folder_with_unreadable_name() -> TempDir {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("good.txt"), "Telework requires approval.").unwrap();
    std::fs::write(
        temp.path().join(OsStr::from_bytes(b"bad\xff.txt")),
        "Travel requires a booking.",
    )
    .unwrap();
    temp
}

#[cfg(unix)]
#[tokio::test]
async fn test_sync_initial_isolates_unreadable_file() {
    let folder = folder_with_unreadable_name();
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .source(Arc::new(DirectorySource::new(folder.path())))
        .build()
        .unwrap();

    let report = navigator.sync_initial().await.unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "bad\u{FFFD}.txt");
    assert_eq!(report.failed[0].kind, "knowledge");
    assert_eq!(navigator.list_documents(), vec!["good.txt".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_rebuild_isolates_unreadable_file() {
    let folder = folder_with_unreadable_name();
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .source(Arc::new(DirectorySource::new(folder.path())))
        .build()
        .unwrap();

    let rebuilt = navigator.rebuild_index().await.unwrap();

    assert_eq!(rebuilt.epoch, 1);
    assert_eq!(rebuilt.report.succeeded.len(), 1);
    assert_eq!(rebuilt.report.succeeded[0].filename, "good.txt");
    assert_eq!(rebuilt.report.failed.len(), 1);
    assert_eq!(rebuilt.report.failed[0].filename, "bad\u{FFFD}.txt");
    assert_eq!(navigator.list_documents(), vec!["good.txt".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_ingest_folder_isolates_unreadable_file() {
    let folder = folder_with_unreadable_name();
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .build()
        .unwrap();

    let report = navigator
        .ingest_files(&[folder.path().to_path_buf()])
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(navigator.list_documents(), vec!["good.txt".to_string()]);
}

#[tokio::test]
async fn test_lookup_instrument_requires_registry() {
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .build()
        .unwrap();
    assert!(matches!(
        navigator.lookup_instrument("14067").await,
        Err(AppError::Config(_))
    ));

    let registry: Arc<dyn InstrumentRegistry> = registry(Script::Found(revoked_14067()));
    let navigator = builder(keyword_embedder(), Arc::new(RecordingLlm::default()))
        .registry(registry)
        .build()
        .unwrap();
    let status = navigator.lookup_instrument("14,067").await.unwrap();
    assert_eq!(status.number, "14067");
}
