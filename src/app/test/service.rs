use super::{TestCompleter, TestEmbedder, TEST_ANSWER};
use crate::{
    core::{
        completion::{Message, Role, DEFAULT_SYSTEM_PROMPT},
        document::ExtractedDocument,
        service::rag::{
            dto::{IndexCorpusPayload, QueryPayload},
            IndexPaths, RagService, MAX_HISTORY_MESSAGES,
        },
        vector::VectorIndex,
        TokenCounter,
    },
    error::RagErr,
};
use std::sync::Arc;
use tracing_test::traced_test;

const FIRST: &str = "Ownership rules in Rust prevent data races at compile time.";
const SECOND: &str = "Borrowing lets functions use values without taking ownership.";
const THIRD: &str = "A flat index compares the query against every stored vector.";

fn service(dir: &str) -> (RagService, Arc<TestCompleter>) {
    let completer = Arc::new(TestCompleter::default());
    let service = RagService::new(
        VectorIndex::new(Arc::new(TestEmbedder::new(32))),
        completer.clone(),
        Arc::new(TokenCounter::new("cl100k_base").unwrap()),
        IndexPaths::in_dir(dir),
    );
    (service, completer)
}

fn corpus() -> IndexCorpusPayload {
    IndexCorpusPayload {
        documents: vec![
            ExtractedDocument::new("ownership.md", FIRST),
            ExtractedDocument::new("borrowing.txt", SECOND),
            ExtractedDocument::new("index.txt", THIRD),
        ],
        chunk_size: 500,
        chunk_overlap: 50,
    }
}

async fn reset(dir: &str) {
    let _ = tokio::fs::remove_dir_all(dir).await;
}

#[tokio::test]
#[traced_test]
async fn index_and_query() {
    let dir = "__rag_service_index_and_query";
    reset(dir).await;

    let (service, completer) = service(dir);

    let report = service.index_corpus(corpus()).await.unwrap();

    assert_eq!(3, report.total_chunks);
    assert_eq!(3, report.total_vectors);
    assert_eq!(32, report.dimension);
    assert_eq!("test-embedder", report.model);
    assert_eq!(3, report.documents_processed);
    assert_eq!(0, report.documents_failed);

    assert!(tokio::fs::try_exists(&service.paths().index).await.unwrap());
    assert!(tokio::fs::try_exists(&service.paths().metadata).await.unwrap());
    assert!(logs_contain("Indexed 3 document(s)"));

    let mut payload = QueryPayload::new(format!("  {THIRD} "));
    payload.top_k = 2;
    let response = service.query(payload).await.unwrap();

    assert_eq!(TEST_ANSWER, response.answer);
    assert_eq!("test-completer", response.model);
    assert_eq!(2, response.sources.len());
    assert_eq!(2, response.sources[0].chunk_id);
    assert_eq!("index.txt", response.sources[0].source);
    assert_eq!(0., response.sources[0].score);
    assert_eq!(1, response.sources[0].rank);
    assert_eq!(2, response.sources[1].rank);
    assert!(response.usage.total_tokens > 0);

    let requests = completer.requests();
    assert_eq!(1, requests.len());
    assert_eq!(THIRD, requests[0].question);
    assert_eq!(DEFAULT_SYSTEM_PROMPT, requests[0].system_prompt);

    let second = &response.sources[1];
    assert_eq!(
        format!(
            "[Document: index.txt]\n{THIRD}\n\n[Document: {}]\n{}",
            second.source, second.text
        ),
        requests[0].context
    );

    reset(dir).await;
}

#[tokio::test]
async fn query_loads_persisted_index() {
    let dir = "__rag_service_lazy_load";
    reset(dir).await;

    let (service, _) = service(dir);
    service.index_corpus(corpus()).await.unwrap();

    let (fresh, _) = self::service(dir);

    let stats = fresh.index_status().await.unwrap();
    assert!(stats.indexed);
    assert_eq!(3, stats.total_chunks);
    assert_eq!(
        vec!["borrowing.txt", "index.txt", "ownership.md"],
        stats.sources
    );

    let (fresh, _) = self::service(dir);
    let response = fresh.query(QueryPayload::new(FIRST)).await.unwrap();
    assert_eq!(0, response.sources[0].chunk_id);
    assert_eq!(3, response.sources.len());

    reset(dir).await;
}

#[tokio::test]
async fn query_without_index() {
    let dir = "__rag_service_no_index";
    reset(dir).await;

    let (service, completer) = service(dir);

    let error = service.query(QueryPayload::new("Anyone?")).await.unwrap_err();
    assert!(matches!(error.error, RagErr::IndexNotBuilt(_)));
    assert!(completer.requests().is_empty());

    let stats = service.index_status().await.unwrap();
    assert!(!stats.indexed);
    assert_eq!(0, stats.total_vectors);
}

#[tokio::test]
async fn rejects_invalid_input() {
    let dir = "__rag_service_invalid_input";
    reset(dir).await;

    let (service, _) = service(dir);

    let mut payload = corpus();
    payload.chunk_overlap = payload.chunk_size;
    let error = service.index_corpus(payload).await.unwrap_err();
    assert!(matches!(error.error, RagErr::Validation(_)));

    let mut payload = corpus();
    payload.chunk_size = 0;
    payload.chunk_overlap = 0;
    let error = service.index_corpus(payload).await.unwrap_err();
    assert!(matches!(error.error, RagErr::Validation(_)));

    let mut payload = corpus();
    payload.documents.clear();
    let error = service.index_corpus(payload).await.unwrap_err();
    assert!(matches!(error.error, RagErr::InvalidInput(_)));

    let mut payload = corpus();
    payload.documents = vec![ExtractedDocument::new("blank.txt", " \n\n ")];
    let error = service.index_corpus(payload).await.unwrap_err();
    assert!(matches!(error.error, RagErr::InvalidInput(_)));

    service.index_corpus(corpus()).await.unwrap();

    let error = service.query(QueryPayload::new("   ")).await.unwrap_err();
    assert!(matches!(error.error, RagErr::Validation(_)));

    let mut payload = QueryPayload::new("Ownership?");
    payload.top_k = 0;
    let error = service.query(payload).await.unwrap_err();
    assert!(matches!(error.error, RagErr::Validation(_)));

    let mut payload = QueryPayload::new("Ownership?");
    payload.temperature = 3.;
    let error = service.query(payload).await.unwrap_err();
    assert!(matches!(error.error, RagErr::Validation(_)));

    reset(dir).await;
}

#[tokio::test]
async fn history_and_system_prompt() {
    let dir = "__rag_service_history";
    reset(dir).await;

    let (service, completer) = service(dir);
    service.index_corpus(corpus()).await.unwrap();

    let history: Vec<_> = (0..25)
        .map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            Message::new(role, format!("message {i}"))
        })
        .collect();

    let mut payload = QueryPayload::new("What about borrowing?");
    payload.history = history.clone();
    payload.system_prompt = Some("  Answer like a pirate.  ".to_string());
    service.query(payload).await.unwrap();

    let mut payload = QueryPayload::new("And ownership?");
    payload.system_prompt = Some("   ".to_string());
    service.query(payload).await.unwrap();

    let requests = completer.requests();

    assert_eq!(MAX_HISTORY_MESSAGES, requests[0].history.len());
    assert_eq!(history[5..], requests[0].history[..]);
    assert_eq!("Answer like a pirate.", requests[0].system_prompt);

    let last = requests[0].messages.last().unwrap();
    assert_eq!(Role::User, last.role);
    assert_eq!("What about borrowing?", last.content);

    assert!(requests[1].history.is_empty());
    assert_eq!(DEFAULT_SYSTEM_PROMPT, requests[1].system_prompt);

    reset(dir).await;
}

#[tokio::test]
async fn failed_save_keeps_previous_index() {
    let dir = "__rag_service_failed_save";
    reset(dir).await;

    let (service, completer) = service(dir);
    service.index_corpus(corpus()).await.unwrap();

    // A non-empty directory in place of the metadata file cannot be renamed over
    tokio::fs::remove_file(&service.paths().metadata).await.unwrap();
    tokio::fs::create_dir_all(service.paths().metadata.join("occupied"))
        .await
        .unwrap();

    let mut payload = corpus();
    payload.documents = vec![ExtractedDocument::new(
        "replacement.txt",
        "Nothing from the previous corpus is in here.",
    )];
    let error = service.index_corpus(payload).await.unwrap_err();
    assert!(matches!(error.error, RagErr::IO(_)));

    let stats = service.index_status().await.unwrap();
    assert!(stats.indexed);
    assert_eq!(3, stats.total_chunks);
    assert_eq!(
        vec!["borrowing.txt", "index.txt", "ownership.md"],
        stats.sources
    );

    let response = service.query(QueryPayload::new(SECOND)).await.unwrap();
    assert_eq!("borrowing.txt", response.sources[0].source);
    assert_eq!(1, completer.requests().len());

    reset(dir).await;
}

#[tokio::test]
async fn delete_index() {
    let dir = "__rag_service_delete";
    reset(dir).await;

    let (service, _) = service(dir);
    service.index_corpus(corpus()).await.unwrap();

    let report = service.delete_index().await.unwrap();
    assert_eq!(
        vec![service.paths().index.clone(), service.paths().metadata.clone()],
        report.deleted
    );

    assert!(!service.index_status().await.unwrap().indexed);

    let error = service.query(QueryPayload::new(FIRST)).await.unwrap_err();
    assert!(matches!(error.error, RagErr::IndexNotBuilt(_)));

    let error = service.delete_index().await.unwrap_err();
    assert!(matches!(error.error, RagErr::DoesNotExist(_)));

    reset(dir).await;
}

#[tokio::test]
async fn index_directory_reports_failures() {
    let dir = "__rag_service_directory";
    reset(dir).await;

    let uploads = format!("{dir}/uploads");
    tokio::fs::create_dir_all(&uploads).await.unwrap();
    tokio::fs::write(format!("{uploads}/ownership.md"), FIRST)
        .await
        .unwrap();
    tokio::fs::write(format!("{uploads}/borrowing.txt"), SECOND)
        .await
        .unwrap();
    tokio::fs::write(format!("{uploads}/sheet.xlsx"), "binary")
        .await
        .unwrap();
    tokio::fs::write(format!("{uploads}/.gitkeep"), "").await.unwrap();

    let (service, _) = service(dir);

    let report = service.index_directory(&uploads, 500, 50).await.unwrap();
    assert_eq!(2, report.documents_processed);
    assert_eq!(1, report.documents_failed);
    assert_eq!(2, report.total_chunks);

    let empty = format!("{dir}/empty");
    tokio::fs::create_dir_all(&empty).await.unwrap();
    let error = service.index_directory(&empty, 500, 50).await.unwrap_err();
    assert!(matches!(error.error, RagErr::InvalidInput(_)));

    reset(dir).await;
}

#[tokio::test]
async fn chunks_preview_numbers_across_documents() {
    let (service, _) = service("__rag_service_preview");

    let documents = vec![
        ExtractedDocument::new("a.txt", format!("{FIRST}\n\n{SECOND}")),
        ExtractedDocument::new("b.txt", THIRD),
    ];

    let chunks = service.chunk(&documents, 16, 4).unwrap();

    assert!(chunks.len() >= 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(i, chunk.chunk_id);
        assert!(chunk.token_count <= 16);
    }
    assert_eq!("b.txt", chunks.last().unwrap().source);
}
