use std::sync::Arc;
use std::time::Duration;

use api_router::{api_routes, api_state::ApiState};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use common::{
    providers::AiProvider,
    storage::{db::SurrealDbClient, store::StorageManager, types::ingestion_task::IngestionTask},
    utils::config::AppConfig,
};
use ingestion_pipeline::pipeline::IngestionPipeline;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    app: Router,
    db: Arc<SurrealDbClient>,
    pipeline: IngestionPipeline,
}

async fn build_test_app(mutate: impl FnOnce(&mut AppConfig)) -> TestApp {
    let mut config = AppConfig::for_tests("unused");
    config.embed_dim = 32;
    mutate(&mut config);

    let db = Arc::new(
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("failed to start in-memory surrealdb"),
    );
    db.ensure_initialized(config.embed_dim)
        .await
        .expect("failed to initialize indexes");

    let provider = Arc::new(AiProvider::from_config(&config));
    let storage = StorageManager::memory();

    let pipeline = IngestionPipeline::new(
        Arc::clone(&db),
        Arc::clone(&provider),
        storage.clone(),
        config.clone(),
    );

    let api_state = ApiState::new(
        Arc::clone(&db),
        provider,
        storage,
        config,
    );

    TestApp {
        app: api_routes(api_state),
        db,
        pipeline,
    }
}

/// Run queued ingestion jobs to completion, the way the worker loop would.
async fn drain_ingestion(test_app: &TestApp) {
    while let Some(task) = IngestionTask::claim_next_ready(
        &test_app.db,
        "test-worker",
        Utc::now(),
        Duration::from_secs(60),
    )
    .await
    .expect("claim")
    {
        let _ = test_app.pipeline.process_task(task).await;
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

async fn ingest_text(test_app: &TestApp, title: &str, text: &str) -> String {
    let (status, body) = send(
        &test_app.app,
        post_json(
            "/sources/ingest",
            &serde_json::json!({ "title": title, "text": text }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let source_id = body["id"].as_str().expect("source id").to_string();
    drain_ingestion(test_app).await;
    source_id
}

fn thesis_fixture() -> String {
    let mut body = String::from(
        "The main thesis of this study is that river trade shaped the growth of delta cities. \
         Merchants moved grain, timber, and salt along the river network every season. \
         Harbor masters kept detailed ledgers of every cargo that passed the locks.\n\n",
    );
    for i in 0..60 {
        body.push_str(&format!(
            "Chapter note {i}: the river network connected inland farms with coastal markets, \
             and ferry crossings charged a small toll on every shipment of grain. "
        ));
    }
    body
}

fn conflicts_fixture() -> String {
    let mut body = String::from(
        "The harbor tax funded the new lighthouse. \
         The lighthouse guided ships safely into the harbor at night.\n\n",
    );
    body.push_str(
        "Port records state the harbor tax never funded the new lighthouse, \
         and the lighthouse keeper disputes that ships were guided safely at night.\n\n",
    );
    for i in 0..20 {
        body.push_str(&format!(
            "Ledger entry {i}: routine accounts of harbor fees and lighthouse maintenance. "
        ));
    }
    body
}

// S1: ingest a multi-chunk source and watch it reach READY.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn source_reaches_ready_with_multiple_chunks() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let (status, body) = send(&test_app.app, get(&format!("/sources/{source_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["source_type"], "text");

    let chunks = common::storage::types::chunk::DocumentChunk::list_for_source(
        &source_id,
        &test_app.db,
    )
    .await
    .expect("chunks");
    assert!(chunks.len() >= 3, "expected >= 3 chunks, got {}", chunks.len());
}

// S2: a grounded answer with citations that resolve under the source.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn query_returns_cited_direct_answer() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let (status, body) = send(
        &test_app.app,
        post_json(
            "/query",
            &serde_json::json!({
                "question": "What is the main thesis?",
                "source_ids": [source_id],
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["answer_id"].as_str().is_some());
    assert_eq!(body["answer_style"], "direct");

    let citations = body["citations"].as_array().expect("citations");
    assert!(!citations.is_empty());
    for citation in citations {
        assert_eq!(citation["source_id"].as_str().expect("source"), source_id);
    }
}

// S3: Idempotency-Key replays return the same answer.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idempotency_key_replays_the_first_answer() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let request = |key: &str| {
        Request::builder()
            .method("POST")
            .uri("/query")
            .header(header::CONTENT_TYPE, "application/json")
            .header("Idempotency-Key", key)
            .body(Body::from(
                serde_json::json!({
                    "question": "What is the main thesis?",
                    "source_ids": [source_id],
                })
                .to_string(),
            ))
            .expect("request")
    };

    let (first_status, first) = send(&test_app.app, request("K1")).await;
    let (second_status, second) = send(&test_app.app, request("K1")).await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["answer_id"], second["answer_id"]);
    assert_eq!(first, second);
}

// S4: verified mode emits claims with verdicts and a consistent summary.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn verified_query_emits_consistent_claims() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let (status, body) = send(
        &test_app.app,
        post_json(
            "/query/verified",
            &serde_json::json!({
                "question": "What is the main thesis?",
                "source_ids": [source_id],
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let claims = body["claims"].as_array().expect("claims");
    assert!(!claims.is_empty());

    let allowed = [
        "supports",
        "weak_support",
        "unsupported",
        "contradicted",
        "conflicting",
    ];
    for claim in claims {
        let verdict = claim["verdict"].as_str().expect("verdict");
        assert!(allowed.contains(&verdict), "unexpected verdict {verdict}");
    }

    let summary = &body["verification_summary"];
    let total = summary["supported_count"].as_u64().expect("supported")
        + summary["weak_support_count"].as_u64().expect("weak")
        + summary["unsupported_count"].as_u64().expect("unsupported")
        + summary["contradicted_count"].as_u64().expect("contradicted")
        + summary["conflicting_count"].as_u64().expect("conflicting");
    assert_eq!(total, claims.len() as u64);
    assert_eq!(summary["answer_style"], body["answer_style"]);
}

// S5: contradictory material rewrites the answer into the sectioned form.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contradictory_sources_produce_a_rewritten_answer() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Harbor conflicts", &conflicts_fixture()).await;

    let (status, body) = send(
        &test_app.app,
        post_json(
            "/query/verified",
            &serde_json::json!({
                "question": "Did the harbor tax fund the new lighthouse?",
                "source_ids": [source_id],
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);

    let summary = &body["verification_summary"];
    assert_eq!(summary["has_contradictions"], true);
    assert_eq!(summary["overall_verdict"], "contradicted");

    let answer_text = body["answer_text"].as_str().expect("answer text");
    assert!(
        answer_text.starts_with("Contradictions detected in the source material."),
        "got: {answer_text}"
    );
    assert!(answer_text.contains("Conflicts:"));
    assert_eq!(body["answer_style"], "contradictions");

    let claims = body["claims"].as_array().expect("claims");
    assert!(claims.iter().any(|claim| {
        matches!(
            claim["verdict"].as_str(),
            Some("contradicted") | Some("conflicting")
        )
    }));
}

// S6: a question the corpus cannot answer gets the insufficient-evidence
// fallback with HTTP 200.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unanswerable_question_gets_the_fallback() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let (status, body) = send(
        &test_app.app,
        post_json(
            "/query",
            &serde_json::json!({
                "question": "zzz qqq nonexistent",
                "source_ids": [source_id],
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["answer_text"]
        .as_str()
        .expect("answer text")
        .contains("insufficient evidence"));
    assert_eq!(body["citations"].as_array().expect("citations").len(), 0);
    assert_eq!(body["answer_style"], "insufficient_evidence");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn verified_highlights_attach_offsets_into_chunk_text() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let (status, body) = send(
        &test_app.app,
        post_json(
            "/query/verified/highlights",
            &serde_json::json!({
                "question": "What is the main thesis?",
                "source_ids": [source_id],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let claims = body["claims"].as_array().expect("claims");
    let mut saw_highlight = false;
    for claim in claims {
        for evidence in claim["evidence"].as_array().expect("evidence") {
            let (Some(start), Some(end), Some(text)) = (
                evidence["highlight_start"].as_u64(),
                evidence["highlight_end"].as_u64(),
                evidence["highlight_text"].as_str(),
            ) else {
                continue;
            };
            saw_highlight = true;

            let chunk_id = evidence["chunk_id"].as_str().expect("chunk id");
            let chunks = common::storage::types::chunk::DocumentChunk::get_by_ids(
                &[chunk_id.to_string()],
                &test_app.db,
            )
            .await
            .expect("chunk lookup");
            let chunk = chunks.get(chunk_id).expect("chunk row");

            let sliced: String = chunk
                .text
                .chars()
                .skip(usize::try_from(start).expect("start"))
                .take(usize::try_from(end - start).expect("len"))
                .collect();
            assert_eq!(sliced, text);
        }
    }
    assert!(saw_highlight, "expected at least one highlight");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn persisted_answers_hydrate_with_groups() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let (_, body) = send(
        &test_app.app,
        post_json(
            "/query",
            &serde_json::json!({
                "question": "What is the main thesis?",
                "source_ids": [source_id],
            }),
        ),
    )
    .await;
    let answer_id = body["answer_id"].as_str().expect("answer id");

    let (status, fetched) = send(&test_app.app, get(&format!("/answers/{answer_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["answer_id"], body["answer_id"]);
    assert_eq!(fetched["answer_text"], body["answer_text"]);

    let (status, grouped) = send(
        &test_app.app,
        get(&format!("/answers/{answer_id}/grouped")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let groups = grouped["citation_groups"].as_array().expect("groups");
    assert!(!groups.is_empty());
    assert_eq!(groups[0]["source_id"].as_str().expect("source"), source_id);

    let (status, _) = send(&test_app.app, get("/answers/no-such-answer")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deleting_a_source_cascades_and_blocks_queries() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let delete_request = Request::builder()
        .method("DELETE")
        .uri(format!("/sources/{source_id}"))
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&test_app.app, delete_request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&test_app.app, get(&format!("/sources/{source_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let chunks = common::storage::types::chunk::DocumentChunk::list_for_source(
        &source_id,
        &test_app.db,
    )
    .await
    .expect("chunk listing");
    assert!(chunks.is_empty(), "cascade must remove chunks");

    let (status, _) = send(
        &test_app.app,
        post_json(
            "/query",
            &serde_json::json!({
                "question": "What is the main thesis?",
                "source_ids": [source_id],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ingest_requires_exactly_one_of_text_or_url() {
    let test_app = build_test_app(|_| {}).await;

    let (status, _) = send(
        &test_app.app,
        post_json("/sources/ingest", &serde_json::json!({ "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &test_app.app,
        post_json(
            "/sources/ingest",
            &serde_json::json!({ "text": "body", "url": "https://example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn url_ingestion_enforces_the_allowlist() {
    let test_app = build_test_app(|config| {
        config.url_allowlist = vec!["example.com".to_string()];
    })
    .await;

    let (status, _) = send(
        &test_app.app,
        post_json(
            "/sources/ingest",
            &serde_json::json!({ "url": "https://forbidden.org/article" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_pdf_uploads_are_rejected() {
    let test_app = build_test_app(|_| {}).await;

    let boundary = "test-boundary";
    let multipart_body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\nContent-Type: text/plain\r\n\r\nplain text\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/sources/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body))
        .expect("request");

    let (status, body) = send(&test_app.app, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(body["detail"].as_str().expect("detail").contains("pdf"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configured_api_key_is_enforced() {
    let test_app = build_test_app(|config| {
        config.api_key = Some("secret-key".to_string());
    })
    .await;

    // Health stays public.
    let (status, _) = send(&test_app.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&test_app.app, get("/sources")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let authed = Request::builder()
        .uri("/sources")
        .header("X-API-Key", "secret-key")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&test_app.app, authed).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_endpoints_report_status() {
    let test_app = build_test_app(|_| {}).await;

    let (status, body) = send(&test_app.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&test_app.app, get("/health/deps")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dependencies"]["ai_provider"], "fake");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fake_provider_answers_are_byte_identical() {
    let test_app = build_test_app(|_| {}).await;
    let source_id = ingest_text(&test_app, "Delta study", &thesis_fixture()).await;

    let request = post_json(
        "/query/verified",
        &serde_json::json!({
            "question": "What is the main thesis?",
            "source_ids": [source_id],
        }),
    );
    let (_, first) = send(&test_app.app, request).await;

    let request = post_json(
        "/query/verified",
        &serde_json::json!({
            "question": "What is the main thesis?",
            "source_ids": [source_id],
        }),
    );
    let (_, second) = send(&test_app.app, request).await;

    assert_eq!(first["answer_text"], second["answer_text"]);
    assert_eq!(first["claims"], second["claims"]);
    assert_eq!(first["verification_summary"], second["verification_summary"]);
}
