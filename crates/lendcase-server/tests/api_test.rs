//! HTTP API integration tests

mod common;

use axum::http::StatusCode;
use common::*;

#[tokio::test]
async fn test_health() {
    let (app, _state, _dir) = test_app();
    let response = get(&app, "/health").await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_create_case_assigns_daily_sequence() {
    let (app, _state, _dir) = test_app();
    let first = expect_json(
        post_json(
            &app,
            "/api/v1/cases",
            serde_json::json!({ "borrower_name": "Ravi", "program_type": "BANKING" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let second = expect_json(
        post_json(
            &app,
            "/api/v1/cases",
            serde_json::json!({ "borrower_name": "Meera", "program_type": "GST" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;

    let a = first["case_id"].as_str().unwrap();
    let b = second["case_id"].as_str().unwrap();
    assert!(a.starts_with("CASE-"));
    assert!(a.ends_with("-0001"));
    assert!(b.ends_with("-0002"));
    assert_eq!(first["status"], "CREATED");
}

#[tokio::test]
async fn test_create_case_rejects_bad_program() {
    let (app, _state, _dir) = test_app();
    let response = post_json(
        &app,
        "/api/v1/cases",
        serde_json::json!({ "borrower_name": "Ravi", "program_type": "CRYPTO" }),
    )
    .await;
    let json = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_case_is_404_with_envelope() {
    let (app, _state, _dir) = test_app();
    let response = get(&app, "/api/v1/cases/CASE-20990101-0001").await;
    let json = expect_json(response, StatusCode::NOT_FOUND).await;
    assert_eq!(json["error"]["code"], "CASE_NOT_FOUND");
}

#[tokio::test]
async fn test_upload_reports_partial_outcomes() {
    let (app, _state, _dir) = test_app();
    let case_id = create_scored_case(&app).await;

    let response = upload(
        &app,
        &case_id,
        &[
            ("pan_card.jpg", b"jpeg-bytes-1".as_slice()),
            ("notes.txt", b"not allowed".as_slice()),
        ],
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["created"].as_array().unwrap().len(), 1);
    assert_eq!(json["rejected"].as_array().unwrap().len(), 1);
    assert_eq!(json["rejected"][0]["filename"], "notes.txt");
}

#[tokio::test]
async fn test_single_duplicate_upload_conflicts() {
    let (app, _state, _dir) = test_app();
    let case_id = create_scored_case(&app).await;

    let first = upload(&app, &case_id, &[("pan.jpg", b"same-bytes".as_slice())]).await;
    let first = expect_json(first, StatusCode::OK).await;
    let original_id = first["created"][0]["doc_id"].as_str().unwrap().to_string();

    let second = upload(&app, &case_id, &[("pan.jpg", b"same-bytes".as_slice())]).await;
    let json = expect_json(second, StatusCode::CONFLICT).await;
    assert_eq!(json["error"]["code"], "DUPLICATE_DOCUMENT");
    assert_eq!(json["error"]["details"]["doc_id"], original_id.as_str());

    // Still exactly one document on the case
    let docs = expect_json(
        get(&app, &format!("/api/v1/cases/{case_id}/documents")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(docs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_zip_upload_skips_junk_entries() {
    use std::io::Write;
    let (app, _state, _dir) = test_app();
    let case_id = create_scored_case(&app).await;

    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let opts = zip::write::FileOptions::default();
        writer.start_file("__MACOSX/._statement.pdf", opts).unwrap();
        writer.write_all(b"junk").unwrap();
        writer.start_file(".DS_Store", opts).unwrap();
        writer.write_all(b"junk").unwrap();
        writer.start_file("statement.jpg", opts).unwrap();
        writer.write_all(b"statement-scan").unwrap();
        writer.finish().unwrap();
    }
    let response = upload(&app, &case_id, &[("bundle.zip", buf.as_slice())]).await;
    let json = expect_json(response, StatusCode::OK).await;
    let created = json["created"].as_array().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["filename"], "statement.jpg");
}

#[tokio::test]
async fn test_features_not_built_is_422() {
    let (app, _state, _dir) = test_app();
    let case_id = create_scored_case(&app).await;
    let response = get(&app, &format!("/api/v1/extraction/case/{case_id}/features")).await;
    let json = expect_json(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(json["error"]["code"], "FEATURES_NOT_BUILT");
}

#[tokio::test]
async fn test_eligibility_requires_features() {
    let (app, state, _dir) = test_app();
    seed_lenders(&state);
    let case_id = create_scored_case(&app).await;
    let response = post_json(
        &app,
        &format!("/api/v1/eligibility/case/{case_id}/score"),
        serde_json::json!({}),
    )
    .await;
    let json = expect_json(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(json["error"]["code"], "FEATURES_NOT_BUILT");
}

#[tokio::test]
async fn test_copilot_knowledge_query_skips_retrieval() {
    let (app, _state, _dir) = test_app();
    let response = post_json(
        &app,
        "/api/v1/copilot/query",
        serde_json::json!({ "query": "what is FOIR" }),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["query_type"], "KNOWLEDGE");
    assert_eq!(json["sources"].as_array().unwrap().len(), 0);
    let text = json["response"].as_str().unwrap();
    assert!(text.contains("Fixed Obligation to Income Ratio"));
    assert!(text.contains("monthly EMIs / monthly income"));

    // The exchange is persisted with its detected type
    let history = expect_json(get(&app, "/api/v1/copilot/history").await, StatusCode::OK).await;
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["query_type"], "KNOWLEDGE");
}

#[tokio::test]
async fn test_copilot_cibil_query_uses_template_fallback() {
    let (app, state, _dir) = test_app();
    seed_lenders(&state);
    let response = post_json(
        &app,
        "/api/v1/copilot/query",
        serde_json::json!({ "query": "which lenders work for cibil 690?" }),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["query_type"], "CIBIL");
    // min_cibil_score ≤ 690: Kotak 680, Chola 650, IIFL 675, Poonawalla 690,
    // Lendingkart 660, Indifi 665 (Flexi is inactive)
    assert_eq!(json["sources"].as_array().unwrap().len(), 6);
    assert!(json["response"].as_str().unwrap().contains("matching products"));
}

#[tokio::test]
async fn test_operator_isolation() {
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    let (app, _state, _dir) = test_app();
    let case_id = create_scored_case(&app).await; // default operator

    let request = Request::builder()
        .uri(format!("/api/v1/cases/{case_id}"))
        .header("X-Operator-Id", "someone-else")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
