//! End-to-end pipeline tests: upload → OCR → classify → extract → cascade →
//! assemble → eligibility → report, driven by draining the durable queue.

mod common;

use axum::http::StatusCode;
use common::*;

/// Upload image documents (textless OCR path), drain the queue and verify
/// the case reaches the eligibility-scored state with ranked results.
#[tokio::test]
async fn test_happy_path_through_pipeline() {
    let (app, state, _dir) = test_app();
    seed_lenders(&state);
    let case_id = create_scored_case(&app).await;

    let response = upload(
        &app,
        &case_id,
        &[
            ("pan_card.jpg", b"jpeg-pan".as_slice()),
            ("aadhaar_front.jpg", b"jpeg-aadhaar".as_slice()),
            ("gst_certificate.png", b"png-gst".as_slice()),
            ("hdfc_bank_statement.jpg", b"jpeg-statement".as_slice()),
        ],
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["created"].as_array().unwrap().len(), 4);

    let executed = state.pipeline.drain().await.unwrap();
    assert!(executed >= 12, "expected a full cascade, ran {executed} jobs");

    // Every document classified from its filename
    let docs = expect_json(
        get(&app, &format!("/api/v1/cases/{case_id}/documents")).await,
        StatusCode::OK,
    )
    .await;
    let docs = docs.as_array().unwrap().clone();
    assert_eq!(docs.len(), 4);
    for doc in &docs {
        assert_eq!(doc["status"], "EXTRACTED", "doc {doc}");
        assert!(doc["classification_confidence"].as_f64().unwrap() >= 0.90);
    }
    let types: Vec<&str> = docs.iter().map(|d| d["doc_type"].as_str().unwrap()).collect();
    assert!(types.contains(&"PAN"));
    assert!(types.contains(&"AADHAAR"));
    assert!(types.contains(&"GST_CERTIFICATE"));
    assert!(types.contains(&"BANK_STATEMENT"));

    // Features assembled from the case overrides
    let features = expect_json(
        get(&app, &format!("/api/v1/extraction/case/{case_id}/features")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(features["cibil_score"], 760);
    assert!(features["feature_completeness"].as_f64().unwrap() >= 70.0);

    // Eligibility ran automatically: 9 active products evaluated, strong
    // borrower passes the lenient ones
    let results = expect_json(
        get(&app, &format!("/api/v1/eligibility/case/{case_id}/results")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(results["total_lenders_evaluated"], 9);
    let passed = results["lenders_passed"].as_u64().unwrap();
    assert!(passed >= 1, "no lender passed");
    let top = &results["results"][0];
    assert_eq!(top["rank"], 1);
    let score = top["eligibility_score"].as_f64().unwrap();
    assert!((50.0..=100.0).contains(&score));

    let status = expect_json(
        get(&app, &format!("/api/v1/cases/{case_id}/status")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(status["status"], "ELIGIBILITY_SCORED");
}

/// Ranks within one run are dense 1..k over PASS rows
#[tokio::test]
async fn test_ranks_are_dense_over_pass_rows() {
    let (app, state, _dir) = test_app();
    seed_lenders(&state);
    let case_id = create_scored_case(&app).await;
    upload(&app, &case_id, &[("pan.jpg", b"x".as_slice())]).await;
    state.pipeline.drain().await.unwrap();

    let results = expect_json(
        get(&app, &format!("/api/v1/eligibility/case/{case_id}/results")).await,
        StatusCode::OK,
    )
    .await;
    let rows = results["results"].as_array().unwrap();
    let mut ranks: Vec<u64> = rows
        .iter()
        .filter(|r| r["hard_filter_status"] == "PASS")
        .map(|r| r["rank"].as_u64().unwrap())
        .collect();
    ranks.sort_unstable();
    let expected: Vec<u64> = (1..=ranks.len() as u64).collect();
    assert_eq!(ranks, expected);
    for row in rows.iter().filter(|r| r["hard_filter_status"] == "FAIL") {
        assert!(row["rank"].is_null());
        assert!(row["eligibility_score"].is_null());
    }
}

/// A corrupt PDF fails OCR permanently; the rest of the case still reaches
/// eligibility with the failed document recorded.
#[tokio::test]
async fn test_failed_document_does_not_block_case() {
    let (app, state, _dir) = test_app();
    seed_lenders(&state);
    let case_id = create_scored_case(&app).await;

    upload(
        &app,
        &case_id,
        &[
            ("cibil_report.pdf", b"definitely not a pdf".as_slice()),
            ("pan_card.jpg", b"jpeg-pan".as_slice()),
        ],
    )
    .await;
    state.pipeline.drain().await.unwrap();

    let status = expect_json(
        get(&app, &format!("/api/v1/cases/{case_id}/status")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(status["status"], "ELIGIBILITY_SCORED");
    let docs = status["documents"].as_array().unwrap();
    let failed: Vec<_> = docs.iter().filter(|d| d["status"] == "FAILED").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["filename"], "cibil_report.pdf");
    assert_eq!(failed[0]["failure_reason"], "corrupt_file");

    let checklist = expect_json(
        get(&app, &format!("/api/v1/cases/{case_id}/checklist")).await,
        StatusCode::OK,
    )
    .await;
    // The failed CIBIL report does not count as available
    assert!(checklist["available"]
        .as_array()
        .unwrap()
        .iter()
        .all(|d| d != "CIBIL_REPORT"));
}

/// Deleting a case cancels its queued pipeline work
#[tokio::test]
async fn test_delete_cancels_jobs() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let (app, state, _dir) = test_app();
    let case_id = create_scored_case(&app).await;
    upload(&app, &case_id, &[("pan.jpg", b"x".as_slice())]).await;

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/cases/{case_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Nothing left to run
    assert_eq!(state.pipeline.drain().await.unwrap(), 0);
    // And the case is gone from the operator's view
    let response = get(&app, &format!("/api/v1/cases/{case_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Report generation renders a PDF and a digest over the scored case
#[tokio::test]
async fn test_report_generation_and_artifacts() {
    let (app, state, _dir) = test_app();
    seed_lenders(&state);
    let case_id = create_scored_case(&app).await;
    upload(
        &app,
        &case_id,
        &[
            ("pan.jpg", b"jpeg-pan".as_slice()),
            ("icici_bank_statement.jpg", b"jpeg-stmt".as_slice()),
        ],
    )
    .await;
    state.pipeline.drain().await.unwrap();

    let generated = expect_json(
        post_json(
            &app,
            &format!("/api/v1/reports/case/{case_id}/generate"),
            serde_json::json!({}),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert!(generated["lenders_matched"].as_u64().unwrap() >= 1);
    assert!(generated["pdf_key"].as_str().unwrap().ends_with(".pdf"));

    let pdf = get(&app, &format!("/api/v1/reports/case/{case_id}/report/pdf")).await;
    assert_eq!(pdf.status(), StatusCode::OK);
    let bytes = body_bytes(pdf).await;
    assert!(bytes.starts_with(b"%PDF"));

    let digest = get(&app, &format!("/api/v1/reports/case/{case_id}/report/whatsapp")).await;
    assert_eq!(digest.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(digest).await).unwrap();
    assert!(text.contains(&case_id));
    assert!(text.contains("CIBIL: 760"));

    let status = expect_json(
        get(&app, &format!("/api/v1/cases/{case_id}/status")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(status["status"], "REPORT_READY");
}

/// Running extraction twice with no new inputs yields the same vector
#[tokio::test]
async fn test_feature_assembly_idempotent_over_http() {
    let (app, state, _dir) = test_app();
    seed_lenders(&state);
    let case_id = create_scored_case(&app).await;
    upload(&app, &case_id, &[("pan.jpg", b"jpeg".as_slice())]).await;
    state.pipeline.drain().await.unwrap();

    let first = expect_json(
        get(&app, &format!("/api/v1/extraction/case/{case_id}/features")).await,
        StatusCode::OK,
    )
    .await;
    expect_json(
        post_json(
            &app,
            &format!("/api/v1/extraction/case/{case_id}/extract"),
            serde_json::json!({}),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    let second = expect_json(
        get(&app, &format!("/api/v1/extraction/case/{case_id}/features")).await,
        StatusCode::OK,
    )
    .await;

    let mut a = first.clone();
    let mut b = second.clone();
    a.as_object_mut().unwrap().remove("updated_at");
    b.as_object_mut().unwrap().remove("updated_at");
    assert_eq!(a, b);
}
