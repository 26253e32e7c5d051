//! Common test utilities

use std::collections::BTreeSet;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lendcase_core::classify::Classifier;
use lendcase_core::model::{DocumentType, EntityType, LenderProduct};
use tower::ServiceExt;

use lendcase_server::api;
use lendcase_server::clients::Clients;
use lendcase_server::config::ServerConfig;
use lendcase_server::db::{lenders, Database};
use lendcase_server::storage::BlobStore;
use lendcase_server::AppState;

pub const BOUNDARY: &str = "test-boundary-7d83a1";

/// Build an app over an in-memory database and a temp blob store
pub fn test_app() -> (Router, AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let store = BlobStore::open(dir.path()).unwrap();
    let state = AppState::assemble(
        ServerConfig::default(),
        db,
        store,
        Clients::disabled(),
        Classifier::new(),
    );
    (api::router(state.clone()), state, dir)
}

/// Seed a handful of lender products covering both strict and lenient policies
pub fn seed_lenders(state: &AppState) {
    let mut products = Vec::new();
    for (i, (lender, min_cibil, min_turnover)) in [
        ("Axis Finance", 700u16, 5_000_000.0),
        ("Kotak Capital", 680, 3_000_000.0),
        ("Bajaj Markets", 720, 8_000_000.0),
        ("Chola Invest", 650, 2_000_000.0),
        ("Tata Lending", 700, 6_000_000.0),
        ("IIFL Credit", 675, 4_000_000.0),
        ("Poonawalla Fin", 690, 3_500_000.0),
        ("Lendingkart", 660, 2_500_000.0),
        ("Indifi Business", 665, 2_000_000.0),
        ("Flexi Capital", 640, 1_500_000.0),
    ]
    .iter()
    .enumerate()
    {
        products.push(LenderProduct {
            id: 0,
            lender_name: lender.to_string(),
            product_name: "Business Loan".to_string(),
            program_type: None,
            is_active: i != 9, // one inactive product must never be evaluated
            policy_available: true,
            min_cibil_score: Some(*min_cibil),
            min_vintage_years: Some(2.0),
            min_turnover_annual: Some(*min_turnover),
            min_abb: Some(50_000.0),
            age_min: Some(23),
            age_max: Some(65),
            max_ticket_size: Some(5_000_000.0),
            max_dpd_30plus: Some(0),
            eligible_entity_types: [EntityType::Proprietorship, EntityType::Partnership].into(),
            required_documents: [DocumentType::Pan, DocumentType::BankStatement]
                .into_iter()
                .collect::<BTreeSet<_>>(),
            enforces_pincode: false,
        });
    }
    state
        .db
        .with_tx(|tx| {
            for p in &products {
                lenders::upsert(tx, p)?;
            }
            Ok(())
        })
        .unwrap();
}

/// POST a JSON body
pub async fn post_json(app: &Router, path: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// GET a path
pub async fn get(app: &Router, path: &str) -> Response<Body> {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Read a response body to bytes
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

/// Read a response body as JSON
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Assert status and parse the body
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status, "unexpected status");
    body_json(response).await
}

/// Build a multipart upload body from (filename, bytes) parts
pub fn multipart_body(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST a multipart upload
pub async fn upload(app: &Router, case_id: &str, parts: &[(&str, &[u8])]) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/cases/{case_id}/upload"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Create a case with manual overrides strong enough to clear hard filters
pub async fn create_scored_case(app: &Router) -> String {
    let response = post_json(
        app,
        "/api/v1/cases",
        serde_json::json!({
            "borrower_name": "Ravi Kumar",
            "program_type": "BANKING",
            "overrides": {
                "cibil_score": 760,
                "entity_type": "PROPRIETORSHIP",
                "annual_turnover": 20000000,
                "business_vintage_years": 5.5,
                "avg_monthly_balance": 200000,
                "monthly_credit_avg": 1700000,
                "bounces_12m": 0,
                "cash_deposit_ratio": 0.1,
                "existing_emis": 100000,
                "active_loans": 1,
                "overdues": 0,
                "enquiries_12m": 2,
                "pincode": "400001",
                "dob": "1985-05-01"
            }
        }),
    )
    .await;
    let json = expect_json(response, StatusCode::CREATED).await;
    json["case_id"].as_str().unwrap().to_string()
}
