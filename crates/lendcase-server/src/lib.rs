//! Lendcase Server
//!
//! HTTP API, SQLite persistence, blob storage, the durable job queue and the
//! outbound collaborator clients. Domain logic lives in `lendcase-core`;
//! this crate wires it to the outside world.

#![warn(clippy::all)]

pub mod api;
pub mod audit;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod ocr;
pub mod pdf;
pub mod storage;
pub mod throttle;

use std::sync::Arc;

use lendcase_core::classify::Classifier;
use lendcase_core::eligibility::EligibilityConfig;

use crate::audit::AuditLogger;
use crate::clients::Clients;
use crate::config::ServerConfig;
use crate::db::Database;
use crate::jobs::Pipeline;
use crate::storage::BlobStore;
use crate::throttle::OperatorLimiter;

/// Application state shared across handlers and workers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub store: BlobStore,
    pub pipeline: Arc<Pipeline>,
    pub clients: Arc<Clients>,
    pub audit: Arc<AuditLogger>,
    pub operator_limiter: Arc<OperatorLimiter>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Assemble the full application state from its parts
    pub fn assemble(
        config: ServerConfig,
        db: Database,
        store: BlobStore,
        clients: Clients,
        classifier: Classifier,
    ) -> Self {
        let db = Arc::new(db);
        let clients = Arc::new(clients);
        let audit = Arc::new(AuditLogger::new(config.audit_dir.clone()));
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&db),
            store.clone(),
            Arc::clone(&clients),
            Arc::new(classifier),
            EligibilityConfig::default(),
            Arc::clone(&audit),
            config.max_job_attempts,
            config.backoff_base_secs,
        ));
        Self {
            db,
            store,
            pipeline,
            clients,
            audit,
            operator_limiter: Arc::new(OperatorLimiter::per_second(config.operator_qps)),
            config: Arc::new(config),
        }
    }
}
