//! Lendcase Case Processing Server
//!
//! Serves the operator HTTP API and runs the pipeline queue workers.

use std::fs;

use anyhow::Context;
use clap::Parser;
use lendcase_core::classify::{Classifier, TermWeightModel};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lendcase_server::api;
use lendcase_server::audit::AuditEvent;
use lendcase_server::clients::Clients;
use lendcase_server::config::ServerConfig;
use lendcase_server::db::{lenders, Database};
use lendcase_server::metrics;
use lendcase_server::storage::BlobStore;
use lendcase_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    metrics::init();

    // Stores and clients, constructed once and passed explicitly
    let db = Database::open(&config.db_path).context("open database")?;
    let store = BlobStore::open(&config.blob_dir).context("open blob store")?;
    let clients = Clients::from_config(&config);

    let classifier = match &config.model_path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("read classifier model {}", path.display()))?;
            let model = TermWeightModel::from_json(&json).context("parse classifier model")?;
            info!(model = %path.display(), "classifier model loaded");
            Classifier::with_model(model)
        }
        None => Classifier::new(),
    };

    let workers = config.workers.max(1);
    let http_addr = config.http_addr;
    let state = AppState::assemble(config, db, store, clients, classifier);

    let lender_products = state.db.with_conn(lenders::list_all).map(|v| v.len()).unwrap_or(0);
    metrics::set_lender_products(lender_products as i64);
    state.audit.log(AuditEvent::ServerStarted {
        version: lendcase_core::VERSION.to_string(),
        lender_products,
    });

    // Pipeline workers run for the life of the process
    let _workers = state.pipeline.spawn_workers(workers);

    let app = api::router(state);
    info!(%http_addr, workers, "starting lendcase server");
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
