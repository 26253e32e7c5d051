//! Standalone pipeline worker
//!
//! Runs queue workers against an existing database without serving HTTP.
//! Useful for scaling pipeline throughput separately from the API.

use clap::Parser;
use lendcase_core::classify::{Classifier, TermWeightModel};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lendcase_server::clients::Clients;
use lendcase_server::config::ServerConfig;
use lendcase_server::db::Database;
use lendcase_server::metrics;
use lendcase_server::storage::BlobStore;
use lendcase_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    metrics::init();

    let db = Database::open(&config.db_path)?;
    let store = BlobStore::open(&config.blob_dir)?;
    let clients = Clients::from_config(&config);
    let classifier = match &config.model_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Classifier::with_model(TermWeightModel::from_json(&json)?)
        }
        None => Classifier::new(),
    };

    let workers = config.workers.max(1);
    let state = AppState::assemble(config, db, store, clients, classifier);
    info!(workers, "starting lendcase worker");

    let handles = state.pipeline.spawn_workers(workers);
    for handle in handles {
        handle.await?;
    }
    Ok(())
}
