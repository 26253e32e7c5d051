//! Pipeline job runner
//!
//! Workers poll the durable queue, claim one job under the write lock, run
//! its handler with a wall-clock budget, then commit the terminal state.
//! Stage hand-off happens only through rows committed by handlers; a process
//! restart loses nothing.

pub mod handlers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use lendcase_core::classify::Classifier;
use lendcase_core::eligibility::EligibilityConfig;
use lendcase_core::error::{CaseError, Result};
use lendcase_core::model::JobState;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::clients::Clients;
use crate::db::{jobs, Database};
use crate::metrics;
use crate::storage::BlobStore;

/// Idle poll interval for workers
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Everything a stage handler needs; constructed once at process start
pub struct Pipeline {
    pub db: Arc<Database>,
    pub store: BlobStore,
    pub clients: Arc<Clients>,
    pub classifier: Arc<Classifier>,
    pub eligibility: EligibilityConfig,
    pub audit: Arc<AuditLogger>,
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    /// Per-case locks serializing eligibility runs
    eligibility_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<Database>,
        store: BlobStore,
        clients: Arc<Clients>,
        classifier: Arc<Classifier>,
        eligibility: EligibilityConfig,
        audit: Arc<AuditLogger>,
        max_attempts: u32,
        backoff_base_secs: u64,
    ) -> Self {
        Self {
            db,
            store,
            clients,
            classifier,
            eligibility,
            audit,
            max_attempts,
            backoff_base_secs,
            eligibility_locks: DashMap::new(),
        }
    }

    /// The lock serializing eligibility runs for one case
    pub(crate) fn eligibility_lock(&self, case: Uuid) -> Arc<Mutex<()>> {
        self.eligibility_locks
            .entry(case)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Spawn `count` long-lived worker tasks
    pub fn spawn_workers(self: &Arc<Self>, count: usize) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|worker| {
                let pipeline = Arc::clone(self);
                tokio::spawn(async move {
                    info!(worker, "pipeline worker started");
                    loop {
                        match pipeline.step().await {
                            Ok(true) => {}
                            Ok(false) => tokio::time::sleep(POLL_INTERVAL).await,
                            Err(e) => {
                                error!(worker, error = %e, "worker step failed");
                                tokio::time::sleep(POLL_INTERVAL).await;
                            }
                        }
                    }
                })
            })
            .collect()
    }

    /// Run queued jobs until the queue has nothing runnable. Returns how many
    /// jobs were executed. Drives tests and the one-shot worker mode.
    pub async fn drain(&self) -> Result<usize> {
        let mut executed = 0;
        while self.step().await? {
            executed += 1;
        }
        Ok(executed)
    }

    /// Claim and execute at most one job
    async fn step(&self) -> Result<bool> {
        let now = Utc::now();
        let Some(job) = self.db.with_tx(|tx| jobs::claim_next(tx, now))? else {
            return Ok(false);
        };

        let started = Instant::now();
        let budget = Duration::from_secs(job.kind.timeout_secs());
        let outcome = match tokio::time::timeout(budget, handlers::execute(self, &job)).await {
            Ok(result) => result,
            Err(_) => Err(CaseError::external_transient(job.kind.as_str(), "timeout")),
        };
        let elapsed = started.elapsed();

        // A cancellation racing the handler wins: leave the job cancelled and
        // skip the terminal-state write
        if self.db.with_conn(|c| jobs::is_cancelled(c, job.id))? {
            warn!(job = job.id, kind = job.kind.as_str(), "job cancelled mid-flight");
            metrics::record_job(job.kind.as_str(), "cancelled", elapsed.as_secs_f64());
            return Ok(true);
        }

        let now = Utc::now();
        match outcome {
            Ok(()) => {
                self.db.with_conn(|c| jobs::mark_succeeded(c, job.id, now))?;
                metrics::record_job(job.kind.as_str(), "succeeded", elapsed.as_secs_f64());
            }
            Err(e) => {
                let final_state = self.db.with_conn(|c| {
                    jobs::fail_or_retry(
                        c,
                        &job,
                        &e.to_string(),
                        e.is_retryable(),
                        self.max_attempts,
                        self.backoff_base_secs,
                        now,
                    )
                })?;
                warn!(
                    job = job.id,
                    kind = job.kind.as_str(),
                    attempts = job.attempts,
                    state = final_state.as_str(),
                    error = %e,
                    "job handler failed"
                );
                let label = if final_state == JobState::Queued { "retried" } else { "failed" };
                metrics::record_job(job.kind.as_str(), label, elapsed.as_secs_f64());
            }
        }
        Ok(true)
    }
}
