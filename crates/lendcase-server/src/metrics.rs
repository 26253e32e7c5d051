//! Prometheus metrics for the Lendcase server

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    register_int_gauge, CounterVec, Encoder, Gauge, GaugeVec, HistogramVec, IntGauge, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    /// Server start time for uptime calculation
    pub static ref START_TIME: Instant = Instant::now();

    // ==================== Server Metrics ====================

    /// Server info gauge (always 1, used for version label)
    pub static ref INFO: GaugeVec = register_gauge_vec!(
        "lendcase_info",
        "Lendcase server info",
        &["version"]
    ).unwrap();

    /// Server uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "lendcase_uptime_seconds",
        "Server uptime in seconds"
    ).unwrap();

    /// Loaded lender products
    pub static ref LENDER_PRODUCTS_TOTAL: IntGauge = register_int_gauge!(
        "lendcase_lender_products_total",
        "Lender products in the reference tables"
    ).unwrap();

    // ==================== HTTP Metrics ====================

    /// Total HTTP requests counter
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "lendcase_http_requests_total",
        "Total number of HTTP requests",
        &["method", "endpoint", "status"]
    ).unwrap();

    // ==================== Upload Metrics ====================

    /// Upload outcomes per file
    pub static ref UPLOAD_FILES_TOTAL: CounterVec = register_counter_vec!(
        "lendcase_upload_files_total",
        "Uploaded file outcomes",
        &["outcome"]
    ).unwrap();

    // ==================== Pipeline Metrics ====================

    /// Jobs finished, by kind and final state
    pub static ref JOBS_TOTAL: CounterVec = register_counter_vec!(
        "lendcase_jobs_total",
        "Finished pipeline jobs",
        &["kind", "state"]
    ).unwrap();

    /// Stage handler duration
    pub static ref JOB_DURATION: HistogramVec = register_histogram_vec!(
        "lendcase_job_duration_seconds",
        "Pipeline job handler duration in seconds",
        &["kind"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 120.0]
    ).unwrap();

    /// Eligibility runs
    pub static ref ELIGIBILITY_RUNS_TOTAL: CounterVec = register_counter_vec!(
        "lendcase_eligibility_runs_total",
        "Eligibility runs",
        &["result"]
    ).unwrap();

    // ==================== Copilot Metrics ====================

    /// Copilot queries by detected type and answer path
    pub static ref COPILOT_QUERIES_TOTAL: CounterVec = register_counter_vec!(
        "lendcase_copilot_queries_total",
        "Copilot queries",
        &["query_type", "path"]
    ).unwrap();
}

/// Initialize metrics (call once at startup)
pub fn init() {
    INFO.with_label_values(&[lendcase_core::VERSION]).set(1.0);
    LENDER_PRODUCTS_TOTAL.set(0);
}

/// Update uptime metric
pub fn update_uptime() {
    UPTIME_SECONDS.set(START_TIME.elapsed().as_secs_f64());
}

pub fn set_lender_products(count: i64) {
    LENDER_PRODUCTS_TOTAL.set(count);
}

pub fn record_http_request(method: &str, endpoint: &str, status: u16) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();
}

pub fn record_upload(outcome: &str, count: usize) {
    UPLOAD_FILES_TOTAL
        .with_label_values(&[outcome])
        .inc_by(count as f64);
}

pub fn record_job(kind: &str, state: &str, duration_secs: f64) {
    JOBS_TOTAL.with_label_values(&[kind, state]).inc();
    JOB_DURATION.with_label_values(&[kind]).observe(duration_secs);
}

pub fn record_eligibility_run(result: &str) {
    ELIGIBILITY_RUNS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_copilot_query(query_type: &str, path: &str) {
    COPILOT_QUERIES_TOTAL
        .with_label_values(&[query_type, path])
        .inc();
}

/// Render the default registry in text exposition format
pub fn render() -> String {
    update_uptime();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
