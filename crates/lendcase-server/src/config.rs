//! Server configuration

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Lendcase Case Processing Server
#[derive(Parser, Debug, Clone)]
#[command(name = "lendcase-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// HTTP server address (e.g., 0.0.0.0:8080)
    #[arg(long, env = "LENDCASE_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    /// SQLite database path
    #[arg(long, env = "LENDCASE_DB_PATH", default_value = "lendcase.db")]
    pub db_path: PathBuf,

    /// Blob store root directory
    #[arg(long, env = "LENDCASE_BLOB_DIR", default_value = "blobs")]
    pub blob_dir: PathBuf,

    /// Number of pipeline queue workers
    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Classifier model file (JSON term weights). Optional; without it the
    /// classifier runs on filename and keyword signals only.
    #[arg(long, env = "LENDCASE_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Audit log directory (optional).
    /// When specified, audit events are written to JSON Lines files in this
    /// directory with daily rotation (audit-YYYY-MM-DD.jsonl). Events are
    /// also logged to stdout regardless of this setting.
    #[arg(long)]
    pub audit_dir: Option<PathBuf>,

    /// GSTIN lookup provider base URL (optional enricher)
    #[arg(long, env = "LENDCASE_GSTIN_BASE_URL")]
    pub gstin_base_url: Option<String>,

    /// Bank-statement analyzer base URL (optional enricher)
    #[arg(long, env = "LENDCASE_BANK_ANALYZER_URL")]
    pub bank_analyzer_url: Option<String>,

    /// LLM chat-completions base URL (OpenAI style)
    #[arg(long, env = "LENDCASE_LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// LLM API key
    #[arg(long, env = "LENDCASE_LLM_API_KEY")]
    pub llm_api_key: Option<String>,

    /// LLM model name
    #[arg(long, env = "LENDCASE_LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    /// WhatsApp gateway base URL
    #[arg(long, env = "LENDCASE_WHATSAPP_GATEWAY_URL")]
    pub whatsapp_gateway_url: Option<String>,

    /// Enricher call timeout in seconds
    #[arg(long, default_value = "15")]
    pub enricher_timeout_secs: u64,

    /// LLM call timeout in seconds
    #[arg(long, default_value = "30")]
    pub llm_timeout_secs: u64,

    /// Maximum job attempts before a job is left failed
    #[arg(long, default_value = "3")]
    pub max_job_attempts: u32,

    /// Retry backoff base in seconds (doubles per attempt)
    #[arg(long, default_value = "10")]
    pub backoff_base_secs: u64,

    /// Per-operator request rate limit (requests/second, 0 = unlimited)
    #[arg(long, default_value = "0")]
    pub operator_qps: u32,

    /// Maximum size of one uploaded file in bytes
    #[arg(long, default_value = "26214400")]
    pub max_file_bytes: u64,

    /// Maximum aggregate upload size per case in bytes
    #[arg(long, default_value = "104857600")]
    pub max_case_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".parse().unwrap(),
            db_path: PathBuf::from("lendcase.db"),
            blob_dir: PathBuf::from("blobs"),
            workers: 4,
            log_level: "info".to_string(),
            model_path: None,
            audit_dir: None,
            gstin_base_url: None,
            bank_analyzer_url: None,
            llm_base_url: None,
            llm_api_key: None,
            llm_model: "gpt-4o-mini".to_string(),
            whatsapp_gateway_url: None,
            enricher_timeout_secs: 15,
            llm_timeout_secs: 30,
            max_job_attempts: 3,
            backoff_base_secs: 10,
            operator_qps: 0,
            max_file_bytes: 25 * 1024 * 1024,
            max_case_bytes: 100 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Whether the LLM client is configured
    pub fn llm_enabled(&self) -> bool {
        self.llm_base_url.is_some() && self.llm_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = ServerConfig::default();
        assert_eq!(config.max_file_bytes, 25 * 1024 * 1024);
        assert_eq!(config.max_case_bytes, 100 * 1024 * 1024);
        assert!(!config.llm_enabled());
    }

    #[test]
    fn test_llm_enabled_requires_key_and_url() {
        let config = ServerConfig {
            llm_base_url: Some("http://localhost:9000".to_string()),
            llm_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert!(config.llm_enabled());
    }
}
