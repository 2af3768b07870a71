use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted event payload, in bytes.
    #[serde(default = "default_max_event_bytes")]
    pub max_event_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_event_bytes: default_max_event_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_max_event_bytes() -> usize {
    1 << 20
}

/// Object storage locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Bucket the input CSVs are read from. Events for other buckets are ignored.
    #[serde(default)]
    pub input_bucket: String,
    /// Bucket run directories are published to.
    #[serde(default)]
    pub output_bucket: String,
    #[serde(default = "default_input_prefix")]
    pub input_prefix: String,
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    /// JSON API root, e.g. `https://storage.googleapis.com/storage/v1`.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Media upload root, e.g. `https://storage.googleapis.com/upload/storage/v1`.
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_bucket: String::new(),
            output_bucket: String::new(),
            input_prefix: default_input_prefix(),
            output_prefix: default_output_prefix(),
            api_base_url: default_api_base_url(),
            upload_base_url: default_upload_base_url(),
        }
    }
}

fn default_input_prefix() -> String {
    "in/".to_string()
}

fn default_output_prefix() -> String {
    "out/".to_string()
}

fn default_api_base_url() -> String {
    "https://storage.googleapis.com/storage/v1".to_string()
}

fn default_upload_base_url() -> String {
    "https://storage.googleapis.com/upload/storage/v1".to_string()
}

/// Retry, backoff and per-attempt timeout tunables for storage calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_token_timeout_ms")]
    pub token_timeout_ms: u64,
    #[serde(default = "default_transfer_timeout_ms")]
    pub download_timeout_ms: u64,
    #[serde(default = "default_transfer_timeout_ms")]
    pub upload_timeout_ms: u64,
    #[serde(default = "default_transfer_timeout_ms")]
    pub metadata_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            token_timeout_ms: default_token_timeout_ms(),
            download_timeout_ms: default_transfer_timeout_ms(),
            upload_timeout_ms: default_transfer_timeout_ms(),
            metadata_timeout_ms: default_transfer_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_token_timeout_ms() -> u64 {
    10_000
}

fn default_transfer_timeout_ms() -> u64 {
    60_000
}

/// Bearer token source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Fixed token used verbatim instead of asking the metadata server.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            metadata_url: default_metadata_url(),
        }
    }
}

fn default_metadata_url() -> String {
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token"
        .to_string()
}

/// External tools and local run layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Parent of per-delivery workspaces (defaults to the system temp dir).
    #[serde(default)]
    pub work_root: Option<PathBuf>,
    #[serde(default = "default_recon_bin")]
    pub recon_bin: PathBuf,
    #[serde(default = "default_auditpack_bin")]
    pub auditpack_bin: PathBuf,
    /// Pack label; `job:<run_id>` when unset.
    #[serde(default)]
    pub label: Option<String>,
    /// Deadline for one whole delivery (token, transfers, tools, upload).
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: None,
            recon_bin: default_recon_bin(),
            auditpack_bin: default_auditpack_bin(),
            label: None,
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn work_root(&self) -> PathBuf {
        self.work_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_recon_bin() -> PathBuf {
    PathBuf::from("recon")
}

fn default_auditpack_bin() -> PathBuf {
    PathBuf::from("auditpack")
}

fn default_run_timeout_secs() -> u64 {
    360
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retry: RetryConfig,
    pub token: SanitizedTokenConfig,
    pub pipeline: PipelineConfig,
}

/// Token config with the static token hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTokenConfig {
    pub access_token_configured: bool,
    pub metadata_url: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            retry: config.retry.clone(),
            token: SanitizedTokenConfig {
                access_token_configured: config
                    .token
                    .access_token
                    .as_deref()
                    .is_some_and(|t| !t.trim().is_empty()),
                metadata_url: config.token.metadata_url.clone(),
            },
            pipeline: config.pipeline.clone(),
        }
    }
}

/// Appends a trailing `/` to non-empty prefixes.
pub fn ensure_slash(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}
