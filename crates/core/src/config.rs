use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub git: GitConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `REPOFLOW_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("REPOFLOW_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
            worker: WorkerConfig::from_env_profiled(p),
            git: GitConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  storage:  data_dir={}, repo_path={}",
            self.storage.data_dir.display(),
            self.storage.repo_path.display()
        );
        tracing::info!(
            "  queue:    poll_interval_ms={}, archive_limit={}",
            self.queue.poll_interval_ms,
            self.queue.archive_limit
        );
        tracing::info!(
            "  worker:   clone={}, index={}, delete={}",
            self.worker.clone_concurrency,
            self.worker.index_concurrency,
            self.worker.delete_concurrency
        );
        tracing::info!("  git:      binary={}", self.git.binary);
        tracing::info!(
            "  notify:   webhook={}, headers={}, buffer={}",
            if self.notify.webhook_url.is_some() { "configured" } else { "off" },
            self.notify.webhook_headers.len(),
            self.notify.webhook_buffer
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3030),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Holds the job journal, status file and repository records.
    pub data_dir: PathBuf,
    /// Root below which repositories are checked out (`{repo_path}/{uri}`).
    pub repo_path: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "DATA_DIR", "data"));
        let repo_path = profiled_env_opt(p, "REPO_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("repos"));
        Self { data_dir, repo_path }
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.data_dir.join("jobs.json")
    }

    pub fn status_path(&self) -> PathBuf {
        self.data_dir.join("status.json")
    }

    pub fn repositories_path(&self) -> PathBuf {
        self.data_dir.join("repositories.json")
    }
}

// ── Queue ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Fallback poll interval when no enqueue wake-up arrives.
    pub poll_interval_ms: u64,
    /// Terminal jobs kept in the journal before the oldest are dropped.
    pub archive_limit: usize,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            poll_interval_ms: profiled_env_u64(p, "QUEUE_POLL_INTERVAL_MS", 1000),
            archive_limit: profiled_env_usize(p, "QUEUE_ARCHIVE_LIMIT", 500),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            archive_limit: 500,
        }
    }
}

// ── Worker ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub clone_concurrency: usize,
    pub index_concurrency: usize,
    pub delete_concurrency: usize,
    pub shutdown_timeout_secs: u64,
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            clone_concurrency: profiled_env_usize(p, "CLONE_CONCURRENCY", 2),
            index_concurrency: profiled_env_usize(p, "INDEX_CONCURRENCY", 2),
            delete_concurrency: profiled_env_usize(p, "DELETE_CONCURRENCY", 1),
            shutdown_timeout_secs: profiled_env_u64(p, "WORKER_SHUTDOWN_TIMEOUT_SECS", 30),
        }
    }
}

// ── Git ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    pub binary: String,
}

impl GitConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            binary: profiled_env_or(p, "GIT_BINARY", "git"),
        }
    }
}

// ── Notify ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Progress events are POSTed here when set. May contain `${VAR}` references.
    pub webhook_url: Option<String>,
    /// Extra request headers, from `Name=Value` pairs separated by commas.
    /// Values may contain `${VAR}` references.
    pub webhook_headers: HashMap<String, String>,
    pub webhook_timeout_ms: u64,
    /// Events waiting for webhook delivery; newer events are dropped when full.
    pub webhook_buffer: usize,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            webhook_url: profiled_env_opt(p, "PROGRESS_WEBHOOK_URL"),
            webhook_headers: profiled_env_opt(p, "PROGRESS_WEBHOOK_HEADERS")
                .map(|v| parse_header_pairs(&v))
                .unwrap_or_default(),
            webhook_timeout_ms: profiled_env_u64(p, "PROGRESS_WEBHOOK_TIMEOUT_MS", 5000),
            webhook_buffer: profiled_env_usize(p, "PROGRESS_WEBHOOK_BUFFER", 256),
        }
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }
}

/// `"X-Token=${HOOK_TOKEN}, X-Source=repoflow"` into a header map. Pairs
/// without `=` or with an empty name are skipped.
fn parse_header_pairs(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}
