use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NodeflowError, Result};

/// Top-level nodeflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub catalog: Option<CatalogConfig>,
}

/// Where the remote execution engine lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub base_url: String,
    /// WebSocket base for push delivery. Derived from `base_url` when unset.
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 { 30 }

impl OrchestratorConfig {
    /// Resolve the push-channel base URL (`http` -> `ws`, `https` -> `wss`).
    pub fn push_url(&self) -> String {
        if let Some(ref ws) = self.ws_url {
            return ws.trim_end_matches('/').to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Progress delivery tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Seconds to wait after the submission is acknowledged before polling starts.
    #[serde(default = "default_poll_grace_secs")]
    pub poll_grace_secs: u64,
    /// Seconds between status polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Consecutive poll failures before the execution is declared lost.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,
    /// Upper bound for the jittered delay after a failed poll.
    #[serde(default = "default_max_poll_backoff_ms")]
    pub max_poll_backoff_ms: u64,
    /// Buffered push messages before the channel applies backpressure.
    #[serde(default = "default_push_buffer")]
    pub push_buffer: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_grace_secs: default_poll_grace_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_failures: default_max_poll_failures(),
            max_poll_backoff_ms: default_max_poll_backoff_ms(),
            push_buffer: default_push_buffer(),
        }
    }
}

impl ExecutionConfig {
    pub fn poll_grace(&self) -> Duration {
        Duration::from_secs(self.poll_grace_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn default_poll_grace_secs() -> u64 { 3 }
fn default_poll_interval_secs() -> u64 { 2 }
fn default_max_poll_failures() -> u32 { 5 }
fn default_max_poll_backoff_ms() -> u64 { 10_000 }
fn default_push_buffer() -> usize { 256 }

/// Limits applied while the graph is being edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Total edges allowed in one workflow.
    #[serde(default = "default_max_edges")]
    pub max_edges: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_edges: default_max_edges(),
        }
    }
}

fn default_max_edges() -> usize { 50 }

/// Template catalog location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub path: String,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| NodeflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| NodeflowError::Config(e.to_string()))
    }

    /// Resolve the catalog path (expand ~), relative paths stay relative to the cwd.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        let path = &self.catalog.as_ref()?.path;
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return Some(home.join(rest));
            }
        }
        Some(PathBuf::from(path))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
