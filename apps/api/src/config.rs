use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::compile::workspace::RetentionPolicy;
use crate::compile::ArtifactDelivery;

const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ARTIFACT_TTL_SECS: u64 = 3600;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Base URL of the account / GitHub-import backend that `/api/auth` and
    /// `/api/github/*` proxy to.
    pub backend_api_url: String,
    /// LaTeX program run for every compilation (must be on PATH).
    pub latex_engine: String,
    pub compile_timeout: Duration,
    pub workspace_root: PathBuf,
    pub retention: RetentionPolicy,
    pub artifact_delivery: ArtifactDelivery,
    /// How long a referenced artifact waits to be fetched when retention is
    /// `delete`. Unfetched workspaces older than this are swept.
    pub artifact_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let compile_timeout_secs = match lookup("COMPILE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("COMPILE_TIMEOUT_SECS must be a whole number of seconds")?,
            None => DEFAULT_COMPILE_TIMEOUT_SECS,
        };
        if compile_timeout_secs == 0 {
            bail!("COMPILE_TIMEOUT_SECS must be greater than zero");
        }

        let artifact_ttl_secs = match lookup("ARTIFACT_TTL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("ARTIFACT_TTL_SECS must be a whole number of seconds")?,
            None => DEFAULT_ARTIFACT_TTL_SECS,
        };
        if artifact_ttl_secs == 0 {
            bail!("ARTIFACT_TTL_SECS must be greater than zero");
        }

        Ok(Config {
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            backend_api_url: lookup("BACKEND_API_URL").with_context(|| {
                "Required environment variable 'BACKEND_API_URL' is not set".to_string()
            })?,
            latex_engine: lookup("LATEX_ENGINE").unwrap_or_else(|| "pdflatex".to_string()),
            compile_timeout: Duration::from_secs(compile_timeout_secs),
            workspace_root: lookup("WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("resume-tailor")),
            retention: lookup("WORKSPACE_RETENTION")
                .as_deref()
                .unwrap_or("delete")
                .parse()?,
            artifact_delivery: lookup("ARTIFACT_DELIVERY")
                .as_deref()
                .unwrap_or("inline")
                .parse()?,
            artifact_ttl: Duration::from_secs(artifact_ttl_secs),
        })
    }

    /// Maximum workspace age for the background sweeper, or `None` when every
    /// workspace is removed by the request that created or fetched it.
    pub fn sweep_age(&self) -> Option<Duration> {
        match (self.retention, self.artifact_delivery) {
            (RetentionPolicy::Sweep { max_age }, _) => Some(max_age),
            (RetentionPolicy::DeleteAfterResponse, ArtifactDelivery::Reference) => {
                Some(self.artifact_ttl)
            }
            (RetentionPolicy::DeleteAfterResponse, ArtifactDelivery::Inline) => None,
        }
    }

    /// Config rooted at a scratch directory, with no backend and defaults
    /// everywhere else.
    pub fn for_tests(workspace_root: impl Into<PathBuf>) -> Self {
        Config {
            port: 0,
            rust_log: "debug".to_string(),
            backend_api_url: "http://127.0.0.1:9".to_string(),
            latex_engine: "pdflatex".to_string(),
            compile_timeout: Duration::from_secs(DEFAULT_COMPILE_TIMEOUT_SECS),
            workspace_root: workspace_root.into(),
            retention: RetentionPolicy::DeleteAfterResponse,
            artifact_delivery: ArtifactDelivery::Inline,
            artifact_ttl: Duration::from_secs(DEFAULT_ARTIFACT_TTL_SECS),
        }
    }
}
