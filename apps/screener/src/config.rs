use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::session::ScreeningConfig;

/// Which scoring oracle the gateway talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoringBackend {
    /// In-process oracle with artificial latency and random scores.
    Simulated,
    /// Remote oracle reached over HTTP multipart.
    Http { url: String },
}

/// Application configuration loaded from environment variables.
/// Everything has a default except `SCORING_ORACLE_URL` when the HTTP
/// backend is selected.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub suitability_threshold: u8,
    pub max_file_size_bytes: u64,
    /// Cap on one multipart upload request, across all of its files.
    pub max_upload_bytes: u64,
    pub scoring_timeout: Duration,
    pub scoring_backend: ScoringBackend,
    pub simulated_latency: Duration,
    pub upload_step: Duration,
    pub event_bus_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let suitability_threshold: u8 = env_or("SUITABILITY_THRESHOLD", 75)?;
        if suitability_threshold > 100 {
            bail!("SUITABILITY_THRESHOLD must be between 0 and 100, got {suitability_threshold}");
        }

        let max_file_size_bytes: u64 = env_or("MAX_FILE_SIZE_BYTES", 1024 * 1024 * 1024)?;

        let scoring_backend = match std::env::var("SCORING_BACKEND")
            .unwrap_or_else(|_| "simulated".to_string())
            .to_lowercase()
            .as_str()
        {
            "simulated" => ScoringBackend::Simulated,
            "http" => ScoringBackend::Http {
                url: require_env("SCORING_ORACLE_URL")?,
            },
            other => bail!("SCORING_BACKEND must be 'simulated' or 'http', got '{other}'"),
        };

        Ok(Config {
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            suitability_threshold,
            max_file_size_bytes,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", max_file_size_bytes.saturating_mul(4))?,
            scoring_timeout: Duration::from_secs(env_or("SCORING_TIMEOUT_SECS", 30)?),
            scoring_backend,
            simulated_latency: Duration::from_millis(env_or("SIMULATED_LATENCY_MS", 1200)?),
            upload_step: Duration::from_millis(env_or("UPLOAD_STEP_MS", 25)?),
            event_bus_capacity: env_or("EVENT_BUS_CAPACITY", 256)?,
        })
    }

    pub fn screening_config(&self) -> ScreeningConfig {
        ScreeningConfig {
            threshold: self.suitability_threshold,
            max_file_size_bytes: self.max_file_size_bytes,
            scoring_timeout: self.scoring_timeout,
            upload_step: self.upload_step,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
