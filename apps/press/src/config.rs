use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Process configuration loaded from environment variables.
/// Every variable has a default; a present but malformed value is an error.
#[derive(Debug, Clone)]
pub struct Config {
    pub workers: usize,
    pub image_timeout: Duration,
    pub body_font: String,
    pub decorative_font: String,
    pub output_dir: PathBuf,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let workers: usize = parse_env("PRESS_WORKERS", 4)?;
        if workers == 0 {
            bail!("PRESS_WORKERS must be at least 1");
        }
        let timeout_secs: u64 = parse_env("PRESS_IMAGE_TIMEOUT_SECS", 10)?;

        Ok(Config {
            workers,
            image_timeout: Duration::from_secs(timeout_secs),
            body_font: env_or("PRESS_BODY_FONT", "Times"),
            decorative_font: env_or("PRESS_DECORATIVE_FONT", "Schoolbook"),
            output_dir: PathBuf::from(env_or("PRESS_OUTPUT_DIR", ".")),
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}
