//! Configuration module
//!
//! Settings are read from `PHOTOS_*` environment variables (an optional `.env`
//! file is loaded first). Every key has a default, so an empty environment
//! yields a usable configuration apart from credentials.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::formats::FormatPolicy;

// Common constants
const DATABASE_PATH: &str = "data/uploads.db";
const TOKEN_PATH: &str = "config/token.json";
const API_URL: &str = "https://photoslibrary.googleapis.com";
const CHUNK_SIZE: usize = 5 * 1024 * 1024;
const MAX_RETRIES: u32 = 3;
const REQUESTS_PER_SECOND: f64 = 5.0;
const MAX_BURST: usize = 10;
const RETRY_BACKOFF_MS: u64 = 1000;
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Largest limiter capacity; matches the permit ceiling of `tokio::sync::Semaphore`
pub const MAX_BURST_LIMIT: usize = usize::MAX >> 3;

pub const DEFAULT_SUPPORTED_IMAGES: &str = ".jpg,.jpeg,.png,.gif,.heic,.heif,.webp,.tiff,.tif,.bmp";
pub const DEFAULT_SUPPORTED_VIDEOS: &str =
    ".mpg,.mpeg,.avi,.mov,.mp4,.m4v,.wmv,.3gp,.3g2,.mkv,.mts,.m2ts";

/// Settings consumed by the upload client and the finalize retry loop
#[derive(Clone, Debug)]
pub struct UploaderConfig {
    /// Remote base URL, without trailing slash
    pub api_base_url: String,
    /// Bytes sent per transfer request
    pub chunk_size: usize,
    /// Additional finalize attempts after the first one
    pub max_retries: u32,
    /// Limiter refill rate
    pub requests_per_second: f64,
    /// Limiter capacity
    pub max_burst: usize,
    /// Time unit of the linear backoff (`attempt * 2` units)
    pub backoff_unit: Duration,
    pub request_timeout: Duration,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_base_url: API_URL.to_string(),
            chunk_size: CHUNK_SIZE,
            max_retries: MAX_RETRIES,
            requests_per_second: REQUESTS_PER_SECOND,
            max_burst: MAX_BURST,
            backoff_unit: Duration::from_millis(RETRY_BACKOFF_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub database_path: PathBuf,
    pub token_path: PathBuf,
    /// Explicit access token; takes precedence over `token_path`
    pub access_token: Option<String>,
    pub uploader: UploaderConfig,
    pub supported_images: Vec<String>,
    pub supported_videos: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chunk_size = match lookup("PHOTOS_CHUNK_SIZE") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .context("PHOTOS_CHUNK_SIZE must be a number of bytes")?,
            None => CHUNK_SIZE,
        };

        let max_retries = match lookup("PHOTOS_MAX_RETRIES") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .context("PHOTOS_MAX_RETRIES must be a non-negative integer")?,
            None => MAX_RETRIES,
        };

        let requests_per_second = match lookup("PHOTOS_REQUESTS_PER_SECOND") {
            Some(v) => v
                .trim()
                .parse::<f64>()
                .context("PHOTOS_REQUESTS_PER_SECOND must be a number")?,
            None => REQUESTS_PER_SECOND,
        };

        let max_burst = match lookup("PHOTOS_MAX_BURST") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .context("PHOTOS_MAX_BURST must be a positive integer")?,
            None => MAX_BURST,
        };

        let backoff_ms = match lookup("PHOTOS_RETRY_BACKOFF_MS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .context("PHOTOS_RETRY_BACKOFF_MS must be a number of milliseconds")?,
            None => RETRY_BACKOFF_MS,
        };

        let timeout_secs = match lookup("PHOTOS_REQUEST_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .context("PHOTOS_REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            None => REQUEST_TIMEOUT_SECS,
        };

        let api_base_url = lookup("PHOTOS_API_URL")
            .unwrap_or_else(|| API_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        let supported_images = split_extensions(
            &lookup("PHOTOS_SUPPORTED_IMAGES").unwrap_or_else(|| DEFAULT_SUPPORTED_IMAGES.into()),
        );
        let supported_videos = split_extensions(
            &lookup("PHOTOS_SUPPORTED_VIDEOS").unwrap_or_else(|| DEFAULT_SUPPORTED_VIDEOS.into()),
        );

        Ok(Config {
            database_path: lookup("PHOTOS_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DATABASE_PATH)),
            token_path: lookup("PHOTOS_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(TOKEN_PATH)),
            access_token: lookup("PHOTOS_ACCESS_TOKEN")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            uploader: UploaderConfig {
                api_base_url,
                chunk_size,
                max_retries,
                requests_per_second,
                max_burst,
                backoff_unit: Duration::from_millis(backoff_ms),
                request_timeout: Duration::from_secs(timeout_secs),
            },
            supported_images,
            supported_videos,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let uploader = &self.uploader;

        if uploader.chunk_size == 0 {
            anyhow::bail!("PHOTOS_CHUNK_SIZE must be greater than 0");
        }
        if !uploader.requests_per_second.is_finite() || uploader.requests_per_second <= 0.0 {
            anyhow::bail!(
                "PHOTOS_REQUESTS_PER_SECOND must be a positive number, got {}",
                uploader.requests_per_second
            );
        }
        match Duration::try_from_secs_f64(1.0 / uploader.requests_per_second) {
            Ok(period) if !period.is_zero() => {}
            _ => anyhow::bail!(
                "PHOTOS_REQUESTS_PER_SECOND {} is out of range",
                uploader.requests_per_second
            ),
        }
        if uploader.max_burst == 0 {
            anyhow::bail!("PHOTOS_MAX_BURST must be greater than 0");
        }
        if uploader.max_burst > MAX_BURST_LIMIT {
            anyhow::bail!(
                "PHOTOS_MAX_BURST must be at most {}, got {}",
                MAX_BURST_LIMIT,
                uploader.max_burst
            );
        }
        if !(uploader.api_base_url.starts_with("http://")
            || uploader.api_base_url.starts_with("https://"))
        {
            anyhow::bail!(
                "PHOTOS_API_URL must be an http(s) URL, got '{}'",
                uploader.api_base_url
            );
        }
        if self.supported_images.is_empty() && self.supported_videos.is_empty() {
            anyhow::bail!("At least one supported image or video extension must be configured");
        }

        Ok(())
    }

    /// Allow-list of file extensions eligible for backup
    pub fn format_policy(&self) -> FormatPolicy {
        FormatPolicy::new(
            self.supported_images
                .iter()
                .chain(self.supported_videos.iter())
                .map(String::as_str),
        )
    }

    /// Create the directory holding the ledger file
    pub fn ensure_directories(&self) -> Result<(), anyhow::Error> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory {}", parent.display())
                })?;
            }
        }
        Ok(())
    }
}

fn split_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| if s.starts_with('.') { s } else { format!(".{}", s) })
        .collect()
}
