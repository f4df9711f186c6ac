//! Credential loading and the authorised HTTP transport.
//!
//! The interactive consent flow lives outside this tool; it only reads a token
//! that was already granted, either from `PHOTOS_ACCESS_TOKEN` or from the
//! persisted token file.

use std::time::Duration;

use anyhow::{Context, Result};
use cronocam_core::Config;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;

/// Persisted OAuth token; fields other than the access token are ignored
#[derive(Debug, Deserialize)]
struct StoredToken {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

/// Resolve the bearer token from the environment override or the token file
pub fn load_access_token(config: &Config) -> Result<String> {
    if let Some(token) = &config.access_token {
        return Ok(token.clone());
    }

    let raw = std::fs::read_to_string(&config.token_path).with_context(|| {
        format!(
            "Failed to read token file {}. Set PHOTOS_ACCESS_TOKEN or PHOTOS_TOKEN_PATH",
            config.token_path.display()
        )
    })?;

    let stored: StoredToken = serde_json::from_str(&raw).with_context(|| {
        format!("Invalid token file {}", config.token_path.display())
    })?;

    if let Some(token_type) = stored.token_type.as_deref() {
        if !token_type.eq_ignore_ascii_case("bearer") {
            anyhow::bail!("Unsupported token type '{}'", token_type);
        }
    }

    let token = stored.access_token.trim();
    if token.is_empty() {
        anyhow::bail!(
            "Token file {} has an empty access_token",
            config.token_path.display()
        );
    }

    Ok(token.to_string())
}

/// HTTP client that attaches `Authorization: Bearer <token>` to every request
pub fn authorized_client(token: &str, timeout: Duration) -> Result<Client> {
    let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
        .context("Access token contains characters not allowed in a header")?;
    auth_value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth_value);

    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}
