//! Hugging Face Hub authentication
//!
//! A token is checked against the hub's `whoami-v2` endpoint. It can be saved
//! to the Hugging Face cache (`$HF_HOME/token`), where hf-hub and the Python
//! tooling read it. Nothing else in the crate requires a successful login.

use crate::config::HubConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Who the token belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubIdentity {
    pub name: String,
    /// `user` or `org`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

pub struct HubClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HubClient {
    pub fn new(hub: &HubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(hub.timeout_secs))
            .build()
            .map_err(|e| Error::Authentication(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: hub.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Validate `token` with the hub
    pub async fn login(&self, token: &str) -> Result<HubIdentity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Authentication("token is empty".into()));
        }

        let response = self
            .client
            .get(format!("{}/api/whoami-v2", self.endpoint))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("hub unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Authentication(format!("hub answered HTTP {}", status)));
        }

        let identity: HubIdentity = response
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("unexpected whoami response: {}", e)))?;
        info!(user = %identity.name, "authenticated with Hugging Face");
        Ok(identity)
    }
}

/// Where the cached token lives: `$HF_HOME/token`, else `~/.cache/huggingface/token`
pub fn token_path() -> Option<PathBuf> {
    token_path_from(std::env::var_os("HF_HOME").map(PathBuf::from), dirs::home_dir())
}

fn token_path_from(hf_home: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    match hf_home {
        Some(dir) => Some(dir.join("token")),
        None => home.map(|h| h.join(".cache").join("huggingface").join("token")),
    }
}

/// Write the token to the Hugging Face cache
pub fn save_token(token: &str) -> Result<PathBuf> {
    let path = token_path().ok_or_else(|| Error::Config("cannot locate the home directory".into()))?;
    write_token(&path, token)?;
    Ok(path)
}

fn write_token(path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, token.trim())?;
    Ok(())
}

/// Pick a token: the explicit one, then `HF_TOKEN`, then the cached file
pub fn resolve_token(explicit: Option<&str>) -> Option<String> {
    let from_env = std::env::var("HF_TOKEN").ok();
    let from_file = token_path().and_then(|p| std::fs::read_to_string(p).ok());
    first_token([explicit.map(str::to_string), from_env, from_file])
}

fn first_token<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}
