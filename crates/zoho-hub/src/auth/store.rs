use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::credentials::Credentials;
use super::refresh::{CredentialSink, RefreshedToken};

const SERVICE_NAME: &str = "zoho-hub";
const TOKEN_FILE: &str = "token.json";

/// Persisted OAuth token data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub api_domain: Option<String>,
}

impl StoredToken {
    /// Checks if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Seconds until expiry, zero once expired
    pub fn expires_in(&self) -> u64 {
        (self.expires_at - Utc::now()).num_seconds().max(0) as u64
    }

    /// Folds a refresh into this token; the refresh token is kept
    pub fn apply_refresh(&mut self, refreshed: &RefreshedToken) -> Result<()> {
        let expires_at = i64::try_from(refreshed.expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .with_context(|| format!("Token lifetime out of range: {}s", refreshed.expires_in))?;

        self.access_token.clone_from(&refreshed.access_token);
        self.expires_at = expires_at;
        if refreshed.api_domain.is_some() {
            self.api_domain.clone_from(&refreshed.api_domain);
        }
        Ok(())
    }

    pub fn to_credentials(&self) -> Credentials {
        Credentials {
            access_token: Some(self.access_token.clone()),
            refresh_token: self.refresh_token.clone(),
            expires_in: self.expires_in(),
            api_domain: self.api_domain.clone(),
        }
    }
}

/// Token store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No token stored")]
    NoToken,
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Trait for token storage operations
///
/// This abstraction allows easy mocking of token storage in tests.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Saves the OAuth token
    async fn save(&self, token: &StoredToken) -> Result<()>;

    /// Loads the stored OAuth token
    async fn load(&self) -> Result<StoredToken, StoreError>;

    /// Deletes the stored token
    async fn delete(&self) -> Result<()>;

    /// Checks if a token is stored
    async fn has_token(&self) -> bool;
}

/// Merges a refresh into whatever `storage` holds and saves it back
async fn persist_refresh<S: TokenStorage + ?Sized>(
    storage: &S,
    refreshed: &RefreshedToken,
) -> Result<()> {
    let mut token = match storage.load().await {
        Ok(token) => token,
        Err(StoreError::NoToken) => anyhow::bail!("No stored token to update after refresh"),
        Err(StoreError::Storage(e)) => return Err(e),
    };

    token.apply_refresh(refreshed)?;
    storage.save(&token).await
}

/// Token storage in the user config directory, mirrored into the OS keyring
///
/// The file is authoritative; the keyring entry is best effort.
pub struct FileTokenStore {
    keyring_entry: Option<keyring::Entry>,
    path: PathBuf,
}

impl FileTokenStore {
    /// Creates a new token store
    pub fn new() -> Result<Self> {
        let config_dir = crate::config::ConfigManager::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;

        Ok(Self {
            keyring_entry: keyring::Entry::new(SERVICE_NAME, "oauth_token").ok(),
            path: config_dir.join(TOKEN_FILE),
        })
    }

    /// Creates a file-only token store at a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            keyring_entry: None,
            path,
        }
    }
}

#[async_trait]
impl TokenStorage for FileTokenStore {
    async fn save(&self, token: &StoredToken) -> Result<()> {
        let data = serde_json::to_string(token).context("Failed to serialize token")?;

        std::fs::write(&self.path, &data).context("Failed to write token file")?;

        if let Some(ref entry) = self.keyring_entry {
            if let Err(e) = entry.set_password(&data) {
                tracing::debug!("Keyring mirror not updated: {}", e);
            }
        }

        Ok(())
    }

    async fn load(&self) -> Result<StoredToken, StoreError> {
        if self.path.exists() {
            let data = std::fs::read_to_string(&self.path)
                .map_err(|e| StoreError::Storage(e.into()))?;
            let token = serde_json::from_str(&data).map_err(|e| StoreError::Storage(e.into()))?;
            return Ok(token);
        }

        if let Some(ref entry) = self.keyring_entry {
            if let Ok(data) = entry.get_password() {
                let token =
                    serde_json::from_str(&data).map_err(|e| StoreError::Storage(e.into()))?;
                return Ok(token);
            }
        }

        Err(StoreError::NoToken)
    }

    async fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to delete token file")?;
        }

        if let Some(ref entry) = self.keyring_entry {
            let _ = entry.delete_credential();
        }

        Ok(())
    }

    async fn has_token(&self) -> bool {
        if self.path.exists() {
            return true;
        }

        self.keyring_entry
            .as_ref()
            .is_some_and(|entry| entry.get_password().is_ok())
    }
}

#[async_trait]
impl CredentialSink for FileTokenStore {
    async fn on_refresh(&self, token: &RefreshedToken) -> Result<()> {
        persist_refresh(self, token).await
    }
}
