use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

const APP_NAME: &str = "zoho-hub";
const CONFIG_FILE: &str = "config.json";

/// Accounts (OAuth) domain to API domain, per data centre
const API_DOMAINS: [(&str, &str); 4] = [
    ("https://accounts.zoho.com", "https://www.zohoapis.com"),
    ("https://accounts.zoho.com.cn", "https://www.zohoapis.com.cn"),
    ("https://accounts.zoho.in", "https://www.zohoapis.in"),
    ("https://accounts.zoho.eu", "https://www.zohoapis.eu"),
];

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// OAuth accounts domain, also used to pick the API data centre
    #[serde(default = "default_accounts_domain")]
    pub accounts_domain: String,
    /// Explicit CRM API domain; inferred from `accounts_domain` when unset
    #[serde(default)]
    pub api_domain: Option<String>,
    /// Used when `accounts_domain` maps to no known API domain
    #[serde(default = "default_fallback_api_domain")]
    pub fallback_api_domain: String,
    #[serde(default = "default_crm_base_path")]
    pub crm_base_path: String,
    #[serde(default = "default_invoice_domain")]
    pub invoice_domain: String,
    #[serde(default = "default_invoice_base_path")]
    pub invoice_base_path: String,
    /// Log every request line and raw response body at info level
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

fn default_accounts_domain() -> String {
    "https://accounts.zoho.com".to_string()
}

fn default_fallback_api_domain() -> String {
    "https://www.zohoapis.eu".to_string()
}

fn default_crm_base_path() -> String {
    "/crm/v2/".to_string()
}

fn default_invoice_domain() -> String {
    "https://invoice.zoho.com".to_string()
}

fn default_invoice_base_path() -> String {
    "/api/v3/".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts_domain: default_accounts_domain(),
            api_domain: None,
            fallback_api_domain: default_fallback_api_domain(),
            crm_base_path: default_crm_base_path(),
            invoice_domain: default_invoice_domain(),
            invoice_base_path: default_invoice_base_path(),
            debug: false,
            timeout_secs: default_timeout(),
            client_id: None,
            client_secret: None,
        }
    }
}

impl Config {
    /// The CRM API domain: the explicit override, else inferred
    pub fn api_domain(&self) -> String {
        self.api_domain
            .clone()
            .unwrap_or_else(|| self.infer_api_domain())
    }

    /// Maps the accounts domain onto its data centre's API domain
    pub fn infer_api_domain(&self) -> String {
        let accounts = self.accounts_domain.trim_end_matches('/');
        API_DOMAINS
            .iter()
            .find(|(from, _)| *from == accounts)
            .map_or_else(|| self.fallback_api_domain.clone(), |(_, to)| (*to).to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration manager
pub struct ConfigManager {
    config: RwLock<Config>,
}

impl ConfigManager {
    /// Loads the configuration from the user config directory
    pub fn new() -> Result<Self> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Self::load_from(config_dir.join(CONFIG_FILE))
    }

    /// Loads the configuration from a specific file, defaulting when absent
    pub fn load_from(config_file: PathBuf) -> Result<Self> {
        let config = if config_file.exists() {
            let data =
                std::fs::read_to_string(&config_file).context("Failed to read config file")?;
            serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unparsable config {}: {}", config_file.display(), e);
                Config::default()
            })
        } else {
            Config::default()
        };

        Ok(Self {
            config: RwLock::new(config),
        })
    }

    /// Gets a copy of the current configuration
    pub fn get(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Updates and saves the configuration
    pub fn save(&self, config: Config) -> Result<()> {
        let config_file = Self::config_dir()?.join(CONFIG_FILE);
        self.save_to(&config_file, config)
    }

    fn save_to(&self, config_file: &std::path::Path, config: Config) -> Result<()> {
        let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
        std::fs::write(config_file, json).context("Failed to write config file")?;

        *self
            .config
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = config;

        Ok(())
    }

    /// Returns the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join(APP_NAME))
    }
}
