use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::credentials::DEFAULT_EXPIRES_IN;
use crate::config::Config;
use crate::connection::http::{HttpClient, HttpRequest, ReqwestClient};

const TOKEN_PATH: &str = "/oauth/v2/token";

/// Credential parameters issued by a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub api_domain: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

impl RefreshedToken {
    pub fn new(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
            api_domain: None,
            token_type: None,
            scope: None,
        }
    }
}

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken>;
}

/// Receives new credentials whenever a connection refreshes its token
///
/// Typically used to persist them. Failures are logged by the connection
/// and never prevent the retried request.
#[async_trait]
pub trait CredentialSink: Send + Sync {
    async fn on_refresh(&self, token: &RefreshedToken) -> Result<()>;
}

/// Refresh-token grant against the Zoho accounts server
pub struct OAuthRefresher<H: HttpClient = ReqwestClient> {
    http: H,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl OAuthRefresher<ReqwestClient> {
    /// Creates a refresher from the configured accounts domain and client
    pub fn from_config(config: &Config) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .context("client_id is not configured")?;
        let client_secret = config
            .client_secret
            .clone()
            .context("client_secret is not configured")?;
        let http = ReqwestClient::with_timeout(config.timeout())?;

        Self::with_http_client(http, &config.accounts_domain, client_id, client_secret)
    }
}

impl<H: HttpClient> OAuthRefresher<H> {
    /// Creates a refresher with a custom HTTP implementation
    pub fn with_http_client(
        http: H,
        accounts_domain: &str,
        client_id: String,
        client_secret: String,
    ) -> Result<Self> {
        let token_url = Url::parse(accounts_domain)
            .and_then(|base| base.join(TOKEN_PATH))
            .with_context(|| format!("Invalid accounts domain: {accounts_domain}"))?;

        Ok(Self {
            http,
            token_url,
            client_id,
            client_secret,
        })
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl<H: HttpClient> TokenRefresher for OAuthRefresher<H> {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken> {
        let request = HttpRequest::new(Method::POST, self.token_url.clone()).form(vec![
            ("refresh_token".to_string(), refresh_token.to_string()),
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
            ("grant_type".to_string(), "refresh_token".to_string()),
        ]);

        let response = self
            .http
            .send(&request)
            .await
            .context("Failed to refresh token")?;

        if !response.is_success() {
            anyhow::bail!(
                "Token refresh failed: {} - {}",
                response.status,
                response.body
            );
        }

        // The accounts server reports rejected grants inside a 200
        let body: Value = response.json()?;
        if let Some(error) = body.get("error") {
            let error = error.as_str().map_or_else(|| error.to_string(), str::to_string);
            anyhow::bail!("Token refresh rejected: {error}");
        }

        serde_json::from_value(body).context("Failed to parse refresh response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::http::mock::MockHttpClient;
    use crate::connection::http::RequestBody;
    use serde_json::json;

    fn refresher(mock: MockHttpClient) -> OAuthRefresher<MockHttpClient> {
        OAuthRefresher::with_http_client(
            mock,
            "https://accounts.zoho.eu",
            "client".to_string(),
            "secret".to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn refresh_posts_grant_form() {
        let mock = MockHttpClient::new().respond_json(&json!({
            "access_token": "1000.new",
            "api_domain": "https://www.zohoapis.eu",
            "token_type": "Bearer",
            "expires_in": 3600
        }));
        let refresher = refresher(mock.clone());

        let token = refresher.refresh("1000.refresh").await.unwrap();

        assert_eq!(token.access_token, "1000.new");
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.api_domain.as_deref(), Some("https://www.zohoapis.eu"));

        let requests = mock.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(
            requests[0].url.as_str(),
            "https://accounts.zoho.eu/oauth/v2/token"
        );
        let RequestBody::Form(pairs) = &requests[0].body else {
            panic!("expected a form body");
        };
        assert!(pairs.contains(&("refresh_token".to_string(), "1000.refresh".to_string())));
        assert!(pairs.contains(&("grant_type".to_string(), "refresh_token".to_string())));
        assert!(pairs.contains(&("client_id".to_string(), "client".to_string())));
        assert!(pairs.contains(&("client_secret".to_string(), "secret".to_string())));
    }

    #[tokio::test]
    async fn refresh_defaults_missing_lifetime() {
        let mock = MockHttpClient::new().respond_json(&json!({"access_token": "1000.new"}));
        let token = refresher(mock).refresh("r").await.unwrap();
        assert_eq!(token, RefreshedToken::new("1000.new", 3600));
    }

    #[tokio::test]
    async fn refresh_rejects_error_body() {
        let mock = MockHttpClient::new().respond_json(&json!({"error": "invalid_code"}));
        let err = refresher(mock).refresh("r").await.unwrap_err();
        assert!(err.to_string().contains("invalid_code"));
    }

    #[tokio::test]
    async fn refresh_rejects_error_status() {
        let mock = MockHttpClient::new().respond(500, "oops");
        let err = refresher(mock).refresh("r").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn from_config_requires_client_credentials() {
        let config = Config::default();
        let err = OAuthRefresher::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("client_id"));

        let config = Config {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            accounts_domain: "https://accounts.zoho.in".to_string(),
            ..Config::default()
        };
        let refresher = OAuthRefresher::from_config(&config).unwrap();
        assert_eq!(
            refresher.token_url().as_str(),
            "https://accounts.zoho.in/oauth/v2/token"
        );
    }
}
