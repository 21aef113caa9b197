use anyhow::Context;
use reqwest::header::HeaderValue;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::http::{HttpClient, HttpRequest, ReqwestClient};
use super::target::Target;
use crate::auth::{CredentialSink, Credentials, TokenRefresher};
use crate::config::Config;
use crate::error::ApiError;
use crate::response::{ApiResponse, ErrorCode};

/// Base URLs of both API surfaces, resolved once
#[derive(Debug, Clone)]
struct Endpoints {
    crm: Url,
    invoice: Url,
}

impl Endpoints {
    fn resolve(config: &Config, credentials: &Credentials) -> Result<Self, ApiError> {
        let api_domain = credentials
            .api_domain
            .clone()
            .unwrap_or_else(|| config.api_domain());

        Ok(Self {
            crm: Url::parse(&api_domain)?.join(&config.crm_base_path)?,
            invoice: Url::parse(&config.invoice_domain)?.join(&config.invoice_base_path)?,
        })
    }

    fn base(&self, target: Target) -> &Url {
        match target {
            Target::Crm => &self.crm,
            Target::Invoice => &self.invoice,
        }
    }
}

/// Authenticated connection to the Zoho APIs
///
/// Owns the session's credentials. Every call is retried once with a fresh
/// access token when Zoho reports the current one as invalid and a refresh
/// token is available.
///
/// Generic over the HTTP client implementation for testability.
pub struct Connection<H: HttpClient = ReqwestClient> {
    http: H,
    endpoints: Endpoints,
    debug: bool,
    credentials: RwLock<Credentials>,
    refresher: Arc<dyn TokenRefresher>,
    sink: Option<Arc<dyn CredentialSink>>,
    // Serialises check-token -> refresh -> update across concurrent calls
    refresh_lock: Mutex<()>,
}

impl Connection<ReqwestClient> {
    /// Creates a connection with the default HTTP implementation
    pub fn new(
        config: &Config,
        credentials: Credentials,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Result<Self, ApiError> {
        let http = ReqwestClient::with_timeout(config.timeout())?;
        Self::with_http_client(http, config, credentials, refresher)
    }
}

impl<H: HttpClient> Connection<H> {
    /// Creates a connection with a custom HTTP implementation
    pub fn with_http_client(
        http: H,
        config: &Config,
        credentials: Credentials,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            http,
            endpoints: Endpoints::resolve(config, &credentials)?,
            debug: config.debug,
            credentials: RwLock::new(credentials),
            refresher,
            sink: None,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Registers a sink that receives the new credentials after each refresh
    #[must_use]
    pub fn with_credential_sink(mut self, sink: Arc<dyn CredentialSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Gets the current access token
    pub async fn access_token(&self) -> Option<String> {
        self.credentials.read().await.access_token.clone()
    }

    /// Sets the access token for subsequent requests
    pub async fn set_access_token(&self, token: String) {
        self.credentials.write().await.access_token = Some(token);
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.credentials
            .read()
            .await
            .refresh_token()
            .map(str::to_string)
    }

    /// Snapshot of the current credentials
    pub async fn credentials(&self) -> Credentials {
        self.credentials.read().await.clone()
    }

    /// Base URL requests for `target` are resolved against
    pub fn base_url(&self, target: Target) -> &Url {
        self.endpoints.base(target)
    }

    pub async fn get(&self, target: Target, path: &str, params: &Value) -> Result<Value, ApiError> {
        self.request(Method::GET, target, path, params).await
    }

    pub async fn post(
        &self,
        target: Target,
        path: &str,
        params: &Value,
    ) -> Result<Value, ApiError> {
        self.request(Method::POST, target, path, params).await
    }

    pub async fn put(&self, target: Target, path: &str, params: &Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, target, path, params).await
    }

    pub async fn delete(
        &self,
        target: Target,
        path: &str,
        params: &Value,
    ) -> Result<Value, ApiError> {
        self.request(Method::DELETE, target, path, params).await
    }

    /// Sends a request, refreshing the access token and retrying once if needed
    ///
    /// Returns the decoded body, including bodies that carry non-authentication
    /// error codes. Fails with [`ApiError::Api`] on an authentication failure
    /// that could not be recovered.
    pub async fn request(
        &self,
        method: Method,
        target: Target,
        path: &str,
        params: &Value,
    ) -> Result<Value, ApiError> {
        self.log(format_args!("{method} {path} with {params}"));

        let request = self.build_request(method, target, path, params)?;
        self.with_refresh(&request).await
    }

    fn build_request(
        &self,
        method: Method,
        target: Target,
        path: &str,
        params: &Value,
    ) -> Result<HttpRequest, ApiError> {
        // Paths always resolve below the base path
        let mut url = self.base_url(target).join(path.trim_start_matches('/'))?;
        let body = target.encode(&method, &mut url, params);

        let mut request = HttpRequest::new(method, url);
        request.body = body;
        Ok(request)
    }

    async fn with_refresh(&self, request: &HttpRequest) -> Result<Value, ApiError> {
        let (token, refresh_token) = {
            let credentials = self.credentials.read().await;
            (
                credentials.access_token.clone(),
                credentials.refresh_token().map(str::to_string),
            )
        };

        let response = self.dispatch(request, token.as_deref()).await?;
        let rejected = response
            .error_code()
            .is_some_and(ErrorCode::is_auth_related);

        match refresh_token {
            Some(refresh_token) if rejected => {
                let fresh = self
                    .refresh_access_token(token.as_deref(), &refresh_token)
                    .await?;

                // Second and final attempt, handed back whatever it says
                let retried = self.dispatch(request, fresh.as_deref()).await?;
                Ok(retried.into_body())
            }
            None if response.is_authentication_failure() => {
                let msg = response
                    .msg()
                    .unwrap_or_else(|| ErrorCode::AuthenticationFailure.to_string());
                Err(ApiError::Api(msg))
            }
            _ => Ok(response.into_body()),
        }
    }

    /// Sends one attempt with the given access token
    async fn dispatch(
        &self,
        request: &HttpRequest,
        access_token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let mut request = request.clone();
        if let Some(token) = access_token.filter(|t| !t.is_empty()) {
            request.set_authorization(authorization_header(token)?);
        }

        let response = self.http.send(&request).await?;
        if self.debug {
            tracing::info!(
                "{} {} -> {}: {}",
                request.method,
                request.url,
                response.status,
                response.body
            );
        } else {
            tracing::trace!(
                "{} {} -> {}: {}",
                request.method,
                request.url,
                response.status,
                response.body
            );
        }

        Ok(ApiResponse::new(response.into_value()))
    }

    /// Replaces the access token observed as stale by a freshly issued one
    ///
    /// If another call already replaced `observed` while this one waited for
    /// the lock, its token is reused instead of refreshing again.
    async fn refresh_access_token(
        &self,
        observed: Option<&str>,
        refresh_token: &str,
    ) -> Result<Option<String>, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        {
            let credentials = self.credentials.read().await;
            if credentials.access_token.as_deref() != observed {
                tracing::debug!("Access token was refreshed by a concurrent request");
                return Ok(credentials.access_token.clone());
            }
        }

        tracing::info!("Refreshing outdated access token...");
        let refreshed = self
            .refresher
            .refresh(refresh_token)
            .await
            .map_err(ApiError::Refresh)?;

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.on_refresh(&refreshed).await {
                tracing::warn!("Credential sink failed after refresh: {:#}", e);
            }
        }

        {
            let mut credentials = self.credentials.write().await;
            credentials.access_token = Some(refreshed.access_token.clone());
            credentials.expires_in = refreshed.expires_in;
        }

        tracing::info!("Access token refreshed successfully");
        Ok(Some(refreshed.access_token))
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        if self.debug {
            tracing::info!("[zoho-hub] {}", message);
        } else {
            tracing::debug!("{}", message);
        }
    }
}

fn authorization_header(token: &str) -> Result<HeaderValue, ApiError> {
    let mut value = HeaderValue::from_str(&format!("Zoho-oauthtoken {token}"))
        .context("Access token is not a valid header value")?;
    value.set_sensitive(true);
    Ok(value)
}
