//! Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zoho_hub::{
    Config, Connection, CredentialSink, Credentials, HttpClient, HttpRequest, HttpResponse,
    RefreshedToken, TokenRefresher,
};

/// Replays scripted responses in order and records every request
#[derive(Clone, Default)]
pub struct ScriptedHttp {
    script: Arc<Mutex<VecDeque<HttpResponse>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedHttp {
    pub fn new(bodies: &[Value]) -> Self {
        let client = Self::default();
        for body in bodies {
            client
                .script
                .lock()
                .unwrap()
                .push_back(HttpResponse::new(200, body.to_string()));
        }
        client
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn send(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.ok_or_else(|| anyhow::anyhow!("script exhausted at {}", request.url))
    }
}

/// Issues `new-token` and counts how often it was asked to
#[derive(Default)]
pub struct StubRefresher {
    pub calls: AtomicUsize,
    pub seen_refresh_tokens: Mutex<Vec<String>>,
}

impl StubRefresher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for StubRefresher {
    async fn refresh(&self, refresh_token: &str) -> anyhow::Result<RefreshedToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        Ok(RefreshedToken {
            access_token: "new-token".to_string(),
            expires_in: 3600,
            api_domain: Some("https://www.zohoapis.com".to_string()),
            token_type: Some("Bearer".to_string()),
            scope: None,
        })
    }
}

/// Records every credential update it receives
#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<RefreshedToken>>,
}

#[async_trait]
impl CredentialSink for RecordingSink {
    async fn on_refresh(&self, token: &RefreshedToken) -> anyhow::Result<()> {
        self.updates.lock().unwrap().push(token.clone());
        Ok(())
    }
}

/// A connection against the US data centre with the given test doubles
pub fn connect(
    http: ScriptedHttp,
    credentials: Credentials,
    refresher: Arc<StubRefresher>,
) -> Connection<ScriptedHttp> {
    let config = Config {
        accounts_domain: "https://accounts.zoho.com".to_string(),
        ..Config::default()
    };
    Connection::with_http_client(http, &config, credentials, refresher)
        .expect("test config should resolve")
}
