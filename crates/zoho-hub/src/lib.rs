//! Client for the Zoho CRM and Zoho Invoice HTTP APIs
//!
//! A [`Connection`] sends authenticated requests and, when Zoho reports the
//! access token as invalid, exchanges the refresh token for a new one and
//! replays the request once.

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod response;
pub mod with_connection;

pub use auth::{
    CredentialSink, Credentials, FileTokenStore, OAuthRefresher, RefreshedToken, StoredToken,
    TokenRefresher, TokenStorage,
};
pub use config::{Config, ConfigManager};
pub use connection::{Connection, HttpClient, HttpRequest, HttpResponse, RequestBody, Target};
pub use error::ApiError;
pub use reqwest::Method;
pub use response::{ApiResponse, ErrorCode, Payload};
pub use with_connection::WithConnection;
