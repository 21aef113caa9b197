//! Request methods for types that carry a connection
//!
//! Record types implement [`WithConnection::connection`] and get `get`,
//! `post`, `put` and `delete` delegating to it.

use async_trait::async_trait;
use serde_json::Value;

use crate::connection::{Connection, HttpClient, Target};
use crate::error::ApiError;

#[async_trait]
pub trait WithConnection: Sync {
    type Http: HttpClient;

    fn connection(&self) -> &Connection<Self::Http>;

    async fn get(&self, target: Target, path: &str, params: &Value) -> Result<Value, ApiError> {
        self.connection().get(target, path, params).await
    }

    async fn post(&self, target: Target, path: &str, params: &Value) -> Result<Value, ApiError> {
        self.connection().post(target, path, params).await
    }

    async fn put(&self, target: Target, path: &str, params: &Value) -> Result<Value, ApiError> {
        self.connection().put(target, path, params).await
    }

    async fn delete(&self, target: Target, path: &str, params: &Value) -> Result<Value, ApiError> {
        self.connection().delete(target, path, params).await
    }
}
