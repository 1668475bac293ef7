use crate::config::StorageConfig;
use crate::http::build_client;
use crate::storage::path::encode_object_path;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Storage-call outcomes the reconciler needs to tell apart. Classification
/// happens once, here, at the response boundary; nothing downstream looks at
/// status codes or message text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("storage request failed: {0}")]
    Request(String),
}

/// Transport seam for the photo orchestrator and reconciler. Tests drive
/// them against an in-memory implementation.
#[async_trait]
pub trait ObjectStore {
    async fn upload_object(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError>;

    async fn delete_object(&self, path: &str) -> Result<(), StoreError>;

    /// Batch removal. Returns how many objects the provider reports removed;
    /// unknown paths are silent no-ops on the Supabase side.
    async fn delete_objects(&self, paths: &[String]) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    config: StorageConfig,
    http: Client,
}

impl SupabaseStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            http: build_client(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url,
            urlencoding::encode(&self.config.bucket),
            encode_object_path(path)
        )
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/storage/v1/object/{}",
            self.config.url,
            urlencoding::encode(&self.config.bucket)
        )
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload_object(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        let response = self
            .http
            .post(self.object_url(path))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }
        debug!(target = "cafe.storage", path, "object uploaded");
        Ok(())
    }

    async fn delete_object(&self, path: &str) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.object_url(path))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }
        debug!(target = "cafe.storage", path, "object deleted");
        Ok(())
    }

    async fn delete_objects(&self, paths: &[String]) -> Result<usize, StoreError> {
        let response = self
            .http
            .delete(self.bucket_url())
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        // The provider answers with the list of objects it actually removed.
        let removed: Value = response
            .json()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;
        let count = removed.as_array().map(Vec::len).unwrap_or(0);
        debug!(target = "cafe.storage", count, "batch removal finished");
        Ok(count)
    }
}

/// Map a non-success response to the closed [`StoreError`] set. Supabase
/// reports absent objects both as 404 and as 400 with an explanatory
/// message, so the message is consulted for that one case.
async fn classify_failure(response: Response) -> StoreError {
    let status = response.status();
    let message = failure_message(response).await;
    match status.as_u16() {
        401 | 403 => StoreError::PermissionDenied,
        404 => StoreError::NotFound,
        400 if message.to_lowercase().contains("not found") => StoreError::NotFound,
        _ => StoreError::Request(format!("HTTP {status}: {message}")),
    }
}

async fn failure_message(response: Response) -> String {
    let status = response.status();
    let body: Option<Value> = response.json().await.ok();
    body.as_ref()
        .and_then(|value| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}
