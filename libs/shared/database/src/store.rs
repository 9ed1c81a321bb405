//! Collaborator interfaces for the hosted backend.
//!
//! Services never talk to Supabase directly; they receive a [`Backend`] built once at
//! start-up and call through these traits. Tests swap in an in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use shared_config::AppConfig;
use shared_models::auth::{Credentials, Identity, Session};

use crate::supabase::SupabaseClient;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network failure or a 5xx from the service. Worth retrying.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the token does not belong to a live session.
    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, BackendError>;

    async fn sign_up(&self, credentials: &Credentials, redirect_to: &str) -> Result<(), BackendError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, BackendError>;

    async fn send_passwordless_link(&self, email: &str, redirect_to: &str) -> Result<(), BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_one(
        &self,
        table: &str,
        id: &str,
        access_token: &str,
    ) -> Result<Option<Value>, BackendError>;

    /// Rows whose `column` equals `value`, ordered ascending by `order_by`.
    async fn fetch_where(
        &self,
        table: &str,
        column: &str,
        value: &str,
        order_by: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<Value>, BackendError>;

    /// Insert-or-merge keyed on `conflict_key`. Columns missing from `row` keep their
    /// stored values. Returns the row as stored.
    async fn upsert(
        &self,
        table: &str,
        row: Value,
        conflict_key: &str,
        access_token: &str,
    ) -> Result<Value, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub cache_control: String,
    pub upsert: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            cache_control: "3600".to_string(),
            upsert: true,
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        options: &UploadOptions,
        access_token: &str,
    ) -> Result<(), BackendError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// The three collaborators, shared by every request and workflow.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            identity,
            records,
            blobs,
        }
    }

    pub fn supabase(config: &AppConfig) -> Self {
        let client = Arc::new(SupabaseClient::new(config));
        Self {
            identity: client.clone(),
            records: client.clone(),
            blobs: client,
        }
    }
}
