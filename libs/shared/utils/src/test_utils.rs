use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::sync::Semaphore;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::store::{
    Backend, BackendError, BlobStore, IdentityProvider, RecordStore, UploadOptions,
};
use shared_models::auth::{Credentials, Identity, Session, User};

use crate::state::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub site_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            site_url: self.site_url.clone(),
            avatar_bucket: "avatars".to_string(),
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    pub fn to_state(&self, backend: Backend) -> Arc<AppState> {
        Arc::new(AppState::new(self.to_app_config(), backend))
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "authenticated".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: Some(self.email.clone()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// Releases uploads held by [`InMemoryBackend::hold_uploads`].
#[derive(Clone)]
pub struct UploadGate(Arc<Semaphore>);

impl UploadGate {
    pub fn release(&self) {
        self.0.add_permits(1);
    }
}

#[derive(Default)]
struct Failures {
    identity: Option<BackendError>,
    fetch: Option<BackendError>,
    upsert: Option<BackendError>,
    upload: Option<BackendError>,
    password: Option<BackendError>,
    link: Option<BackendError>,
}

/// Stateful stand-in for the hosted backend. Upserts merge columns like PostgREST's
/// `resolution=merge-duplicates`.
#[derive(Default)]
pub struct InMemoryBackend {
    sessions: Mutex<HashMap<String, Identity>>,
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    rows: Mutex<HashMap<String, Vec<Value>>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    passwords: Mutex<HashMap<String, String>>,
    links: Mutex<Vec<(String, String)>>,
    signups: Mutex<Vec<(String, String)>>,
    failures: Mutex<Failures>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    fetch_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    password_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn backend(self: &Arc<Self>) -> Backend {
        Backend::new(self.clone(), self.clone(), self.clone())
    }

    pub fn with_session(&self, token: &str, identity: Identity) {
        self.sessions.lock().unwrap().insert(token.to_string(), identity);
    }

    pub fn with_account(&self, email: &str, password: &str, identity: Identity) {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), identity));
    }

    pub fn insert_row(&self, table: &str, row: Value) {
        self.rows.lock().unwrap().entry(table.to_string()).or_default().push(row);
    }

    pub fn row(&self, table: &str, id: &str) -> Option<Value> {
        self.rows
            .lock()
            .unwrap()
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r["id"] == id).cloned())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows.lock().unwrap().get(table).map(Vec::len).unwrap_or(0)
    }

    pub fn blob(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(&format!("{}/{}", bucket, path)).cloned()
    }

    pub fn password_for(&self, id: &str) -> Option<String> {
        self.passwords.lock().unwrap().get(id).cloned()
    }

    pub fn links_sent(&self) -> Vec<(String, String)> {
        self.links.lock().unwrap().clone()
    }

    pub fn signups(&self) -> Vec<(String, String)> {
        self.signups.lock().unwrap().clone()
    }

    pub fn is_signed_in(&self, token: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(token)
    }

    pub fn fail_identity_with(&self, err: BackendError) {
        self.failures.lock().unwrap().identity = Some(err);
    }

    pub fn fail_fetch_with(&self, err: BackendError) {
        self.failures.lock().unwrap().fetch = Some(err);
    }

    pub fn fail_upsert_with(&self, err: BackendError) {
        self.failures.lock().unwrap().upsert = Some(err);
    }

    pub fn fail_upload_with(&self, err: BackendError) {
        self.failures.lock().unwrap().upload = Some(err);
    }

    pub fn fail_password_update_with(&self, err: BackendError) {
        self.failures.lock().unwrap().password = Some(err);
    }

    pub fn fail_links_with(&self, err: BackendError) {
        self.failures.lock().unwrap().link = Some(err);
    }

    pub fn clear_failures(&self) {
        *self.failures.lock().unwrap() = Failures::default();
    }

    /// Makes every following upload wait until the returned gate is released once per upload.
    pub fn hold_uploads(&self) -> UploadGate {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(semaphore.clone());
        UploadGate(semaphore)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn password_calls(&self) -> usize {
        self.password_calls.load(Ordering::SeqCst)
    }

    fn identity_for(&self, token: &str) -> Result<Identity, BackendError> {
        self.sessions
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| BackendError::Unauthorized("invalid JWT".to_string()))
    }
}

fn column_matches(cell: &Value, value: &str) -> bool {
    match cell {
        Value::String(s) => s == value,
        Value::Bool(b) => b.to_string() == value,
        Value::Number(n) => n.to_string() == value,
        _ => false,
    }
}

#[async_trait]
impl IdentityProvider for InMemoryBackend {
    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, BackendError> {
        if let Some(err) = self.failures.lock().unwrap().identity.clone() {
            return Err(err);
        }
        Ok(self.sessions.lock().unwrap().get(access_token).cloned())
    }

    async fn sign_up(&self, credentials: &Credentials, redirect_to: &str) -> Result<(), BackendError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&credentials.email) {
            return Err(BackendError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        let identity = Identity {
            id: Uuid::new_v4().to_string(),
            email: Some(credentials.email.clone()),
        };
        accounts.insert(credentials.email.clone(), (credentials.password.clone(), identity));
        self.signups
            .lock()
            .unwrap()
            .push((credentials.email.clone(), redirect_to.to_string()));
        Ok(())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let identity = match self.accounts.lock().unwrap().get(&credentials.email) {
            Some((password, identity)) if *password == credentials.password => identity.clone(),
            _ => {
                return Err(BackendError::Rejected {
                    status: 400,
                    message: "Invalid login credentials".to_string(),
                })
            }
        };

        let access_token = format!("token-{}", identity.id);
        self.with_session(&access_token, identity.clone());

        Ok(Session {
            access_token,
            refresh_token: None,
            expires_in: Some(3600),
            identity,
        })
    }

    async fn send_passwordless_link(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        if let Some(err) = self.failures.lock().unwrap().link.clone() {
            return Err(err);
        }
        self.links
            .lock()
            .unwrap()
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.sessions.lock().unwrap().remove(access_token);
        Ok(())
    }

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), BackendError> {
        self.password_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().password.clone() {
            return Err(err);
        }
        let identity = self.identity_for(access_token)?;
        self.passwords
            .lock()
            .unwrap()
            .insert(identity.id, new_password.to_string());
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryBackend {
    async fn fetch_one(
        &self,
        table: &str,
        id: &str,
        _access_token: &str,
    ) -> Result<Option<Value>, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().fetch.clone() {
            return Err(err);
        }
        Ok(self.row(table, id))
    }

    async fn fetch_where(
        &self,
        table: &str,
        column: &str,
        value: &str,
        order_by: &str,
        _access_token: Option<&str>,
    ) -> Result<Vec<Value>, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().fetch.clone() {
            return Err(err);
        }

        let mut matching: Vec<Value> = self
            .rows
            .lock()
            .unwrap()
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| column_matches(&row[column], value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matching.sort_by(|a, b| {
            a[order_by]
                .as_str()
                .unwrap_or_default()
                .cmp(b[order_by].as_str().unwrap_or_default())
        });
        Ok(matching)
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        conflict_key: &str,
        _access_token: &str,
    ) -> Result<Value, BackendError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().upsert.clone() {
            return Err(err);
        }

        let incoming = match row {
            Value::Object(map) => map,
            other => {
                return Err(BackendError::Rejected {
                    status: 400,
                    message: format!("expected an object, got {}", other),
                })
            }
        };

        let key = incoming.get(conflict_key).cloned().unwrap_or(Value::Null);
        let mut rows = self.rows.lock().unwrap();
        let table_rows = rows.entry(table.to_string()).or_default();

        match table_rows.iter_mut().find(|existing| existing[conflict_key] == key) {
            Some(Value::Object(existing)) => {
                for (column, value) in incoming {
                    existing.insert(column, value);
                }
                Ok(Value::Object(existing.clone()))
            }
            _ => {
                let stored = Value::Object(incoming);
                table_rows.push(stored.clone());
                Ok(stored)
            }
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        _options: &UploadOptions,
        _access_token: &str,
    ) -> Result<(), BackendError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if let Some(err) = self.failures.lock().unwrap().upload.clone() {
            return Err(err);
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, path), bytes);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.test/{}/{}", bucket, path)
    }
}
