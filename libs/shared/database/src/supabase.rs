use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE},
    Client, Method, Response,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::auth::{Credentials, Identity, Session};

use crate::store::{BackendError, BlobStore, IdentityProvider, RecordStore, UploadOptions};

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: AuthUser,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<Response, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        check_status(response).await
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, auth_token, body, headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// For endpoints that answer with an empty body.
    pub async fn request_empty(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(), BackendError> {
        self.send(method, path, auth_token, body, None).await?;
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn header_value(value: &str) -> Result<HeaderValue, BackendError> {
    HeaderValue::from_str(value)
        .map_err(|_| BackendError::Rejected { status: 0, message: "Invalid header value".to_string() })
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    error!("API error ({}): {}", status, error_text);

    Err(match status.as_u16() {
        401 | 403 => BackendError::Unauthorized(error_text),
        code if code >= 500 => BackendError::Unavailable(format!("{}: {}", status, error_text)),
        code => BackendError::Rejected {
            status: code,
            message: error_text,
        },
    })
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, BackendError> {
        match self
            .request::<AuthUser>(Method::GET, "/auth/v1/user", Some(access_token), None)
            .await
        {
            Ok(user) => Ok(Some(Identity {
                id: user.id,
                email: user.email,
            })),
            Err(BackendError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn sign_up(&self, credentials: &Credentials, redirect_to: &str) -> Result<(), BackendError> {
        let path = format!("/auth/v1/signup?redirect_to={}", urlencoding::encode(redirect_to));

        self.request_empty(
            Method::POST,
            &path,
            None,
            Some(json!({
                "email": credentials.email,
                "password": credentials.password,
            })),
        )
        .await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let grant: TokenGrant = self
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=password",
                None,
                Some(json!({
                    "email": credentials.email,
                    "password": credentials.password,
                })),
            )
            .await?;

        Ok(Session {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_in: grant.expires_in,
            identity: Identity {
                id: grant.user.id,
                email: grant.user.email,
            },
        })
    }

    async fn send_passwordless_link(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        let path = format!("/auth/v1/otp?redirect_to={}", urlencoding::encode(redirect_to));

        self.request_empty(
            Method::POST,
            &path,
            None,
            Some(json!({
                "email": email,
                "create_user": true,
            })),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.request_empty(Method::POST, "/auth/v1/logout", Some(access_token), None)
            .await
    }

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), BackendError> {
        self.request_empty(
            Method::PUT,
            "/auth/v1/user",
            Some(access_token),
            Some(json!({ "password": new_password })),
        )
        .await
    }
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn fetch_one(
        &self,
        table: &str,
        id: &str,
        access_token: &str,
    ) -> Result<Option<Value>, BackendError> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=*", table, urlencoding::encode(id));

        let mut rows: Vec<Value> = self
            .request(Method::GET, &path, Some(access_token), None)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(rows.swap_remove(0)))
    }

    async fn fetch_where(
        &self,
        table: &str,
        column: &str,
        value: &str,
        order_by: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<Value>, BackendError> {
        let path = format!(
            "/rest/v1/{}?{}=eq.{}&order={}.asc&select=*",
            table,
            column,
            urlencoding::encode(value),
            order_by
        );

        self.request(Method::GET, &path, access_token, None).await
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        conflict_key: &str,
        access_token: &str,
    ) -> Result<Value, BackendError> {
        let path = format!("/rest/v1/{}?on_conflict={}", table, conflict_key);

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let mut result: Vec<Value> = self
            .request_with_headers(Method::POST, &path, Some(access_token), Some(row), Some(headers))
            .await?;

        if result.is_empty() {
            return Err(BackendError::Decode(format!("Upsert into {} returned no row", table)));
        }

        Ok(result.swap_remove(0))
    }
}

#[async_trait]
impl BlobStore for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        options: &UploadOptions,
        access_token: &str,
    ) -> Result<(), BackendError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let mut headers = self.get_headers(Some(access_token))?;
        headers.insert(CONTENT_TYPE, header_value(content_type)?);
        headers.insert(
            CACHE_CONTROL,
            header_value(&format!("max-age={}", options.cache_control))?,
        );
        headers.insert(
            HeaderName::from_static("x-upsert"),
            HeaderValue::from_static(if options.upsert { "true" } else { "false" }),
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}
