//! HTTP client for the hosted data platform

use crate::error::{GatewayError, Result};
use crate::types::*;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// HTTP client for the hosted platform's auth, row, RPC and storage APIs
///
/// # Example
///
/// ```rust,no_run
/// use lumen_gateway::{GatewayClient, GatewayConfig, RowQuery};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GatewayClient::new(GatewayConfig {
///     base_url: "https://studio.example.com".into(),
///     api_key: "public-anon-key".into(),
///     ..Default::default()
/// })?;
///
/// client.sign_in_with_password("owner@example.com", "secret").await?;
///
/// let projects = client
///     .select("projects", &RowQuery::new().eq("status", "shoot"))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GatewayClient {
    config: GatewayConfig,
    client: Client,
    session: RwLock<Option<Session>>,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(config: GatewayConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(GatewayError::Config("base_url must not be empty".into()));
        }

        let mut headers = header::HeaderMap::new();
        if !config.api_key.is_empty() {
            let value = header::HeaderValue::from_str(&config.api_key)
                .map_err(|_| GatewayError::Config("api_key is not a valid header value".into()))?;
            headers.insert("apikey", value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: GatewayConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            client,
            session: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    // ==================== Auth API ====================

    /// Sign in with email and password; the session is kept for later calls
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        let session: Session = self.handle_response(response).await?;
        debug!(user_id = %session.user.id, "Signed in");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// End the current session, locally and remotely
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };

        let url = format!("{}/auth/v1/logout", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Server { status, message: body });
        }
        Ok(())
    }

    /// Install a session obtained elsewhere (e.g. restored from disk)
    pub async fn set_session(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    // ==================== Row API ====================

    /// Select rows from a table
    pub async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>> {
        let url = format!(
            "{}?{}",
            self.table_url(table),
            query.to_query_string()
        );

        let request = self.authorized(self.client.get(&url)).await;
        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Insert one row (object) or many rows (array); returns inserted rows
    pub async fn insert(&self, table: &str, rows: &Value) -> Result<Vec<Value>> {
        let request = self
            .authorized(self.client.post(self.table_url(table)))
            .await
            .header("Prefer", "return=representation")
            .json(rows);

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Patch all rows matching the filters; returns updated rows
    pub async fn update(&self, table: &str, filters: &[Filter], patch: &Value) -> Result<Vec<Value>> {
        let url = self.filtered_url(table, filters);

        let request = self
            .authorized(self.client.patch(&url))
            .await
            .header("Prefer", "return=representation")
            .json(patch);

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Delete all rows matching the filters; returns deleted rows
    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        if filters.is_empty() {
            return Err(GatewayError::Config(format!(
                "refusing unfiltered delete on {}",
                table
            )));
        }
        let url = self.filtered_url(table, filters);

        let request = self
            .authorized(self.client.delete(&url))
            .await
            .header("Prefer", "return=representation");

        let response = request.send().await?;
        self.handle_response(response).await
    }

    // ==================== RPC API ====================

    /// Call a named remote procedure.
    ///
    /// Both the transport status and an embedded `success: false` envelope are
    /// turned into errors; anything else is returned as-is.
    pub async fn rpc(&self, name: &str, args: &Value) -> Result<Value> {
        let url = format!(
            "{}/rest/v1/rpc/{}",
            self.config.base_url,
            urlencoding::encode(name)
        );

        let request = self.authorized(self.client.post(&url)).await.json(args);
        let response = request.send().await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let value: Value = self.handle_response(response).await?;
        RpcEnvelope::check(name, &value)?;
        Ok(value)
    }

    // ==================== Storage API ====================

    /// Upload an object and return its public URL
    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<StoredObject> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        );

        let request = self
            .authorized(self.client.post(&url))
            .await
            .header(header::CONTENT_TYPE, mime_type)
            .body(data);

        let response = request.send().await?;
        let _: Value = self.handle_response(response).await?;

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            public_url: self.public_url(bucket, path),
        })
    }

    /// Remove objects from a bucket
    pub async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let url = format!(
            "{}/storage/v1/object/{}",
            self.config.base_url,
            urlencoding::encode(bucket)
        );

        let request = self
            .authorized(self.client.delete(&url))
            .await
            .json(&serde_json::json!({ "prefixes": paths }));

        let response = request.send().await?;
        let _: Value = self.handle_response(response).await?;
        Ok(())
    }

    /// Public URL for an object
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }

    // ==================== Helper Methods ====================

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, urlencoding::encode(table))
    }

    fn filtered_url(&self, table: &str, filters: &[Filter]) -> String {
        let params: Vec<String> = filters.iter().map(Filter::to_query_pair).collect();
        if params.is_empty() {
            self.table_url(table)
        } else {
            format!("{}?{}", self.table_url(table), params.join("&"))
        }
    }

    /// Attach the session token, falling back to the public key
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.read().await.as_ref() {
            Some(session) => request.bearer_auth(&session.access_token),
            None if !self.config.api_key.is_empty() => request.bearer_auth(&self.config.api_key),
            None => request,
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Unauthorized {
                status: status.as_u16(),
                message: body,
            });
        }

        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::NotFound(if body.is_empty() {
                "Resource not found".to_string()
            } else {
                body
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            serde_json::from_str("null")?
        } else {
            serde_json::from_str(&text)?
        };
        Ok(body)
    }
}

/// Encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
