//! Self-hosted cloud endpoint.
//!
//! The snapshot lives at `{base}/data`; attachment blobs live at
//! `{base}/{key}`. Every request carries the bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder};
use serde_json::Value;

use super::http::{build_client, check_status, encode_key, normalize_base_url};
use super::{normalize_key, BackendKind, RemoteBackend};
use crate::models::AppData;
use crate::storage::parse_json_relaxed;
use crate::{Error, Result};

const BACKEND: &str = "cloud";
const DATA_ROUTE: &str = "data";

#[derive(Debug, Clone)]
pub struct CloudBackend {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl CloudBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url, "cloud")?,
            token: token.filter(|token| !token.trim().is_empty()),
            client: build_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, route: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}/{}", self.base_url, encode_key(route)));
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str, route: &str) -> Result<reqwest::Response> {
        let response = request.send().await?;
        check_status(response, BACKEND, operation, route).await
    }
}

#[async_trait]
impl RemoteBackend for CloudBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    async fn get_json(&self) -> Result<Option<Value>> {
        let request = self
            .request(Method::GET, DATA_ROUTE)
            .header(header::ACCEPT, "application/json");
        match self.send(request, "GET", DATA_ROUTE).await {
            Ok(response) => {
                let body = response.text().await?;
                parse_json_relaxed(&body).map(Some)
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn put_json(&self, data: &AppData) -> Result<()> {
        let request = self.request(Method::PUT, DATA_ROUTE).json(data);
        self.send(request, "PUT", DATA_ROUTE).await?;
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let key = normalize_key(key)?;
        match self.send(self.request(Method::HEAD, &key), "HEAD", &key).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        let key = normalize_key(key)?;
        let response = self.send(self.request(Method::GET, &key), "GET", &key).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn put_file(&self, key: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()> {
        let key = normalize_key(key)?;
        let request = self
            .request(Method::PUT, &key)
            .header(
                header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(bytes.to_vec());
        self.send(request, "PUT", &key).await?;
        Ok(())
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        let key = normalize_key(key)?;
        match self.send(self.request(Method::DELETE, &key), "DELETE", &key).await {
            Ok(_) | Err(Error::NotFound(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Keys are flat on the cloud endpoint; nothing to create.
    async fn make_directory(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}
