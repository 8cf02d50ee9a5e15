//! WebDAV backend over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde_json::Value;

use super::http::{build_client, check_status, encode_key, normalize_base_url};
use super::{normalize_key, BackendKind, RemoteBackend, DATA_FILE_NAME};
use crate::models::AppData;
use crate::storage::parse_json_relaxed;
use crate::{Error, Result};

const BACKEND: &str = "webdav";

/// Client for a WebDAV collection holding `data.json` and attachment blobs.
#[derive(Debug, Clone)]
pub struct WebDavBackend {
    base_url: String,
    username: String,
    password: Option<String>,
    client: reqwest::Client,
}

impl WebDavBackend {
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url, "WebDAV")?,
            username: username.into(),
            password,
            client: build_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, encode_key(path))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        if self.username.is_empty() && self.password.is_none() {
            request
        } else {
            request.basic_auth(&self.username, self.password.as_deref())
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str, path: &str) -> Result<reqwest::Response> {
        let response = request.send().await?;
        check_status(response, BACKEND, operation, path).await
    }
}

#[async_trait]
impl RemoteBackend for WebDavBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::WebDav
    }

    async fn get_json(&self) -> Result<Option<Value>> {
        let request = self
            .request(Method::GET, DATA_FILE_NAME)
            .header(header::ACCEPT, "application/json");
        match self.send(request, "GET", DATA_FILE_NAME).await {
            Ok(response) => {
                let body = response.text().await?;
                parse_json_relaxed(&body).map(Some)
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn put_json(&self, data: &AppData) -> Result<()> {
        let body = serde_json::to_vec_pretty(data)?;
        let request = self
            .request(Method::PUT, DATA_FILE_NAME)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request, "PUT", DATA_FILE_NAME).await?;
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
        let mut request = self.request(Method::PUT, &key).body(bytes.to_vec());
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
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

    /// Creates each missing collection along `path`.
    async fn make_directory(&self, path: &str) -> Result<()> {
        let path = normalize_key(path)?;
        let mkcol = Method::from_bytes(b"MKCOL")
            .map_err(|error| Error::Storage(format!("invalid WebDAV method: {error}")))?;

        let mut current = String::new();
        for segment in path.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            let response = self.request(mkcol.clone(), &current).send().await?;
            // 405 means the collection already exists.
            if response.status() == StatusCode::METHOD_NOT_ALLOWED {
                continue;
            }
            check_status(response, BACKEND, "MKCOL", &current).await?;
        }
        Ok(())
    }
}
