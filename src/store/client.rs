//! Resource client
//!
//! CRUD and paginated listing of configuration service resources. Content is
//! base64-encoded on the way out and decoded on the way in; callers only ever
//! see raw bytes.

use super::codec;
use super::error::{DecodeError, Error, Operation, Result};
use super::path::{resource_path, Scope};
use super::transport::TransportConfig;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Query parameter carrying the pagination cursor
const PAGE_KEY_PARAM: &str = "nextPageKey";

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// A named artifact held by the configuration service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub uri: String,
    pub content: Vec<u8>,
}

impl Resource {
    pub fn new(uri: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            uri: uri.to_string(),
            content: content.into(),
        }
    }

    /// Content as text, if it is valid UTF-8
    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Resource as it travels over the wire
#[derive(Debug, Serialize, Deserialize)]
struct WireResource {
    #[serde(rename = "resourceURI")]
    uri: String,
    /// The store sends `null` for resources without content
    #[serde(rename = "resourceContent", default)]
    content: Option<String>,
}

impl WireResource {
    fn encode(resource: &Resource) -> Self {
        Self {
            uri: resource.uri.clone(),
            content: Some(codec::encode(&resource.content)),
        }
    }

    fn decode(self) -> std::result::Result<Resource, DecodeError> {
        Ok(Resource {
            content: codec::decode(self.content.as_deref().unwrap_or_default())?,
            uri: self.uri,
        })
    }
}

#[derive(Serialize)]
struct ResourceRequest {
    resources: Vec<WireResource>,
}

#[derive(Deserialize)]
struct Version {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Deserialize)]
struct ResourcePage {
    /// An empty stage comes back as `null`
    #[serde(default)]
    resources: Option<Vec<WireResource>>,
    #[serde(rename = "nextPageKey", default)]
    next_page_key: Option<String>,
}

#[derive(Deserialize)]
struct RemoteError {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

/// An empty cursor and `"0"` both mean there is nothing left to fetch
fn is_last_page(key: &str) -> bool {
    key.is_empty() || key == "0"
}

fn decode_error<E: Into<DecodeError>>(operation: Operation, target: &str) -> impl FnOnce(E) -> Error + '_ {
    move |err| Error::Decode {
        operation,
        target: target.to_string(),
        source: err.into(),
    }
}

/// Client for the configuration service resource API
///
/// Cheap to clone and safe to share between tasks; all state is read-only.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    transport: TransportConfig,
    cancel: Option<CancellationToken>,
}

impl ResourceClient {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            cancel: None,
        }
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// A clone whose calls abort with [`Error::Cancelled`] once `token` fires
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            transport: self.transport.clone(),
            cancel: Some(token),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create several resources in one request, returning the new version
    pub async fn create_resources(&self, scope: &Scope, resources: &[Resource]) -> Result<String> {
        self.write_resources(Operation::CreateResources, Method::POST, scope, resources)
            .await
    }

    /// Update several resources in one request, returning the new version
    pub async fn update_resources(&self, scope: &Scope, resources: &[Resource]) -> Result<String> {
        self.write_resources(Operation::UpdateResources, Method::PUT, scope, resources)
            .await
    }

    /// Update a single resource, returning the new version
    pub async fn update_resource(&self, scope: &Scope, resource: &Resource) -> Result<String> {
        let path = resource_path(scope, Some(&resource.uri));
        let body = WireResource::encode(resource);
        self.write(Operation::UpdateResource, Method::PUT, path, &body)
            .await
    }

    async fn write_resources(
        &self,
        operation: Operation,
        method: Method,
        scope: &Scope,
        resources: &[Resource],
    ) -> Result<String> {
        let path = resource_path(scope, None);
        let body = ResourceRequest {
            resources: resources.iter().map(WireResource::encode).collect(),
        };
        tracing::debug!("{} {}: {} resources", operation, scope, body.resources.len());
        self.write(operation, method, path, &body).await
    }

    async fn write<B: Serialize>(
        &self,
        operation: Operation,
        method: Method,
        path: String,
        body: &B,
    ) -> Result<String> {
        let request = self
            .transport
            .http()
            .request(method, self.transport.url(&path))
            .json(body);
        let (status, response_body) = self.send(operation, &path, request).await?;

        if !status.is_success() {
            return Err(self.write_error(operation, path, status, response_body));
        }

        let version = serde_json::from_str::<Version>(&response_body)
            .map_err(decode_error(operation, &path))?
            .version
            .unwrap_or_default();
        tracing::info!("{} {}: version {}", operation, path, version);
        Ok(version)
    }

    fn write_error(&self, operation: Operation, path: String, status: StatusCode, body: String) -> Error {
        // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
        tracing::error!("{} {} failed: {} - {}", operation, path, status, sanitize_for_log(&body));
        Error::RemoteWrite {
            operation,
            target: path,
            status: status.as_u16(),
            body,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch a single resource with its content decoded
    pub async fn get_resource(&self, scope: &Scope, uri: &str) -> Result<Resource> {
        let operation = Operation::GetResource;
        let path = resource_path(scope, Some(uri));
        let request = self.transport.http().get(self.transport.url(&path));
        let (status, body) = self.send(operation, &path, request).await?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("{} {}: not found", operation, path);
            return Err(Error::NotFound {
                operation,
                target: path,
            });
        }
        if !status.is_success() {
            return Err(self.read_error(operation, path, status, &body));
        }

        let wire: WireResource = serde_json::from_str(&body).map_err(decode_error(operation, &path))?;
        wire.decode().map_err(decode_error(operation, &path))
    }

    /// Fetch every resource of a stage, following the pagination cursor
    ///
    /// Any failing page aborts the whole listing; no partial result is returned.
    pub async fn list_stage_resources(&self, project: &str, stage: &str) -> Result<Vec<Resource>> {
        let operation = Operation::ListResources;
        let path = resource_path(&Scope::stage(project, stage), None);
        let url = self.transport.url(&path);

        let mut resources = Vec::new();
        let mut page_key: Option<String> = None;
        let mut pages = 0usize;

        loop {
            if self.is_cancelled() {
                return Err(Error::Cancelled {
                    operation,
                    target: path,
                });
            }

            let mut request = self.transport.http().get(&url);
            if let Some(key) = page_key.as_deref() {
                request = request.query(&[(PAGE_KEY_PARAM, key)]);
            }

            let (status, body) = self.send(operation, &path, request).await?;
            if status != StatusCode::OK {
                return Err(self.read_error(operation, path, status, &body));
            }

            let page: ResourcePage = serde_json::from_str(&body).map_err(decode_error(operation, &path))?;
            pages += 1;
            for wire in page.resources.unwrap_or_default() {
                resources.push(wire.decode().map_err(decode_error(operation, &path))?);
            }

            match page.next_page_key {
                Some(key) if !is_last_page(&key) => page_key = Some(key),
                _ => break,
            }
        }

        tracing::debug!(
            "{} {}: {} resources in {} pages",
            operation,
            path,
            resources.len(),
            pages
        );
        Ok(resources)
    }

    /// Turn a rejected read into a structured error
    ///
    /// The store answers with `{code, message}`; when it does not, the HTTP
    /// status and raw body stand in.
    fn read_error(&self, operation: Operation, path: String, status: StatusCode, body: &str) -> Error {
        tracing::error!("{} {} failed: {} - {}", operation, path, status, sanitize_for_log(body));
        let (code, message) = match serde_json::from_str::<RemoteError>(body) {
            Ok(remote) => (remote.code, remote.message.unwrap_or_default()),
            Err(_) => (i64::from(status.as_u16()), body.to_string()),
        };
        Error::RemoteRead {
            operation,
            target: path,
            code,
            message,
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete a single resource
    pub async fn delete_resource(&self, scope: &Scope, uri: &str) -> Result<()> {
        let operation = Operation::DeleteResource;
        let path = resource_path(scope, Some(uri));
        let request = self.transport.http().delete(self.transport.url(&path));
        let (status, body) = self.send(operation, &path, request).await?;

        if !status.is_success() {
            return Err(self.write_error(operation, path, status, body));
        }
        tracing::info!("{} {}", operation, path);
        Ok(())
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Send a request and read the full response body
    async fn send(
        &self,
        operation: Operation,
        path: &str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String)> {
        let request = match self.transport.auth() {
            Some((header, token)) => request.header(header, token),
            None => request,
        };

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let outcome = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("{} {}: cancelled", operation, path);
                        return Err(Error::Cancelled {
                            operation,
                            target: path.to_string(),
                        });
                    }
                    outcome = exchange => outcome,
                }
            }
            None => exchange.await,
        };

        let (status, body) = outcome.map_err(|source| Error::Transport {
            operation,
            target: path.to_string(),
            source,
        })?;
        tracing::debug!("{} {} -> {}", operation, path, status);
        Ok((status, body))
    }
}
