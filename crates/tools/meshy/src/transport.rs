//! HTTP transport seam
//!
//! The client only needs `GET` and `POST` that hand back a status code,
//! headers and a body string. [`ReqwestTransport`] is the production
//! implementation; tests plug in scripted transports.

use crate::error::{MeshyError, Result};
use crate::request::BinaryPayload;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Headers sent with every request, as `(name, value)` pairs
pub type Headers = Vec<(String, String)>;

/// Raw HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Classify a non-2xx response: 429 becomes `RateLimited`, anything
    /// else `Remote` with the status and body
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        if self.status == 429 {
            let retry_after = self
                .header("retry-after")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(MeshyError::RateLimited { retry_after });
        }
        Err(MeshyError::Remote {
            status: self.status,
            body: self.body,
        })
    }

    /// Classify a non-2xx response for a caller that does not retry: every
    /// failure, 429 included, becomes `Remote` with the status and body
    pub fn error_for_status_remote(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(MeshyError::Remote {
            status: self.status,
            body: self.body,
        })
    }
}

/// One field of a multipart form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, payload: BinaryPayload },
}

/// Transport-neutral multipart form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, payload: BinaryPayload) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            payload,
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Value of the first text field called `name`
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    fn into_reqwest(self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File { name, payload } => {
                    let part = reqwest::multipart::Part::bytes(payload.bytes)
                        .file_name(payload.file_name)
                        .mime_str(&payload.content_type)?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// Body of a POST request; exactly one encoding per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Json(String),
    Multipart(MultipartForm),
}

/// Minimal HTTP surface the client depends on
///
/// Implementations return every response they receive, success or not;
/// status classification happens in the client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse>;

    async fn post(&self, url: &str, headers: &Headers, body: RequestBody) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> MeshyError {
        if e.is_timeout() {
            MeshyError::TimeoutError(self.timeout)
        } else if e.is_connect() {
            MeshyError::ConnectionError(format!("Failed to connect to {}: {}", url, e))
        } else {
            MeshyError::RequestFailed(e)
        }
    }

    async fn read(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse> {
        let mut request = self.client.get(url).timeout(self.timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;
        Self::read(response).await
    }

    async fn post(&self, url: &str, headers: &Headers, body: RequestBody) -> Result<HttpResponse> {
        let mut request = self.client.post(url).timeout(self.timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match body {
            RequestBody::Json(json) => request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(json),
            RequestBody::Multipart(form) => request.multipart(form.into_reqwest()?),
        };
        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;
        Self::read(response).await
    }
}
