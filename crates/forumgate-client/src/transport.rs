//! HTTP transport abstraction.
//!
//! The executor only needs "send one request, get one response back". That
//! seam is [`HttpTransport`]; [`ReqwestTransport`] is the production
//! implementation and tests script their own.
//!
//! ## Redirects
//!
//! Redirect following is a per-request choice. `ReqwestTransport` keeps two
//! pooled clients, one with `redirect::Policy::none()` and one with the
//! reqwest default, and picks per call.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, header};
use reqwest::multipart;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Failures below HTTP. These are never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The per-request timeout elapsed
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request could not be built or sent
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// A file sent as a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// Form field name
    pub field: String,
    /// File name reported to the server
    pub file_name: String,
    /// MIME type, if known
    pub content_type: Option<String>,
    /// File contents
    pub data: Bytes,
}

impl FileAttachment {
    /// Create an attachment without a MIME type.
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
    /// JSON document
    Json(Value),
    /// `multipart/form-data` fields and files
    Multipart {
        /// Text fields
        fields: Vec<(String, String)>,
        /// File parts
        files: Vec<FileAttachment>,
    },
}

/// Per-request transport behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Follow 3xx responses instead of returning them
    pub follow_redirects: bool,
    /// Abort the request after this long
    pub timeout: Option<Duration>,
}

/// A fully resolved request, ready to send.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute target URL
    pub url: Url,
    /// Query pairs appended to `url`
    pub query: Vec<(String, String)>,
    /// Body
    pub body: RequestBody,
    /// Headers
    pub headers: HeaderMap,
    /// Transport options
    pub options: RequestOptions,
}

/// A response with its body fully read.
#[derive(Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl RawResponse {
    /// Create a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Whether the status counts as success (anything below 400).
    pub fn is_success(&self) -> bool {
        self.status.as_u16() < 400
    }

    /// The `Content-Type` header, if present and readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Whether the body is empty or only ASCII whitespace.
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type())
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Sends a single HTTP request.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Send `request` and read the whole response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response was received. Any HTTP
    /// status, including errors, is a successful send.
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError>;
}

/// [`HttpTransport`] backed by reqwest with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    direct: reqwest::Client,
    following: reqwest::Client,
}

impl ReqwestTransport {
    /// Build both pooled clients.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, TransportError> {
        let direct = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let following = reqwest::Client::builder().build()?;
        Ok(Self::from_clients(direct, following))
    }

    /// Use existing clients. `direct` must not follow redirects.
    pub fn from_clients(direct: reqwest::Client, following: reqwest::Client) -> Self {
        Self { direct, following }
    }

    fn multipart_form(
        fields: Vec<(String, String)>,
        files: Vec<FileAttachment>,
    ) -> Result<multipart::Form, TransportError> {
        let mut form = multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name, value);
        }
        for file in files {
            let mut part = multipart::Part::bytes(file.data.to_vec()).file_name(file.file_name);
            if let Some(mime) = &file.content_type {
                part = part.mime_str(mime)?;
            }
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let client = if request.options.follow_redirects {
            &self.following
        } else {
            &self.direct
        };

        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(timeout) = request.options.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart { fields, files } => {
                builder.multipart(Self::multipart_form(fields, files)?)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(RawResponse::new(status, headers, body))
    }
}
