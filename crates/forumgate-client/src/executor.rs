//! Request execution with rate-limit retries.
//!
//! [`HttpRequestExecutor::execute`] runs one logical call:
//!
//! 1. Resolve the URL (`host` with its path replaced) and the default headers
//!    `Accept`, `Api-Key`, `Api-Username`; per-request overrides win.
//! 2. Send. Success (status below 400) leaves the loop.
//! 3. A 429 consumes an attempt and, unless it was the last, sleeps
//!    `backoff + extras.wait_seconds`. Any other failure returns at once.
//! 4. A 302 that survived the loop is an error; otherwise the body goes
//!    through [`ResponseDecoder`].
//!
//! Retries are strictly sequential and never outlive the call.

use std::sync::Arc;
use std::time::Duration;

use http::header::{ACCEPT, HeaderName};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::decoder::{JSON_CONTENT_TYPE, ResponseDecoder};
use crate::error::{ApiError, Result};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::transport::{
    FileAttachment, HttpTransport, RequestBody, RequestOptions, ReqwestTransport,
    TransportRequest,
};

/// `Api-Key` header name.
pub const API_KEY_HEADER: &str = "api-key";
/// `Api-Username` header name.
pub const API_USERNAME_HEADER: &str = "api-username";

/// Who the client talks to and as whom.
#[derive(Debug, Clone)]
pub struct Credentials {
    host: Url,
    api_username: String,
    api_key: SecretString,
    timeout: Option<Duration>,
}

impl Credentials {
    /// Credentials without a timeout.
    pub fn new(host: Url, api_username: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            host,
            api_username: api_username.into(),
            api_key,
            timeout: None,
        }
    }

    /// Parse `host` and build credentials.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidRequest`](crate::ApiErrorKind::InvalidRequest)
    /// error if `host` is not an absolute URL.
    pub fn parse(host: &str, api_username: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let host = Url::parse(host)
            .map_err(|e| ApiError::invalid_request(format!("invalid host '{host}': {e}")))?;
        Ok(Self::new(host, api_username, SecretString::new(api_key.into())))
    }

    /// Apply a per-call timeout to every request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// API host.
    pub fn host(&self) -> &Url {
        &self.host
    }

    /// User the API key acts as.
    pub fn api_username(&self) -> &str {
        &self.api_username
    }

    /// Default per-call timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// One API call: verb, path, payload and overrides.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    json: Option<Value>,
    files: Vec<FileAttachment>,
    headers: HeaderMap,
    follow_redirects: Option<bool>,
    timeout: Option<Duration>,
}

impl ApiRequest {
    /// A request without payload.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            form: Vec::new(),
            json: None,
            files: Vec::new(),
            headers: HeaderMap::new(),
            follow_redirects: None,
            timeout: None,
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `PUT path`
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `POST path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add query parameters.
    #[must_use]
    pub fn query<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add form fields.
    #[must_use]
    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.form
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Send a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Attach files. Form fields travel with them as multipart.
    #[must_use]
    pub fn files(mut self, files: impl IntoIterator<Item = FileAttachment>) -> Self {
        self.files.extend(files);
        self
    }

    /// Override or add a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Follow redirects instead of failing on a 302.
    #[must_use]
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    /// Override the credentials' timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn body(&mut self) -> Result<RequestBody> {
        let form = std::mem::take(&mut self.form);
        let files = std::mem::take(&mut self.files);
        match (self.json.take(), files.is_empty()) {
            (Some(_), false) => Err(ApiError::invalid_request(
                "a JSON body cannot be combined with file attachments",
            )),
            (Some(json), true) => Ok(RequestBody::Json(json)),
            (None, false) => Ok(RequestBody::Multipart {
                fields: form,
                files,
            }),
            (None, true) if form.is_empty() => Ok(RequestBody::Empty),
            (None, true) => Ok(RequestBody::Form(form)),
        }
    }
}

/// Builds, sends and classifies API requests.
#[derive(Debug, Clone)]
pub struct HttpRequestExecutor {
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
    decoder: ResponseDecoder,
}

impl HttpRequestExecutor {
    /// Executor over a fresh [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns a [`Transport`](crate::ApiErrorKind::Transport) error if the
    /// HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let transport = ReqwestTransport::new().map_err(ApiError::transport)?;
        Ok(Self::with_transport(credentials, Arc::new(transport)))
    }

    /// Executor over any transport.
    pub fn with_transport(credentials: Credentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            transport,
            sleeper: Arc::new(TokioSleeper),
            retry: RetryPolicy::default(),
            decoder: ResponseDecoder,
        }
    }

    /// Replace the backoff sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Credentials in use.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Retry policy in use.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// `host` with its path replaced by `path`; query and fragment dropped.
    pub fn url_for(&self, path: &str) -> Url {
        let mut url = self.credentials.host.clone();
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    fn headers(&self, overrides: &HeaderMap) -> Result<HeaderMap> {
        let mut api_key = HeaderValue::from_str(self.credentials.api_key.expose_secret())
            .map_err(|_| ApiError::invalid_request("API key is not a valid header value"))?;
        api_key.set_sensitive(true);
        let api_username = HeaderValue::from_str(&self.credentials.api_username)
            .map_err(|_| ApiError::invalid_request("API username is not a valid header value"))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);
        headers.insert(HeaderName::from_static(API_USERNAME_HEADER), api_username);
        // Replaces every default value for an overridden name, keeping all of
        // the override's values.
        headers.extend(overrides.clone());
        Ok(headers)
    }

    fn prepare(&self, mut request: ApiRequest) -> Result<TransportRequest> {
        let body = request.body()?;
        Ok(TransportRequest {
            url: self.url_for(&request.path),
            headers: self.headers(&request.headers)?,
            options: RequestOptions {
                follow_redirects: request.follow_redirects.unwrap_or(false),
                timeout: request.timeout.or(self.credentials.timeout),
            },
            method: request.method,
            query: request.query,
            body,
        })
    }

    /// Run `request` to completion.
    ///
    /// Returns the decoded document, or `None` for a blank non-JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiErrorKind`](crate::ApiErrorKind): transport failures are
    /// returned immediately, 429s are retried until the policy runs out,
    /// other non-success statuses fail with the server's diagnostic.
    pub async fn execute(&self, request: ApiRequest) -> Result<Option<Value>> {
        let request = self.prepare(request)?;
        let mut state = self.retry.start();

        let response = loop {
            debug!(
                method = %request.method,
                url = %request.url,
                attempts_remaining = state.attempts_remaining(),
                "sending API request"
            );
            let response = self
                .transport
                .send(request.clone())
                .await
                .map_err(ApiError::transport)?;

            if response.is_success() {
                break response;
            }

            if response.status != StatusCode::TOO_MANY_REQUESTS {
                let message = self.decoder.diagnostic_message(&response);
                warn!(status = %response.status, url = %request.url, %message, "API request failed");
                return Err(ApiError::http(message, response));
            }

            let wait_seconds = self.decoder.rate_limit_wait(&response).unwrap_or_else(|| {
                warn!(url = %request.url, "rate limited without extras.wait_seconds");
                0.0
            });
            let delay = state.rate_limited(wait_seconds);
            if !state.can_attempt() {
                warn!(url = %request.url, "rate limited, retries exhausted");
                return Err(ApiError::rate_limited(response));
            }
            if let Some(delay) = delay {
                warn!(
                    url = %request.url,
                    delay_ms = delay.as_millis() as u64,
                    attempts_remaining = state.attempts_remaining(),
                    "rate limited, backing off"
                );
                self.sleeper.sleep(delay).await;
            }
        };

        if response.status == StatusCode::FOUND {
            return Err(ApiError::unexpected_redirect(response));
        }

        self.decoder.decode(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(host: &str) -> HttpRequestExecutor {
        let credentials = Credentials::parse(host, "system", "key-123").unwrap();
        HttpRequestExecutor::new(credentials).unwrap()
    }

    #[test]
    fn test_url_replaces_path() {
        let exec = executor("https://forum.example.org/base/?x=1#frag");
        assert_eq!(
            exec.url_for("admin/users/7.json").as_str(),
            "https://forum.example.org/admin/users/7.json"
        );
        assert_eq!(
            exec.url_for("/groups/makers.json").as_str(),
            "https://forum.example.org/groups/makers.json"
        );
    }

    #[test]
    fn test_default_headers() {
        let exec = executor("https://forum.example.org");
        let headers = exec.headers(&HeaderMap::new()).unwrap();
        assert_eq!(headers[ACCEPT], JSON_CONTENT_TYPE);
        assert_eq!(headers[API_KEY_HEADER], "key-123");
        assert!(headers[API_KEY_HEADER].is_sensitive());
        assert_eq!(headers[API_USERNAME_HEADER], "system");
    }

    #[test]
    fn test_header_overrides_win() {
        let exec = executor("https://forum.example.org");
        let mut overrides = HeaderMap::new();
        overrides.insert(ACCEPT, HeaderValue::from_static("text/csv"));
        overrides.insert(
            HeaderName::from_static(API_USERNAME_HEADER),
            HeaderValue::from_static("alice"),
        );
        let headers = exec.headers(&overrides).unwrap();
        assert_eq!(headers[ACCEPT], "text/csv");
        assert_eq!(headers[API_USERNAME_HEADER], "alice");
        assert_eq!(headers[API_KEY_HEADER], "key-123");
    }

    #[test]
    fn test_multi_valued_header_override() {
        let exec = executor("https://forum.example.org");
        let mut overrides = HeaderMap::new();
        overrides.append(ACCEPT, HeaderValue::from_static("text/csv"));
        overrides.append(ACCEPT, HeaderValue::from_static("text/plain"));
        let headers = exec.headers(&overrides).unwrap();
        let accept: Vec<_> = headers.get_all(ACCEPT).iter().collect();
        assert_eq!(accept, ["text/csv", "text/plain"]);
        assert_eq!(headers[API_USERNAME_HEADER], "system");
    }

    #[test]
    fn test_prepare_options() {
        let credentials = Credentials::parse("https://forum.example.org", "system", "k")
            .unwrap()
            .with_timeout(Duration::from_secs(10));
        let exec = HttpRequestExecutor::new(credentials).unwrap();

        let prepared = exec.prepare(ApiRequest::get("/x.json")).unwrap();
        assert!(!prepared.options.follow_redirects);
        assert_eq!(prepared.options.timeout, Some(Duration::from_secs(10)));

        let prepared = exec
            .prepare(
                ApiRequest::get("/x.json")
                    .follow_redirects(true)
                    .timeout(Duration::from_secs(2)),
            )
            .unwrap();
        assert!(prepared.options.follow_redirects);
        assert_eq!(prepared.options.timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_body_selection() {
        let exec = executor("https://forum.example.org");

        let empty = exec.prepare(ApiRequest::put("/a")).unwrap();
        assert_eq!(empty.body, RequestBody::Empty);

        let form = exec.prepare(ApiRequest::put("/a").form([("usernames", "sam")])).unwrap();
        assert_eq!(
            form.body,
            RequestBody::Form(vec![("usernames".into(), "sam".into())])
        );

        let json = exec
            .prepare(ApiRequest::post("/a").json(serde_json::json!({"a": 1})))
            .unwrap();
        assert_eq!(json.body, RequestBody::Json(serde_json::json!({"a": 1})));

        let file = FileAttachment::new("file", "a.txt", "hi");
        let multipart = exec
            .prepare(ApiRequest::post("/a").form([("type", "avatar")]).files([file.clone()]))
            .unwrap();
        assert_eq!(
            multipart.body,
            RequestBody::Multipart {
                fields: vec![("type".into(), "avatar".into())],
                files: vec![file.clone()],
            }
        );

        let err = exec
            .prepare(ApiRequest::post("/a").json(serde_json::json!({})).files([file]))
            .unwrap_err();
        assert_eq!(err.kind(), crate::ApiErrorKind::InvalidRequest);
    }

    #[test]
    fn test_invalid_host() {
        let err = Credentials::parse("not a url", "system", "k").unwrap_err();
        assert_eq!(err.kind(), crate::ApiErrorKind::InvalidRequest);
    }

    #[test]
    fn test_credentials_debug_redacts_key() {
        let credentials = Credentials::parse("https://forum.example.org", "system", "key-123").unwrap();
        assert!(!format!("{credentials:?}").contains("key-123"));
    }
}
