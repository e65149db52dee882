//! Common test utilities for client integration tests
//!
//! A scripted transport that replays canned responses and records requests,
//! and a sleeper that records backoff delays instead of waiting.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use forumgate_client::{
    Credentials, HttpRequestExecutor, HttpTransport, JSON_CONTENT_TYPE, RawResponse, Sleeper,
    TransportError, TransportRequest, async_trait,
};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use serde_json::Value;

pub const API_USERNAME: &str = "system";
pub const API_KEY: &str = "test-api-key";

/// Replays queued responses in order
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = RawResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::default(),
        })
    }

    pub fn failing(error: TransportError) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::from([Err(error)])),
            requests: Mutex::default(),
        })
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("script exhausted".into())))
    }
}

/// Records requested sleeps without waiting
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn credentials(host: &str) -> Credentials {
    Credentials::parse(host, API_USERNAME, API_KEY).expect("valid host")
}

/// Executor over a scripted transport and a recording sleeper
pub fn scripted_executor(
    responses: impl IntoIterator<Item = RawResponse>,
) -> (HttpRequestExecutor, Arc<ScriptedTransport>, Arc<RecordingSleeper>) {
    let transport = ScriptedTransport::new(responses);
    let sleeper = Arc::new(RecordingSleeper::default());
    let executor = HttpRequestExecutor::with_transport(
        credentials("https://forum.example.org"),
        transport.clone(),
    )
    .with_sleeper(sleeper.clone());
    (executor, transport, sleeper)
}

pub fn response(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> RawResponse {
    let mut headers = HeaderMap::new();
    if let Some(ct) = content_type {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
    }
    RawResponse::new(StatusCode::from_u16(status).unwrap(), headers, body)
}

pub fn json_response(status: u16, body: &Value) -> RawResponse {
    response(status, Some(JSON_CONTENT_TYPE), body.to_string())
}

pub fn rate_limited(wait_seconds: u64) -> RawResponse {
    json_response(
        429,
        &serde_json::json!({
            "errors": ["You've performed this action too many times."],
            "error_type": "rate_limit",
            "extras": {"wait_seconds": wait_seconds}
        }),
    )
}
