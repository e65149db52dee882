//! Response classification and the JSON error envelope.
//!
//! The API answers JSON documents that may carry `errors: [string]` and
//! `message: string`. An empty `errors` array means success.

use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::transport::RawResponse;

/// The only content type accepted as JSON.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Decodes successful responses and explains failed ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder;

impl ResponseDecoder {
    /// Decode a response whose status already counted as success.
    ///
    /// Returns `Ok(None)` for a blank body without the JSON content type;
    /// some endpoints answer with an empty HTML document.
    ///
    /// # Errors
    ///
    /// - [`ContentTypeMismatch`](crate::ApiErrorKind::ContentTypeMismatch)
    ///   for a non-blank body with any other content type
    /// - [`Decode`](crate::ApiErrorKind::Decode) if the body is not JSON
    /// - [`Application`](crate::ApiErrorKind::Application) if `errors` is
    ///   populated
    pub fn decode(&self, response: RawResponse) -> Result<Option<Value>> {
        let content_type = response.content_type().unwrap_or_default();
        if content_type != JSON_CONTENT_TYPE {
            if response.is_blank() {
                debug!(status = %response.status, content_type, "empty non-JSON response");
                return Ok(None);
            }
            let actual = content_type.to_string();
            return Err(ApiError::content_type_mismatch(
                JSON_CONTENT_TYPE,
                &actual,
                response,
            ));
        }

        let document: Value = match serde_json::from_slice(&response.body) {
            Ok(document) => document,
            Err(_) => return Err(ApiError::decode(response)),
        };

        if let Some(errors) = populated_errors(&document) {
            let message = document
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map_or_else(|| join_errors(errors), str::to_string);
            return Err(ApiError::application(message, response));
        }

        Ok(Some(document))
    }

    /// Message describing a non-success response: the joined `errors`
    /// array, else the status reason phrase, else `"<status>: <body>"`.
    pub fn diagnostic_message(&self, response: &RawResponse) -> String {
        let errors = response
            .json()
            .and_then(|doc| doc.get("errors").and_then(string_errors));
        if let Some(message) = errors {
            return message;
        }
        match response.status.canonical_reason() {
            Some(reason) => reason.to_string(),
            None => format!("{}: {}", response.status.as_u16(), response.text()),
        }
    }

    /// `extras.wait_seconds` from a 429 body.
    pub fn rate_limit_wait(&self, response: &RawResponse) -> Option<f64> {
        response
            .json()?
            .get("extras")?
            .get("wait_seconds")?
            .as_f64()
    }
}

fn populated_errors(document: &Value) -> Option<&Value> {
    let errors = document.get("errors")?;
    let populated = match errors {
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => false,
    };
    populated.then_some(errors)
}

/// Join an `errors` value for display. Objects contribute their field
/// names; non-string array entries are rendered as JSON.
fn join_errors(errors: &Value) -> String {
    match errors {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(fields) => fields.keys().cloned().collect::<Vec<_>>().join(","),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Join an `errors` array made only of strings.
fn string_errors(errors: &Value) -> Option<String> {
    let items = errors.as_array()?;
    let strings = items
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<_>>>()?;
    Some(strings.join(","))
}
