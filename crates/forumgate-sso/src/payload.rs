//! SSO payload encoding.
//!
//! On the wire the payload is `base64(urlencode(fields))`. Outbound it carries
//! `nonce` and `return_sso_url`; inbound the provider adds at least
//! `external_id` and `username`, often `email`, `name`, `admin`, `moderator`
//! and `groups` as well.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::form_urlencoded;

use crate::error::{Result, SsoError};

/// Encode outbound fields as `base64(urlencode(fields))`.
pub fn encode<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    STANDARD.encode(query)
}

/// Decoded inbound payload: each key maps to every value it appeared with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsoPayload {
    fields: HashMap<String, Vec<String>>,
}

impl SsoPayload {
    /// Decode the `sso` parameter.
    ///
    /// Only call this on a payload whose signature has been verified.
    /// ASCII whitespace is ignored, since some providers wrap base64 lines.
    ///
    /// # Errors
    ///
    /// Returns [`SsoError::MalformedPayload`] when the value is not base64 or
    /// does not decode to UTF-8.
    pub fn decode(sso: &str) -> Result<Self> {
        let compact: String = sso.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| SsoError::MalformedPayload(format!("base64: {e}")))?;
        let query = String::from_utf8(bytes)
            .map_err(|e| SsoError::MalformedPayload(format!("utf-8: {e}")))?;
        Ok(Self::parse(&query))
    }

    /// Parse a URL-encoded query string. Blank values are skipped.
    pub fn parse(query: &str) -> Self {
        let mut fields: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            fields
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        Self { fields }
    }

    /// First value of `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of `key`, in payload order.
    pub fn all(&self, key: &str) -> &[String] {
        self.fields
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Boolean flag as the provider sends it (`"true"`/`"false"`).
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.first(key).and_then(|v| v.parse().ok())
    }

    /// Field names present in the payload.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Identity established by a verified callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// The application's own user id, echoed back by the provider
    pub external_id: i64,
    /// Forum username
    pub username: String,
}

impl AuthenticatedIdentity {
    /// Extract the required identity fields.
    ///
    /// # Errors
    ///
    /// [`SsoError::MissingField`] if `external_id` or `username` is absent,
    /// [`SsoError::InvalidField`] if `external_id` is not an integer.
    pub fn from_payload(payload: &SsoPayload) -> Result<Self> {
        let raw_id = payload
            .first("external_id")
            .ok_or(SsoError::MissingField("external_id"))?;
        let external_id = raw_id
            .trim()
            .parse::<i64>()
            .map_err(|e| SsoError::InvalidField {
                field: "external_id",
                reason: e.to_string(),
            })?;
        let username = payload
            .first("username")
            .ok_or(SsoError::MissingField("username"))?
            .to_string();

        Ok(Self {
            external_id,
            username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_matches_form_encoding() {
        let encoded = encode([("nonce", "abc"), ("return_sso_url", "https://app/x")]);
        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, "nonce=abc&return_sso_url=https%3A%2F%2Fapp%2Fx");
    }

    #[test]
    fn test_decode_repeated_keys() {
        let sso = STANDARD.encode("groups=admins&groups=staff&username=sam");
        let payload = SsoPayload::decode(&sso).unwrap();
        assert_eq!(payload.all("groups"), ["admins", "staff"]);
        assert_eq!(payload.first("groups"), Some("admins"));
        assert_eq!(payload.first("username"), Some("sam"));
        assert!(payload.all("missing").is_empty());
    }

    #[test]
    fn test_decode_ignores_line_wrapping() {
        let sso = STANDARD.encode("nonce=abc&username=sam&external_id=1");
        let (head, tail) = sso.split_at(8);
        let wrapped = format!("{head}\n{tail}\n");
        assert_eq!(
            SsoPayload::decode(&wrapped).unwrap(),
            SsoPayload::decode(&sso).unwrap()
        );
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(matches!(
            SsoPayload::decode("%%%not-base64%%%"),
            Err(SsoError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let sso = STANDARD.encode([0xffu8, 0xfe, 0xfd]);
        assert!(matches!(
            SsoPayload::decode(&sso),
            Err(SsoError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_blank_values_skipped() {
        let payload = SsoPayload::parse("name=&username=sam");
        assert!(!payload.contains("name"));
        assert!(payload.contains("username"));
    }

    #[test]
    fn test_flags() {
        let payload = SsoPayload::parse("admin=true&moderator=false&odd=yes");
        assert_eq!(payload.flag("admin"), Some(true));
        assert_eq!(payload.flag("moderator"), Some(false));
        assert_eq!(payload.flag("odd"), None);
    }

    #[test]
    fn test_identity_extraction() {
        let payload = SsoPayload::parse("external_id=1234&username=samsam&email=s%40x.org");
        let identity = AuthenticatedIdentity::from_payload(&payload).unwrap();
        assert_eq!(identity.external_id, 1234);
        assert_eq!(identity.username, "samsam");
        assert_eq!(payload.first("email"), Some("s@x.org"));
    }

    #[test]
    fn test_identity_missing_fields() {
        let payload = SsoPayload::parse("username=sam");
        assert!(matches!(
            AuthenticatedIdentity::from_payload(&payload),
            Err(SsoError::MissingField("external_id"))
        ));

        let payload = SsoPayload::parse("external_id=7");
        assert!(matches!(
            AuthenticatedIdentity::from_payload(&payload),
            Err(SsoError::MissingField("username"))
        ));
    }

    #[test]
    fn test_identity_malformed_external_id() {
        let payload = SsoPayload::parse("external_id=seven&username=sam");
        assert!(matches!(
            AuthenticatedIdentity::from_payload(&payload),
            Err(SsoError::InvalidField {
                field: "external_id",
                ..
            })
        ));
    }
}
