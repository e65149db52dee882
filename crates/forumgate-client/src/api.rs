//! Admin API endpoints.
//!
//! Thin verb/path mappings over [`HttpRequestExecutor`]. Read endpoints
//! convert the dynamic document to typed values at the call site; mutations
//! return the optional raw document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::executor::{ApiRequest, Credentials, HttpRequestExecutor};
use crate::transport::FileAttachment;

/// A user as seen through the admin endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    /// Forum user id
    pub id: i64,
    /// Login name
    pub username: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Primary email, only present for admins
    #[serde(default)]
    pub email: Option<String>,
    /// Account is active
    #[serde(default)]
    pub active: bool,
    /// Site administrator
    #[serde(default)]
    pub admin: bool,
    /// Site moderator
    #[serde(default)]
    pub moderator: bool,
    /// Groups the user belongs to
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// A forum group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group id
    pub id: i64,
    /// Machine name used in URLs
    pub name: String,
    /// Human-readable name
    #[serde(default)]
    pub full_name: Option<String>,
    /// Number of members
    #[serde(default)]
    pub user_count: Option<u64>,
    /// Created and managed by the forum itself
    #[serde(default)]
    pub automatic: bool,
}

/// An entry of a group's member or owner list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Forum user id
    pub id: i64,
    /// Login name
    pub username: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL template
    #[serde(default)]
    pub avatar_template: Option<String>,
}

/// Admin REST API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    executor: HttpRequestExecutor,
}

impl ApiClient {
    /// Client over the default reqwest transport.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Ok(Self::from_executor(HttpRequestExecutor::new(credentials)?))
    }

    /// Client over a configured executor.
    pub fn from_executor(executor: HttpRequestExecutor) -> Self {
        Self { executor }
    }

    /// The underlying executor.
    pub fn executor(&self) -> &HttpRequestExecutor {
        &self.executor
    }

    /// `GET admin/users/{id}.json`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; a document without a user is a decode error.
    pub async fn user_by_id(&self, user_id: i64) -> Result<AdminUser> {
        let document = self.get(&format!("admin/users/{user_id}.json"), &[]).await?;
        typed(document, None)
    }

    /// `GET /groups/{name}.json`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn group(&self, group_name: &str) -> Result<Group> {
        let document = self.get(&format!("/groups/{group_name}.json"), &[]).await?;
        typed(document, Some("group"))
    }

    /// Owners of a group, from `GET /groups/{name}/members.json`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn group_owners(&self, group_name: &str) -> Result<Vec<GroupMember>> {
        let document = self
            .get(&format!("/groups/{group_name}/members.json"), &[])
            .await?;
        typed(document, Some("owners"))
    }

    /// Members of a group, from `GET /groups/{name}/members.json`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn group_members(&self, group_name: &str) -> Result<Vec<GroupMember>> {
        let document = self
            .get(&format!("/groups/{group_name}/members.json"), &[])
            .await?;
        typed(document, Some("members"))
    }

    /// `PUT /admin/groups/{id}/owners.json` with `usernames=<username>`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn add_group_owner(&self, group_id: i64, username: &str) -> Result<Option<Value>> {
        self.put(
            &format!("/admin/groups/{group_id}/owners.json"),
            &[("usernames", username)],
        )
        .await
    }

    /// `PUT /admin/groups/{id}/members.json` with `usernames=<username>`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn add_group_member(&self, group_id: i64, username: &str) -> Result<Option<Value>> {
        self.put(
            &format!("/admin/groups/{group_id}/members.json"),
            &[("usernames", username)],
        )
        .await
    }

    /// `POST /admin/users/{user_id}/groups` with `group_id=<id>`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn add_user_to_group(&self, group_id: i64, user_id: i64) -> Result<Option<Value>> {
        let group_id = group_id.to_string();
        self.post(
            &format!("/admin/users/{user_id}/groups"),
            &[("group_id", group_id.as_str())],
            Vec::new(),
        )
        .await
    }

    /// `GET` with query parameters.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Option<Value>> {
        self.request(ApiRequest::get(path).query(params.iter().copied()))
            .await
    }

    /// `PUT` with form fields.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn put(&self, path: &str, fields: &[(&str, &str)]) -> Result<Option<Value>> {
        self.request(ApiRequest::put(path).form(fields.iter().copied()))
            .await
    }

    /// `PUT` with a JSON body.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn put_json(&self, path: &str, body: Value) -> Result<Option<Value>> {
        self.request(ApiRequest::put(path).json(body)).await
    }

    /// `POST` with form fields and optional files.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn post(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        files: Vec<FileAttachment>,
    ) -> Result<Option<Value>> {
        self.request(ApiRequest::post(path).form(fields.iter().copied()).files(files))
            .await
    }

    /// `POST` with a JSON body.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn post_json(&self, path: &str, body: Value) -> Result<Option<Value>> {
        self.request(ApiRequest::post(path).json(body)).await
    }

    /// `DELETE`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn delete(&self, path: &str) -> Result<Option<Value>> {
        self.request(ApiRequest::delete(path)).await
    }

    /// Run an arbitrary request.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn request(&self, request: ApiRequest) -> Result<Option<Value>> {
        self.executor.execute(request).await
    }
}

/// Convert a document, or one of its fields, to `T`.
fn typed<T: DeserializeOwned>(document: Option<Value>, field: Option<&str>) -> Result<T> {
    let document = document.ok_or_else(|| ApiError::unexpected_shape("empty response"))?;
    let value = match field {
        Some(field) => match document {
            Value::Object(mut map) => map
                .remove(field)
                .ok_or_else(|| ApiError::unexpected_shape(format!("response has no '{field}' field")))?,
            _ => return Err(ApiError::unexpected_shape("response is not an object")),
        },
        None => document,
    };
    serde_json::from_value(value).map_err(|e| ApiError::unexpected_shape(e.to_string()))
}
