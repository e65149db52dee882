//! Session-scoped key-value storage.
//!
//! The SSO handshake keeps two kinds of per-session state: the pending login
//! nonce and the authenticated identity. Both go through [`SessionStore`], an
//! external collaborator (cookie session, Redis, database...) handed to the
//! protocol explicitly through a [`Session`] handle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::Result;

/// Key-value store partitioned by session id.
///
/// `pop` must be atomic per session: two concurrent pops of the same key may
/// not both observe the value.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Read a value.
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<()>;

    /// Read and remove a value in one step.
    async fn pop(&self, session_id: &str, key: &str) -> Result<Option<Value>>;
}

/// In-process session store backed by a concurrent map.
///
/// Each session's entries sit behind one shard lock, which makes `pop`
/// atomic per session.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, HashMap<String, Value>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry of a session.
    pub fn clear(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Number of sessions currently holding entries.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .sessions
            .get(session_id)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<()> {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn pop(&self, session_id: &str, key: &str) -> Result<Option<Value>> {
        let popped = self
            .sessions
            .get_mut(session_id)
            .and_then(|mut entries| entries.remove(key));
        // Emptiness is rechecked under the shard lock, so a concurrent `set`
        // is never lost.
        self.sessions
            .remove_if(session_id, |_, entries| entries.is_empty());
        Ok(popped)
    }
}

/// Handle to one session's state, passed into every protocol operation.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Bind a session id to a store.
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read a value from this session.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.store.get(&self.id, key).await
    }

    /// Write a value into this session.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn set(&self, key: &str, value: impl Into<Value> + Send) -> Result<()> {
        self.store.set(&self.id, key, value.into()).await
    }

    /// Read and remove a value from this session.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn pop(&self, key: &str) -> Result<Option<Value>> {
        self.store.pop(&self.id, key).await
    }

    /// Whether this session holds `key`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(id: &str, store: &Arc<MemorySessionStore>) -> Session {
        Session::new(id, store.clone() as Arc<dyn SessionStore>)
    }

    #[tokio::test]
    async fn test_set_get_pop() {
        let store = Arc::new(MemorySessionStore::new());
        let s = session("abc", &store);

        s.set("member_id", 42).await.unwrap();
        assert_eq!(s.get("member_id").await.unwrap(), Some(json!(42)));
        assert!(s.contains("member_id").await.unwrap());

        assert_eq!(s.pop("member_id").await.unwrap(), Some(json!(42)));
        assert_eq!(s.pop("member_id").await.unwrap(), None);
        assert!(!s.contains("member_id").await.unwrap());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = Arc::new(MemorySessionStore::new());
        let a = session("a", &store);
        let b = session("b", &store);

        a.set("nonce", "one").await.unwrap();
        assert_eq!(b.get("nonce").await.unwrap(), None);
        assert_eq!(b.pop("nonce").await.unwrap(), None);
        assert_eq!(a.get("nonce").await.unwrap(), Some(json!("one")));
        assert_eq!(store.session_count(), 1);

        store.clear("a");
        assert_eq!(a.get("nonce").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pop_of_last_entry_drops_session() {
        let store = Arc::new(MemorySessionStore::new());
        let s = session("visitor", &store);

        s.set("nonce", "n").await.unwrap();
        s.set("return_url", "/members").await.unwrap();
        assert_eq!(store.session_count(), 1);

        s.pop("nonce").await.unwrap();
        assert_eq!(store.session_count(), 1);
        s.pop("return_url").await.unwrap();
        assert_eq!(store.session_count(), 0);
        assert!(store.sessions.get("visitor").is_none());

        // Popping from an unknown session does not create one.
        session("stranger", &store).pop("nonce").await.unwrap();
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_pop_yields_value_once() {
        let store = Arc::new(MemorySessionStore::new());
        let s = session("race", &store);
        s.set("nonce", "only-once").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let s = s.clone();
            handles.push(tokio::spawn(async move { s.pop("nonce").await.unwrap() }));
        }

        let mut hits = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                hits += 1;
            }
        }
        assert_eq!(hits, 1);
    }
}
