//! Public key directory.
//!
//! The directory maps usernames to published public keys:
//!
//! - `POST /user/upsert {username, publicKey}` -> 200
//! - `GET /user/{username}` -> 200 `{publicKey}` | 404
//!
//! Keys returned by the directory are untrusted input.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chat::error::ChatError;
use crate::chat::room::Username;

/// Username to public key lookups.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Publishes (or replaces) the public key for `username`.
    async fn upsert(&self, username: &Username, public_key: &str) -> Result<(), ChatError>;

    /// Looks up the public key for `username`. `None` if not registered.
    async fn lookup(&self, username: &Username) -> Result<Option<String>, ChatError>;
}

#[async_trait]
impl<D: Directory + ?Sized> Directory for Arc<D> {
    async fn upsert(&self, username: &Username, public_key: &str) -> Result<(), ChatError> {
        (**self).upsert(username, public_key).await
    }

    async fn lookup(&self, username: &Username) -> Result<Option<String>, ChatError> {
        (**self).lookup(username).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest<'a> {
    username: &'a str,
    public_key: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    public_key: String,
}

/// Builds `base/seg1/seg2/...`, percent-encoding each segment.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, String> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| format!("{} cannot be used as a base URL", base))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// Directory client speaking the HTTP API.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base: Url,
}

impl HttpDirectory {
    /// Creates a client for the directory at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ChatError> {
        let base = Url::parse(base_url)
            .map_err(|e| ChatError::Directory(format!("invalid URL {}: {}", base_url, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ChatError> {
        endpoint(&self.base, segments).map_err(ChatError::Directory)
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn upsert(&self, username: &Username, public_key: &str) -> Result<(), ChatError> {
        let url = self.url(&["user", "upsert"])?;
        self.client
            .post(url)
            .json(&UpsertRequest {
                username: username.as_str(),
                public_key,
            })
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| ChatError::Directory(e.to_string()))?;

        info!(user = %username, "published public key to directory");
        Ok(())
    }

    async fn lookup(&self, username: &Username) -> Result<Option<String>, ChatError> {
        let url = self.url(&["user", username.as_str()])?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ChatError::Directory(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(user = %username, "no directory entry");
            return Ok(None);
        }

        let body: LookupResponse = resp
            .error_for_status()
            .map_err(|e| ChatError::Directory(e.to_string()))?
            .json()
            .await
            .map_err(|e| ChatError::Directory(e.to_string()))?;
        Ok(Some(body.public_key))
    }
}

/// In-process directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes an entry, so lookups for it return `None`.
    pub fn remove(&self, username: &Username) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(username.as_str());
        }
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn upsert(&self, username: &Username, public_key: &str) -> Result<(), ChatError> {
        self.entries
            .lock()
            .map_err(|_| ChatError::Directory("directory lock poisoned".to_string()))?
            .insert(username.as_str().to_string(), public_key.to_string());
        Ok(())
    }

    async fn lookup(&self, username: &Username) -> Result<Option<String>, ChatError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| ChatError::Directory("directory lock poisoned".to_string()))?
            .get(username.as_str())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("http://localhost:4000").unwrap();
        let url = endpoint(&base, &["user", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/user/a%2Fb");

        let room = endpoint(&base, &["history", "alice|bob"]).unwrap();
        assert!(room.path().starts_with("/history/alice"));
        assert_eq!(room.path_segments().unwrap().count(), 2);
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("http://example.com/api/").unwrap();
        let url = endpoint(&base, &["user", "bob"]).unwrap();

        assert_eq!(url.as_str(), "http://example.com/api/user/bob");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpDirectory::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_memory_directory() {
        let directory = MemoryDirectory::new();
        let bob = Username::parse("bob").unwrap();

        assert_eq!(directory.lookup(&bob).await.unwrap(), None);

        directory.upsert(&bob, "KEY1").await.unwrap();
        directory.upsert(&bob, "KEY2").await.unwrap();
        assert_eq!(directory.lookup(&bob).await.unwrap().as_deref(), Some("KEY2"));

        directory.remove(&bob);
        assert_eq!(directory.lookup(&bob).await.unwrap(), None);
    }
}
