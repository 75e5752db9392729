use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cushion so a token is refreshed slightly before it actually expires.
const EXPIRY_SLACK_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp after which `access_token` is no longer valid.
    pub expires_at: i64,
}

impl StoredToken {
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at - EXPIRY_SLACK_SECS
    }
}

/// JSON-file persistence for the Google OAuth token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the stored token if any. A corrupt token file is removed and
    /// treated as "not authenticated" to force a fresh OAuth round.
    pub async fn load(&self) -> Result<Option<StoredToken>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "removing unreadable token file");
                let _ = tokio::fs::remove_file(&self.path).await;
                Ok(None)
            }
        }
    }

    pub async fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }

    /// Delete the stored token. Returns true if a file was removed.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn token(expires_at: i64) -> StoredToken {
        StoredToken {
            access_token: "at_123".into(),
            refresh_token: Some("rt_456".into()),
            expires_at,
        }
    }

    #[tokio::test]
    async fn load_missing_file_is_none() {
        let tmp = TempDir::new().expect("tempdir");
        let store = TokenStore::new(tmp.path().join("token.json"));
        assert!(store.load().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let tmp = TempDir::new().expect("tempdir");
        let store = TokenStore::new(tmp.path().join("auth/token.json"));
        let original = token(Utc::now().timestamp() + 3600);

        store.save(&original).await.expect("save");
        let loaded = store.load().await.expect("load").expect("some");
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn corrupt_file_is_removed_and_treated_as_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("token.json");
        tokio::fs::write(&path, "not json").await.expect("write");

        let store = TokenStore::new(&path);
        assert!(store.load().await.expect("load").is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn clear_reports_whether_file_existed() {
        let tmp = TempDir::new().expect("tempdir");
        let store = TokenStore::new(tmp.path().join("token.json"));

        assert!(!store.clear().await.expect("clear missing"));
        store
            .save(&token(Utc::now().timestamp() + 3600))
            .await
            .expect("save");
        assert!(store.clear().await.expect("clear"));
    }

    #[test]
    fn expiry_includes_slack() {
        assert!(token(Utc::now().timestamp() + 10).is_expired());
        assert!(!token(Utc::now().timestamp() + 3600).is_expired());
    }
}
