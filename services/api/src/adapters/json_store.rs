//! services/api/src/adapters/json_store.rs
//!
//! A file-backed `SessionRepository` for running without a database. The
//! collection is written as one JSON document, replaced atomically by rename.

use async_trait::async_trait;
use research_assistant_core::domain::Session;
use research_assistant_core::ports::{PortError, PortResult, SessionRepository};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Clone, Debug)]
pub struct JsonFileAdapter {
    path: PathBuf,
}

impl JsonFileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionRepository for JsonFileAdapter {
    async fn load(&self) -> PortResult<Vec<Session>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        serde_json::from_str(&raw).map_err(|e| {
            PortError::Unexpected(format!("Corrupt session file {}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, sessions: &[Session]) -> PortResult<()> {
        let json =
            serde_json::to_vec(sessions).map_err(|e| PortError::Unexpected(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        file.write_all(&json)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        // Flushed to disk before the rename makes it visible.
        file.sync_all()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}
