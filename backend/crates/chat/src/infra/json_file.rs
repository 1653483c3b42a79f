//! JSON file usage store
//!
//! The record is a small pretty-printed JSON document that can be read and
//! edited by hand between runs. Saves write a sibling temporary file, sync
//! it, then rename it over the target.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::domain::entities::UsageWindow;
use crate::domain::repository::UsageStore;
use crate::error::{ChatError, ChatResult};

#[derive(Debug, Clone)]
pub struct JsonFileUsageStore {
    path: PathBuf,
}

impl JsonFileUsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the record; `.` for a bare file name
    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "usage.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> ChatError {
        ChatError::Store(format!("{action} {}: {e}", self.path.display()))
    }
}

impl UsageStore for JsonFileUsageStore {
    async fn load(&self) -> ChatResult<Option<UsageWindow>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error("read", e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ChatError::Store(format!("parse {}: {e}", self.path.display())))
    }

    async fn save(&self, window: &UsageWindow) -> ChatResult<()> {
        let mut body = serde_json::to_vec_pretty(window)
            .map_err(|e| ChatError::Internal(format!("serialize usage window: {e}")))?;
        body.push(b'\n');

        tokio::fs::create_dir_all(self.dir())
            .await
            .map_err(|e| self.io_error("create directory for", e))?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| self.io_error("create temporary file for", e))?;
        file.write_all(&body)
            .await
            .map_err(|e| self.io_error("write", e))?;
        file.sync_all()
            .await
            .map_err(|e| self.io_error("sync", e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error("replace", e))?;

        sync_dir(self.dir())
            .await
            .map_err(|e| self.io_error("sync directory of", e))
    }
}

/// Make a rename in `dir` durable
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

// No portable directory sync outside unix
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
