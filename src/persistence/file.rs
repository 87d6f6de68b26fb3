//! File Backend Module
//!
//! Stores each record as a JSON-lines file, one snapshot per line.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::persistence::{Snapshot, SnapshotBackend, SnapshotKind};

#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", key))
    }
}

#[async_trait]
impl SnapshotBackend for FileBackend {
    async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let mut line = serde_json::to_vec(snapshot)?;
        line.push(b'\n');
        let path = self.record_path(key);

        match snapshot.kind {
            SnapshotKind::Full => {
                // Readers never observe a half-written full record
                let tmp = path.with_extension("jsonl.tmp");
                fs::write(&tmp, &line).await?;
                fs::rename(&tmp, &path).await?;
            }
            SnapshotKind::Incremental => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                file.write_all(&line).await?;
                file.flush().await?;
            }
        }

        debug!(path = %path.display(), bytes = line.len(), "Snapshot written");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<Snapshot>> {
        let path = self.record_path(key);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut lines: Vec<&str> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();

        // A crash mid-append leaves an unterminated last line; the lines before it still hold
        if !contents.ends_with('\n') {
            if let Some(last) = lines.last() {
                if serde_json::from_str::<Snapshot>(last).is_err() {
                    warn!(path = %path.display(), "Dropping torn trailing snapshot line");
                    lines.pop();
                }
            }
        }

        lines
            .into_iter()
            .map(|line| {
                serde_json::from_str(line).map_err(|_| CacheError::CorruptRecord(key.to_string()))
            })
            .collect()
    }
}
