use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use chrono::Utc;
use thiserror::Error;
use crate::models::Snapshot;
use super::detector::{self, Change};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("snapshot file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot file {path} is unreadable: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// The persisted snapshot, one pretty-printed JSON file replaced wholesale.
pub struct SnapshotStore {
    path: PathBuf,
    writes: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub writes: u64,
    pub file_size_bytes: u64,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes an empty snapshot if the file is missing. Returns whether it did.
    pub fn ensure_exists(&self) -> Result<bool, StoreError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.write(&Snapshot::new())?;
        tracing::info!("📁 Created empty snapshot at {}", self.path.display());
        Ok(true)
    }

    /// Reads the persisted snapshot. `Ok(None)` when there is no file yet.
    pub fn load_checked(&self) -> Result<Option<Snapshot>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };

        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path: self.path.clone(), source })
    }

    /// Persisted snapshot, or an empty one if the file is missing or unreadable.
    pub fn load(&self) -> Snapshot {
        if let Err(e) = self.ensure_exists() {
            tracing::error!("Snapshot store could not be initialized: {}", e);
        }

        match self.load_checked() {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                tracing::error!("⚠️ Snapshot store unreadable, continuing from empty state: {}", e);
                Snapshot::new()
            }
        }
    }

    /// Persists `snapshot` if it differs from what is on disk and returns the
    /// detected changes. Nothing is written when there are none.
    pub fn save(&self, snapshot: &Snapshot) -> Result<Vec<Change>, StoreError> {
        let current = match self.load_checked() {
            Ok(current) => current.unwrap_or_default(),
            Err(StoreError::Corrupt { source, .. }) => {
                let backup = self.preserve_unreadable()?;
                tracing::error!(
                    "⚠️ Snapshot store unreadable ({}), moved aside to {}",
                    source,
                    backup.display()
                );
                Snapshot::new()
            }
            Err(e) => return Err(e),
        };

        let changes = detector::diff(&current, snapshot);
        if changes.is_empty() {
            return Ok(changes);
        }

        self.write(snapshot)?;

        let at = Utc::now().to_rfc3339();
        for change in &changes {
            tracing::info!("[{}] {}", at, change);
        }
        Ok(changes)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            writes: self.writes.load(Ordering::Relaxed),
            file_size_bytes: fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        }
    }

    /// Full replacement through a sibling temp file and a rename.
    fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        let tmp = self.sibling("tmp");
        let file = File::create(&tmp).map_err(|e| self.io_error(e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot).map_err(StoreError::Serialize)?;
        writer.flush().map_err(|e| self.io_error(e))?;
        drop(writer);

        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("💾 Saved {} exchanges -> {}", snapshot.exchanges.len(), self.path.display());
        Ok(())
    }

    fn preserve_unreadable(&self) -> Result<PathBuf, StoreError> {
        let backup = self.sibling(&format!("corrupt-{}", Utc::now().format("%Y-%m-%dT%H-%M-%S")));
        fs::rename(&self.path, &backup).map_err(|e| self.io_error(e))?;
        Ok(backup)
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }
}
