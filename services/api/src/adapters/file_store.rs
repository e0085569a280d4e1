//! services/api/src/adapters/file_store.rs
//!
//! A `StorageService` backed by one JSON document: `<data_dir>/board.json`,
//! an object mapping slot names to their text. Every batch rewrites the whole
//! document through a temporary file followed by a rename, so a crash leaves
//! either the old or the new document on disk, never a mix.

use async_trait::async_trait;
use resource_board_core::ports::{PortError, PortResult, SlotBatch, SlotMap, StorageService};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const DOCUMENT_NAME: &str = "board.json";

pub struct FileStorageAdapter {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStorageAdapter {
    /// Creates the adapter, creating `data_dir` if it doesn't exist.
    pub fn new(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(DOCUMENT_NAME),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> PortResult<SlotMap> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SlotMap::new()),
            Err(e) => return Err(io_error(&self.path, e)),
        };
        match serde_json::from_str(&text) {
            Ok(slots) => Ok(slots),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Unreadable board document, treating every slot as absent"
                );
                Ok(SlotMap::new())
            }
        }
    }

    /// Writes `contents` to a fresh temp file beside the document, then
    /// renames it over the document.
    async fn replace_document(&self, contents: &str) -> PortResult<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| PortError::Unexpected("board document has no parent directory".into()))?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        for attempt in 0..10u32 {
            let temp = dir.join(format!(
                ".{}.tmp-{}-{}-{}",
                DOCUMENT_NAME,
                std::process::id(),
                nanos,
                attempt
            ));
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_error(&temp, e)),
            };

            let written = async {
                file.write_all(contents.as_bytes()).await?;
                file.flush().await?;
                drop(file);
                tokio::fs::rename(&temp, &self.path).await
            }
            .await;
            if let Err(e) = written {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(io_error(&temp, e));
            }
            return Ok(());
        }

        Err(PortError::Unexpected(format!(
            "{}: failed to create a temp file",
            dir.display()
        )))
    }
}

#[async_trait]
impl StorageService for FileStorageAdapter {
    async fn read_slots(&self) -> PortResult<SlotMap> {
        self.read_document().await
    }

    async fn commit(&self, batch: SlotBatch) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut slots = self.read_document().await?;
        for key in &batch.removals {
            slots.remove(key);
        }
        slots.extend(batch.writes);

        let json = serde_json::to_string_pretty(&slots)
            .map_err(|e| PortError::Unexpected(format!("failed to encode board document: {e}")))?;
        self.replace_document(&json).await?;

        debug!(path = %self.path.display(), slots = slots.len(), "Board document written");
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> PortError {
    PortError::Unexpected(format!("{}: {}", path.display(), e))
}
