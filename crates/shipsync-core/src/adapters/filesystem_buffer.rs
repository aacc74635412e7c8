//! Filesystem payload buffer.
//!
//! Stores one JSON file per buffered payload under the namespace directory,
//! using the tmp-file + rename pattern so a crash mid-write never leaves a
//! half-written entry visible to the worker or the sweeper.

use crate::buffer::{BufferError, BufferedPayload, PayloadBuffer};
use crate::PayloadId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Filesystem-backed [`PayloadBuffer`]
///
/// # Examples
///
/// ```no_run
/// use shipsync_core::adapters::FilesystemPayloadBuffer;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let buffer = FilesystemPayloadBuffer::new(PathBuf::from("./data/payloads")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemPayloadBuffer {
    base_path: PathBuf,
}

impl FilesystemPayloadBuffer {
    /// Create the buffer, ensuring the namespace directory exists
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Unavailable`] when the directory cannot be
    /// created or accessed.
    pub async fn new(base_path: PathBuf) -> Result<Self, BufferError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| BufferError::Unavailable {
                message: format!("Failed to create buffer directory: {}", e),
            })?;

        Ok(Self { base_path })
    }

    fn entry_path(&self, id: &PayloadId) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }

    fn id_from_path(path: &Path) -> Option<PayloadId> {
        path.file_stem()?.to_str()?.parse().ok()
    }
}

#[async_trait]
impl PayloadBuffer for FilesystemPayloadBuffer {
    async fn put(&self, payload: &BufferedPayload) -> Result<(), BufferError> {
        let path = self.entry_path(&payload.payload_id);

        let json =
            serde_json::to_string_pretty(payload).map_err(|e| BufferError::Corrupt {
                message: format!("Failed to serialize payload: {}", e),
            })?;

        let temp_path = path.with_extension("tmp");
        let mut file =
            fs::File::create(&temp_path)
                .await
                .map_err(|e| BufferError::OperationFailed {
                    message: format!("Failed to create temp file: {}", e),
                })?;

        file.write_all(json.as_bytes())
            .await
            .map_err(|e| BufferError::OperationFailed {
                message: format!("Failed to write payload: {}", e),
            })?;

        file.flush()
            .await
            .map_err(|e| BufferError::OperationFailed {
                message: format!("Failed to flush payload: {}", e),
            })?;

        // Atomic on most filesystems.
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| BufferError::OperationFailed {
                message: format!("Failed to rename temp file: {}", e),
            })?;

        Ok(())
    }

    async fn get(&self, id: &PayloadId) -> Result<Option<BufferedPayload>, BufferError> {
        let path = self.entry_path(id);

        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BufferError::OperationFailed {
                    message: format!("Failed to read payload: {}", e),
                });
            }
        };

        let payload = serde_json::from_str(&json).map_err(|e| BufferError::Corrupt {
            message: format!("Failed to deserialize payload: {}", e),
        })?;

        Ok(Some(payload))
    }

    async fn delete(&self, id: &PayloadId) -> Result<(), BufferError> {
        let path = self.entry_path(id);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Idempotent: another worker already deleted it.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BufferError::OperationFailed {
                message: format!("Failed to delete payload: {}", e),
            }),
        }
    }

    async fn list_ids(&self) -> Result<Vec<PayloadId>, BufferError> {
        let mut ids = Vec::new();

        let mut entries =
            fs::read_dir(&self.base_path)
                .await
                .map_err(|e| BufferError::OperationFailed {
                    message: format!("Failed to read buffer directory: {}", e),
                })?;

        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| BufferError::OperationFailed {
                    message: format!("Failed to read directory entry: {}", e),
                })?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(id) = Self::id_from_path(&path) {
                    ids.push(id);
                }
            }
        }

        Ok(ids)
    }
}

#[cfg(test)]
#[path = "filesystem_buffer_tests.rs"]
mod tests;
