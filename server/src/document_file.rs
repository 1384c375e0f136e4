use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use coviewer_system::uuid::Uuid;
use coviewer_system::RoomId;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot prepare document directory {path}: {source}")]
    Directory { path: PathBuf, source: io::Error },
    #[error("cannot write document for room {room_id}: {source}")]
    Write { room_id: RoomId, source: io::Error },
    #[error("cannot read document for room {room_id}: {source}")]
    Read { room_id: RoomId, source: io::Error },
}

pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// One opaque blob per room, stored as a file in `dir`.
#[derive(Debug, Clone)]
pub struct DocumentFiles {
    dir: PathBuf,
    max_bytes: usize,
}

impl DocumentFiles {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| DocumentError::Directory {
                path: dir.clone(),
                source,
            })?;
        Ok(Self {
            dir,
            max_bytes: DEFAULT_MAX_BYTES,
        })
    }

    pub fn with_max_bytes(self, max_bytes: usize) -> Self {
        Self { max_bytes, ..self }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Largest document accepted for upload.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn store(&self, room_id: &RoomId, blob: &[u8]) -> Result<(), DocumentError> {
        let path = self.path_for(room_id);
        // one temp file per write, so concurrent uploads never share it
        let partial = path.with_extension(format!("{}.part", Uuid::new_v4().simple()));
        let write_err = |source| DocumentError::Write {
            room_id: room_id.clone(),
            source,
        };

        fs::write(&partial, blob).await.map_err(write_err)?;
        if let Err(err) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(write_err(err));
        }
        log::info!("Stored {} bytes for room {}", blob.len(), room_id);
        Ok(())
    }

    pub async fn retrieve(&self, room_id: &RoomId) -> Result<Option<Vec<u8>>, DocumentError> {
        match fs::read(self.path_for(room_id)).await {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DocumentError::Read {
                room_id: room_id.clone(),
                source,
            }),
        }
    }

    // room ids are caller-supplied, so never use them as a path verbatim
    fn path_for(&self, room_id: &RoomId) -> PathBuf {
        let mut file_name = String::with_capacity(room_id.as_str().len() * 2 + 4);
        for byte in room_id.as_str().bytes() {
            let _ = write!(file_name, "{:02x}", byte);
        }
        file_name.push_str(".doc");
        self.dir.join(file_name)
    }
}
