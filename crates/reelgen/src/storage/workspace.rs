use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::StorageError;
use crate::job::{StockClip, Transcript};

const AUDIO_DIR: &str = "audio";
const AUDIO_FILE: &str = "full_audio.mp3";
const SUBTITLES_DIR: &str = "subtitles";
const SUBTITLES_FILE: &str = "subtitles.json";
const IMAGES_DIR: &str = "images";
const STOCK_DIR: &str = "stock";
const STOCK_FILE: &str = "clips.json";

/// Root directory under which every job gets its own namespace.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the namespace for `job_id`. The id must be a single path component.
    pub fn for_job(&self, job_id: &str) -> Result<JobWorkspace, StorageError> {
        let valid = !job_id.is_empty()
            && job_id != "."
            && job_id != ".."
            && !job_id.contains(['/', '\\'])
            && !job_id.contains('\0');
        if !valid {
            return Err(StorageError::InvalidJobId(job_id.to_string()));
        }
        Ok(JobWorkspace {
            dir: self.root.join(job_id),
        })
    }
}

/// Working files owned by one job: `audio/`, `subtitles/`, `images/` and `stock/`.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    dir: PathBuf,
}

impl JobWorkspace {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn audio_path(&self) -> PathBuf {
        self.dir.join(AUDIO_DIR).join(AUDIO_FILE)
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.dir.join(SUBTITLES_DIR).join(SUBTITLES_FILE)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir.join(IMAGES_DIR)
    }

    /// Image for the segment at `index`; files are numbered from 1.
    pub fn image_path(&self, index: usize) -> PathBuf {
        self.images_dir().join(format!("image_{}.png", index + 1))
    }

    pub fn stock_clips_path(&self) -> PathBuf {
        self.dir.join(STOCK_DIR).join(STOCK_FILE)
    }

    /// Removes everything the job has written and recreates an empty namespace.
    pub async fn reset(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::RemoveDirectory {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        }
        self.ensure().await
    }

    pub async fn ensure(&self) -> Result<(), StorageError> {
        ensure_directory(&self.dir).await
    }

    pub async fn write_audio(&self, audio: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.audio_path();
        write_file(&path, audio).await?;
        Ok(path)
    }

    pub async fn write_transcript(&self, transcript: &Transcript) -> Result<PathBuf, StorageError> {
        let path = self.transcript_path();
        write_json(&path, transcript).await?;
        Ok(path)
    }

    pub async fn read_transcript(&self) -> Result<Transcript, StorageError> {
        let path = self.transcript_path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::ReadFile {
                path: path.clone(),
                source: e,
            })?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Encode { path, source: e })
    }

    pub async fn write_image(&self, index: usize, image: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.image_path(index);
        write_file(&path, image).await?;
        Ok(path)
    }

    pub async fn write_stock_clips(&self, clips: &[StockClip]) -> Result<PathBuf, StorageError> {
        let path = self.stock_clips_path();
        write_json(&path, &clips).await?;
        Ok(path)
    }
}

async fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Writes through a sibling `.part` file and renames it into place so readers
/// never observe a half-written artifact.
async fn write_file(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent).await?;
    }
    let partial = path.with_extension("part");
    tokio::fs::write(&partial, content)
        .await
        .map_err(|e| StorageError::WriteFile {
            path: partial.clone(),
            source: e,
        })?;
    tokio::fs::rename(&partial, path)
        .await
        .map_err(|e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Encode {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_file(path, &bytes).await
}
