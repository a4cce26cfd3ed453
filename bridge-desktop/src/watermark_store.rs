//! File-backed Watermark Store using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    watermark::{Watermark, WatermarkStore},
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const DEFAULT_FILE_NAME: &str = "watermark.json";

/// JSON watermark file with atomic replace.
///
/// Persisting writes `<path>.tmp`, syncs it to disk and renames it over the
/// target, so readers only ever see a complete old or new file.
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    /// Store under the platform data directory.
    pub fn new() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("index-sync");

        Self::with_path(data_dir.join(DEFAULT_FILE_NAME))
    }

    /// Store at an explicit file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

impl Default for FileWatermarkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> Result<Watermark> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "No watermark file, starting from zero");
                return Ok(Watermark::default());
            }
            Err(e) => return Err(Self::map_io_error(e)),
        };

        let watermark: Watermark = serde_json::from_slice(&data).map_err(|e| {
            warn!(path = ?self.path, error = %e, "Watermark file is corrupt");
            BridgeError::Serialization(e)
        })?;

        debug!(path = ?self.path, ?watermark, "Loaded watermark");
        Ok(watermark)
    }

    async fn persist(&self, watermark: &Watermark) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(Self::map_io_error)?;
            }
        }

        let data = serde_json::to_vec_pretty(watermark)?;
        let temp_path = self.temp_path();

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(Self::map_io_error)?;
        file.write_all(&data).await.map_err(Self::map_io_error)?;
        file.sync_all().await.map_err(Self::map_io_error)?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(Self::map_io_error)?;

        debug!(path = ?self.path, ?watermark, "Persisted watermark");
        Ok(())
    }
}
