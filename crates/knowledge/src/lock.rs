//! Exclusive build lock for a corpus directory.

use docqa_core::{AppError, AppResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::time::Instant;

/// Held for the whole duration of a rebuild; unlocks on drop.
#[derive(Debug)]
pub struct IndexWriteLock {
    file: File,
    path: PathBuf,
}

impl IndexWriteLock {
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release index lock {:?}: {}", self.path, e);
        }
    }
}

/// Block (off the async runtime) until the lock at `path` is ours.
pub async fn acquire_write_lock(path: PathBuf) -> AppResult<IndexWriteLock> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::task::spawn_blocking(move || -> AppResult<IndexWriteLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| AppError::Other(format!("open index lock {:?}: {}", path, e)))?;

        let start = Instant::now();
        file.lock_exclusive()
            .map_err(|e| AppError::Other(format!("acquire index lock {:?}: {}", path, e)))?;
        tracing::debug!(
            "Acquired index lock {:?} after {}ms",
            path,
            start.elapsed().as_millis()
        );

        Ok(IndexWriteLock { file, path })
    })
    .await
    .map_err(|e| AppError::Other(format!("index lock task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_is_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("index.lock");

        let lock = acquire_write_lock(path.clone()).await.unwrap();
        assert!(path.exists());

        let probe = File::open(&path).unwrap();
        assert!(probe.try_lock_exclusive().is_err());

        drop(lock);
        probe.try_lock_exclusive().unwrap();
        FileExt::unlock(&probe).unwrap();
    }
}
